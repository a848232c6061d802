//! Interceptor chain: ordered request transforms run before protected handlers.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use tracing::debug;
use uuid::Uuid;

use crate::auth::TokenIssuer;
use crate::error::AppError;

pub const HEADER_REQUEST_ID: &str = "x-request-id";

/// One step of the chain. Returning `Err` short-circuits into an error response.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, req: Request) -> Result<Request, AppError>;
}

/// Interceptors applied in insertion order.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    steps: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, step: impl Interceptor + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn apply(&self, req: Request) -> Result<Request, AppError> {
        self.steps.iter().try_fold(req, |req, step| step.intercept(req))
    }
}

/// Axum adapter: `middleware::from_fn_with_state(chain, intercept)`.
pub async fn intercept(State(chain): State<InterceptorChain>, req: Request, next: Next) -> Response {
    match chain.apply(req) {
        Ok(req) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

/// Stamps an `x-request-id` header when the client did not send one.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssignRequestId;

impl Interceptor for AssignRequestId {
    fn intercept(&self, mut req: Request) -> Result<Request, AppError> {
        if !req.headers().contains_key(HEADER_REQUEST_ID) {
            let id = Uuid::new_v4().to_string();
            if let Ok(value) = HeaderValue::from_str(&id) {
                req.headers_mut().insert(HEADER_REQUEST_ID, value);
            }
        }
        Ok(req)
    }
}

/// Verifies the bearer token and attaches the resulting `Principal` to the request.
#[derive(Clone)]
pub struct RequireBearer {
    issuer: TokenIssuer,
}

impl RequireBearer {
    pub fn new(issuer: TokenIssuer) -> Self {
        Self { issuer }
    }
}

impl Interceptor for RequireBearer {
    fn intercept(&self, mut req: Request) -> Result<Request, AppError> {
        let Some(Authorization(bearer)) = req.headers().typed_get::<Authorization<Bearer>>() else {
            debug!("rejected request: missing or invalid bearer token");
            return Err(AppError::Malformed);
        };
        let principal = self.issuer.verify(bearer.token())?;
        req.extensions_mut().insert(principal);
        Ok(req)
    }
}
