//! Shared application state and the health probe.

use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, Json};
use serde_json::json;

use crate::auth::{CredentialPolicy, SecretHasher, TokenIssuer};
use crate::config::Config;
use crate::error::AppResult;
use crate::middleware::{AssignRequestId, InterceptorChain, RequireBearer};
use crate::repositories::CredentialStore;
use crate::services::Authenticator;

/// Shared application state for all routes.
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Authenticator,
    /// Runs in front of every `/api/v1/users` route.
    pub chain: InterceptorChain,
    pub request_timeout: Duration,
}

impl AppState {
    /// Wire the authenticator and the protected-route chain around an injected store.
    pub fn new(config: &Config, store: Arc<dyn CredentialStore>) -> AppResult<Self> {
        let hasher = SecretHasher::new(config.hash_params)?;
        let issuer = TokenIssuer::new(
            config.signing_key.as_bytes(),
            config.token_issuer.clone(),
            config.token_ttl,
        );
        let authenticator = Authenticator::new(
            store,
            hasher,
            issuer,
            CredentialPolicy::new(config.password_min_length),
            config.store_timeout,
        );
        Ok(Self::from_authenticator(authenticator, config.request_timeout))
    }

    pub fn from_authenticator(authenticator: Authenticator, request_timeout: Duration) -> Self {
        let chain = InterceptorChain::new()
            .with(AssignRequestId)
            .with(RequireBearer::new(authenticator.issuer().clone()));
        Self {
            authenticator,
            chain,
            request_timeout,
        }
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }
}

/// GET /health: liveness probe.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": "user-service" })),
    )
}
