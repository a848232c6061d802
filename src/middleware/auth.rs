//! Auth extractor: the principal attached by `RequireBearer`.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::error;

use crate::error::AppError;
use crate::models::Principal;

/// Extractor: authenticated principal. Only valid on routes behind the interceptor chain.
#[derive(Clone, Copy, Debug)]
pub struct AuthUser(pub Principal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .copied()
            .map(AuthUser)
            .ok_or_else(|| {
                error!("AuthUser used on a route without RequireBearer");
                AppError::Malformed
            })
    }
}
