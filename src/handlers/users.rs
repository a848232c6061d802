//! Handlers for the authenticated caller's own account.

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::http::AppState;
use crate::middleware::AuthUser;
use crate::models::Role;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// GET /api/v1/users/me
pub async fn me(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Result<Json<MeResponse>, AppError> {
    let user = state.authenticator().profile(principal.subject_id).await?;
    Ok(Json(MeResponse {
        id: user.id,
        email: user.identity,
        name: user.name,
        role: user.role,
        created_at: user.created_at,
    }))
}

/// PUT /api/v1/users/me/password
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    WithRejection(Json(body), _): WithRejection<Json<ChangePasswordRequest>, AppError>,
) -> Result<StatusCode, AppError> {
    state
        .authenticator()
        .change_password(principal.subject_id, &body.current_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/users/me. Soft delete: the identity becomes free to register again.
pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Result<StatusCode, AppError> {
    state.authenticator().deactivate(principal.subject_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
