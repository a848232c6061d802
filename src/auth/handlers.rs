//! Auth HTTP handlers: signup, signin.

use axum::{extract::State, Json};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::http::AppState;
use crate::models::Role;

/// Signup body. Any client-supplied role is ignored.
#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// POST /api/v1/auths/signup
pub async fn signup(
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<SignupRequest>, AppError>,
) -> Result<Json<SignupResponse>, AppError> {
    let user = state
        .authenticator()
        .register_with_name(&body.email, &body.password, body.name.as_deref())
        .await?;

    Ok(Json(SignupResponse {
        id: user.id,
        email: user.identity,
        name: user.name,
        role: user.role,
    }))
}

/// POST /api/v1/auths/signin
pub async fn signin(
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<CredentialsRequest>, AppError>,
) -> Result<Json<SigninResponse>, AppError> {
    let session = state
        .authenticator()
        .login(&body.email, &body.password)
        .await?;

    Ok(Json(SigninResponse {
        token: session.token,
        expires_at: session.expires_at,
    }))
}
