//! Application error types shared by the store, the authenticator and the HTTP layer.

use axum::{
    extract::rejection::JsonRejection,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Seconds a client should wait before retrying a `StoreUnavailable` response.
const RETRY_AFTER_SECS: &str = "1";

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Weak secret: {0}")]
    WeakSecret(String),

    #[error("Identity already registered")]
    Conflict,

    #[error("Record not found")]
    NotFound,

    /// Deliberately carries no detail: callers must not learn which field was wrong.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Token expired")]
    Expired,

    #[error("Malformed token")]
    Malformed,

    #[error("Bad token signature")]
    BadSignature,

    #[error("Request timed out")]
    RequestTimeout,

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable kind returned in the `error` field of failure bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidIdentity(_) => "invalid_identity",
            AppError::WeakSecret(_) => "weak_secret",
            AppError::Conflict => "conflict",
            AppError::NotFound => "not_found",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::Expired => "expired",
            AppError::Malformed => "malformed",
            AppError::BadSignature => "bad_signature",
            AppError::InvalidBody(_) => "invalid_body",
            AppError::RequestTimeout => "request_timeout",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidIdentity(_) | AppError::WeakSecret(_) | AppError::InvalidBody(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::InvalidCredentials
            | AppError::Expired
            | AppError::Malformed
            | AppError::BadSignature => StatusCode::UNAUTHORIZED,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Only store outages are worth retrying; everything else is terminal for the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::Conflict,
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => AppError::StoreUnavailable(e.to_string()),
            other => AppError::Internal(anyhow::Error::new(other).context("database")),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidBody(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.kind() }));

        match &self {
            AppError::Internal(e) => error!(error = %e, "internal error"),
            AppError::StoreUnavailable(msg) => error!(reason = %msg, "store unavailable"),
            _ => {}
        }

        if self.is_retryable() {
            return (status, [(header::RETRY_AFTER, RETRY_AFTER_SECS)], body).into_response();
        }
        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
