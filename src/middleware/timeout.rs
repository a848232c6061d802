//! Gives timed-out requests the same JSON error body as every other failure.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::error::AppError;

/// `map_response` hook placed outside `TimeoutLayer`, which answers with a bare 408.
pub async fn timeout_body(res: Response) -> Response {
    if res.status() == StatusCode::REQUEST_TIMEOUT
        && !res.headers().contains_key(header::CONTENT_TYPE)
    {
        return AppError::RequestTimeout.into_response();
    }
    res
}
