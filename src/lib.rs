//! Credential authentication service.
//!
//! Exposes open-webui compatible `/api/v1/auths/signup` and `/api/v1/auths/signin`
//! over a Postgres credential store, with Argon2id password hashing,
//! timing-equalised login and signed, time-bounded session tokens.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;

pub use config::Config;
pub use error::AppError;
pub use handlers::http::AppState;
pub use services::Authenticator;

use axum::routing::{get, post, put};
use handlers::http;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Build the API router (health, auths, users). Used by main and by integration tests.
pub fn create_app(state: AppState) -> axum::Router {
    let auth_routes = axum::Router::new()
        .route("/signup", post(auth::signup))
        .route("/signin", post(auth::signin));

    let user_routes = axum::Router::new()
        .route("/me", get(handlers::me).delete(handlers::delete_me))
        .route("/me/password", put(handlers::change_password))
        .route_layer(axum::middleware::from_fn_with_state(
            state.chain.clone(),
            middleware::intercept,
        ));

    let request_timeout = state.request_timeout;

    axum::Router::new()
        .route("/health", get(http::health))
        .nest("/api/v1/auths", auth_routes)
        .nest("/api/v1/users", user_routes)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                        tracing::info_span!(
                            "http_request",
                            method = %req.method(),
                            uri = %req.uri(),
                        )
                    }),
                )
                .layer(axum::middleware::map_response(middleware::timeout_body))
                .layer(TimeoutLayer::new(request_timeout))
                .layer(CorsLayer::permissive()),
        )
}
