//! Integration tests: health, signup/signin, protected user routes.
//!
//! Run with `cargo test`. Most tests use the in-memory credential store. The
//! Postgres tests need `TEST_DATABASE_URL` (migrations are applied on start)
//! and are skipped when it is unset.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use serde_json::{json, Value};
use tokio_test::assert_ok;
use tower::util::ServiceExt;
use user_service::auth::{CredentialPolicy, HashParams, SecretHasher, TokenIssuer};
use user_service::db::{self, PgCredentialStore};
use user_service::error::AppResult;
use user_service::models::{NewUser, UserRecord};
use user_service::repositories::{CredentialStore, MemoryCredentialStore};
use user_service::{create_app, AppState, Authenticator};

const SIGNING_KEY: &[u8] = b"test-jwt-secret-min-32-chars!!!!";

fn test_state(store: Arc<dyn CredentialStore>) -> AppState {
    test_state_with_timeout(store, Duration::from_secs(30))
}

fn test_state_with_timeout(store: Arc<dyn CredentialStore>, request_timeout: Duration) -> AppState {
    let hasher = SecretHasher::new(HashParams {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    })
    .expect("hasher");
    let issuer = TokenIssuer::new(SIGNING_KEY, "user-service", Duration::from_secs(24 * 60 * 60));
    let authenticator = Authenticator::new(
        store,
        hasher,
        issuer,
        CredentialPolicy::default(),
        Duration::from_secs(5),
    );
    AppState::from_authenticator(authenticator, request_timeout)
}

fn memory_app() -> axum::Router {
    create_app(test_state(Arc::new(MemoryCredentialStore::new())))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_bearer(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token));
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(res: Response<Body>) -> Value {
    let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn signup(app: &axum::Router, email: &str, password: &str) -> Response<Body> {
    app.clone()
        .oneshot(post_json(
            "/api/v1/auths/signup",
            json!({ "email": email, "password": password }),
        ))
        .await
        .unwrap()
}

async fn signin(app: &axum::Router, email: &str, password: &str) -> Response<Body> {
    app.clone()
        .oneshot(post_json(
            "/api/v1/auths/signin",
            json!({ "email": email, "password": password }),
        ))
        .await
        .unwrap()
}

async fn token_for(app: &axum::Router, email: &str, password: &str) -> String {
    let res = signin(app, email, password).await;
    assert_eq!(res.status(), StatusCode::OK);
    json_body(res).await["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = memory_app();
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = json_body(res).await;
    assert_eq!(json.get("status").and_then(|v| v.as_str()), Some("ok"));
}

#[tokio::test]
async fn signup_and_signin() {
    let app = memory_app();

    let res = signup(&app, "Alice@Example.com", "Secretpw1").await;
    assert_eq!(res.status(), StatusCode::OK, "signup should succeed");
    let json = json_body(res).await;
    assert_eq!(json["email"], "alice@example.com");
    assert_eq!(json["role"], "user");
    assert!(json.get("id").and_then(|v| v.as_str()).is_some());
    assert!(json.get("password").is_none());
    assert!(json.get("password_hash").is_none());

    let res = signin(&app, "alice@example.com", "Secretpw1").await;
    assert_eq!(res.status(), StatusCode::OK, "signin should succeed");
    let json = json_body(res).await;
    assert!(json.get("token").and_then(|v| v.as_str()).is_some(), "response should contain token");
    assert!(json.get("expiresAt").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn signin_token_verifies_to_the_signed_up_user() {
    let state = test_state(Arc::new(MemoryCredentialStore::new()));
    let issuer = state.authenticator().issuer().clone();
    let app = create_app(state);

    let res = signup(&app, "alice@example.com", "Secretpw1").await;
    let id = json_body(res).await["id"].as_str().unwrap().to_string();

    let token = token_for(&app, "alice@example.com", "Secretpw1").await;
    let principal = assert_ok!(issuer.verify(&token));
    assert_eq!(principal.subject_id.to_string(), id);
    assert_eq!(principal.role.as_str(), "user");
}

#[tokio::test]
async fn duplicate_signup_is_conflict() {
    let app = memory_app();
    assert_eq!(signup(&app, "alice@example.com", "Secretpw1").await.status(), StatusCode::OK);

    let res = signup(&app, "alice@example.com", "SomethingElse2").await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(res).await, json!({ "error": "conflict" }));
}

#[tokio::test]
async fn signup_validation_errors_are_bad_request() {
    let app = memory_app();

    let res = signup(&app, "alice@example.com", "abc").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(res).await, json!({ "error": "weak_secret" }));

    let res = signup(&app, "not-an-email", "Secretpw1").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(res).await, json!({ "error": "invalid_identity" }));

    // The weak-secret attempt left nothing behind.
    let res = signin(&app, "alice@example.com", "abc").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_body_is_bad_request_json() {
    let app = memory_app();
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/auths/signup")
        .header("content-type", "application/json")
        .body(Body::from("{\"email\": 42"))
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(res).await, json!({ "error": "invalid_body" }));
}

#[tokio::test]
async fn client_supplied_role_is_ignored() {
    let app = memory_app();
    let res = app
        .clone()
        .oneshot(post_json(
            "/api/v1/auths/signup",
            json!({ "email": "mallory@example.com", "password": "Secretpw1", "role": "admin" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["role"], "user");
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let app = memory_app();
    signup(&app, "alice@example.com", "Secretpw1").await;

    let wrong = signin(&app, "alice@example.com", "wrongpw").await;
    let unknown = signin(&app, "nobody@example.com", "Secretpw1").await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(wrong).await, json_body(unknown).await);
}

#[tokio::test]
async fn protected_routes_require_a_valid_bearer() {
    let app = memory_app();

    let req = Request::builder()
        .uri("/api/v1/users/me")
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(res).await, json!({ "error": "malformed" }));

    let foreign = TokenIssuer::new(
        b"some-other-signing-key-0123456789",
        "user-service",
        Duration::from_secs(60),
    )
    .mint(uuid::Uuid::new_v4(), user_service::models::Role::Admin)
    .unwrap();
    let res = app
        .oneshot(with_bearer("GET", "/api/v1/users/me", &foreign.token, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(res).await, json!({ "error": "bad_signature" }));
}

#[tokio::test]
async fn me_returns_the_caller() {
    let app = memory_app();
    signup(&app, "alice@example.com", "Secretpw1").await;
    let token = token_for(&app, "alice@example.com", "Secretpw1").await;

    let res = app
        .oneshot(with_bearer("GET", "/api/v1/users/me", &token, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = json_body(res).await;
    assert_eq!(json["email"], "alice@example.com");
    assert_eq!(json["role"], "user");
    assert!(json.get("createdAt").is_some());
}

#[tokio::test]
async fn change_password_then_signin_with_new_secret() {
    let app = memory_app();
    signup(&app, "alice@example.com", "Secretpw1").await;
    let token = token_for(&app, "alice@example.com", "Secretpw1").await;

    let res = app
        .clone()
        .oneshot(with_bearer(
            "PUT",
            "/api/v1/users/me/password",
            &token,
            Some(json!({ "currentPassword": "wrongpw", "newPassword": "NewSecret22" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app
        .clone()
        .oneshot(with_bearer(
            "PUT",
            "/api/v1/users/me/password",
            &token,
            Some(json!({ "currentPassword": "Secretpw1", "newPassword": "NewSecret22" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    assert_eq!(
        signin(&app, "alice@example.com", "Secretpw1").await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        signin(&app, "alice@example.com", "NewSecret22").await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn deleted_account_frees_the_identity() {
    let app = memory_app();
    signup(&app, "alice@example.com", "Secretpw1").await;
    let token = token_for(&app, "alice@example.com", "Secretpw1").await;

    let res = app
        .clone()
        .oneshot(with_bearer("DELETE", "/api/v1/users/me", &token, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    // The token is still cryptographically valid but names a deleted record.
    let res = app
        .clone()
        .oneshot(with_bearer("GET", "/api/v1/users/me", &token, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    assert_eq!(
        signin(&app, "alice@example.com", "Secretpw1").await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        signup(&app, "alice@example.com", "Secretpw1").await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn name_round_trips_through_signup_and_me() {
    let app = memory_app();
    let res = app
        .clone()
        .oneshot(post_json(
            "/api/v1/auths/signup",
            json!({ "email": "alice@example.com", "password": "Secretpw1", "name": " Alice Liddell " }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["name"], "Alice Liddell");

    let token = token_for(&app, "alice@example.com", "Secretpw1").await;
    let res = app
        .clone()
        .oneshot(with_bearer("GET", "/api/v1/users/me", &token, None))
        .await
        .unwrap();
    assert_eq!(json_body(res).await["name"], "Alice Liddell");

    // Name is optional.
    let res = signup(&app, "bob@example.com", "Secretpw1").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["name"], Value::Null);
}

#[tokio::test]
async fn over_long_secret_at_signin_is_invalid_credentials() {
    let app = memory_app();
    signup(&app, "alice@example.com", "Secretpw1").await;
    let res = signin(&app, "alice@example.com", &"x".repeat(10_000)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(res).await, json!({ "error": "invalid_credentials" }));
}

/// Store whose calls never complete.
struct HungStore;

#[async_trait]
impl CredentialStore for HungStore {
    async fn insert(&self, _user: NewUser) -> AppResult<UserRecord> {
        std::future::pending().await
    }
    async fn find_by_identity(&self, _identity: &str) -> AppResult<UserRecord> {
        std::future::pending().await
    }
    async fn find_by_id(&self, _id: uuid::Uuid) -> AppResult<UserRecord> {
        std::future::pending().await
    }
    async fn update_password(&self, _id: uuid::Uuid, _hash: &str) -> AppResult<UserRecord> {
        std::future::pending().await
    }
    async fn upgrade_password(&self, _id: uuid::Uuid, _expected: &str, _hash: &str) -> AppResult<bool> {
        std::future::pending().await
    }
    async fn soft_delete(&self, _id: uuid::Uuid) -> AppResult<()> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn request_timeout_answers_with_error_body() {
    let app = create_app(test_state_with_timeout(
        Arc::new(HungStore),
        Duration::from_millis(100),
    ));
    let res = signup(&app, "alice@example.com", "Secretpw1").await;
    assert_eq!(res.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(json_body(res).await, json!({ "error": "request_timeout" }));
}

async fn postgres_state() -> Option<(AppState, db::DbPool)> {
    let database_url = match std::env::var("TEST_DATABASE_URL") {
        Ok(u) => u,
        Err(_) => {
            eprintln!("Skip integration test: set TEST_DATABASE_URL");
            return None;
        }
    };
    let pool = match db::create_pool(&database_url, 5, Duration::from_secs(5)).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Skip integration test: {}", e);
            return None;
        }
    };
    db::MIGRATOR.run(&pool).await.expect("migrations");
    let store = Arc::new(PgCredentialStore::new(pool.clone()));
    Some((test_state(store), pool))
}

fn unique_email(tag: &str) -> String {
    format!("{}-{}@example.com", tag, uuid::Uuid::new_v4().simple())
}

#[tokio::test]
async fn postgres_signup_and_signin() {
    let Some((state, _pool)) = postgres_state().await else {
        return;
    };
    let app = create_app(state);
    let email = unique_email("pg");

    assert_eq!(signup(&app, &email, "Secretpw1").await.status(), StatusCode::OK);
    assert_eq!(signup(&app, &email, "Secretpw1").await.status(), StatusCode::CONFLICT);
    assert_eq!(signin(&app, &email, "Secretpw1").await.status(), StatusCode::OK);
    assert_eq!(signin(&app, &email, "wrongpw").await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn postgres_concurrent_signups_admit_exactly_one() {
    let Some((state, _pool)) = postgres_state().await else {
        return;
    };
    let authenticator = state.authenticator().clone();
    let email = unique_email("race");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let authenticator = authenticator.clone();
        let email = email.clone();
        handles.push(tokio::spawn(async move {
            authenticator.register(&email, "Secretpw1").await
        }));
    }
    let mut created = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => created += 1,
            Err(user_service::AppError::Conflict) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(created, 1);
}

#[tokio::test]
async fn postgres_soft_delete_keeps_the_row() {
    let Some((state, pool)) = postgres_state().await else {
        return;
    };
    let authenticator = state.authenticator().clone();
    let email = unique_email("gone");

    let user = authenticator.register(&email, "Secretpw1").await.unwrap();
    authenticator.deactivate(user.id).await.unwrap();

    let (deleted,): (bool,) =
        sqlx::query_as("SELECT deleted_at IS NOT NULL FROM users WHERE id = $1")
            .bind(user.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(deleted);
    assert!(authenticator.register(&email, "Secretpw1").await.is_ok());
}

#[tokio::test]
async fn postgres_name_and_hash_upgrade() {
    let Some((state, pool)) = postgres_state().await else {
        return;
    };
    let authenticator = state.authenticator().clone();
    let email = unique_email("named");

    let user = authenticator
        .register_with_name(&email, "Secretpw1", Some("Named User"))
        .await
        .unwrap();
    assert_eq!(user.name.as_deref(), Some("Named User"));

    let store = PgCredentialStore::new(pool);
    assert!(!store
        .upgrade_password(user.id, "$argon2id$stale", "$argon2id$other")
        .await
        .unwrap());
    assert!(store
        .upgrade_password(user.id, &user.password_hash, &user.password_hash)
        .await
        .unwrap());
    let reloaded = store.find_by_id(user.id).await.unwrap();
    assert_eq!(reloaded.name.as_deref(), Some("Named User"));
    assert_eq!(reloaded.password_hash, user.password_hash);
}
