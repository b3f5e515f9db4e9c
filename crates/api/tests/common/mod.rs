//! Shared harness for HTTP-level integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tempfile::TempDir;
use tokio::sync::Notify;
use tower::ServiceExt;

use scholarship_api::auth::jwt::{generate_access_token, JwtConfig};
use scholarship_api::auth::password::hash_password;
use scholarship_api::config::{ExtractionConfig, ServerConfig};
use scholarship_api::router::build_app_router;
use scholarship_api::state::AppState;
use scholarship_api::ws::WsManager;
use scholarship_core::types::DbId;
use scholarship_db::models::user::{CreateUser, User};
use scholarship_db::repositories::{ReferenceRepo, UserRepo};
use scholarship_events::EventBus;
use scholarship_storage::LocalStore;

pub const SCHOOL_YEAR: &str = "2025-2026";
pub const SEMESTER: &str = "1st Semester";
pub const PASSWORD: &str = "correct-horse-battery";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
        },
        extraction: ExtractionConfig::default(),
    }
}

/// Application under test. The temp directory backs the object store and
/// lives as long as the app.
pub struct TestApp {
    pub state: AppState,
    router: Router,
    _storage_dir: TempDir,
}

impl TestApp {
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Sign an access token carrying the user's own role and branch.
    pub fn token_for(&self, user: &User) -> String {
        generate_access_token(user.id, &user.role, user.branch_id, &self.state.config.jwt)
            .expect("token generation should succeed")
    }
}

/// Build the production router over `pool`. No extraction runner is
/// spawned, so uploaded jobs stay pending.
pub async fn build_test_app(pool: PgPool) -> TestApp {
    let config = test_config();
    let storage_dir = tempfile::tempdir().expect("tempdir");
    let storage = LocalStore::create(storage_dir.path())
        .await
        .expect("local store");

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        ws_manager: Arc::new(WsManager::new()),
        event_bus: Arc::new(EventBus::default()),
        storage: Arc::new(storage),
        extraction_wakeup: Arc::new(Notify::new()),
    };

    TestApp {
        router: build_app_router(state.clone(), &config),
        state,
        _storage_dir: storage_dir,
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Create an active user with [`PASSWORD`] as the password.
pub async fn create_user(pool: &PgPool, username: &str, role: &str, branch_id: Option<DbId>) -> User {
    let role = ReferenceRepo::find_role_by_name(pool, role)
        .await
        .unwrap()
        .expect("seeded role");
    UserRepo::create(
        pool,
        &CreateUser {
            username: username.to_string(),
            email: format!("{username}@example.edu"),
            password_hash: hash_password(PASSWORD).unwrap(),
            role_id: role.id,
            branch_id,
        },
    )
    .await
    .expect("user creation should succeed")
}

pub async fn branch_id(pool: &PgPool, name: &str) -> DbId {
    sqlx::query_scalar("SELECT id FROM branches WHERE name = $1")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Insert an active scholar in `branch`, returning its ID.
pub async fn seed_scholar(pool: &PgPool, student_number: &str, branch: &str) -> DbId {
    let branch_id = branch_id(pool, branch).await;
    sqlx::query_scalar(
        "INSERT INTO scholars (student_number, first_name, last_name, year_level, branch_id)
         VALUES ($1, 'Test', $1, 2, $2)
         RETURNING id",
    )
    .bind(student_number)
    .bind(branch_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: &serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, json_request(Method::POST, uri, None, &body)).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, json_request(Method::POST, uri, Some(token), &body)).await
}

/// POST without a body.
pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, json_request(Method::PUT, uri, Some(token), &body)).await
}

/// Build a single-file multipart body with optional extra text fields.
pub fn multipart_body(
    boundary: &str,
    filename: &str,
    content_type: &str,
    data: &[u8],
    fields: &[(&str, &str)],
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

pub async fn post_multipart_auth(
    app: Router,
    uri: &str,
    token: &str,
    boundary: &str,
    body: Vec<u8>,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}
