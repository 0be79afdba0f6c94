//! Test application setup utilities
//!
//! Provides utilities for setting up test instances of the application
//! with in-memory databases and mock services.

use std::sync::Arc;

use axum::{body::Body, http::Request, Router};
use chrono::NaiveDate;
use tower::ServiceExt;

use futurekonnect_console::{
    api,
    config::{AppConfig, DatabaseConfig},
    db::{self, AuditRepository, DbPool, SqliteBackend, TenantRepository, UserRepository},
    middleware::auth::create_access_token,
    models::{AuditLogEntry, NewUser, Tenant, TenantUsageRecord, User},
    services::{AuthService, Backend},
    AppState,
};

use super::fixtures::{alice, TEST_BASE_URL, TEST_JWT_SECRET};
use super::mocks::RecordingMailer;

/// Test application wrapper for integration testing
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    /// Store behind the default SQLite backend, for seeding
    pub pool: DbPool,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    /// Create a new test application with in-memory SQLite database
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    /// Create a new test application with custom configuration
    pub async fn with_config(config: AppConfig) -> Self {
        let pool = db::init_pool(&config.database)
            .await
            .expect("Failed to initialize test database");
        let backend = Arc::new(SqliteBackend::new(pool.clone()));
        Self::assemble(config, backend, pool)
    }

    /// Create a test application over another data backend
    pub async fn with_backend(backend: Arc<dyn Backend>) -> Self {
        let config = test_config();
        let pool = db::init_pool(&config.database)
            .await
            .expect("Failed to initialize test database");
        Self::assemble(config, backend, pool)
    }

    fn assemble(config: AppConfig, backend: Arc<dyn Backend>, pool: DbPool) -> Self {
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(config, backend, mailer.clone());
        let router = api::router(state.clone(), None);

        Self {
            router,
            state,
            pool,
            mailer,
        }
    }

    /// Insert an account with an Argon2 hash of `password`
    pub async fn seed_user(&self, username: &str, email: &str, password: &str) -> User {
        UserRepository::new(&self.pool)
            .insert(&NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash: AuthService::hash_password(password).unwrap(),
            })
            .await
            .expect("Failed to seed user")
    }

    pub async fn seed_alice(&self) -> User {
        self.seed_user(alice::USERNAME, alice::EMAIL, alice::PASSWORD)
            .await
    }

    pub async fn seed_audit_logs(&self, entries: &[AuditLogEntry]) {
        let repo = AuditRepository::new(&self.pool);
        for entry in entries {
            repo.insert(entry).await.expect("Failed to seed audit log");
        }
    }

    pub async fn seed_tenant(&self, id: &str, name: &str, data_usage_gb: f64) {
        TenantRepository::new(&self.pool)
            .insert(&Tenant {
                id: id.to_string(),
                name: name.to_string(),
                data_usage_gb,
            })
            .await
            .expect("Failed to seed tenant");
    }

    pub async fn seed_usage(&self, tenant_id: &str, usage_date: NaiveDate, data_usage_gb: f64) {
        TenantRepository::new(&self.pool)
            .insert_usage(tenant_id, &TenantUsageRecord::new(usage_date, data_usage_gb))
            .await
            .expect("Failed to seed usage");
    }

    /// Session token for `user`, as issued at login
    pub fn token_for(&self, user: &User) -> String {
        create_access_token(
            user,
            &self.state.config.auth.jwt_secret,
            self.state.config.auth.token_expiry_hours,
        )
        .expect("Failed to generate test token")
    }

    /// Session token for a seeded alice
    pub async fn alice_token(&self) -> String {
        let user = self.seed_alice().await;
        self.token_for(&user)
    }

    /// Make a GET request to the test application
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Make an authenticated GET request
    pub async fn get_with_auth(&self, uri: &str, token: &str) -> TestResponse {
        self.request(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Make a POST request with JSON body
    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> TestResponse {
        self.post_raw(uri, &body.to_string()).await
    }

    /// Make an authenticated POST request with JSON body
    pub async fn post_json_with_auth(
        &self,
        uri: &str,
        body: serde_json::Value,
        token: &str,
    ) -> TestResponse {
        self.request(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Make a POST request with a body that may not be valid JSON
    pub async fn post_raw(&self, uri: &str, body: &str) -> TestResponse {
        self.request(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Make an arbitrary request
    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: axum::http::StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: bytes::Bytes,
}

impl TestResponse {
    /// Get the response body as a string
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Parse the response body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to parse response as JSON")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// `message` field of a JSON body
    pub fn message(&self) -> String {
        let body: serde_json::Value = self.json();
        body["message"].as_str().unwrap_or_default().to_string()
    }

    /// Assert the response status
    pub fn assert_status(&self, expected: axum::http::StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
        self
    }

    /// Assert the response status is OK (200)
    pub fn assert_ok(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::OK)
    }

    /// Assert the response status is Created (201)
    pub fn assert_created(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::CREATED)
    }

    /// Assert the response status is Bad Request (400)
    pub fn assert_bad_request(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::BAD_REQUEST)
    }

    /// Assert the response status is Unauthorized (401)
    pub fn assert_unauthorized(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::UNAUTHORIZED)
    }

    /// Assert the response status is Not Found (404)
    pub fn assert_not_found(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::NOT_FOUND)
    }
}

/// Test configuration: in-memory SQLite, log-free mailer, fixed secret
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.server.static_dir = None;
    config.server.serve_frontend = false;
    config.app.base_url = TEST_BASE_URL.to_string();
    config.auth.jwt_secret = TEST_JWT_SECRET.to_string();
    config.auth.legacy_token_endpoints = true;
    config.database = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        connect_timeout_secs: 5,
        idle_timeout_secs: 60,
    };
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_creation() {
        let app = TestApp::new().await;
        assert_eq!(app.state.backend.name(), "sqlite");
        assert!(app.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = TestApp::new().await;
        let response = app.get("/api/v1/health").await;
        response.assert_ok();
    }
}
