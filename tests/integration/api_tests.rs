//! Routing, health and session enforcement

use std::sync::Arc;

use axum::http::StatusCode;
use rstest::rstest;
use serde_json::{json, Value};

use crate::common::*;

#[tokio::test]
async fn test_health_reports_version() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/health").await;
    response.assert_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_readiness_with_reachable_backend() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/health/ready").await;
    response.assert_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["backend"]["name"], "sqlite");
    assert_eq!(body["backend"]["status"], "healthy");
}

#[tokio::test]
async fn test_readiness_with_unreachable_backend() {
    let app = TestApp::with_backend(Arc::new(UnreachableBackend)).await;
    let response = app.get("/api/v1/health/ready").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = response.json();
    assert_eq!(body["backend"]["status"], "unhealthy");
    assert!(!response.text().contains("connection refused"));
}

#[rstest]
#[case("/api/v1/auth/me")]
#[case("/api/v1/audit-logs")]
#[case("/api/v1/audit-logs/export")]
#[case("/api/v1/tenants")]
#[case("/api/v1/tenants/1/usage")]
#[case("/api/v1/dashboard/stats")]
#[tokio::test]
async fn test_protected_routes_require_session(#[case] uri: &str) {
    let app = TestApp::new().await;
    let response = app.get(uri).await;
    response.assert_unauthorized();

    let body: Value = response.json();
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let app = TestApp::new().await;
    app.get_with_auth("/api/v1/auth/me", "not-a-jwt")
        .await
        .assert_unauthorized();
}

#[tokio::test]
async fn test_reset_token_does_not_open_a_session() {
    let app = TestApp::new().await;
    let user = app.seed_alice().await;
    let reset = app
        .state
        .reset_tokens
        .issue(&user.id, &user.email, &user.username)
        .unwrap();

    app.get_with_auth("/api/v1/auth/me", &reset.token)
        .await
        .assert_unauthorized();
}

#[tokio::test]
async fn test_session_token_opens_protected_routes() {
    let app = TestApp::new().await;
    let token = app.alice_token().await;

    let response = app.get_with_auth("/api/v1/auth/me", &token).await;
    response.assert_ok();

    let body: Value = response.json();
    assert_eq!(body["email"], alice::EMAIL);
    assert_eq!(body["username"], alice::USERNAME);
}

#[tokio::test]
async fn test_legacy_endpoints_can_be_disabled() {
    let mut config = test_config();
    config.auth.legacy_token_endpoints = false;
    let app = TestApp::with_config(config).await;

    app.post_json("/api/verify-token", json!({"token": "x"}))
        .await
        .assert_not_found();
    app.post_json(
        "/api/send-reset",
        json!({"email": "a@example.com", "username": "a", "userId": "1"}),
    )
    .await
    .assert_not_found();
}

#[tokio::test]
async fn test_unknown_route() {
    let app = TestApp::new().await;
    app.get("/api/v2/health").await.assert_not_found();
}

fn login_from(ip: [u8; 4]) -> axum::http::Request<axum::body::Body> {
    let mut request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/v1/auth/login")
        .header("Content-Type", "application/json")
        .body(axum::body::Body::from(
            json!({"email": "nobody@example.com", "password": "wrong-password"}).to_string(),
        ))
        .unwrap();
    request
        .extensions_mut()
        .insert(axum::extract::ConnectInfo(std::net::SocketAddr::from((ip, 40000))));
    request
}

#[tokio::test]
async fn test_auth_routes_are_rate_limited_per_client() {
    use futurekonnect_console::{api, config::RateLimitSettings, middleware::RateLimitState};
    use tower::ServiceExt;

    let app = TestApp::new().await;
    let limiter = RateLimitState::new(&RateLimitSettings {
        enabled: true,
        requests_per_period: 1,
        period_secs: 3600,
        burst_size: 2,
    });
    let router = api::router(app.state.clone(), Some(limiter));

    for _ in 0..2 {
        let response = router.clone().oneshot(login_from([10, 0, 0, 1])).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let limited = router.clone().oneshot(login_from([10, 0, 0, 1])).await.unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers().contains_key("retry-after"));

    let other = router.clone().oneshot(login_from([10, 0, 0, 2])).await.unwrap();
    assert_eq!(other.status(), StatusCode::UNAUTHORIZED);
}
