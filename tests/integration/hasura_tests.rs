//! Hasura GraphQL backend against a mocked endpoint

use std::sync::Arc;

use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use futurekonnect_console::{config::HasuraConfig, services::Backend, services::HasuraClient};

use crate::common::*;

const ADMIN_SECRET: &str = "hasura-admin-secret";

fn client(server: &MockServer) -> HasuraClient {
    HasuraClient::new(&HasuraConfig {
        url: format!("{}/v1/graphql", server.uri()),
        admin_secret: Some(ADMIN_SECRET.to_string()),
        timeout_secs: 5,
        user_id_type: "Int".to_string(),
        tenant_id_type: "Int".to_string(),
    })
    .unwrap()
}

fn graphql() -> wiremock::MockBuilder {
    Mock::given(method("POST"))
        .and(path("/v1/graphql"))
        .and(header("x-hasura-admin-secret", ADMIN_SECRET))
}

#[tokio::test]
async fn test_find_users_by_email() {
    let server = MockServer::start().await;
    graphql()
        .and(body_string_contains("GetUserByEmail"))
        .and(body_partial_json(json!({"variables": {"email": "alice@example.com"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"Users": [{
                "id": 42,
                "username": "alice",
                "email": "alice@example.com",
                "password": "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"
            }]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let users = client(&server)
        .find_users_by_email("alice@example.com")
        .await
        .unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, "42");
    assert!(users[0].password_hash.starts_with("$argon2id$"));
}

#[tokio::test]
async fn test_graphql_errors_become_failures() {
    let server = MockServer::start().await;
    graphql()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{"message": "field 'Users' not found in type: 'query_root'"}]
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .find_users_by_email("alice@example.com")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found in type"));
}

#[tokio::test]
async fn test_http_error_becomes_failure() {
    let server = MockServer::start().await;
    graphql()
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    assert!(client(&server).list_tenants().await.is_err());
    assert!(client(&server).ping().await.is_err());
}

#[tokio::test]
async fn test_update_password_sends_integer_id() {
    let server = MockServer::start().await;
    graphql()
        .and(body_string_contains("update_Users_by_pk"))
        .and(body_partial_json(json!({"variables": {"id": 42}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"update_Users_by_pk": {"id": 42}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client(&server)
        .update_password("42", "$argon2id$new")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_update_password_for_missing_row() {
    let server = MockServer::start().await;
    graphql()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"update_Users_by_pk": null}
        })))
        .mount(&server)
        .await;

    assert!(!client(&server)
        .update_password("404", "$argon2id$new")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_audit_logs_and_usage_parse() {
    let server = MockServer::start().await;
    graphql()
        .and(body_string_contains("GetAuditLogs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"audit_logs": [{
                "id": 9,
                "time": "2024-03-02T08:15:00",
                "description": "Deleted firewall rule",
                "event": "Delete",
                "category": "Firewall Rule",
                "performed_by": "ops"
            }]}
        })))
        .mount(&server)
        .await;
    graphql()
        .and(body_string_contains("GetTenantUsage"))
        .and(body_partial_json(json!({"variables": {"tenantId": 3}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"tenant_data_usage_daily": [
                {"usage_date": "2024-03-02", "data_usage_gb": 12.5},
                {"usage_date": "2024-03-01", "data_usage_gb": 7}
            ]}
        })))
        .mount(&server)
        .await;

    let hasura = client(&server);
    let logs = hasura.list_audit_logs().await.unwrap();
    assert_eq!(logs[0].id, "9");
    assert_eq!(logs[0].time, at(2, 8) + chrono::Duration::minutes(15));

    let usage = hasura.list_tenant_usage("3").await.unwrap();
    assert_eq!(usage.len(), 2);
    assert_eq!(usage[1].data_usage_gb, 7.0);
}

#[tokio::test]
async fn test_forgot_password_through_hasura() {
    let server = MockServer::start().await;
    graphql()
        .and(body_string_contains("GetUserByEmail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"Users": [
                {"id": 7, "username": "Alice", "email": "alice@example.com", "password": "x"},
                {"id": 8, "username": "someone-else", "email": "alice@example.com", "password": "y"}
            ]}
        })))
        .mount(&server)
        .await;

    let app = TestApp::with_backend(Arc::new(client(&server))).await;
    app.post_json(
        "/api/v1/auth/forgot-password",
        json!({"email": "alice@example.com", "username": "alice"}),
    )
    .await
    .assert_ok();

    let token = app.mailer.last_token().unwrap();
    let decoded = app.state.reset_tokens.decode(Some(&token)).unwrap();
    assert_eq!(decoded.user_id, "7");
}
