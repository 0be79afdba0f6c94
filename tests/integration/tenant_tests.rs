//! Tenant list, usage chart and dashboard stats

use axum::http::StatusCode;
use chrono::{Duration, NaiveDate, Utc};
use serde_json::Value;

use crate::common::*;

fn days_ago(days: i64) -> NaiveDate {
    (Utc::now() - Duration::days(days)).date_naive()
}

fn label(date: NaiveDate) -> String {
    date.format("%d/%m").to_string()
}

async fn seeded_app() -> (TestApp, String) {
    let app = TestApp::new().await;
    app.seed_tenant("1", "Acme Maritime", 120.5).await;
    app.seed_tenant("2", "Globex", 980.0).await;
    app.seed_tenant("3", "Initech", 45.0).await;

    for (days, gb) in [(0, 1.0), (3, 2.0), (10, 4.0), (40, 8.0)] {
        app.seed_usage("1", days_ago(days), gb).await;
    }
    app.seed_usage("3", days_ago(1), 250.0).await;
    app.seed_usage("3", days_ago(2), 750.0).await;

    let token = app.alice_token().await;
    (app, token)
}

fn names(tenants: &Value) -> Vec<String> {
    tenants
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_tenants_heaviest_first() {
    let (app, token) = seeded_app().await;

    let response = app.get_with_auth("/api/v1/tenants", &token).await;
    response.assert_ok();
    assert_eq!(
        names(&response.json()),
        vec!["Globex", "Acme Maritime", "Initech"]
    );
}

#[tokio::test]
async fn test_tenant_search_is_case_insensitive() {
    let (app, token) = seeded_app().await;

    let tenants: Value = app
        .get_with_auth("/api/v1/tenants?search=ACME", &token)
        .await
        .json();
    assert_eq!(names(&tenants), vec!["Acme Maritime"]);

    let tenants: Value = app
        .get_with_auth("/api/v1/tenants?search=zzz", &token)
        .await
        .json();
    assert!(names(&tenants).is_empty());
}

#[tokio::test]
async fn test_usage_default_window() {
    let (app, token) = seeded_app().await;

    let response = app.get_with_auth("/api/v1/tenants/1/usage", &token).await;
    response.assert_ok();

    let usage: Value = response.json();
    assert_eq!(usage["tenant_id"], "1");
    assert_eq!(usage["window_days"], 30);
    assert_eq!(
        usage["dates"],
        serde_json::json!([label(days_ago(10)), label(days_ago(3)), label(days_ago(0))])
    );
    assert_eq!(usage["values"], serde_json::json!([4.0, 2.0, 1.0]));
    assert_eq!(usage["total_gb"], 15.0);
}

#[tokio::test]
async fn test_usage_week_window() {
    let (app, token) = seeded_app().await;

    let usage: Value = app
        .get_with_auth("/api/v1/tenants/1/usage?days=7", &token)
        .await
        .json();
    assert_eq!(usage["values"], serde_json::json!([2.0, 1.0]));
    assert_eq!(usage["total_gb"], 15.0);
}

#[tokio::test]
async fn test_usage_thinned_quarter() {
    let (app, token) = seeded_app().await;

    let usage: Value = app
        .get_with_auth("/api/v1/tenants/1/usage?days=90&step=2", &token)
        .await
        .json();
    assert_eq!(usage["values"], serde_json::json!([8.0, 2.0]));
    assert_eq!(
        usage["dates"],
        serde_json::json!([label(days_ago(40)), label(days_ago(3))])
    );
}

#[tokio::test]
async fn test_usage_rejects_other_windows() {
    let (app, token) = seeded_app().await;

    let response = app
        .get_with_auth("/api/v1/tenants/1/usage?days=14", &token)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_usage_for_tenant_without_records() {
    let (app, token) = seeded_app().await;

    let usage: Value = app
        .get_with_auth("/api/v1/tenants/2/usage", &token)
        .await
        .json();
    assert_eq!(usage["dates"], serde_json::json!([]));
    assert_eq!(usage["total_gb"], 0.0);
}

#[tokio::test]
async fn test_dashboard_stats_default_to_first_listed_tenant() {
    let (app, token) = seeded_app().await;

    let response = app.get_with_auth("/api/v1/dashboard/stats", &token).await;
    response.assert_ok();

    let stats: Value = response.json();
    assert_eq!(stats["tenant_count"], 3);
    assert_eq!(stats["tenant_id"], "3");
    assert_eq!(stats["total_data_gb"], 1000.0);
    assert_eq!(stats["total_data_exchanged"], "1.00 TB");
}

#[tokio::test]
async fn test_dashboard_stats_for_selected_tenant() {
    let (app, token) = seeded_app().await;

    let stats: Value = app
        .get_with_auth("/api/v1/dashboard/stats?tenant_id=1", &token)
        .await
        .json();
    assert_eq!(stats["tenant_id"], "1");
    assert_eq!(stats["tenant_count"], 3);
    assert_eq!(stats["total_data_gb"], 15.0);
}

#[tokio::test]
async fn test_dashboard_stats_without_tenants() {
    let app = TestApp::new().await;
    let token = app.alice_token().await;

    let stats: Value = app
        .get_with_auth("/api/v1/dashboard/stats", &token)
        .await
        .json();
    assert_eq!(stats["tenant_count"], 0);
    assert!(stats["tenant_id"].is_null());
    assert_eq!(stats["total_data_exchanged"], "0.00 TB");
}
