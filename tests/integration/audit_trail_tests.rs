//! Audit trail listing, filtering and CSV export

use axum::http::StatusCode;
use rstest::rstest;
use serde_json::Value;

use futurekonnect_console::models::{AuditEvent, AuditLogEntry};

use crate::common::*;

async fn seeded_app() -> (TestApp, String) {
    let app = TestApp::new().await;
    app.seed_audit_logs(&sample_audit_entries()).await;
    let token = app.alice_token().await;
    (app, token)
}

fn ids(page: &Value) -> Vec<String> {
    page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_default_listing_is_first_page_newest_first() {
    let (app, token) = seeded_app().await;

    let response = app.get_with_auth("/api/v1/audit-logs", &token).await;
    response.assert_ok();

    let page: Value = response.json();
    assert_eq!(page["total"], 12);
    assert_eq!(page["page"], 0);
    assert_eq!(page["page_size"], 10);
    assert_eq!(page["page_count"], 2);

    let ids = ids(&page);
    assert_eq!(ids.len(), 10);
    assert_eq!(ids[0], "log-12");
    assert_eq!(ids[9], "log-03");
}

#[tokio::test]
async fn test_second_page_holds_the_rest() {
    let (app, token) = seeded_app().await;

    let page: Value = app
        .get_with_auth("/api/v1/audit-logs?page=1", &token)
        .await
        .json();
    assert_eq!(ids(&page), vec!["log-02", "log-01"]);
}

#[tokio::test]
async fn test_page_past_the_end_is_empty() {
    let (app, token) = seeded_app().await;

    let page: Value = app
        .get_with_auth("/api/v1/audit-logs?page=5", &token)
        .await
        .json();
    assert_eq!(page["total"], 12);
    assert!(ids(&page).is_empty());
}

#[rstest]
#[case("category=Router", 6)]
#[case("actions=Create", 3)]
#[case("actions=Update,Download", 6)]
#[case("actions=create,%20DELETE", 6)]
#[case("user=jane", 3)]
#[case("user=OPS", 6)]
#[case("from=2024-03-05&to=2024-03-08", 4)]
#[case("from=2024-03-12", 1)]
#[case("to=2024-03-01", 1)]
#[case("category=Router&actions=Delete&from=2024-03-04", 2)]
#[case("category=Billing", 0)]
#[case("category=&user=&actions=", 12)]
#[tokio::test]
async fn test_filters(#[case] query: &str, #[case] expected: u64) {
    let (app, token) = seeded_app().await;

    let response = app
        .get_with_auth(&format!("/api/v1/audit-logs?{}", query), &token)
        .await;
    response.assert_ok();

    let page: Value = response.json();
    assert_eq!(page["total"], expected, "query: {}", query);
}

#[tokio::test]
async fn test_smaller_page_size() {
    let (app, token) = seeded_app().await;

    let page: Value = app
        .get_with_auth("/api/v1/audit-logs?page_size=5&page=2", &token)
        .await
        .json();
    assert_eq!(page["page_count"], 3);
    assert_eq!(ids(&page), vec!["log-02", "log-01"]);
}

#[rstest]
#[case("page_size=7")]
#[case("actions=Explode")]
#[case("from=2024-03-09&to=2024-03-02")]
#[tokio::test]
async fn test_rejected_queries(#[case] query: &str) {
    let (app, token) = seeded_app().await;

    let response = app
        .get_with_auth(&format!("/api/v1/audit-logs?{}", query), &token)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_export_is_csv_attachment() {
    let (app, token) = seeded_app().await;

    let response = app
        .get_with_auth("/api/v1/audit-logs/export?category=Reports", &token)
        .await;
    response.assert_ok();

    assert!(response
        .header("content-type")
        .unwrap()
        .starts_with("text/csv"));
    let disposition = response.header("content-disposition").unwrap();
    assert!(disposition.starts_with("attachment; filename=\"audit_trail_"));
    assert!(disposition.ends_with(".csv\""));

    let csv = response.text();
    assert!(csv.starts_with("Time,Description,Event,Category,Performed By\n"));

    let rows = parse_csv(&csv);
    assert_eq!(rows.len(), 4);
    assert!(rows[1][0].starts_with("2024-03-12T10:00:00"));
    assert_eq!(rows[1][2..].to_vec(), vec!["Download", "Reports", "auditor"]);
}

#[tokio::test]
async fn test_export_ignores_paging() {
    let (app, token) = seeded_app().await;

    let csv = app
        .get_with_auth("/api/v1/audit-logs/export?page_size=5&page=1", &token)
        .await
        .text();
    assert_eq!(parse_csv(&csv).len(), 13);
}

#[tokio::test]
async fn test_export_round_trips_awkward_text() {
    let app = TestApp::new().await;
    let mut entries = vec![
        audit_entry("a", at(4, 9), AuditEvent::Create, "Router", "ops"),
        audit_entry("b", at(3, 9), AuditEvent::Update, "Router", "Doe, Jane"),
        audit_entry("c", at(2, 9), AuditEvent::Delete, "Hotspot", "ops"),
        audit_entry("d", at(1, 9), AuditEvent::Update, "Router", "ops"),
    ];
    entries[0].description = "Opened ports 80, 443".to_string();
    entries[1].description = "Renamed \"core\" router\nand rebooted".to_string();
    entries[3].description = "First line\n\"second\", third\n".to_string();
    app.seed_audit_logs(&entries).await;
    let token = app.alice_token().await;

    let csv = app
        .get_with_auth("/api/v1/audit-logs/export?category=Router", &token)
        .await
        .text();
    let rows = parse_csv(&csv);

    let expected: Vec<&AuditLogEntry> = entries.iter().filter(|e| e.category == "Router").collect();
    assert_eq!(rows.len(), expected.len() + 1);
    for (row, entry) in rows[1..].iter().zip(expected) {
        let time = chrono::DateTime::parse_from_rfc3339(&row[0]).unwrap();
        assert_eq!(time, entry.time);
        assert_eq!(row[1], entry.description);
        assert_eq!(row[2], entry.event.to_string());
        assert_eq!(row[3], entry.category);
        assert_eq!(row[4], entry.performed_by);
    }
}

#[tokio::test]
async fn test_export_quotes_embedded_quotes() {
    let app = TestApp::new().await;
    let mut entry = audit_entry(
        "quoted",
        at(3, 8),
        AuditEvent::Update,
        "Router",
        "ops",
    );
    entry.description = "Renamed \"core\" router".to_string();
    app.seed_audit_logs(&[entry]).await;
    let token = app.alice_token().await;

    let csv = app
        .get_with_auth("/api/v1/audit-logs/export", &token)
        .await
        .text();
    assert!(csv.contains("\"Renamed \"\"core\"\" router\""));
}

#[tokio::test]
async fn test_backend_failure_is_bad_gateway() {
    let app = TestApp::with_backend(std::sync::Arc::new(UnreachableBackend)).await;
    let user = app.seed_alice().await;
    let token = app.token_for(&user);

    let response = app.get_with_auth("/api/v1/audit-logs", &token).await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    assert_eq!(response.message(), "Failed to load audit logs");
}
