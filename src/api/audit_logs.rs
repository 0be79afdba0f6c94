//! Audit log API endpoints

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;

use crate::{
    middleware::AuthUser,
    models::{AuditLogEntry, AuditLogPage, AuditLogQuery},
    services::audit_trail::{
        self, export_csv, export_file_name, is_valid_page_size, AuditTrailState, FilterSpec,
        DEFAULT_PAGE_SIZE, PAGE_SIZE_OPTIONS,
    },
    utils::AppError,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_audit_logs))
        .route("/export", get(export_audit_logs))
}

/// View state described by the query string
fn view_state(query: &AuditLogQuery) -> Result<AuditTrailState, AppError> {
    let filter = FilterSpec::from_query(query).map_err(AppError::validation)?;

    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if !is_valid_page_size(page_size) {
        return Err(AppError::validation(format!(
            "page_size must be one of {:?}",
            PAGE_SIZE_OPTIONS
        )));
    }

    Ok(AuditTrailState::default()
        .with_filter(filter)
        .set_page_size(page_size)
        .set_page(query.page.unwrap_or(0)))
}

async fn load_entries(state: &AppState) -> Result<Vec<AuditLogEntry>, AppError> {
    state.backend.list_audit_logs().await.map_err(|e| {
        tracing::error!("Failed to list audit logs: {:#}", e);
        AppError::upstream("Failed to load audit logs")
    })
}

async fn list_audit_logs(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<AuditLogPage>, AppError> {
    let view = view_state(&query)?;
    let entries = load_entries(&state).await?;
    Ok(Json(view.view(&entries)))
}

/// Every entry matching the filter as a CSV download, ignoring paging
async fn export_audit_logs(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<AuditLogQuery>,
) -> Result<impl IntoResponse, AppError> {
    let view = view_state(&query)?;
    let entries = load_entries(&state).await?;
    let matching = audit_trail::filter(&entries, &view.filter);

    tracing::info!(
        user_id = %auth_user.id,
        rows = matching.len(),
        "Exporting audit trail"
    );

    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_file_name(Utc::now())
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export_csv(&matching),
    ))
}
