//! Home dashboard stat cards

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use crate::{
    middleware::AuthUser,
    models::{DashboardStats, DashboardStatsQuery},
    services::usage::{format_terabytes, total_usage},
    utils::AppError,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/stats", get(get_stats))
}

/// Tenant count and total data exchanged, for the requested tenant or the first listed one
async fn get_stats(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Query(query): Query<DashboardStatsQuery>,
) -> Result<Json<DashboardStats>, AppError> {
    let tenants = state.backend.list_tenants().await.map_err(|e| {
        tracing::error!("Failed to list tenants: {:#}", e);
        AppError::upstream("Failed to load dashboard stats")
    })?;

    let tenant_id = query
        .tenant_id
        .filter(|id| !id.trim().is_empty())
        .or_else(|| tenants.first().map(|t| t.id.clone()));

    let total_data_gb = match tenant_id {
        Some(ref id) => {
            let records = state.backend.list_tenant_usage(id).await.map_err(|e| {
                tracing::error!(tenant_id = %id, "Failed to load tenant usage: {:#}", e);
                AppError::upstream("Failed to load dashboard stats")
            })?;
            total_usage(&records)
        }
        None => 0.0,
    };

    Ok(Json(DashboardStats {
        tenant_count: tenants.len(),
        tenant_id,
        total_data_gb,
        total_data_exchanged: format_terabytes(total_data_gb),
    }))
}
