//! Tenant list and usage chart endpoints

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;

use crate::{
    middleware::AuthUser,
    models::{Tenant, TenantSearchQuery, TenantUsageResponse, UsageQuery},
    services::usage::{
        aggregate, filter_tenants, is_valid_window, thin, total_usage, DEFAULT_WINDOW_DAYS,
        WINDOW_OPTIONS,
    },
    utils::AppError,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tenants))
        .route("/{id}/usage", get(tenant_usage))
}

/// Tenants matching the search, heaviest users first
async fn list_tenants(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Query(query): Query<TenantSearchQuery>,
) -> Result<Json<Vec<Tenant>>, AppError> {
    let tenants = state.backend.list_tenants().await.map_err(|e| {
        tracing::error!("Failed to list tenants: {:#}", e);
        AppError::upstream("Failed to load tenants")
    })?;

    Ok(Json(filter_tenants(
        &tenants,
        query.search.as_deref().unwrap_or_default(),
    )))
}

async fn tenant_usage(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(tenant_id): Path<String>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<TenantUsageResponse>, AppError> {
    let window_days = query.days.unwrap_or(DEFAULT_WINDOW_DAYS);
    if !is_valid_window(window_days) {
        return Err(AppError::validation(format!(
            "days must be one of {:?}",
            WINDOW_OPTIONS
        )));
    }

    let records = state
        .backend
        .list_tenant_usage(&tenant_id)
        .await
        .map_err(|e| {
            tracing::error!(tenant_id = %tenant_id, "Failed to load tenant usage: {:#}", e);
            AppError::upstream("Failed to load usage data")
        })?;

    let series = thin(
        &aggregate(&records, window_days, Utc::now()),
        query.step.unwrap_or(1),
    );

    Ok(Json(TenantUsageResponse {
        tenant_id,
        window_days,
        dates: series.dates,
        values: series.values,
        total_gb: total_usage(&records),
    }))
}
