//! API routes and handlers
//!
//! This module defines all API endpoints and their routing.

use axum::{middleware::from_fn_with_state, routing::get, Router};

use crate::middleware::{auth_middleware, rate_limit_middleware, RateLimitState};
use crate::AppState;

mod audit_logs;
mod auth;
mod dashboard;
mod health;
mod reset;
mod tenants;

pub use health::*;

/// Public API routes (no authentication required)
///
/// The auth endpoints get the per-IP limiter when one is supplied.
pub fn public_routes(auth_rate_limit: Option<RateLimitState>) -> Router<AppState> {
    let mut auth_routes = auth::public_routes();
    if let Some(limit) = auth_rate_limit {
        auth_routes = auth_routes.layer(from_fn_with_state(limit, rate_limit_middleware));
    }

    Router::new()
        // Health check endpoints
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness))
        // Authentication and password reset (no auth required)
        .nest("/auth", auth_routes)
}

/// Protected API routes (authentication required)
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::protected_routes())
        .nest("/audit-logs", audit_logs::routes())
        .nest("/tenants", tenants::routes())
        .nest("/dashboard", dashboard::routes())
}

/// Unversioned token endpoints kept for existing reset-link clients
///
/// `send-reset` signs a usable token, so it sits behind the auth middleware.
pub fn legacy_routes(state: &AppState, rate_limit: Option<RateLimitState>) -> Router<AppState> {
    let routes = reset::public_routes().merge(
        reset::protected_routes().layer(from_fn_with_state(state.clone(), auth_middleware)),
    );
    match rate_limit {
        Some(limit) => routes.layer(from_fn_with_state(limit, rate_limit_middleware)),
        None => routes,
    }
}

/// Full API router: `/api/v1` plus the legacy `/api` endpoints when enabled
pub fn router(state: AppState, auth_rate_limit: Option<RateLimitState>) -> Router {
    let protected =
        protected_routes().layer(from_fn_with_state(state.clone(), auth_middleware));

    let mut app = Router::new().nest(
        "/api/v1",
        public_routes(auth_rate_limit.clone()).merge(protected),
    );

    if state.config.auth.legacy_token_endpoints {
        app = app.merge(legacy_routes(&state, auth_rate_limit));
    }

    app.with_state(state)
}
