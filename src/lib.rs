//! FutureKonnect Console Library
//!
//! Server side of the RUDRA / FutureKonnect network operations dashboard:
//! sign-in, the email-token password reset flow, the audit trail and tenant
//! usage views, on top of a Hasura GraphQL or local SQLite backend.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use db::DbPool;
pub use middleware::{auth_middleware, AuthUser, Claims};
use services::{AuthService, Backend, Mailer, PasswordResetService, ResetGuard, ResetTokenService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Data backend (Hasura or SQLite)
    pub backend: Arc<dyn Backend>,
    /// Reset email delivery
    pub mailer: Arc<dyn Mailer>,
    pub reset_tokens: ResetTokenService,
    /// Accounts with a forgot-password request in progress
    pub reset_guard: ResetGuard,
}

impl AppState {
    pub fn new(config: AppConfig, backend: Arc<dyn Backend>, mailer: Arc<dyn Mailer>) -> Self {
        let reset_tokens = ResetTokenService::new(
            config.auth.jwt_secret.clone(),
            config.auth.reset_token_expiry_hours,
            config.app.base_url.clone(),
        );
        Self {
            config,
            backend,
            mailer,
            reset_tokens,
            reset_guard: ResetGuard::default(),
        }
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(Arc::clone(&self.backend))
    }

    pub fn password_reset(&self) -> PasswordResetService {
        PasswordResetService::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.mailer),
            self.reset_tokens.clone(),
            self.reset_guard.clone(),
            self.config.auth.password_min_length,
        )
    }
}
