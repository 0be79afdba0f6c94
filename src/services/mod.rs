//! Business logic services

pub mod audit_trail;
pub mod auth;
pub mod backend;
pub mod hasura;
pub mod mailer;
pub mod password_reset;
pub mod reset_token;
pub mod usage;


pub use auth::AuthService;
pub use backend::Backend;
pub use hasura::HasuraClient;
pub use mailer::{build_mailer, EmailJsMailer, LogMailer, Mailer, ResetEmail, SmtpMailer};
pub use password_reset::{PasswordResetService, ResetError, ResetGuard};
pub use reset_token::{ResetTokenService, TokenVerification};
