//! Password reset flow
//!
//! Forgot-password: find exactly one account for the (email, username) pair,
//! sign a reset token and mail its link. Reset-password: re-verify the token,
//! hash the new password and write it back by user id.
//!
//! Nothing is rolled back on failure. A token whose email failed to send is
//! still valid until it expires; a failed password write leaves the token
//! usable for another attempt.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::models::User;
use crate::services::reset_token::{
    DecodedResetToken, IssuedResetToken, ResetTokenService, TokenRejection, TokenVerification,
    INVALID_TOKEN_MESSAGE,
};
use crate::services::{AuthService, Backend, Mailer, ResetEmail};
use crate::utils::error::AppError;
use crate::utils::validation::normalize_credential;

pub const NO_ACCOUNT_MESSAGE: &str = "No account found with these credentials";
pub const MISSING_CREDENTIALS_MESSAGE: &str = "Email and username are required";
pub const REQUEST_FAILED_MESSAGE: &str = "Failed to send reset link. Please try again.";
pub const RESET_LINK_SENT_MESSAGE: &str = "Password reset link sent to your email";
pub const PASSWORD_TOO_SHORT_MESSAGE: &str = "Password must be at least 8 characters long";
pub const PASSWORD_MISMATCH_MESSAGE: &str = "Passwords do not match";
pub const RESET_FAILED_MESSAGE: &str = "Failed to reset password. Please try again.";
pub const RESET_SUCCESS_MESSAGE: &str = "Password reset successful";
pub const IN_FLIGHT_MESSAGE: &str = "A reset request for this account is already in progress";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResetError {
    #[error("{0}")]
    Validation(String),
    #[error("No account found with these credentials")]
    NotFound,
    #[error("Reset link has expired. Please request a new one.")]
    ExpiredToken,
    #[error("Invalid reset link. Please request a new one.")]
    InvalidToken,
    #[error("A reset request for this account is already in progress")]
    InFlight,
    /// A collaborator failed; the message is what the user sees
    #[error("{0}")]
    Transport(&'static str),
}

impl From<TokenRejection> for ResetError {
    fn from(rejection: TokenRejection) -> Self {
        match rejection {
            TokenRejection::Expired => ResetError::ExpiredToken,
            TokenRejection::Missing | TokenRejection::Invalid => ResetError::InvalidToken,
        }
    }
}

impl From<ResetError> for AppError {
    fn from(err: ResetError) -> Self {
        let message = err.to_string();
        match err {
            ResetError::Validation(_) => AppError::ValidationError(message),
            ResetError::NotFound => AppError::NotFound(message),
            ResetError::ExpiredToken | ResetError::InvalidToken => AppError::BadRequest(message),
            ResetError::InFlight => AppError::Conflict(message),
            ResetError::Transport(_) => AppError::Upstream(message),
        }
    }
}

/// Progress of one forgot-password submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum ResetRequestState {
    Idle,
    Submitting,
    Success(String),
    Failed(String),
}

impl ResetRequestState {
    /// Start a submission; `None` while one is already running
    pub fn submit(&self) -> Option<Self> {
        match self {
            ResetRequestState::Submitting => None,
            _ => Some(ResetRequestState::Submitting),
        }
    }

    /// Settle a running submission with its outcome
    pub fn finish<T>(self, outcome: &Result<T, ResetError>) -> Self {
        match (self, outcome) {
            (ResetRequestState::Submitting, Ok(_)) => {
                ResetRequestState::Success(RESET_LINK_SENT_MESSAGE.to_string())
            }
            (ResetRequestState::Submitting, Err(e)) => ResetRequestState::Failed(e.to_string()),
            (other, _) => other,
        }
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self, ResetRequestState::Submitting)
    }
}

/// What the reset page knows about its token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    Pending,
    Valid(DecodedResetToken),
    Invalid(String),
}

impl From<TokenVerification> for TokenState {
    fn from(verification: TokenVerification) -> Self {
        match (verification.valid, verification.decoded) {
            (true, Some(decoded)) => TokenState::Valid(decoded),
            _ => TokenState::Invalid(
                verification
                    .message
                    .unwrap_or_else(|| INVALID_TOKEN_MESSAGE.to_string()),
            ),
        }
    }
}

impl TokenState {
    /// The new-password form is shown only for a valid token
    pub fn accepts_password(&self) -> bool {
        matches!(self, TokenState::Valid(_))
    }
}

/// Accounts with a forgot-password request currently running
#[derive(Debug, Clone, Default)]
pub struct ResetGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl ResetGuard {
    /// Claim `key`; `None` when it is already claimed
    pub fn try_acquire(&self, key: &str) -> Option<InFlightPermit> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
        if !in_flight.insert(key.to_string()) {
            return None;
        }
        Some(InFlightPermit {
            key: key.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(key)
    }
}

/// Releases its key when dropped, on success and error paths alike
#[derive(Debug)]
pub struct InFlightPermit {
    key: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.key);
    }
}

/// Check the new password before anything leaves the service
pub fn validate_new_password(
    password: &str,
    confirm_password: &str,
    min_length: usize,
) -> Result<(), ResetError> {
    if password.chars().count() < min_length {
        let message = if min_length == 8 {
            PASSWORD_TOO_SHORT_MESSAGE.to_string()
        } else {
            format!("Password must be at least {} characters long", min_length)
        };
        return Err(ResetError::Validation(message));
    }
    if password != confirm_password {
        return Err(ResetError::Validation(PASSWORD_MISMATCH_MESSAGE.to_string()));
    }
    Ok(())
}

/// Runs the forgot-password and reset-password operations
#[derive(Clone)]
pub struct PasswordResetService {
    backend: Arc<dyn Backend>,
    mailer: Arc<dyn Mailer>,
    tokens: ResetTokenService,
    guard: ResetGuard,
    password_min_length: usize,
}

impl PasswordResetService {
    pub fn new(
        backend: Arc<dyn Backend>,
        mailer: Arc<dyn Mailer>,
        tokens: ResetTokenService,
        guard: ResetGuard,
        password_min_length: usize,
    ) -> Self {
        Self {
            backend,
            mailer,
            tokens,
            guard,
            password_min_length,
        }
    }

    /// Look up the account, issue a token and mail the reset link
    pub async fn request_reset(
        &self,
        email: &str,
        username: &str,
    ) -> Result<IssuedResetToken, ResetError> {
        let email = normalize_credential(email);
        let username = normalize_credential(username);
        if email.is_empty() || username.is_empty() {
            return Err(ResetError::Validation(
                MISSING_CREDENTIALS_MESSAGE.to_string(),
            ));
        }

        let _permit = self
            .guard
            .try_acquire(&email)
            .ok_or(ResetError::InFlight)?;

        let user = self.find_account(&email, &username).await?;

        let issued = self
            .tokens
            .issue(&user.id, &user.email, &user.username)
            .map_err(|e| {
                error!(user_id = %user.id, error = %e, "Failed to sign reset token");
                ResetError::Transport(REQUEST_FAILED_MESSAGE)
            })?;

        let message = ResetEmail {
            to_email: user.email.clone(),
            username: user.username.clone(),
            reset_url: issued.reset_url.clone(),
        };
        self.mailer.send_reset_email(&message).await.map_err(|e| {
            error!(
                user_id = %user.id,
                provider = self.mailer.provider(),
                error = %format!("{:#}", e),
                "Failed to send reset email"
            );
            ResetError::Transport(REQUEST_FAILED_MESSAGE)
        })?;

        info!(user_id = %user.id, expires_at = %issued.expires_at, "Reset link sent");
        Ok(issued)
    }

    async fn find_account(&self, email: &str, username: &str) -> Result<User, ResetError> {
        let candidates = self.backend.find_users_by_email(email).await.map_err(|e| {
            error!(error = %format!("{:#}", e), "Account lookup failed");
            ResetError::Transport(REQUEST_FAILED_MESSAGE)
        })?;

        let mut matches: Vec<User> = candidates
            .into_iter()
            .filter(|u| normalize_credential(&u.username) == username)
            .collect();

        match matches.len() {
            1 => Ok(matches.remove(0)),
            0 => Err(ResetError::NotFound),
            n => {
                warn!(matches = n, "Reset lookup matched more than one account");
                Err(ResetError::NotFound)
            }
        }
    }

    /// Check a reset link's token
    pub fn verify_reset_link(&self, token: Option<&str>) -> TokenVerification {
        self.tokens.verify(token)
    }

    /// Validate, re-verify the token and store the new password hash
    pub async fn submit_new_password(
        &self,
        token: Option<&str>,
        password: &str,
        confirm_password: &str,
    ) -> Result<(), ResetError> {
        validate_new_password(password, confirm_password, self.password_min_length)?;

        // The payload a browser shows is never trusted; decode again here
        let decoded = self.tokens.decode(token)?;

        let password_hash = AuthService::hash_password(password).map_err(|e| {
            error!(user_id = %decoded.user_id, error = %e, "Failed to hash new password");
            ResetError::Transport(RESET_FAILED_MESSAGE)
        })?;

        match self
            .backend
            .update_password(&decoded.user_id, &password_hash)
            .await
        {
            Ok(true) => {
                info!(user_id = %decoded.user_id, "Password reset completed");
                Ok(())
            }
            Ok(false) => {
                warn!(user_id = %decoded.user_id, "Reset token refers to a missing account");
                Err(ResetError::Transport(RESET_FAILED_MESSAGE))
            }
            Err(e) => {
                error!(
                    user_id = %decoded.user_id,
                    error = %format!("{:#}", e),
                    "Failed to store new password"
                );
                Err(ResetError::Transport(RESET_FAILED_MESSAGE))
            }
        }
    }
}
