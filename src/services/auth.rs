//! Authentication service
//!
//! Provides password hashing with Argon2 and credential checks against the
//! configured data backend. Hashes never leave this module's callers.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::models::{NewUser, User};
use crate::services::Backend;
use crate::utils::validation::normalize_credential;

/// Why an account could not be created
#[derive(Debug, Error)]
pub enum SignupError {
    #[error("An account with this email already exists")]
    DuplicateEmail,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Authentication service
pub struct AuthService {
    backend: Arc<dyn Backend>,
}

impl AuthService {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Hash a password using Argon2id
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();
        Ok(password_hash)
    }

    /// Verify a password against a hash
    pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Authenticate by email and password
    ///
    /// Stored hashes in a format Argon2 cannot read (bcrypt rows written by the
    /// old client) never match; those users go through the reset flow once.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>> {
        let email = normalize_credential(email);
        if email.is_empty() || password.is_empty() {
            return Ok(None);
        }

        let candidates = self
            .backend
            .find_users_by_email(&email)
            .await
            .context("Failed to look up user by email")?;

        for user in candidates {
            match Self::verify_password(password, &user.password_hash) {
                Ok(true) => return Ok(Some(user)),
                Ok(false) => {}
                Err(e) => {
                    warn!(user_id = %user.id, error = %e, "Stored password hash is not usable");
                }
            }
        }

        Ok(None)
    }

    /// Create an account; the email is stored normalized
    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, SignupError> {
        let email = normalize_credential(email);

        let existing = self
            .backend
            .find_users_by_email(&email)
            .await
            .context("Failed to check for existing account")?;
        if !existing.is_empty() {
            return Err(SignupError::DuplicateEmail);
        }

        let password_hash = Self::hash_password(password)?;
        let user = self
            .backend
            .insert_user(&NewUser {
                username: username.trim().to_string(),
                email,
                password_hash,
            })
            .await
            .context("Failed to create user")?;
        Ok(user)
    }
}
