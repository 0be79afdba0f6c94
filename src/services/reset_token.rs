//! Password reset tokens
//!
//! A reset link carries a signed, time-bound JWT that embeds the account it
//! was issued for. Nothing is stored server-side: a token stays valid until
//! its `exp` claim passes.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const NO_TOKEN_MESSAGE: &str = "No token provided.";
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid reset link. Please request a new one.";
pub const EXPIRED_TOKEN_MESSAGE: &str = "Reset link has expired. Please request a new one.";

/// Audience claim separating reset tokens from session tokens signed with the same secret
pub const RESET_TOKEN_AUDIENCE: &str = "futurekonnect-password-reset";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetClaims {
    user_id: String,
    email: String,
    username: String,
    aud: String,
    iat: i64,
    exp: i64,
}

/// Payload of a verified reset token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedResetToken {
    pub user_id: String,
    pub email: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

impl From<ResetClaims> for DecodedResetToken {
    fn from(claims: ResetClaims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
            username: claims.username,
            iat: claims.iat,
            exp: claims.exp,
        }
    }
}

/// A freshly signed token and the link that carries it
#[derive(Debug, Clone)]
pub struct IssuedResetToken {
    pub token: String,
    pub reset_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of checking a token; serialized as the verify endpoints' response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenVerification {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoded: Option<DecodedResetToken>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Why a token was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenRejection {
    #[error("No token provided.")]
    Missing,
    #[error("Invalid reset link. Please request a new one.")]
    Invalid,
    #[error("Reset link has expired. Please request a new one.")]
    Expired,
}

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("Missing required fields")]
    MissingFields,
    #[error("Failed to generate reset token")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Issues and verifies reset tokens with a shared HMAC secret
#[derive(Clone)]
pub struct ResetTokenService {
    secret: String,
    validity: Duration,
    base_url: String,
}

impl ResetTokenService {
    pub fn new(secret: impl Into<String>, validity_hours: u64, base_url: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            validity: Duration::hours(validity_hours as i64),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Sign a token for the account and build its reset link
    pub fn issue(
        &self,
        user_id: &str,
        email: &str,
        username: &str,
    ) -> Result<IssuedResetToken, IssueError> {
        self.issue_at(user_id, email, username, Utc::now())
    }

    /// Same as [`issue`](Self::issue) with an explicit issue time
    pub fn issue_at(
        &self,
        user_id: &str,
        email: &str,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedResetToken, IssueError> {
        if [user_id, email, username].iter().any(|v| v.trim().is_empty()) {
            return Err(IssueError::MissingFields);
        }

        let expires_at = now + self.validity;
        let claims = ResetClaims {
            user_id: user_id.to_string(),
            email: email.to_string(),
            username: username.to_string(),
            aud: RESET_TOKEN_AUDIENCE.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(IssueError::Signing)?;

        let reset_url = format!(
            "{}/reset-password?token={}",
            self.base_url,
            urlencoding::encode(&token)
        );

        Ok(IssuedResetToken {
            token,
            reset_url,
            expires_at,
        })
    }

    /// Decode a token, classifying every failure
    pub fn decode(&self, token: Option<&str>) -> Result<DecodedResetToken, TokenRejection> {
        let token = match token.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return Err(TokenRejection::Missing),
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(&[RESET_TOKEN_AUDIENCE]);

        decode::<ResetClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims.into())
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenRejection::Expired,
            _ => TokenRejection::Invalid,
        })
    }

    /// Check a token; never fails, the outcome is carried in the result
    pub fn verify(&self, token: Option<&str>) -> TokenVerification {
        match self.decode(token) {
            Ok(decoded) => TokenVerification {
                valid: true,
                decoded: Some(decoded),
                message: None,
            },
            Err(rejection) => TokenVerification {
                valid: false,
                decoded: None,
                message: Some(rejection.to_string()),
            },
        }
    }
}
