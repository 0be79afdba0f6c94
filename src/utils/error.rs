//! Error types and handling
//!
//! All handler errors are converted to a consistent JSON response format.
//! Server-side failures are logged here and reach the client only as the
//! curated message carried by the variant.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Message shown when a collaborator failed and no more specific text applies
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthorized - authentication required (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Conflict - resource already exists or an operation is already running (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Field-level validation failed (400)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Data backend or mail provider failure (502)
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::ValidationError(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        AppError::Upstream(message.into())
    }

    /// The user-facing message without the variant prefix
    pub fn message(&self) -> &str {
        match self {
            AppError::NotFound(m)
            | AppError::BadRequest(m)
            | AppError::Unauthorized(m)
            | AppError::Conflict(m)
            | AppError::ValidationError(m)
            | AppError::Internal(m)
            | AppError::Upstream(m) => m,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Error response body
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    /// Error type identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (error_type, should_log) = match &self {
            AppError::NotFound(_) => ("not_found", false),
            AppError::BadRequest(_) => ("bad_request", false),
            AppError::Unauthorized(_) => ("unauthorized", false),
            AppError::Conflict(_) => ("conflict", false),
            AppError::ValidationError(_) => ("validation_error", false),
            AppError::Internal(_) => ("internal_error", true),
            AppError::Upstream(_) => ("upstream_error", true),
        };

        if should_log {
            error!(error = %self, error_type = error_type, "Request error");
        }

        let body = ErrorResponse::new(error_type, self.message());

        (self.status(), Json(body)).into_response()
    }
}

// Raw collaborator errors are logged at the conversion point and replaced by
// generic text so backend details never reach a response body.

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        error!(error = %format!("{:#}", err), "Unhandled service error");
        AppError::Internal(GENERIC_FAILURE_MESSAGE.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}
