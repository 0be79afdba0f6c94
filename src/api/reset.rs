//! Legacy reset-token endpoints
//!
//! `/api/send-reset` and `/api/verify-token` keep the response shapes that
//! existing reset pages and mail templates were written against.
//! `send-reset` only signs links for the authenticated caller's own account.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    middleware::AuthUser,
    models::{deserialize_optional_opaque_id, MessageResponse, VerifyTokenRequest},
    services::{reset_token::IssueError, TokenVerification},
    AppState,
};

const TOKEN_GENERATED_MESSAGE: &str = "Token generated successfully";
const VERIFY_FAILED_MESSAGE: &str = "An error occurred while verifying the token";
const FOREIGN_ACCOUNT_MESSAGE: &str = "Reset links can only be issued for your own account";

pub fn public_routes() -> Router<AppState> {
    Router::new().route("/api/verify-token", post(verify_token))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/api/send-reset", post(send_reset))
}

#[derive(Debug, Deserialize)]
struct SendResetRequest {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(
        rename = "userId",
        default,
        deserialize_with = "deserialize_optional_opaque_id"
    )]
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetLinkData {
    reset_url: String,
    username: String,
    email: String,
    user_id: String,
}

#[derive(Debug, Serialize)]
struct SendResetResponse {
    message: &'static str,
    data: ResetLinkData,
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(MessageResponse::new(text))).into_response()
}

/// Sign a reset token for the caller's account and return its link
///
/// The token carries the identity from the access token, never the body's
/// email or username.
async fn send_reset(
    State(state): State<AppState>,
    caller: AuthUser,
    payload: Result<Json<SendResetRequest>, JsonRejection>,
) -> Response {
    let missing = || message(StatusCode::BAD_REQUEST, &IssueError::MissingFields.to_string());

    let Ok(Json(payload)) = payload else {
        return missing();
    };
    let (Some(_), Some(_), Some(user_id)) = (payload.email, payload.username, payload.user_id)
    else {
        return missing();
    };

    if user_id != caller.id {
        tracing::warn!(
            caller = %caller.id,
            requested = %user_id,
            "Refused reset link for another account"
        );
        return message(StatusCode::FORBIDDEN, FOREIGN_ACCOUNT_MESSAGE);
    }

    let AuthUser {
        id: user_id,
        username,
        email,
    } = caller;

    match state.reset_tokens.issue(&user_id, &email, &username) {
        Ok(issued) => (
            StatusCode::OK,
            Json(SendResetResponse {
                message: TOKEN_GENERATED_MESSAGE,
                data: ResetLinkData {
                    reset_url: issued.reset_url,
                    username,
                    email,
                    user_id,
                },
            }),
        )
            .into_response(),
        Err(IssueError::MissingFields) => missing(),
        Err(e @ IssueError::Signing(_)) => {
            tracing::error!(error = ?e, "Failed to sign reset token");
            message(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

/// Verify a reset token; the body is `{valid, decoded?, message?}`
async fn verify_token(
    State(state): State<AppState>,
    payload: Result<Json<VerifyTokenRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(request)) => (
            StatusCode::OK,
            Json(state.reset_tokens.verify(request.token.as_deref())),
        )
            .into_response(),
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Unreadable token verification request");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(TokenVerification {
                    valid: false,
                    decoded: None,
                    message: Some(VERIFY_FAILED_MESSAGE.to_string()),
                }),
            )
                .into_response()
        }
    }
}
