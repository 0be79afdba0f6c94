//! Authentication and password reset endpoints

use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
use validator::Validate;

use crate::{
    middleware::{auth::create_access_token, AuthUser},
    models::{
        AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse, ResetPasswordRequest,
        SignupRequest, UserPublic, VerifyTokenRequest,
    },
    services::{
        password_reset::{RESET_LINK_SENT_MESSAGE, RESET_SUCCESS_MESSAGE},
        auth::SignupError,
        TokenVerification,
    },
    utils::{validation::validate_username, AppError},
    AppState,
};

/// Public auth routes
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/signup", post(signup))
        .route("/forgot-password", post(forgot_password))
        .route("/verify-reset", post(verify_reset))
        .route("/reset-password", post(reset_password))
}

/// Auth routes that need a session
pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_current_user))
}

/// Sign in with email and password
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = state
        .auth_service()
        .authenticate(&payload.email, &payload.password)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid email or password"))?;

    let access_token = create_access_token(
        &user,
        &state.config.auth.jwt_secret,
        state.config.auth.token_expiry_hours,
    )
    .map_err(|e| {
        tracing::error!("Failed to create access token: {}", e);
        AppError::internal("Failed to sign in. Please try again.")
    })?;

    tracing::info!(user_id = %user.id, "User signed in");

    Ok(Json(AuthResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.auth.token_expiry_hours * 3600,
        user: user.into(),
    }))
}

async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<UserPublic>), AppError> {
    payload.validate()?;
    if !validate_username(&payload.username) {
        return Err(AppError::validation(
            "Username may only contain letters, digits, dots, underscores and hyphens",
        ));
    }

    let min_length = state.config.auth.password_min_length;
    if payload.password.chars().count() < min_length {
        return Err(AppError::validation(format!(
            "Password must be at least {} characters long",
            min_length
        )));
    }

    let user = state
        .auth_service()
        .signup(&payload.username, &payload.email, &payload.password)
        .await
        .map_err(|e| match e {
            SignupError::DuplicateEmail => AppError::conflict(e.to_string()),
            SignupError::Backend(e) => AppError::from(e),
        })?;

    tracing::info!(user_id = %user.id, "Account created");

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Mail a reset link to the account matching email and username
async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .password_reset()
        .request_reset(&payload.email, &payload.username)
        .await?;

    Ok(Json(MessageResponse::new(RESET_LINK_SENT_MESSAGE)))
}

/// Check the token of a reset link before showing the new-password form
async fn verify_reset(
    State(state): State<AppState>,
    Json(payload): Json<VerifyTokenRequest>,
) -> Json<TokenVerification> {
    Json(
        state
            .password_reset()
            .verify_reset_link(payload.token.as_deref()),
    )
}

async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .password_reset()
        .submit_new_password(
            payload.token.as_deref(),
            &payload.password,
            &payload.confirm_password,
        )
        .await?;

    Ok(Json(MessageResponse::new(RESET_SUCCESS_MESSAGE)))
}

async fn get_current_user(auth_user: AuthUser) -> Json<AuthUser> {
    Json(auth_user)
}
