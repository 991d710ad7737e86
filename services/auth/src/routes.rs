//! Authentication service routes
//!
//! Mutations answer with a `UserResponse` envelope: field errors are a normal
//! 200 response, only store failures turn into HTTP errors.

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::info;

use crate::{
    AppState,
    error::{ApiError, AuthError, AuthResult},
    middleware::CurrentSession,
    models::{LoginCredentials, RegisterInput, User, UserResponse},
};

/// Request for user registration
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub options: RegisterInput,
}

/// Request for a password recovery email
#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Request to redeem a password reset token
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/me", get(me))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/change-password", post(change_password))
        .with_state(state)
}

fn user_response(result: AuthResult<User>) -> Result<UserResponse, ApiError> {
    match result {
        Ok(user) => Ok(UserResponse::user(user)),
        Err(AuthError::Invalid(errors)) => Ok(UserResponse::errors(errors)),
        Err(e) => Err(e.into()),
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

/// Currently logged-in user, or `null`
pub async fn me(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Json<Option<User>>, ApiError> {
    let user = state.auth.me(&current.session).await?;
    Ok(Json(user))
}

/// User registration endpoint
pub async fn register(
    State(state): State<AppState>,
    mut current: CurrentSession,
    Json(payload): Json<RegisterRequest>,
) -> Result<(CookieJar, Json<UserResponse>), ApiError> {
    info!("Registration attempt for user: {}", payload.options.username);

    let result = state
        .auth
        .register(&mut current.session, payload.options)
        .await;
    let body = user_response(result)?;

    Ok((current.into_jar(&state.config), Json(body)))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    mut current: CurrentSession,
    Json(payload): Json<LoginCredentials>,
) -> Result<(CookieJar, Json<UserResponse>), ApiError> {
    let result = state
        .auth
        .login(
            &mut current.session,
            &payload.username_or_email,
            &payload.password,
        )
        .await;
    let body = user_response(result)?;

    Ok((current.into_jar(&state.config), Json(body)))
}

/// Logout endpoint; the cookie is cleared whatever the outcome
///
/// The session is not loaded first, so an unreachable store still gets the
/// cookie cleared and a `false` answer.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<bool>) {
    let mut current = CurrentSession::unverified(jar, &state.config);
    let destroyed = state.auth.logout(&mut current.session).await;
    (current.into_jar(&state.config), Json(destroyed))
}

/// Password recovery endpoint
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<bool>, ApiError> {
    let sent = state.auth.forgot_password(&payload.email).await?;
    Ok(Json(sent))
}

/// Password change endpoint
pub async fn change_password(
    State(state): State<AppState>,
    mut current: CurrentSession,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<(CookieJar, Json<UserResponse>), ApiError> {
    let result = state
        .auth
        .change_password(&mut current.session, &payload.token, &payload.new_password)
        .await;
    let body = user_response(result)?;

    Ok((current.into_jar(&state.config), Json(body)))
}
