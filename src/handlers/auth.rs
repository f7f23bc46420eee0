use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::session::{generate_reset_code, generate_token, SESSION_COOKIE_NAME};
use crate::auth::{password, AuthenticatedUser};
use crate::state::AppState;
use crate::utils::ApiError;

const SESSION_TTL_DAYS: i64 = 7;
const RESET_TOKEN_TTL_MINUTES: i64 = 15;
const DEFAULT_CHAT_TITLE: &str = "Cuộc trò chuyện mới";

fn is_valid_email(email: &str) -> bool {
    match email.find('@') {
        Some(at) => email[at + 1..].contains('.'),
        None => false,
    }
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub user_id: i64,
    pub username: String,
    pub email: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    if req.username.trim().is_empty() {
        return Err(ApiError::Validation("username must not be empty".to_string()));
    }
    if !is_valid_email(&req.email) {
        return Err(ApiError::Validation("email must contain '@' followed by '.'".to_string()));
    }
    if req.password.len() < 6 {
        return Err(ApiError::Validation("password must be at least 6 characters".to_string()));
    }
    if req.password != req.confirm_password {
        return Err(ApiError::Validation("password and confirm_password do not match".to_string()));
    }
    if state.repository.get_user_by_email(&req.email).await?.is_some() {
        return Err(ApiError::Validation("an account with this email already exists".to_string()));
    }
    if state.repository.get_user_by_username(&req.username).await?.is_some() {
        return Err(ApiError::Validation("this username is already taken".to_string()));
    }

    let hash = password::hash_password(&req.password)?;
    let user = state.repository.create_user(&req.username, &req.email, &hash).await?;

    Ok(Json(RegisterResponse { user_id: user.id, username: user.username, email: user.email }))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: i64,
    pub chat_session_id: String,
}

pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> Result<Response, ApiError> {
    let user = state
        .repository
        .get_user_by_email(&req.email)
        .await?
        .ok_or_else(|| ApiError::Auth("invalid email or password".to_string()))?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        return Err(ApiError::Auth("invalid email or password".to_string()));
    }
    if !user.active {
        return Err(ApiError::Auth("account is disabled".to_string()));
    }

    let token = generate_token();
    state
        .repository
        .create_auth_session(&token, user.id, Duration::days(SESSION_TTL_DAYS))
        .await?;

    let chat_session_id = Uuid::new_v4().to_string();
    state
        .repository
        .create_chat_session(&chat_session_id, user.id, DEFAULT_CHAT_TITLE)
        .await?;

    let secure = if state.settings.security.cookie_secure { "; Secure" } else { "" };
    let cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}{secure}",
        SESSION_TTL_DAYS * 24 * 60 * 60
    );

    let body = Json(LoginResponse { token, user_id: user.id, chat_session_id });
    Ok(([(SET_COOKIE, cookie)], body).into_response())
}

pub async fn logout(State(state): State<AppState>, user: AuthenticatedUser) -> Result<Json<serde_json::Value>, ApiError> {
    state.repository.delete_auth_session(&user.token).await?;
    Ok(Json(serde_json::json!({ "message": "logged out" })))
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if let Some(user) = state.repository.get_user_by_email(&req.email).await? {
        let code = generate_reset_code();
        state
            .repository
            .create_reset_token(&code, user.id, Duration::minutes(RESET_TOKEN_TTL_MINUTES))
            .await?;
        tracing::info!(user_id = user.id, "password reset code issued (delivery channel not wired in this deployment)");
    }

    // Always a generic success reply, regardless of whether the email
    // matched an account, to avoid leaking which emails are registered.
    Ok(Json(serde_json::json!({ "message": "if that email is registered, a reset code has been issued" })))
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub code: String,
    pub new_password: String,
    pub confirm_password: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.new_password.len() < 6 {
        return Err(ApiError::Validation("password must be at least 6 characters".to_string()));
    }
    if req.new_password != req.confirm_password {
        return Err(ApiError::Validation("new_password and confirm_password do not match".to_string()));
    }

    let token = state
        .repository
        .get_reset_token(&req.code)
        .await?
        .ok_or_else(|| ApiError::Validation("invalid or expired reset code".to_string()))?;

    if token.used || token.expires_at < chrono::Utc::now() {
        return Err(ApiError::Validation("invalid or expired reset code".to_string()));
    }

    let hash = password::hash_password(&req.new_password)?;
    state.repository.update_user_password(token.user_id, &hash).await?;
    state.repository.mark_reset_token_used(&req.code).await?;

    Ok(Json(serde_json::json!({ "message": "password updated" })))
}

#[derive(Serialize)]
pub struct VerifySessionResponse {
    pub user_id: i64,
    pub email: String,
    pub chat_session_id: String,
}

pub async fn verify_session(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<VerifySessionResponse>, ApiError> {
    let record = state
        .repository
        .get_user_by_id(user.user_id)
        .await?
        .ok_or_else(|| ApiError::Auth("session refers to a deleted account".to_string()))?;

    let chat_session_id = Uuid::new_v4().to_string();
    state
        .repository
        .create_chat_session(&chat_session_id, record.id, DEFAULT_CHAT_TITLE)
        .await?;

    Ok(Json(VerifySessionResponse { user_id: record.id, email: record.email, chat_session_id }))
}
