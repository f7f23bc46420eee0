use std::collections::HashMap;

use axum::extract::{FromRequestParts, Query};
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use rand::RngCore;

use crate::state::AppState;
use crate::utils::ApiError;

pub const SESSION_COOKIE_NAME: &str = "ragviet_session";

/// A 32-byte CSPRNG token, base64 (URL-safe, unpadded) encoded. Carries no
/// claims — it is only a lookup key into `auth_sessions`.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// 6 ASCII digits, used for password reset codes.
pub fn generate_reset_code() -> String {
    let mut buf = [0u8; 1];
    let mut code = String::with_capacity(6);
    for _ in 0..6 {
        rand::rng().fill_bytes(&mut buf);
        code.push((b'0' + (buf[0] % 10)) as char);
    }
    code
}

pub struct AuthenticatedUser {
    pub user_id: i64,
    pub token: String,
}

fn extract_bearer(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn extract_cookie_token(headers: &axum::http::HeaderMap) -> Option<String> {
    let raw = headers.get(COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE_NAME).then(|| value.to_string())
    })
}

/// Extracts a raw (unvalidated) session token from request headers: bearer
/// header first, then cookie. Body-embedded `session_id` is checked
/// separately by handlers that already parse a JSON body, via
/// `resolve_authenticated_user`.
pub fn extract_header_token(headers: &axum::http::HeaderMap) -> Option<String> {
    extract_bearer(headers).or_else(|| extract_cookie_token(headers))
}

/// Reads `?session_id=...` from the request's query string — the fallback
/// for GET endpoints that carry no body to embed a `session_id` field in.
async fn extract_query_token(parts: &mut Parts, state: &AppState) -> Option<String> {
    Query::<HashMap<String, String>>::from_request_parts(parts, state)
        .await
        .ok()
        .and_then(|Query(params)| params.get("session_id").cloned())
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = match extract_header_token(&parts.headers) {
            Some(token) => token,
            None => extract_query_token(parts, state)
                .await
                .ok_or_else(|| ApiError::Auth("missing session token".to_string()))?,
        };
        validate_token(state, token).await
    }
}

async fn validate_token(state: &AppState, token: String) -> Result<AuthenticatedUser, ApiError> {
    let session = state
        .repository
        .get_auth_session(&token)
        .await?
        .ok_or_else(|| ApiError::Auth("invalid session".to_string()))?;

    if session.expires_at < Utc::now() {
        let _ = state.repository.delete_auth_session(&token).await;
        return Err(ApiError::Auth("session expired".to_string()));
    }

    Ok(AuthenticatedUser { user_id: session.user_id, token })
}

/// Used by handlers that accept a JSON body which may itself carry
/// `session_id` — the full auth-extraction chain (header, cookie, body,
/// query) for routes where a body extractor can't run inside
/// `FromRequestParts`.
pub async fn resolve_authenticated_user(
    state: &AppState,
    header_token: Option<String>,
    body_session_id: Option<String>,
    query_session_id: Option<String>,
) -> Result<AuthenticatedUser, ApiError> {
    let token = header_token
        .or(body_session_id)
        .or(query_session_id)
        .ok_or_else(|| ApiError::Auth("missing session token".to_string()))?;
    validate_token(state, token).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_unique_and_encoded() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(URL_SAFE_NO_PAD.decode(&a).is_ok());
    }

    #[test]
    fn reset_code_is_six_ascii_digits() {
        let code = generate_reset_code();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }
}
