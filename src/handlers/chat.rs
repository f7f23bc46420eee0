use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::session::{extract_header_token, resolve_authenticated_user};
use crate::database::ChatRole;
use crate::state::AppState;
use crate::utils::ApiError;

#[derive(Deserialize)]
pub struct SendRequest {
    pub message: String,
    pub chat_session_id: Option<String>,
    pub selected_file: Option<String>,
    /// Third link in the auth-extraction chain when no bearer header or
    /// cookie is present.
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct SendResponse {
    pub reply: String,
    pub chat_session_id: String,
}

pub async fn send(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(req): Json<SendRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    let user = resolve_authenticated_user(
        &state,
        extract_header_token(&headers),
        req.session_id.clone(),
        query.get("session_id").cloned(),
    )
    .await?;

    if req.message.trim().is_empty() {
        return Err(ApiError::Validation("message must not be empty".to_string()));
    }

    let result = state
        .answerer
        .answer(user.user_id, &req.message, req.chat_session_id, req.selected_file)
        .await?;

    Ok(Json(SendResponse { reply: result.reply, chat_session_id: result.chat_session_id }))
}

#[derive(Serialize)]
pub struct ChatSessionSummary {
    pub id: String,
    pub title: String,
    pub message_count: i32,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

pub async fn list_sessions(
    State(state): State<AppState>,
    user: crate::auth::AuthenticatedUser,
) -> Result<Json<Vec<ChatSessionSummary>>, ApiError> {
    let sessions = state.repository.get_chat_sessions(user.user_id).await?;
    Ok(Json(
        sessions
            .into_iter()
            .map(|s| ChatSessionSummary { id: s.id, title: s.title, message_count: s.message_count, updated_at: s.updated_at })
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub title: Option<String>,
}

#[derive(Serialize)]
pub struct CreateSessionResponse {
    pub id: String,
}

pub async fn create_session(
    State(state): State<AppState>,
    user: crate::auth::AuthenticatedUser,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let id = uuid::Uuid::new_v4().to_string();
    let title = req.title.unwrap_or_else(|| "Cuộc trò chuyện mới".to_string());
    state.repository.create_chat_session(&id, user.user_id, &title).await?;
    Ok(Json(CreateSessionResponse { id }))
}

#[derive(Serialize)]
pub struct ChatTurnView {
    pub role: String,
    pub content: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

pub async fn history(
    State(state): State<AppState>,
    user: crate::auth::AuthenticatedUser,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<ChatTurnView>>, ApiError> {
    state
        .repository
        .get_chat_session(&session_id, user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("chat session not found".to_string()))?;

    let turns = state.repository.get_session_messages(&session_id).await?;
    Ok(Json(
        turns
            .into_iter()
            .map(|t| ChatTurnView {
                role: ChatRole::from_str(&t.role).as_str().to_string(),
                content: t.content,
                timestamp: t.created_at,
            })
            .collect(),
    ))
}
