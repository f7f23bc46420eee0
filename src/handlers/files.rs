use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedUser;
use crate::services::UploadFile;
use crate::state::AppState;
use crate::utils::ApiError;

pub async fn upload(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Json<crate::services::IngestionSummary>, ApiError> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart upload: {e}")))?
    {
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::Validation("multipart field is missing a filename".to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("failed to read upload body: {e}")))?;

        files.push(UploadFile { filename, bytes: bytes.to_vec() });
    }

    if files.is_empty() {
        return Err(ApiError::Validation("no files were uploaded".to_string()));
    }

    let summary = state.ingestion.ingest(user.user_id, files).await?;
    Ok(Json(summary))
}

#[derive(Serialize)]
pub struct FileListItem {
    pub filename: String,
    pub page_count: i32,
    pub chunk_count: i32,
    pub uploaded_at: chrono::DateTime<chrono::Utc>,
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<FileListItem>>, ApiError> {
    let files = state.repository.get_user_files(user.user_id).await?;
    Ok(Json(
        files
            .into_iter()
            .map(|f| FileListItem {
                filename: f.filename,
                page_count: f.page_count,
                chunk_count: f.chunk_count,
                uploaded_at: f.uploaded_at,
            })
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct DeleteRequest {
    pub filename: String,
}

pub async fn delete(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<DeleteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = state
        .store
        .delete_by_filename(&req.filename, user.user_id, state.embedder.as_ref())
        .await?;
    state.repository.delete_user_file(user.user_id, &req.filename).await?;

    Ok(Json(serde_json::json!({ "removed": removed })))
}

pub async fn clear_all(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.store.clear_all(user.user_id);
    state.repository.clear_user_files(user.user_id).await?;
    Ok(Json(serde_json::json!({ "message": "all files cleared" })))
}

#[derive(Serialize)]
pub struct FileViewResponse {
    pub filename: String,
    pub pages: Vec<FileViewPage>,
}

#[derive(Serialize)]
pub struct FileViewPage {
    pub page_number: i32,
    pub text: String,
}

/// Reconstructs a file's indexed text by page. The original bytes are not
/// retained once chunked, so this reflects the chunk store, not the
/// original PDF layout.
pub async fn view(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(filename): Path<String>,
) -> Result<Json<FileViewResponse>, ApiError> {
    let chunks = state.store.get_file_chunks(user.user_id, &filename);
    if chunks.is_empty() {
        return Err(ApiError::NotFound(format!("no indexed content for {filename}")));
    }

    let mut pages: Vec<FileViewPage> = Vec::new();
    for chunk in chunks {
        match pages.iter_mut().find(|p| p.page_number == chunk.page_number) {
            Some(page) => {
                page.text.push(' ');
                page.text.push_str(&chunk.text);
            }
            None => pages.push(FileViewPage { page_number: chunk.page_number, text: chunk.text }),
        }
    }

    Ok(Json(FileViewResponse { filename, pages }))
}
