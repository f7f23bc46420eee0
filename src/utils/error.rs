use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::Validation(msg) => {
                tracing::warn!("validation error: {}", msg);
                (StatusCode::BAD_REQUEST, "Validation", msg)
            }
            ApiError::Auth(msg) => {
                tracing::warn!("auth error: {}", msg);
                (StatusCode::UNAUTHORIZED, "Auth", msg)
            }
            ApiError::NotFound(msg) => {
                tracing::warn!("not found: {}", msg);
                (StatusCode::NOT_FOUND, "NotFound", msg)
            }
            ApiError::Extraction(msg) => {
                tracing::warn!("extraction error: {}", msg);
                (StatusCode::UNPROCESSABLE_ENTITY, "Extraction", msg)
            }
            ApiError::Upstream(msg) => {
                tracing::error!("upstream error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Upstream", msg)
            }
            ApiError::Storage(msg) => {
                tracing::error!("storage error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage", msg)
            }
            ApiError::RateLimited => {
                tracing::warn!("rate limited");
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "RateLimited",
                    "Too many requests".to_string(),
                )
            }
            ApiError::Timeout(msg) => {
                tracing::error!("timeout: {}", msg);
                (StatusCode::GATEWAY_TIMEOUT, "Timeout", msg)
            }
            ApiError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal", msg)
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Storage(err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Storage(err.to_string())
    }
}
