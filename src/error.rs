use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Error taxonomy for the chat subsystem.
///
/// Blocks are deliberately surfaced as `NotFound` to the blocked/blocking
/// party rather than as a permission error, so the block relationship itself
/// is never revealed.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("permission denied: {0}")]
    Permission(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ChatError {
    pub fn permission(reason: impl Into<String>) -> Self {
        ChatError::Permission(reason.into())
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        ChatError::Conflict(reason.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        ChatError::Validation(reason.into())
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, error, reason) = match &self {
            ChatError::Permission(reason) => {
                (StatusCode::FORBIDDEN, "forbidden", reason.clone())
            }
            ChatError::Conflict(reason) => (StatusCode::CONFLICT, "conflict", reason.clone()),
            ChatError::Validation(reason) => {
                (StatusCode::BAD_REQUEST, "bad_request", reason.clone())
            }
            ChatError::NotFound => (StatusCode::NOT_FOUND, "not_found", "not found".to_string()),
            ChatError::Database(e) => {
                // Storage detail goes to the log, never into the response body.
                tracing::error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(serde_json::json!({ "error": error, "reason": reason })),
        )
            .into_response()
    }
}
