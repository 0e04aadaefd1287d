//! Error types for the server and their HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use notecrypt_types::{ErrorBody, ALREADY_INITIALIZED};
use thiserror::Error;
use tracing::error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while serving a request or running a migration.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The profile salt is already set.
    #[error("{}", ALREADY_INITIALIZED)]
    AlreadyInitialized,

    #[error("{0}")]
    BadRequest(String),

    /// Missing or malformed account header.
    #[error("authentication required")]
    Unauthorized,

    /// Profile reset is switched off for this deployment.
    #[error("profile reset is disabled")]
    ResetDisabled,

    #[error("{0} not found")]
    NotFound(String),

    /// SQLite failure. The detail is logged, never returned.
    #[error("storage error: {0}")]
    Storage(String),

    /// A stored document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A blocking task panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(String),
}

impl ServerError {
    /// Returns a `map_err` adapter that wraps a rusqlite error with context.
    pub fn storage(context: &'static str) -> impl Fn(rusqlite::Error) -> Self {
        move |e| Self::Storage(format!("{context}: {e}"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::AlreadyInitialized | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::ResetDisabled => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage(_) | Self::Serialization(_) | Self::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
