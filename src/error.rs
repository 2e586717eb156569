use crate::middleware::error_handling;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error_handling::into_response(self).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("message body and attachments cannot both be empty")]
    EmptyMessage,

    #[error("too many file attachments ({count}, max {max})")]
    TooManyAttachments { count: usize, max: usize },

    #[error("edit window expired (max_edit_minutes: {max_edit_minutes})")]
    EditWindowExpired { max_edit_minutes: i64 },

    #[error("invalid call invitation transition (status: {status})")]
    InvalidTransition { status: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("file storage error: {0}")]
    Storage(String),

    #[error("internal server error")]
    Internal,
}

impl AppError {
    /// Returns whether this error is retryable (e.g., database connection timeout)
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Database(e) => {
                matches!(
                    e,
                    sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
                )
            }
            AppError::Storage(_) | AppError::Internal => true,
            _ => false,
        }
    }

    /// Returns HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_)
            | AppError::EmptyMessage
            | AppError::TooManyAttachments { .. } => 400,
            AppError::Unauthorized => 401,
            AppError::Forbidden | AppError::EditWindowExpired { .. } => 403,
            AppError::NotFound => 404,
            AppError::InvalidTransition { .. } => 409,
            _ => 500,
        }
    }
}
