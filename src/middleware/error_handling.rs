use crate::error::AppError;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
    pub error_type: String,
}

/// Map domain errors to HTTP responses.
pub fn map_error(err: &AppError) -> (StatusCode, ErrorResponse) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let error_type = match err {
        AppError::BadRequest(_)
        | AppError::EmptyMessage
        | AppError::TooManyAttachments { .. } => "validation_error",
        AppError::Unauthorized => "authentication_error",
        AppError::Forbidden | AppError::EditWindowExpired { .. } => "authorization_error",
        AppError::NotFound => "not_found_error",
        AppError::InvalidTransition { .. } => "conflict_error",
        AppError::Config(_)
        | AppError::StartServer(_)
        | AppError::Database(_)
        | AppError::Storage(_)
        | AppError::Internal => "server_error",
    };

    // Transient store failures surface as a generic message; internals stay
    // in the logs.
    let message = match err {
        AppError::Database(_) | AppError::Storage(_) | AppError::Internal => {
            tracing::error!(error = %err, "request failed");
            "something went wrong, please try again".to_string()
        }
        other => other.to_string(),
    };

    let response = ErrorResponse {
        error: status
            .canonical_reason()
            .unwrap_or("Error")
            .to_string(),
        message,
        status: status.as_u16(),
        error_type: error_type.to_string(),
    };

    (status, response)
}

pub fn into_response(err: AppError) -> impl IntoResponse {
    let (status, response) = map_error(&err);
    (status, Json(response))
}
