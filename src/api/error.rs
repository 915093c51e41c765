//! API error types and conversions

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::alerts::AlertError;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Invalid request parameters or a rejected configuration
    InvalidRequest(String),

    /// The caller only has read access
    Forbidden(String),

    /// The request is valid but cannot be served in the current state
    Conflict(String),

    /// Storage operation failed
    StorageError(String),

    /// Internal server error
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::StorageError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<AlertError> for ApiError {
    fn from(err: AlertError) -> Self {
        let message = err.to_string();
        match err {
            AlertError::Configuration(_) | AlertError::InvalidSilence(_) => {
                ApiError::InvalidRequest(message)
            }
            AlertError::SecretsUnavailable(_) | AlertError::ChannelsDisabled => {
                ApiError::Conflict(message)
            }
            AlertError::Persistence(_) => ApiError::StorageError(message),
            AlertError::Crypto(_) => ApiError::Internal(message),
        }
    }
}

impl From<crate::storage::error::StorageError> for ApiError {
    fn from(err: crate::storage::error::StorageError) -> Self {
        ApiError::StorageError(err.to_string())
    }
}
