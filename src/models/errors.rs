use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{message}")]
    ValidationError { message: String },

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    Forbidden { message: String },

    /// Non-2xx answer from the backend, relayed with its own status.
    #[error("Backend responded with {status}: {error}")]
    UpstreamError {
        status: StatusCode,
        error: String,
        message: Option<String>,
    },

    #[error("Invalid response from backend: {message}")]
    InvalidUpstreamResponse { message: String },

    /// The backend could not be reached at all.
    #[error("Transport error: {message}")]
    TransportError { message: String },

    #[error("{message}")]
    StorageError { message: String },

    #[error("Internal server error: {message}")]
    InternalError { message: String },
}

/// JSON body rendered for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    #[serde(default)]
    pub success: bool,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: Option<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            message,
        }
    }
}

pub struct ErrorHandler;

impl ErrorHandler {
    /// Converts an AppError into the status and body sent to the caller
    pub fn handle_error(error: AppError) -> (StatusCode, ErrorResponse) {
        match error {
            AppError::ValidationError { message } => {
                (StatusCode::BAD_REQUEST, ErrorResponse::new(message, None))
            }

            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                ErrorResponse::new("Method not allowed", None),
            ),

            AppError::NotFound { message } => {
                (StatusCode::NOT_FOUND, ErrorResponse::new(message, None))
            }

            AppError::Unauthorized { message } => {
                (StatusCode::UNAUTHORIZED, ErrorResponse::new(message, None))
            }

            AppError::Forbidden { message } => {
                (StatusCode::FORBIDDEN, ErrorResponse::new(message, None))
            }

            AppError::UpstreamError {
                status,
                error,
                message,
            } => (status, ErrorResponse::new(error, message)),

            AppError::InvalidUpstreamResponse { message } => (
                StatusCode::BAD_GATEWAY,
                ErrorResponse::new("Invalid response from backend", Some(message)),
            ),

            AppError::TransportError { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("Internal proxy error", Some(message)),
            ),

            AppError::StorageError { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new(message, None),
            ),

            AppError::InternalError { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("An unexpected error occurred", Some(message)),
            ),
        }
    }

    /// Client errors are expected traffic; only server-side failures are logged loudly.
    pub fn is_server_fault(error: &AppError) -> bool {
        matches!(
            error,
            AppError::TransportError { .. }
                | AppError::InvalidUpstreamResponse { .. }
                | AppError::StorageError { .. }
                | AppError::InternalError { .. }
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if ErrorHandler::is_server_fault(&self) {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let (status, body) = ErrorHandler::handle_error(self);
        (status, Json(body)).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::TransportError {
            message: error.to_string(),
        }
    }
}

impl From<multer::Error> for AppError {
    fn from(error: multer::Error) -> Self {
        AppError::ValidationError {
            message: format!("Invalid multipart data: {}", error),
        }
    }
}

// Convenience functions for creating specific errors
impl AppError {
    pub fn validation_failed(message: impl Into<String>) -> Self {
        AppError::ValidationError { message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound { message: message.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized { message: message.into() }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden { message: message.into() }
    }

    pub fn upstream(status: StatusCode, error: impl Into<String>, message: Option<String>) -> Self {
        AppError::UpstreamError {
            status,
            error: error.into(),
            message,
        }
    }

    pub fn invalid_upstream(message: impl Into<String>) -> Self {
        AppError::InvalidUpstreamResponse { message: message.into() }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        AppError::TransportError { message: message.into() }
    }

    pub fn storage_failed(message: impl Into<String>) -> Self {
        AppError::StorageError { message: message.into() }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        AppError::InternalError { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_maps_to_generic_proxy_error() {
        let (status, body) =
            ErrorHandler::handle_error(AppError::transport("connection refused"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal proxy error");
        assert_eq!(body.message.as_deref(), Some("connection refused"));
        assert!(!body.success);
    }

    #[test]
    fn test_upstream_error_keeps_backend_status() {
        let (status, body) = ErrorHandler::handle_error(AppError::upstream(
            StatusCode::FORBIDDEN,
            "Admin access required",
            None,
        ));
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.error, "Admin access required");
    }

    #[test]
    fn test_validation_error_body_omits_message() {
        let (status, body) =
            ErrorHandler::handle_error(AppError::validation_failed("ID parameter is required"));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "error": "ID parameter is required" })
        );
    }

    #[test]
    fn test_client_errors_are_not_server_faults() {
        assert!(!ErrorHandler::is_server_fault(&AppError::MethodNotAllowed));
        assert!(!ErrorHandler::is_server_fault(&AppError::unauthorized("no")));
        assert!(ErrorHandler::is_server_fault(&AppError::storage_failed("disk full")));
    }
}
