//! Application error type mapping to HTTP status codes and envelope format.

use axum::response::{IntoResponse, Response};

use hydrowatch_types::error::{ControlError, RegistryError};

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Registry outcome or control-plane failure.
    Control(ControlError),
    /// Request rejected before reaching the registry.
    Validation(String),
}

impl From<ControlError> for AppError {
    fn from(e: ControlError) -> Self {
        AppError::Control(e)
    }
}

impl From<RegistryError> for AppError {
    fn from(e: RegistryError) -> Self {
        AppError::Control(e.into())
    }
}

impl AppError {
    /// Envelope error code and message.
    pub fn code_and_message(&self) -> (&'static str, String) {
        match self {
            AppError::Control(ControlError::NotFound(id)) => {
                ("NOT_FOUND", format!("station '{id}' not found"))
            }
            AppError::Control(ControlError::AlreadyExists(id)) => {
                ("ALREADY_EXISTS", format!("station '{id}' already exists"))
            }
            AppError::Control(ControlError::InvalidArgument(msg)) => {
                ("INVALID_ARGUMENT", msg.clone())
            }
            AppError::Control(ControlError::Unavailable(msg)) => ("UNAVAILABLE", msg.clone()),
            AppError::Control(ControlError::Timeout) => {
                ("UNAVAILABLE", "registry call timed out".to_string())
            }
            AppError::Control(e) => ("INTERNAL_ERROR", e.to_string()),
            AppError::Validation(msg) => ("INVALID_ARGUMENT", msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, message) = self.code_and_message();
        if code == "INTERNAL_ERROR" || code == "UNAVAILABLE" {
            tracing::warn!(code, %message, "request failed");
        } else {
            tracing::debug!(code, %message, "request rejected");
        }

        ApiResponse::error(code, &message, uuid::Uuid::now_v7().to_string(), 0).into_response()
    }
}
