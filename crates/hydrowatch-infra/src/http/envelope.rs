//! Client-side decoding of the control service response envelope.
//!
//! Successful responses carry `data`; failures carry `errors[0].code`, one
//! of `NOT_FOUND`, `ALREADY_EXISTS`, `INVALID_ARGUMENT` or `UNAVAILABLE`.

use hydrowatch_types::error::ControlError;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Map an error code from the envelope to a [`ControlError`].
pub fn error_from_code(code: &str, message: String) -> ControlError {
    match code {
        "NOT_FOUND" => ControlError::NotFound(message),
        "ALREADY_EXISTS" => ControlError::AlreadyExists(message),
        "INVALID_ARGUMENT" => ControlError::InvalidArgument(message),
        "UNAVAILABLE" => ControlError::Unavailable(message),
        other => ControlError::Protocol(format!("{other}: {message}")),
    }
}

/// Decode a response body into its `data` payload.
pub fn decode<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, ControlError> {
    let envelope: Envelope<T> = serde_json::from_str(body).map_err(|e| {
        ControlError::Protocol(format!("HTTP {status}: unreadable response body: {e}"))
    })?;

    if let Some(first) = envelope.errors.into_iter().next() {
        return Err(error_from_code(&first.code, first.message));
    }

    match envelope.data {
        Some(data) if status.is_success() => Ok(data),
        _ => Err(ControlError::Protocol(format!(
            "HTTP {status}: response carried no data"
        ))),
    }
}
