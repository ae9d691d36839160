use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    RateLimited,
    Internal,
    #[default]
    Unknown,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::Validation,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            429 => Self::RateLimited,
            500..=599 => Self::Internal,
            _ => Self::Unknown,
        }
    }
}

/// Error body returned by the album service. Most endpoints only send
/// `{ "message": ... }`, so both fields are optional on the wire.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    #[serde(default)]
    pub code: ErrorCode,
    #[serde(default)]
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Builds an error from a non-success response, preferring the server's
    /// JSON `message` over the raw body text.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<ApiError>(body).ok();
        let code = match parsed.as_ref().map(|e| e.code) {
            Some(code) if code != ErrorCode::Unknown => code,
            _ => ErrorCode::from_status(status),
        };
        let message = match parsed {
            Some(e) if !e.message.is_empty() => e.message,
            _ if body.trim().is_empty() => format!("request failed with status {status}"),
            _ => body.trim().to_string(),
        };
        Self { code, message }
    }
}
