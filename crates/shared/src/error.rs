use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shown when a failure carries no message of its own.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Sorry for the inconvenience.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    Conflict,
    Transport,
    Server,
    MalformedResponse,
    Inconsistent,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => ErrorCode::Validation,
            404 => ErrorCode::NotFound,
            409 => ErrorCode::Conflict,
            500..=599 => ErrorCode::Server,
            _ => ErrorCode::Internal,
        }
    }
}

/// A failure as shown to the operator: a displayable message plus an
/// optional machine-readable detail string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            code,
            message: if message.trim().is_empty() {
                GENERIC_ERROR_MESSAGE.to_string()
            } else {
                message
            },
            detail: None,
        }
    }

    pub fn generic(code: ErrorCode) -> Self {
        Self::new(code, GENERIC_ERROR_MESSAGE)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        if !detail.trim().is_empty() {
            self.detail = Some(detail);
        }
        self
    }

    /// Detail line for an error summary; falls back to a fixed marker when the
    /// server gave nothing more specific.
    pub fn detail_or_unspecified(&self) -> &str {
        self.detail.as_deref().unwrap_or("unspecified")
    }
}
