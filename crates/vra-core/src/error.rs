//! Error types for vRA operations.
//!
//! Every fatal or transient condition surfaced by the transport and lifecycle
//! layers is one variant of [`Error`]. Transient variants (`Conflict`,
//! `Transport`, `Timeout`) are consumed by the delete convergence loop and only
//! escape it wrapped in [`Error::RetriesExhausted`].

use std::time::Duration;
use thiserror::Error;

/// Main error type for vRA operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Remote object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote object is still referenced or the server could not complete the request yet
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Connection-level failure, no HTTP response was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request timed out before a response arrived
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Authentication or authorization was rejected
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// The server rejected the request
    #[error("Request rejected with status {status}: {message}")]
    Validation {
        /// HTTP status code returned by the server
        status: u16,
        /// Response body text
        message: String,
    },

    /// Delete did not converge before the deadline
    #[error(
        "exhausted retries after {attempts} attempts over {elapsed:?}, last error: {last_error}"
    )]
    RetriesExhausted {
        /// Number of requests dispatched
        attempts: u32,
        /// Wall-clock time spent retrying
        elapsed: Duration,
        /// Last transient error observed
        last_error: Box<Error>,
    },

    /// The caller cancelled the operation
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Invalid UUID format
    #[error("Invalid UUID: {0}")]
    InvalidUuid(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Specialized result type for vRA operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Transport(_) => "TRANSPORT",
            Self::Timeout(_) => "TIMEOUT",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Validation { .. } => "VALIDATION_FAILED",
            Self::RetriesExhausted { .. } => "RETRIES_EXHAUSTED",
            Self::Cancelled(_) => "CANCELLED",
            Self::Decode(_) => "DECODE_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::InvalidUuid(_) => "INVALID_UUID",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true for connection-level failures that never produced a response.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if err.is_builder() {
            Self::InvalidEndpoint(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<uuid::Error> for Error {
    fn from(err: uuid::Error) -> Self {
        Self::InvalidUuid(err.to_string())
    }
}
