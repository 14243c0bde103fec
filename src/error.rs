//! Relay error types

use std::time::Duration;

/// Relay error types
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    // Transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server could not be reached at all (refused, DNS, reset).
    #[error("connection error: {0}")]
    Connection(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The server answered with a body that does not parse.
    #[error("invalid response from server: {0}")]
    Decode(String),

    #[error("empty response from server")]
    EmptyResponse,

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl RelayError {
    /// Whether this error means the server was unreachable or too slow,
    /// as opposed to answering with an error.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            RelayError::Connection(_) | RelayError::Timeout(_) | RelayError::Http(_)
        )
    }

    /// Map a reqwest error, attributing timeouts to the given budget.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            RelayError::Timeout(timeout)
        } else if err.is_connect() {
            RelayError::Connection(err.to_string())
        } else if err.is_decode() {
            RelayError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            RelayError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            RelayError::Http(err.to_string())
        }
    }
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;
