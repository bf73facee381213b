//! Error types for search operations.

use intelx_core::ConfigError;
use thiserror::Error;

/// Errors that can occur while talking to the search API.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The service refused to start a search (bad bucket, bad key, malformed request)
    #[error("search initiation rejected: HTTP {status}: {message}")]
    SearchInit {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// The service accepted the call but reported a non-zero initiation status
    #[error("search initiation rejected with status {code}: {reason}")]
    SearchRejected {
        /// Status code from the initiation body
        code: i64,
        /// Explanation of the code
        reason: String,
    },

    /// Non-2xx response from any other call
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Transport-level failure (DNS, timeout, connection reset)
    #[error("network error: {0}")]
    Network(String),

    /// Response body could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Request rejected locally before any call was made
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SearchError {
    /// HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::SearchInit { status, .. } | Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Result type alias for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;
