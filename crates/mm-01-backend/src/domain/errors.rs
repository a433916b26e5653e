//! Backend error types.

use thiserror::Error;

/// Message used when an address history is over the protocol server limit.
pub const CAPACITY_EXCEEDED_MESSAGE: &str =
    "The number of transactions on this address exceeds the Electrum server limit";

/// Errors returned by every backend variant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The upstream call failed and may succeed on retry.
    #[error("backend unavailable: {0}")]
    Transient(String),

    /// The requested transaction or block does not exist upstream.
    #[error("not found: {0}")]
    NotFound(String),

    /// An address history is larger than the upstream server will return.
    #[error("{0}")]
    CapacityExceeded(String),

    /// The configured backend cannot serve this operation.
    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    /// The upstream answered with something we could not decode.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::InvalidResponse(e.to_string())
        } else if e.status() == Some(reqwest::StatusCode::NOT_FOUND) {
            BackendError::NotFound(e.to_string())
        } else {
            BackendError::Transient(e.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::InvalidResponse(e.to_string())
    }
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        BackendError::Transient(e.to_string())
    }
}
