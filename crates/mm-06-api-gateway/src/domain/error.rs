//! # Gateway Errors
//!
//! `GatewayError` covers the push side, `ApiError` the REST side.
//!
//! | Backend condition | HTTP status |
//! |-------------------|-------------|
//! | `NotFound` | 404 |
//! | `Unsupported` | 405 |
//! | `CapacityExceeded` | 413 |
//! | mempool not in sync | 503 |
//! | anything else | 500 |

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mm_01_backend::BackendError;
use thiserror::Error;

use super::connection::ConnectionId;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid control frame: {0}")]
    InvalidFrame(String),

    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    #[error("failed to encode push frame: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// REST error carrying its status code.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unavailable() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable")
    }
}

impl From<BackendError> for ApiError {
    fn from(e: BackendError) -> Self {
        let status = match &e {
            BackendError::NotFound(_) => StatusCode::NOT_FOUND,
            BackendError::Unsupported { .. } => StatusCode::METHOD_NOT_ALLOWED,
            BackendError::CapacityExceeded(_) => StatusCode::PAYLOAD_TOO_LARGE,
            BackendError::Transient(_) | BackendError::InvalidResponse(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, e.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_status_mapping() {
        let cases = [
            (BackendError::NotFound("tx".into()), StatusCode::NOT_FOUND),
            (
                BackendError::Unsupported {
                    backend: "bitcoind",
                    operation: "address lookups",
                },
                StatusCode::METHOD_NOT_ALLOWED,
            ),
            (
                BackendError::CapacityExceeded("too many".into()),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                BackendError::Transient("timeout".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status, status);
        }
    }
}
