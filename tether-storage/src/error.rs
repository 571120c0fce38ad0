//! Error types for store access.

use tether_core::Container;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Session could not be established: {reason}")]
    Session { reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Object not found: {container}/{path}")]
    NotFound { container: Container, path: String },

    #[error("Serialization error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Invalid store configuration: {0}")]
    Config(String),
}

impl GatewayError {
    /// Transport-level failures worth another attempt on an idempotent read.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            GatewayError::Status { status, .. } => *status >= 500 || *status == 429,
            GatewayError::Unavailable { .. } => true,
            GatewayError::Session { .. }
            | GatewayError::NotFound { .. }
            | GatewayError::Decode(_)
            | GatewayError::Config(_) => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound { .. })
    }
}

/// Result type alias for store operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
