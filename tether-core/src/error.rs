//! Error types for decoding remote-produced payloads

use thiserror::Error;

/// Failure to turn an untrusted blob or row into a typed record.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Expected a JSON object")]
    NotAnObject,

    #[error("Required field missing: {field}")]
    MissingField { field: &'static str },

    #[error("Field {field} is not numeric")]
    NonNumeric { field: &'static str },
}

/// Result type alias for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;
