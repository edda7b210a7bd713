//! Error types for protocol parsing.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// A server payload that does not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The payload should have been a JSON array.
    #[error("expected an array payload, found {found}")]
    NotAnArray {
        /// JSON type actually found.
        found: &'static str,
    },

    /// A header element could not be read.
    #[error("invalid record header at index {index}: {message}")]
    InvalidHeader {
        /// Position in the flat payload.
        index: usize,
        /// What was wrong.
        message: String,
    },

    /// A non-deleted header was not followed by a document.
    #[error("record {id} has no document")]
    MissingDocument {
        /// lowlaId from the header.
        id: String,
    },

    /// Any other malformed message.
    #[error("malformed message: {0}")]
    Malformed(String),
}

impl ProtocolError {
    /// Create a malformed message error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Name of the JSON type of `value`, for error messages.
pub(crate) fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
