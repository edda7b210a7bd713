//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while validating or materializing wire values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A tagged value carried a discriminator outside the recognized set.
    #[error("Unexpected BSON type: {tag}")]
    UnknownType {
        /// The offending `_bsonType` value.
        tag: String,
    },

    /// A recognized tag whose payload fields are missing or malformed.
    #[error("invalid {tag} value: {message}")]
    InvalidTagged {
        /// The tag being decoded.
        tag: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// A value that should have been a JSON object was not.
    #[error("expected a JSON object, found {found}")]
    NotAnObject {
        /// Short description of what was found instead.
        found: &'static str,
    },
}

impl CodecError {
    /// Create an unknown type error.
    pub fn unknown_type(tag: impl Into<String>) -> Self {
        Self::UnknownType { tag: tag.into() }
    }

    /// Create an invalid tagged value error.
    pub fn invalid_tagged(tag: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidTagged {
            tag,
            message: message.into(),
        }
    }
}
