//! Error types for store operations.

use lowla_codec::CodecError;
use lowla_storage::StorageError;
use thiserror::Error;

/// Result type for store operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by collection, cursor and metadata operations.
///
/// Validation variants are raised before anything is written.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The document store failed; the enclosing transaction was aborted.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A value could not be validated or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A field name starting with `$` where only plain fields are allowed.
    #[error("The dollar ($) prefixed field {field} is not valid")]
    InvalidField {
        /// The offending field name.
        field: String,
    },

    /// A `$` operator other than `$set` or `$unset` in a modifier update.
    #[error("Unknown modifier: {modifier}")]
    UnknownModifier {
        /// The offending operator.
        modifier: String,
    },

    /// An update mixing modifier operators with plain replacement fields.
    #[error("Can not mix operations and values in object updates")]
    MixedUpdate,

    /// A document or operand of the wrong shape.
    #[error("invalid document: {message}")]
    InvalidDocument {
        /// What was wrong.
        message: String,
    },

    /// The metadata record could not be read or written.
    #[error("invalid metadata record: {0}")]
    Metadata(String),
}

impl CoreError {
    /// Create an invalid field error.
    pub fn invalid_field(field: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
        }
    }

    /// Create an unknown modifier error.
    pub fn unknown_modifier(modifier: impl Into<String>) -> Self {
        Self::UnknownModifier {
            modifier: modifier.into(),
        }
    }

    /// Create an invalid document error.
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }

    /// Returns true for errors raised by argument validation, before any
    /// write was attempted.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidField { .. }
                | Self::UnknownModifier { .. }
                | Self::MixedUpdate
                | Self::InvalidDocument { .. }
                | Self::Codec(_)
        )
    }
}
