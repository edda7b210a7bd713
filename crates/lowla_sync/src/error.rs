//! Error types for the sync engine.

use lowla_codec::CodecError;
use lowla_core::CoreError;
use lowla_sync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync cycle.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether a later cycle may succeed.
        retryable: bool,
    },

    /// The adapter answered with an error status.
    #[error("server returned {status} for {url}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The request timed out.
    #[error("operation timed out")]
    Timeout,

    /// The adapter's answer had the wrong shape.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A document carried an unrecognized or malformed tagged value.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The local store failed.
    #[error("store error: {0}")]
    Store(#[from] CoreError),

    /// The background worker could not be started.
    #[error("sync worker failed to start: {0}")]
    Worker(String),

    /// The sync server URL is unusable.
    #[error("Invalid server URL for LowlaDB Sync: {0:?}")]
    InvalidUrl(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if the next scheduled cycle may succeed without
    /// intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            SyncError::Server { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(!SyncError::transport_fatal("bad certificate").is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(SyncError::Server {
            status: 503,
            url: "x".into()
        }
        .is_retryable());
        assert!(!SyncError::Server {
            status: 404,
            url: "x".into()
        }
        .is_retryable());
        assert!(!SyncError::InvalidUrl(String::new()).is_retryable());
    }

    #[test]
    fn codec_errors_keep_their_message() {
        let err = SyncError::from(CodecError::unknown_type("Nope"));
        assert_eq!(err.to_string(), "codec error: Unexpected BSON type: Nope");
    }
}
