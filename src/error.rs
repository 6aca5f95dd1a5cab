//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for every cache tier.
///
/// A missing key is not an error: lookups return `Ok(None)` instead.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Value could not be serialized; nothing was written
    #[error("Encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Stored bytes are not a valid encoding of the requested type
    #[error("Decode failed: {0}")]
    Decode(String),

    /// File operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage engine operation failed
    #[error("Storage engine error: {0}")]
    Storage(#[from] redb::Error),

    /// The precise expiry queue no longer accepts records
    #[error("Expiry queue is closed")]
    QueueClosed,

    /// Options rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal failure (e.g. a blocking task panicked)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Builds a [`CacheError::Decode`] from any displayable decode failure.
    pub fn decode(err: impl std::fmt::Display) -> Self {
        CacheError::Decode(err.to_string())
    }

    /// Converts any of redb's per-operation error types into [`CacheError::Storage`].
    pub fn storage(err: impl Into<redb::Error>) -> Self {
        CacheError::Storage(err.into())
    }
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(err: tokio::task::JoinError) -> Self {
        CacheError::Internal(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_helper_keeps_message() {
        let err = CacheError::decode("truncated record");
        assert!(matches!(err, CacheError::Decode(ref msg) if msg == "truncated record"));
        assert_eq!(err.to_string(), "Decode failed: truncated record");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: CacheError = io.into();
        assert!(matches!(err, CacheError::Io(_)));
    }

    #[test]
    fn test_storage_helper_accepts_engine_errors() {
        let err = CacheError::storage(redb::StorageError::Corrupted("bad page".into()));
        assert!(matches!(err, CacheError::Storage(_)));
    }
}
