// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Storage error taxonomy.
//!
//! `NotFound` is the only recoverable "absent" outcome. Everything else is a
//! store failure and must reach the caller as such: a timeout or a backend
//! error is never reported as a missing key.

use std::io;
use std::time::Duration;

use super::codec::SchemaError;

/// Error type for object store and cache operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The key (or the requested version) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote call did not complete within its deadline.
    #[error("store call `{op}` on `{key}` timed out after {after:?}")]
    Timeout {
        op: &'static str,
        key: String,
        after: Duration,
    },

    /// The object store rejected or failed the request.
    #[error("object store failure: {0}")]
    Backend(String),

    /// I/O error from a filesystem-backed store.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    /// Store-internal bookkeeping could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The stored object exists but cannot be decoded into its record type.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

impl StorageError {
    /// Whether this error means "the key is absent" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    pub fn backend(message: impl Into<String>) -> Self {
        StorageError::Backend(message.into())
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(e.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_not_found() {
        let err: StorageError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(err.is_not_found());
    }

    #[test]
    fn other_io_errors_are_failures() {
        let err: StorageError = io::Error::new(io::ErrorKind::PermissionDenied, "nope").into();
        assert!(!err.is_not_found());
        assert!(matches!(err, StorageError::Io(_)));
    }

    #[test]
    fn timeout_is_not_a_miss() {
        let err = StorageError::Timeout {
            op: "get",
            key: "user/alice".to_string(),
            after: Duration::from_millis(50),
        };
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("user/alice"));
    }
}
