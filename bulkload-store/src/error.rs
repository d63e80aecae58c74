//! Store error types.
//!
//! All errors are explicit and typed. No string errors.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a [`crate::KvStore`].
///
/// Used both for batch-level failures and for individual records inside an
/// otherwise acknowledged batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// I/O error from the underlying storage.
    #[error("I/O error: {operation}: {message}")]
    Io {
        /// What operation was being performed.
        operation: &'static str,
        /// Error message.
        message: String,
    },

    /// The storage device is full.
    #[error("storage device full")]
    DeviceFull,

    /// The store rejected a single record.
    #[error("record rejected: {reason}")]
    RecordRejected {
        /// Why the record was rejected.
        reason: String,
    },

    /// The store has been closed.
    #[error("store closed")]
    Closed,
}

impl StoreError {
    /// Creates an I/O error.
    pub fn io(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Io {
            operation,
            message: err.to_string(),
        }
    }

    /// Returns true if the error concerns a single record rather than the batch.
    #[must_use]
    pub const fn is_record_level(&self) -> bool {
        matches!(self, Self::RecordRejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::io("write_batch", "disk on fire");
        assert_eq!(err.to_string(), "I/O error: write_batch: disk on fire");
        assert_eq!(StoreError::DeviceFull.to_string(), "storage device full");
    }

    #[test]
    fn test_is_record_level() {
        assert!(StoreError::RecordRejected {
            reason: "value too large".into()
        }
        .is_record_level());
        assert!(!StoreError::DeviceFull.is_record_level());
        assert!(!StoreError::Closed.is_record_level());
    }
}
