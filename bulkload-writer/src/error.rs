//! Writer error types.
//!
//! Errors fall into three groups:
//!
//! | Group | Variants | Meaning |
//! |-------|----------|---------|
//! | Fatal | `StoreWrite`, `RecordWrite`, `Sync`, `Completion` | The write stream is known to be inconsistent |
//! | Latched | `Aborted` | A fatal error was already observed; carries the first one |
//! | Usage | `Config`, `Drained` | The writer was misconfigured or misused |
//!
//! Fatal errors are never retried and never aggregated: only the first one is
//! kept, and every later call reports it through `Aborted`.

use bulkload_core::BatchId;
use bulkload_store::StoreError;
use thiserror::Error;

/// Result type for writer operations.
pub type WriterResult<T> = Result<T, WriterError>;

/// Errors that can occur during batch writer operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WriterError {
    /// The writer configuration is invalid.
    #[error("invalid writer config: {0}")]
    Config(#[from] bulkload_core::Error),

    /// The store failed a batch as a whole.
    #[error("store write failed for {batch_id} ({records} records): {source}")]
    StoreWrite {
        /// The batch that failed.
        batch_id: BatchId,
        /// Number of records in the batch.
        records: u32,
        /// The store error.
        source: StoreError,
    },

    /// The store failed one record inside an acknowledged batch.
    #[error("record {index} of {batch_id} failed: {source}")]
    RecordWrite {
        /// The batch containing the record.
        batch_id: BatchId,
        /// Position of the record within the batch.
        index: u32,
        /// The store error.
        source: StoreError,
    },

    /// The final store sync failed.
    #[error("store sync failed: {source}")]
    Sync {
        /// The store error.
        source: StoreError,
    },

    /// A submission ended without reporting an outcome (its task panicked).
    #[error("completion for {batch_id} was lost: {message}")]
    Completion {
        /// The batch whose outcome is unknown.
        batch_id: BatchId,
        /// What happened.
        message: String,
    },

    /// A fatal error was observed earlier; the writer accepts no more work.
    #[error("writer aborted after fatal error: {first}")]
    Aborted {
        /// The first fatal error observed.
        first: Box<WriterError>,
    },

    /// The writer has been drained; no further records are accepted.
    #[error("writer already drained")]
    Drained,
}

impl WriterError {
    /// Returns true if this error means the write stream is inconsistent.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StoreWrite { .. }
                | Self::RecordWrite { .. }
                | Self::Completion { .. }
                | Self::Sync { .. }
                | Self::Aborted { .. }
        )
    }

    /// Returns the root fatal error, unwrapping `Aborted`.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Aborted { first } => first.root(),
            other => other,
        }
    }

    /// Returns the batch the error belongs to, if any.
    #[must_use]
    pub fn batch_id(&self) -> Option<BatchId> {
        match self.root() {
            Self::StoreWrite { batch_id, .. }
            | Self::RecordWrite { batch_id, .. }
            | Self::Completion { batch_id, .. } => Some(*batch_id),
            _ => None,
        }
    }
}
