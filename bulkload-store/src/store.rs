//! Store abstraction for the batch writer.
//!
//! The trait is intentionally small: one batch write and one sync. Higher
//! level concerns (batching, admission control, error latching) belong to the
//! writer.

use async_trait::async_trait;
use bulkload_core::Batch;

use crate::error::{StoreError, StoreResult};

/// A record that failed inside an otherwise acknowledged batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    /// Position of the record within its batch.
    pub index: u32,
    /// Why the record failed.
    pub error: StoreError,
}

/// Outcome of a batch write that succeeded at the batch level.
///
/// Individual records may still have failed; callers must check
/// [`WriteReceipt::failures`] as well as the batch-level result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReceipt {
    /// Number of records written successfully.
    pub records_written: u32,
    /// Per-record failures, in batch order.
    pub failures: Vec<RecordFailure>,
}

impl WriteReceipt {
    /// Creates a receipt for a batch where every record was written.
    #[must_use]
    pub const fn clean(records_written: u32) -> Self {
        Self {
            records_written,
            failures: Vec::new(),
        }
    }

    /// Returns true if no record failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns the first per-record failure, if any.
    #[must_use]
    pub fn first_failure(&self) -> Option<&RecordFailure> {
        self.failures.first()
    }
}

/// Key-value store backend used by the batch writer.
///
/// Implementations must be `Send + Sync` for use across async tasks. A single
/// store is shared by every in-flight write, so `write_batch` may be called
/// concurrently and batches may complete in any order.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Writes a batch.
    ///
    /// Resolves exactly once, when the batch has been accepted by the store or
    /// has failed. A batch-level failure is returned as `Err`; failures of
    /// individual records are reported in the receipt. An accepted batch is
    /// not durable until a later [`KvStore::sync`] returns `Ok`.
    ///
    /// # Errors
    /// Returns an error if the batch as a whole could not be written.
    async fn write_batch(&self, batch: &Batch) -> StoreResult<WriteReceipt>;

    /// Makes every previously written batch durable (fsync).
    ///
    /// # Errors
    /// Returns an error if the sync fails.
    async fn sync(&self) -> StoreResult<()>;
}
