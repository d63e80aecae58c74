//! Asynchronous batch writer.
//!
//! Records are appended to a single buffer. When the buffer reaches the
//! configured threshold it is cut into a [`Batch`] and dispatched: the writer
//! takes an in-flight slot (waiting if the pool is saturated), bumps the
//! shared [`ProgressCounter`] and spawns one task that owns the batch until
//! the store reports its outcome.
//!
//! # Completion
//!
//! Each dispatched batch completes exactly once, in any order relative to the
//! others. Completion latches a fatal error if the store rejected the batch or
//! any record in it, then decrements the counter, then frees the slot. Freeing
//! the slot last means a fully free pool implies every outcome was observed.
//!
//! # Cancellation
//!
//! [`AsyncBatchWriter::set`] is not cancel-safe: dropping it while it waits
//! for a slot drops the batch it was about to dispatch.

mod flush;

use std::sync::Arc;

use bulkload_core::{Batch, BatchId, Limits, Record};
use bulkload_store::{KvStore, StoreResult, WriteReceipt};
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::config::WriterConfig;
use crate::error::{WriterError, WriterResult};
use crate::fatal::FatalLatch;
use crate::pool::{InFlightPool, InFlightSlot};
use crate::progress::{ProgressCounter, ProgressGuard};
use crate::stats::{WriterStats, WriterStatsSnapshot};

pub use flush::FlushReport;

/// Lifecycle of a writer as seen by its producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Buffer is empty.
    Idle,
    /// Buffer holds at least one record.
    Accumulating,
    /// A full batch is being handed to the in-flight pool.
    Submitted,
    /// `drain` has run; no further records are accepted.
    Drained,
}

/// Groups records into batches and writes them with bounded concurrency.
pub struct AsyncBatchWriter<S: KvStore> {
    store: Arc<S>,
    progress: ProgressCounter,
    config: WriterConfig,
    pool: InFlightPool,
    latch: FatalLatch,
    stats: Arc<WriterStats>,
    buffer: Batch,
    state: WriterState,
}

impl<S: KvStore> AsyncBatchWriter<S> {
    /// Creates a writer validated against the default [`Limits`].
    ///
    /// # Errors
    /// Returns `Config` if the configuration is out of bounds.
    pub fn new(store: Arc<S>, progress: ProgressCounter, config: WriterConfig) -> WriterResult<Self> {
        Self::with_limits(store, progress, config, &Limits::new())
    }

    /// Creates a writer validated against custom limits.
    ///
    /// # Errors
    /// Returns `Config` if the configuration is out of bounds.
    pub fn with_limits(
        store: Arc<S>,
        progress: ProgressCounter,
        config: WriterConfig,
        limits: &Limits,
    ) -> WriterResult<Self> {
        config.validate(limits)?;

        info!(
            writer_id = config.writer_id.get(),
            batch_records = config.batch_records,
            max_in_flight = config.max_in_flight,
            failure_policy = ?config.failure_policy,
            "Created async batch writer"
        );

        Ok(Self {
            store,
            progress,
            pool: InFlightPool::new(config.max_in_flight),
            latch: FatalLatch::new(config.failure_policy),
            stats: Arc::new(WriterStats::default()),
            buffer: Batch::with_capacity(BatchId::new(0), config.batch_records),
            state: WriterState::Idle,
            config,
        })
    }

    /// Appends a record built from `key`, `value` and `meta`.
    ///
    /// Dispatches the buffer when it reaches the batch threshold, waiting for
    /// a free slot if needed. Store failures of the dispatched batch are not
    /// returned here; they surface from a later call once latched.
    ///
    /// # Errors
    /// - `Drained` if `drain` already ran.
    /// - `Aborted` if a fatal error has been latched.
    pub async fn set(
        &mut self,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
        meta: u8,
    ) -> WriterResult<()> {
        self.push(Record::new(key, value, meta)).await
    }

    /// Appends an already built record. See [`Self::set`].
    ///
    /// # Errors
    /// Same as [`Self::set`].
    pub async fn push(&mut self, record: Record) -> WriterResult<()> {
        if self.state == WriterState::Drained {
            return Err(WriterError::Drained);
        }
        self.latch.check()?;

        self.stats.record_append();
        if !self.buffer.push(record) {
            self.state = WriterState::Accumulating;
            return Ok(());
        }

        let batch = self.cut_batch();
        self.state = WriterState::Submitted;
        let result = self.dispatch(batch).await;
        self.state = WriterState::Idle;
        result
    }

    /// Detaches the buffer and starts a fresh one with the next batch id.
    fn cut_batch(&mut self) -> Batch {
        let next = Batch::with_capacity(self.buffer.id().next(), self.config.batch_records);
        std::mem::replace(&mut self.buffer, next)
    }

    /// Hands a full batch to the in-flight pool.
    #[tracing::instrument(skip_all, name = "writer_dispatch", fields(writer_id = self.config.writer_id.get(), batch_id = batch.id().get(), records = batch.len()))]
    #[allow(clippy::cast_possible_truncation)] // Batch sizes are bounded by Limits.
    async fn dispatch(&mut self, batch: Batch) -> WriterResult<()> {
        let slot = match self.pool.try_acquire() {
            Some(slot) => slot,
            None => {
                self.stats.record_slot_wait();
                debug!(
                    in_flight = self.pool.in_flight(),
                    capacity = self.pool.capacity(),
                    "In-flight pool saturated, waiting for a slot"
                );
                self.pool.acquire().await
            }
        };

        // A completion may have failed while we waited.
        self.latch.check()?;

        let submission = Submission {
            batch_id: batch.id(),
            records: batch.len() as u32,
            latch: self.latch.clone(),
            stats: Arc::clone(&self.stats),
            completed: false,
            _progress: self.progress.begin(),
            _slot: slot,
        };
        self.stats.record_dispatch();
        debug!(
            in_flight = self.pool.in_flight(),
            outstanding = self.progress.get(),
            "Dispatched batch"
        );

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let outcome = store.write_batch(&batch).await;
            submission.complete(outcome);
        });
        Ok(())
    }

    /// Returns the number of records waiting in the buffer.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the number of dispatched batches whose slot is still held.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.pool.in_flight()
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> WriterState {
        self.state
    }

    /// Returns the first fatal error, if one has been latched.
    #[must_use]
    pub fn first_error(&self) -> Option<WriterError> {
        self.latch.first().cloned()
    }

    /// Returns a snapshot of the writer counters.
    #[must_use]
    pub fn stats(&self) -> WriterStatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns the shared progress counter.
    #[must_use]
    pub const fn progress(&self) -> &ProgressCounter {
        &self.progress
    }

    /// Returns the writer configuration.
    #[must_use]
    pub const fn config(&self) -> &WriterConfig {
        &self.config
    }
}

impl<S: KvStore> std::fmt::Debug for AsyncBatchWriter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncBatchWriter")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("buffered", &self.buffer.len())
            .field("in_flight", &self.pool.in_flight())
            .field("tripped", &self.latch.is_tripped())
            .finish_non_exhaustive()
    }
}

impl<S: KvStore> Drop for AsyncBatchWriter<S> {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            warn!(
                writer_id = self.config.writer_id.get(),
                buffered = self.buffer.len(),
                "Batch writer dropped with buffered records that were never written"
            );
        }
    }
}

/// One dispatched batch, owned by its completion task.
///
/// Fields drop in declaration order: the counter is decremented before the
/// slot is released.
struct Submission {
    batch_id: BatchId,
    records: u32,
    latch: FatalLatch,
    stats: Arc<WriterStats>,
    completed: bool,
    _progress: ProgressGuard,
    _slot: InFlightSlot,
}

impl Submission {
    fn complete(mut self, outcome: StoreResult<WriteReceipt>) {
        match check_outcome(self.batch_id, self.records, outcome) {
            Ok(written) => {
                self.stats.record_completion(written);
                debug!(batch_id = self.batch_id.get(), records = written, "Batch write completed");
            }
            Err(err) => {
                self.stats.record_failure();
                self.latch.record(err);
            }
        }
        self.completed = true;
    }
}

impl Drop for Submission {
    fn drop(&mut self) {
        if !self.completed {
            self.stats.record_failure();
            self.latch.record(WriterError::Completion {
                batch_id: self.batch_id,
                message: "write task ended without an outcome".into(),
            });
        }
    }
}

/// Maps a store outcome to the writer's error taxonomy.
///
/// Returns the number of records written when neither the batch nor any
/// record in it failed.
pub(crate) fn check_outcome(
    batch_id: BatchId,
    records: u32,
    outcome: StoreResult<WriteReceipt>,
) -> WriterResult<u64> {
    let receipt = outcome.map_err(|source| WriterError::StoreWrite {
        batch_id,
        records,
        source,
    })?;
    if let Some(failure) = receipt.failures.into_iter().next() {
        return Err(WriterError::RecordWrite {
            batch_id,
            index: failure.index,
            source: failure.error,
        });
    }
    Ok(u64::from(receipt.records_written))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use bulkload_store::{RecordFailure, SimulatedKvStore, StoreError, StoreFaultConfig};

    use super::*;

    fn writer(store: &SimulatedKvStore, config: WriterConfig) -> AsyncBatchWriter<SimulatedKvStore> {
        AsyncBatchWriter::new(Arc::new(store.clone()), ProgressCounter::new(), config).unwrap()
    }

    fn key(i: usize) -> Bytes {
        Bytes::from(format!("key-{i:04}"))
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let store = Arc::new(SimulatedKvStore::new(42));
        let result = AsyncBatchWriter::new(
            store,
            ProgressCounter::new(),
            WriterConfig::new().with_batch_records(0),
        );
        assert!(matches!(result, Err(WriterError::Config(_))));
    }

    #[tokio::test]
    async fn test_buffers_until_threshold() {
        let store = SimulatedKvStore::new(42);
        let mut writer = writer(&store, WriterConfig::for_testing());
        assert_eq!(writer.state(), WriterState::Idle);

        for i in 0..3 {
            writer.set(key(i), "v", 0).await.unwrap();
        }
        assert_eq!(writer.buffered_len(), 3);
        assert_eq!(writer.state(), WriterState::Accumulating);
        assert_eq!(writer.stats().batches_dispatched, 0);

        writer.set(key(3), "v", 0).await.unwrap();
        assert_eq!(writer.buffered_len(), 0);
        assert_eq!(writer.state(), WriterState::Idle);
        assert_eq!(writer.stats().batches_dispatched, 1);

        writer.wait_idle().await.unwrap();
        assert_eq!(store.committed_batches().len(), 1);
        assert_eq!(store.committed_batches()[0].len(), 4);
        assert!(writer.progress().is_idle());
    }

    #[tokio::test]
    async fn test_batch_ids_are_sequential() {
        let store = SimulatedKvStore::new(42);
        let mut writer = writer(&store, WriterConfig::for_testing().with_batch_records(2));
        for i in 0..6 {
            writer.set(key(i), "v", 0).await.unwrap();
        }
        writer.wait_idle().await.unwrap();

        let mut ids = store.completion_order();
        ids.sort();
        assert_eq!(ids, vec![BatchId::new(0), BatchId::new(1), BatchId::new(2)]);
    }

    #[tokio::test]
    async fn test_store_failure_latches_and_aborts() {
        let store = SimulatedKvStore::with_faults(42, StoreFaultConfig::none().with_force_batch_fail());
        let mut writer = writer(&store, WriterConfig::for_testing().with_batch_records(1));

        // Dispatch succeeds; the failure surfaces through the latch.
        writer.set(key(0), "v", 0).await.unwrap();
        let err = writer.wait_idle().await.unwrap_err();
        assert!(matches!(err, WriterError::Aborted { .. }));
        assert!(matches!(err.root(), WriterError::StoreWrite { records: 1, .. }));
        assert_eq!(writer.stats().batches_failed, 1);
        assert!(writer.progress().is_idle());

        let err = writer.set(key(1), "v", 0).await.unwrap_err();
        assert_eq!(err.batch_id(), Some(BatchId::new(0)));
        assert_eq!(writer.buffered_len(), 0);
    }

    #[tokio::test]
    async fn test_record_failure_is_fatal() {
        let store =
            SimulatedKvStore::with_faults(42, StoreFaultConfig::none().with_force_record_fail_at(1));
        let mut writer = writer(&store, WriterConfig::for_testing().with_batch_records(2));

        writer.set(key(0), "v", 0).await.unwrap();
        writer.set(key(1), "v", 0).await.unwrap();
        writer.wait_idle().await.unwrap_err();

        match writer.first_error() {
            Some(WriterError::RecordWrite { batch_id, index, .. }) => {
                assert_eq!(batch_id, BatchId::new(0));
                assert_eq!(index, 1);
            }
            other => panic!("expected RecordWrite, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_waits_for_free_slot() {
        let store = SimulatedKvStore::new(42);
        store.hold();
        let mut writer = writer(
            &store,
            WriterConfig::for_testing()
                .with_batch_records(1)
                .with_max_in_flight(1),
        );

        writer.set(key(0), "v", 0).await.unwrap();
        assert_eq!(writer.in_flight(), 1);

        let handle = tokio::spawn(async move {
            writer.set(key(1), "v", 0).await.map(|()| writer)
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        store.release();
        let writer = handle.await.unwrap().unwrap();
        assert_eq!(writer.stats().slot_waits, 1);
        writer.wait_idle().await.unwrap();
        assert_eq!(store.peak_concurrent_writes(), 1);
    }

    #[test]
    fn test_check_outcome() {
        let id = BatchId::new(5);
        assert_eq!(check_outcome(id, 3, Ok(WriteReceipt::clean(3))), Ok(3));

        let err = check_outcome(id, 3, Err(StoreError::DeviceFull)).unwrap_err();
        assert_eq!(
            err,
            WriterError::StoreWrite {
                batch_id: id,
                records: 3,
                source: StoreError::DeviceFull
            }
        );

        let receipt = WriteReceipt {
            records_written: 1,
            failures: vec![
                RecordFailure {
                    index: 0,
                    error: StoreError::Closed,
                },
                RecordFailure {
                    index: 2,
                    error: StoreError::DeviceFull,
                },
            ],
        };
        let err = check_outcome(id, 3, Ok(receipt)).unwrap_err();
        assert!(matches!(err, WriterError::RecordWrite { index: 0, .. }));
    }

    /// Store whose writes panic, leaving the completion without an outcome.
    struct PanickingStore;

    #[async_trait]
    impl KvStore for PanickingStore {
        async fn write_batch(&self, _batch: &Batch) -> StoreResult<WriteReceipt> {
            panic!("simulated store panic");
        }

        async fn sync(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_panicked_completion_is_latched() {
        let progress = ProgressCounter::new();
        let mut writer = AsyncBatchWriter::new(
            Arc::new(PanickingStore),
            progress.clone(),
            WriterConfig::for_testing().with_batch_records(1),
        )
        .unwrap();

        writer.set(key(0), "v", 0).await.unwrap();
        let err = writer.wait_idle().await.unwrap_err();
        assert!(matches!(err.root(), WriterError::Completion { .. }));
        assert!(progress.is_idle());
    }
}
