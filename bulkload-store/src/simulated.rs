//! Simulated key-value store for Deterministic Simulation Testing (DST).
//!
//! This module provides an in-memory store with configurable fault injection,
//! injectable write latency and a hold gate that parks writes until released.
//! Faults are drawn from a seeded hash so every run with the same seed and
//! the same operation order injects the same faults.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bulkload_core::{Batch, BatchId, Record};
use tokio::sync::watch;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::store::{KvStore, RecordFailure, WriteReceipt};

/// Configuration for fault injection in the simulated store.
#[derive(Debug, Clone, Default)]
pub struct StoreFaultConfig {
    /// Probability of a batch write failing as a whole. Range: 0.0 - 1.0.
    pub batch_fail_rate: f64,
    /// Probability of each individual record failing. Range: 0.0 - 1.0.
    pub record_fail_rate: f64,
    /// Probability of sync failing. Range: 0.0 - 1.0.
    pub sync_fail_rate: f64,
    /// If true, the next batch write fails (one-shot).
    pub force_batch_fail: bool,
    /// If true, the next batch write fails with device full (one-shot).
    pub force_device_full: bool,
    /// Fail the batch write with this sequence number (0-based, in arrival order).
    pub fail_write_seq: Option<u64>,
    /// Fail the record at this index of the next batch that is long enough (one-shot).
    pub force_record_fail_at: Option<u32>,
    /// If true, the next sync fails (one-shot).
    pub force_sync_fail: bool,
    /// Fixed latency added to every batch write.
    pub write_latency: Duration,
    /// Upper bound of extra, seed-derived latency added to every batch write.
    pub write_jitter: Duration,
}

impl StoreFaultConfig {
    /// Creates a fault config with no faults (for basic testing).
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates a fault config that simulates a flaky store.
    #[must_use]
    pub fn flaky() -> Self {
        Self {
            batch_fail_rate: 0.01,
            record_fail_rate: 0.001,
            sync_fail_rate: 0.01,
            ..Self::default()
        }
    }

    /// Sets the batch failure rate.
    #[must_use]
    pub const fn with_batch_fail_rate(mut self, rate: f64) -> Self {
        self.batch_fail_rate = rate;
        self
    }

    /// Sets the per-record failure rate.
    #[must_use]
    pub const fn with_record_fail_rate(mut self, rate: f64) -> Self {
        self.record_fail_rate = rate;
        self
    }

    /// Sets the sync failure rate.
    #[must_use]
    pub const fn with_sync_fail_rate(mut self, rate: f64) -> Self {
        self.sync_fail_rate = rate;
        self
    }

    /// Forces the next batch write to fail.
    #[must_use]
    pub const fn with_force_batch_fail(mut self) -> Self {
        self.force_batch_fail = true;
        self
    }

    /// Forces the next batch write to fail with device full.
    #[must_use]
    pub const fn with_force_device_full(mut self) -> Self {
        self.force_device_full = true;
        self
    }

    /// Fails the batch write with the given arrival sequence number.
    #[must_use]
    pub const fn with_fail_write_seq(mut self, seq: u64) -> Self {
        self.fail_write_seq = Some(seq);
        self
    }

    /// Forces the record at `index` of the next long enough batch to fail.
    #[must_use]
    pub const fn with_force_record_fail_at(mut self, index: u32) -> Self {
        self.force_record_fail_at = Some(index);
        self
    }

    /// Forces the next sync to fail.
    #[must_use]
    pub const fn with_force_sync_fail(mut self) -> Self {
        self.force_sync_fail = true;
        self
    }

    /// Sets the fixed write latency.
    #[must_use]
    pub const fn with_write_latency(mut self, latency: Duration) -> Self {
        self.write_latency = latency;
        self
    }

    /// Sets the jitter bound added on top of the fixed write latency.
    #[must_use]
    pub const fn with_write_jitter(mut self, jitter: Duration) -> Self {
        self.write_jitter = jitter;
        self
    }
}

/// Type of fault being injected.
#[derive(Debug, Clone, Copy)]
enum FaultType {
    BatchFail,
    RecordFail,
    SyncFail,
}

/// Statistics tracking for injected faults.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FaultStats {
    /// Number of batch failures injected.
    pub batch_failures: u64,
    /// Number of record failures injected.
    pub record_failures: u64,
    /// Number of sync failures injected.
    pub sync_failures: u64,
    /// Total store operations attempted.
    pub total_ops: u64,
}

impl FaultStats {
    /// Returns the total number of faults injected.
    #[must_use]
    pub const fn total_faults(&self) -> u64 {
        self.batch_failures + self.record_failures + self.sync_failures
    }
}

/// Committed contents of the store.
#[derive(Debug, Default)]
struct StoreContents {
    /// Batches in the order their writes completed (dirty - may not be synced).
    committed: Vec<Batch>,
    /// Number of leading `committed` batches covered by the last sync.
    durable: usize,
}

/// Decrements the active-write gauge on every exit path of a write.
struct ActiveWrite<'a> {
    active: &'a AtomicU64,
}

impl Drop for ActiveWrite<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory simulated key-value store for deterministic testing.
///
/// Clones share state via `Arc`, so a test can keep a handle for inspection
/// while the writer owns another.
///
/// # Panics
///
/// Methods may panic if internal mutex locks are poisoned, which indicates
/// a previous panic in a critical section. This is acceptable for test code.
#[derive(Debug, Clone)]
#[allow(clippy::significant_drop_tightening, clippy::missing_panics_doc)]
pub struct SimulatedKvStore {
    /// Committed batches and the durable watermark.
    contents: Arc<Mutex<StoreContents>>,
    /// Fault injection configuration.
    fault_config: Arc<Mutex<StoreFaultConfig>>,
    /// Statistics tracking for injected faults.
    fault_stats: Arc<Mutex<FaultStats>>,
    /// RNG seed for deterministic fault injection.
    seed: u64,
    /// Counter for deterministic fault injection.
    op_counter: Arc<AtomicU64>,
    /// Arrival sequence of batch writes.
    write_seq: Arc<AtomicU64>,
    /// Writes currently inside `write_batch`.
    active_writes: Arc<AtomicU64>,
    /// Highest value `active_writes` ever reached.
    peak_writes: Arc<AtomicU64>,
    /// Writes park while this is `true`.
    hold: Arc<watch::Sender<bool>>,
}

#[allow(clippy::missing_panics_doc, clippy::significant_drop_tightening)]
impl SimulatedKvStore {
    /// Creates a new simulated store with the given seed and no faults.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_faults(seed, StoreFaultConfig::none())
    }

    /// Creates a new simulated store with fault injection enabled.
    #[must_use]
    pub fn with_faults(seed: u64, config: StoreFaultConfig) -> Self {
        let (hold, _) = watch::channel(false);
        Self {
            contents: Arc::new(Mutex::new(StoreContents::default())),
            fault_config: Arc::new(Mutex::new(config)),
            fault_stats: Arc::new(Mutex::new(FaultStats::default())),
            seed,
            op_counter: Arc::new(AtomicU64::new(0)),
            write_seq: Arc::new(AtomicU64::new(0)),
            active_writes: Arc::new(AtomicU64::new(0)),
            peak_writes: Arc::new(AtomicU64::new(0)),
            hold: Arc::new(hold),
        }
    }

    /// Returns a reference to the fault configuration for modification.
    pub fn fault_config(&self) -> MutexGuard<'_, StoreFaultConfig> {
        self.fault_config.lock().expect("fault config lock poisoned")
    }

    /// Returns a copy of the current fault statistics.
    #[must_use]
    pub fn fault_stats(&self) -> FaultStats {
        self.fault_stats.lock().expect("fault stats lock poisoned").clone()
    }

    /// Parks every batch write that arrives (or is waiting) until [`Self::release`].
    pub fn hold(&self) {
        self.hold.send_replace(true);
    }

    /// Lets parked batch writes proceed.
    pub fn release(&self) {
        self.hold.send_replace(false);
    }

    /// Simulates a crash: batches written after the last sync are lost.
    pub fn simulate_crash(&self) {
        let mut contents = self.contents.lock().expect("contents lock poisoned");
        let durable = contents.durable;
        contents.committed.truncate(durable);
    }

    /// Returns the committed batches in completion order.
    #[must_use]
    pub fn committed_batches(&self) -> Vec<Batch> {
        let contents = self.contents.lock().expect("contents lock poisoned");
        contents.committed.clone()
    }

    /// Returns the committed records, ordered by batch id then append order.
    #[must_use]
    pub fn committed_records(&self) -> Vec<Record> {
        let mut batches = self.committed_batches();
        batches.sort_by_key(Batch::id);
        batches.into_iter().flat_map(Batch::into_records).collect()
    }

    /// Returns the ids of committed batches in completion order.
    #[must_use]
    pub fn completion_order(&self) -> Vec<BatchId> {
        let contents = self.contents.lock().expect("contents lock poisoned");
        contents.committed.iter().map(Batch::id).collect()
    }

    /// Returns the number of batches covered by the last sync.
    #[must_use]
    pub fn durable_batch_count(&self) -> usize {
        self.contents.lock().expect("contents lock poisoned").durable
    }

    /// Returns the number of batch writes that have arrived.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.write_seq.load(Ordering::SeqCst)
    }

    /// Returns the number of batch writes currently in progress.
    #[must_use]
    pub fn active_writes(&self) -> u64 {
        self.active_writes.load(Ordering::SeqCst)
    }

    /// Returns the highest number of concurrent batch writes observed.
    #[must_use]
    pub fn peak_concurrent_writes(&self) -> u64 {
        self.peak_writes.load(Ordering::SeqCst)
    }

    /// Simple deterministic RNG for fault injection.
    fn should_inject_fault(&self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        if rate >= 1.0 {
            return true;
        }
        let counter = self.op_counter.fetch_add(1, Ordering::Relaxed);
        let hash = self
            .seed
            .wrapping_add(counter)
            .wrapping_mul(0x5851_f42d_4c95_7f2d);
        #[allow(clippy::cast_precision_loss)]
        let normalized = (hash as f64) / (u64::MAX as f64);
        normalized < rate
    }

    /// Seed-derived latency in `[0, bound]` for the write with sequence `seq`.
    #[allow(clippy::cast_possible_truncation)] // Jitter bounds are far below u64::MAX micros.
    fn jitter(&self, seq: u64, bound: Duration) -> Duration {
        let bound_us = bound.as_micros() as u64;
        if bound_us == 0 {
            return Duration::ZERO;
        }
        let hash = self
            .seed
            .wrapping_add(seq)
            .wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Duration::from_micros(hash % (bound_us + 1))
    }

    /// Increments a fault counter.
    fn record_fault(&self, fault_type: FaultType) {
        let mut stats = self.fault_stats.lock().expect("fault stats lock poisoned");
        match fault_type {
            FaultType::BatchFail => stats.batch_failures += 1,
            FaultType::RecordFail => stats.record_failures += 1,
            FaultType::SyncFail => stats.sync_failures += 1,
        }
    }

    /// Increments total operation counter.
    fn record_op(&self) {
        let mut stats = self.fault_stats.lock().expect("fault stats lock poisoned");
        stats.total_ops += 1;
    }

    /// Decides whether the write with sequence `seq` fails as a whole.
    fn batch_fault(&self, seq: u64) -> Option<StoreError> {
        let mut config = self.fault_config.lock().expect("fault config lock poisoned");
        if config.force_device_full {
            config.force_device_full = false;
            return Some(StoreError::DeviceFull);
        }
        if config.force_batch_fail {
            config.force_batch_fail = false;
            return Some(StoreError::io("write_batch", "simulated failure (forced)"));
        }
        if config.fail_write_seq == Some(seq) {
            return Some(StoreError::io("write_batch", format!("simulated failure (write {seq})")));
        }
        if self.should_inject_fault(config.batch_fail_rate) {
            return Some(StoreError::io("write_batch", "simulated failure"));
        }
        None
    }

    /// Decides which records of `batch` fail individually.
    #[allow(clippy::cast_possible_truncation)] // Batch sizes are bounded by Limits.
    fn record_faults(&self, batch: &Batch) -> Vec<RecordFailure> {
        let mut config = self.fault_config.lock().expect("fault config lock poisoned");
        let mut failures = Vec::new();

        if let Some(index) = config.force_record_fail_at {
            if (index as usize) < batch.len() {
                config.force_record_fail_at = None;
                failures.push(RecordFailure {
                    index,
                    error: StoreError::RecordRejected {
                        reason: "simulated record failure (forced)".into(),
                    },
                });
            }
        }

        if config.record_fail_rate > 0.0 {
            for index in 0..batch.len() as u32 {
                if failures.iter().any(|f| f.index == index) {
                    continue;
                }
                if self.should_inject_fault(config.record_fail_rate) {
                    failures.push(RecordFailure {
                        index,
                        error: StoreError::RecordRejected {
                            reason: "simulated record failure".into(),
                        },
                    });
                }
            }
            failures.sort_by_key(|f| f.index);
        }

        failures
    }
}

#[async_trait]
impl KvStore for SimulatedKvStore {
    #[allow(clippy::cast_possible_truncation)] // Batch sizes are bounded by Limits.
    async fn write_batch(&self, batch: &Batch) -> StoreResult<WriteReceipt> {
        self.record_op();
        let seq = self.write_seq.fetch_add(1, Ordering::SeqCst);
        let active = self.active_writes.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_writes.fetch_max(active, Ordering::SeqCst);
        let _active = ActiveWrite {
            active: &self.active_writes,
        };

        let mut hold = self.hold.subscribe();
        hold.wait_for(|held| !*held)
            .await
            .map_err(|_| StoreError::Closed)?;

        let (latency, jitter) = {
            let config = self.fault_config.lock().expect("fault config lock poisoned");
            (config.write_latency, config.write_jitter)
        };
        let delay = latency + self.jitter(seq, jitter);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.batch_fault(seq) {
            self.record_fault(FaultType::BatchFail);
            debug!(batch_id = batch.id().get(), seq, error = %err, "Injected batch failure");
            return Err(err);
        }

        let failures = self.record_faults(batch);
        for failure in &failures {
            self.record_fault(FaultType::RecordFail);
            debug!(batch_id = batch.id().get(), index = failure.index, "Injected record failure");
        }

        let written: Vec<Record> = batch
            .records()
            .iter()
            .enumerate()
            .filter(|(index, _)| !failures.iter().any(|f| f.index as usize == *index))
            .map(|(_, record)| record.clone())
            .collect();
        let records_written = written.len() as u32;

        {
            let mut contents = self.contents.lock().expect("contents lock poisoned");
            contents.committed.push(Batch::from_records(batch.id(), written));
        }

        Ok(WriteReceipt {
            records_written,
            failures,
        })
    }

    async fn sync(&self) -> StoreResult<()> {
        self.record_op();
        {
            let mut config = self.fault_config.lock().expect("fault config lock poisoned");
            let fail = if config.force_sync_fail {
                config.force_sync_fail = false;
                true
            } else {
                self.should_inject_fault(config.sync_fail_rate)
            };
            if fail {
                drop(config);
                self.record_fault(FaultType::SyncFail);
                return Err(StoreError::io("sync", "fsync failed (simulated)"));
            }
        }

        let mut contents = self.contents.lock().expect("contents lock poisoned");
        contents.durable = contents.committed.len();
        Ok(())
    }
}
