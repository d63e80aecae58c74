//! Writer statistics.
//!
//! Counters are shared between the producer and completion tasks, so they
//! are plain atomics; [`WriterStats::snapshot`] gives a consistent-enough copy
//! for logging and assertions.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one writer.
#[derive(Debug, Default)]
pub struct WriterStats {
    records_appended: AtomicU64,
    batches_dispatched: AtomicU64,
    batches_completed: AtomicU64,
    batches_failed: AtomicU64,
    records_written: AtomicU64,
    slot_waits: AtomicU64,
    records_drained: AtomicU64,
    batches_unsynced: AtomicU64,
    syncs: AtomicU64,
}

impl WriterStats {
    pub(crate) fn record_append(&self) {
        self.records_appended.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatch(&self) {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_slot_wait(&self) {
        self.slot_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completion(&self, records_written: u64) {
        self.batches_completed.fetch_add(1, Ordering::Relaxed);
        self.records_written.fetch_add(records_written, Ordering::Relaxed);
        self.batches_unsynced.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_failure(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_drain(&self, records: u64) {
        self.records_drained.fetch_add(records, Ordering::Relaxed);
        self.records_written.fetch_add(records, Ordering::Relaxed);
    }

    /// Returns the number of completed asynchronous batches not yet covered
    /// by a sync, and resets it. Call before issuing the sync.
    pub(crate) fn take_unsynced(&self) -> u64 {
        self.batches_unsynced.swap(0, Ordering::AcqRel)
    }

    pub(crate) fn record_sync(&self) {
        self.syncs.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a copy of the current counters.
    #[must_use]
    pub fn snapshot(&self) -> WriterStatsSnapshot {
        WriterStatsSnapshot {
            records_appended: self.records_appended.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            batches_completed: self.batches_completed.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            slot_waits: self.slot_waits.load(Ordering::Relaxed),
            records_drained: self.records_drained.load(Ordering::Relaxed),
            syncs: self.syncs.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`WriterStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStatsSnapshot {
    /// Records passed to `set`.
    pub records_appended: u64,
    /// Full batches handed to the asynchronous path.
    pub batches_dispatched: u64,
    /// Asynchronous batches whose writes succeeded.
    pub batches_completed: u64,
    /// Asynchronous batches whose writes failed.
    pub batches_failed: u64,
    /// Records acknowledged by the store (async and drain).
    pub records_written: u64,
    /// Dispatches that had to wait for a free slot.
    pub slot_waits: u64,
    /// Records written by the synchronous drain.
    pub records_drained: u64,
    /// Store syncs issued by the writer.
    pub syncs: u64,
}

impl WriterStatsSnapshot {
    /// Returns the number of asynchronous batches with an observed outcome.
    #[must_use]
    pub const fn batches_finished(&self) -> u64 {
        self.batches_completed + self.batches_failed
    }
}
