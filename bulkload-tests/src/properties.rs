//! Property definitions and checkers for batch writer tests.
//!
//! Properties are invariants that must hold once a load has finished (or
//! stopped on a fatal error). The checkers inspect the simulated store and
//! the writer's progress counter.

use std::collections::BTreeSet;

use bulkload_core::{Batch, BatchId, Record};
use bulkload_store::SimulatedKvStore;
use bulkload_writer::{ProgressCounter, WriterConfig};

// ============================================================================
// Property Violation Types
// ============================================================================

/// A violation of a batch writer property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterViolation {
    /// Writes were still counted as outstanding after the writer went idle.
    OutstandingWrites {
        /// Counter value observed.
        outstanding: i64,
    },
    /// More writes ran concurrently than the in-flight capacity allows.
    ConcurrencyExceeded {
        /// Highest concurrency observed by the store.
        peak: u64,
        /// Configured in-flight capacity.
        capacity: u32,
    },
    /// A batch holds more records than the threshold.
    OversizedBatch {
        /// The batch.
        batch_id: BatchId,
        /// Records in the batch.
        len: usize,
        /// Configured threshold.
        threshold: u32,
    },
    /// A batch other than the last one is smaller than the threshold.
    PartialBatch {
        /// The batch.
        batch_id: BatchId,
        /// Records in the batch.
        len: usize,
        /// Configured threshold.
        threshold: u32,
    },
    /// The same batch was committed twice.
    DuplicateBatch {
        /// The batch.
        batch_id: BatchId,
    },
    /// A batch holds records that were not appended in that position.
    BatchOrder {
        /// The batch.
        batch_id: BatchId,
    },
    /// The store does not hold every appended record.
    MissingRecords {
        /// Records appended.
        expected: usize,
        /// Records found in the store.
        actual: usize,
    },
}

impl std::fmt::Display for WriterViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutstandingWrites { outstanding } => {
                write!(f, "{outstanding} writes still outstanding after idle")
            }
            Self::ConcurrencyExceeded { peak, capacity } => {
                write!(f, "{peak} concurrent writes exceed capacity {capacity}")
            }
            Self::OversizedBatch {
                batch_id,
                len,
                threshold,
            } => write!(f, "{batch_id} holds {len} records, threshold is {threshold}"),
            Self::PartialBatch {
                batch_id,
                len,
                threshold,
            } => write!(
                f,
                "{batch_id} holds {len} records but is not the last batch (threshold {threshold})"
            ),
            Self::DuplicateBatch { batch_id } => write!(f, "{batch_id} committed twice"),
            Self::BatchOrder { batch_id } => {
                write!(f, "{batch_id} does not match the append order")
            }
            Self::MissingRecords { expected, actual } => {
                write!(f, "store holds {actual} of {expected} appended records")
            }
        }
    }
}

// ============================================================================
// Property Checks
// ============================================================================

/// Checks the invariants that hold for every load, failed or not.
///
/// - the progress counter is back at zero
/// - store concurrency never exceeded the in-flight capacity
/// - every committed batch is at most `batch_records` long, was committed
///   once, and holds records in append order from its own slice of `appended`
#[must_use]
pub fn check_load(
    store: &SimulatedKvStore,
    progress: &ProgressCounter,
    config: &WriterConfig,
    appended: &[Record],
) -> Vec<WriterViolation> {
    let mut violations = Vec::new();

    let outstanding = progress.get();
    if outstanding != 0 {
        violations.push(WriterViolation::OutstandingWrites { outstanding });
    }

    // The synchronous drain can overlap the last asynchronous writes.
    let peak = store.peak_concurrent_writes();
    if peak > u64::from(config.max_in_flight) + 1 {
        violations.push(WriterViolation::ConcurrencyExceeded {
            peak,
            capacity: config.max_in_flight,
        });
    }

    let mut seen = BTreeSet::new();
    for batch in store.committed_batches() {
        if !seen.insert(batch.id()) {
            violations.push(WriterViolation::DuplicateBatch { batch_id: batch.id() });
        }
        if batch.len() > config.batch_records as usize {
            violations.push(WriterViolation::OversizedBatch {
                batch_id: batch.id(),
                len: batch.len(),
                threshold: config.batch_records,
            });
        }
        if !is_in_append_order(&batch, config.batch_records, appended) {
            violations.push(WriterViolation::BatchOrder { batch_id: batch.id() });
        }
    }

    violations
}

/// Checks a load that finished without error.
///
/// On top of [`check_load`]: every appended record is in the store, and
/// every batch except the last is exactly `batch_records` long.
#[must_use]
pub fn check_clean_load(
    store: &SimulatedKvStore,
    progress: &ProgressCounter,
    config: &WriterConfig,
    appended: &[Record],
) -> Vec<WriterViolation> {
    let mut violations = check_load(store, progress, config, appended);

    let mut batches = store.committed_batches();
    batches.sort_by_key(Batch::id);
    let last = batches.last().map(Batch::id);
    for batch in &batches {
        if Some(batch.id()) != last && batch.len() != config.batch_records as usize {
            violations.push(WriterViolation::PartialBatch {
                batch_id: batch.id(),
                len: batch.len(),
                threshold: config.batch_records,
            });
        }
    }

    let committed = store.committed_records();
    if committed.as_slice() != appended {
        violations.push(WriterViolation::MissingRecords {
            expected: appended.len(),
            actual: committed.len(),
        });
    }

    violations
}

/// Returns true if `batch` is a subsequence of the records appended for its
/// position. Records rejected individually are missing from the batch, so
/// an exact match is not required.
#[allow(clippy::cast_possible_truncation)] // Test loads fit in usize.
fn is_in_append_order(batch: &Batch, batch_records: u32, appended: &[Record]) -> bool {
    let start = batch.id().get() as usize * batch_records as usize;
    let end = (start + batch_records as usize).min(appended.len());
    if start > appended.len() {
        return false;
    }
    let mut expected = appended[start..end].iter();
    batch
        .records()
        .iter()
        .all(|record| expected.any(|candidate| candidate == record))
}

/// Panics with every violation listed if there are any.
///
/// # Panics
/// Panics if `violations` is not empty.
pub fn assert_no_violations(violations: &[WriterViolation]) {
    if !violations.is_empty() {
        let listed: Vec<String> = violations.iter().map(ToString::to_string).collect();
        panic!("writer property violations:\n  {}", listed.join("\n  "));
    }
}
