//! Shared count of writes in flight.
//!
//! A write is "in flight" from the moment it is issued until its outcome
//! (success or failure) has been observed. Several writers may share one
//! counter, so it is an explicit handle passed in at construction rather than
//! process-wide state.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Thread-safe running count of outstanding writes.
///
/// Clones share the same count.
#[derive(Debug, Clone, Default)]
pub struct ProgressCounter {
    outstanding: Arc<AtomicI64>,
}

impl ProgressCounter {
    /// Creates a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks one write as issued. Returns the new count.
    pub fn increment(&self) -> i64 {
        self.outstanding.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Marks one write's outcome as observed. Returns the new count.
    pub fn decrement(&self) -> i64 {
        let now = self.outstanding.fetch_sub(1, Ordering::AcqRel) - 1;
        debug_assert!(now >= 0, "progress counter went negative: {now}");
        now
    }

    /// Returns the current count.
    #[must_use]
    pub fn get(&self) -> i64 {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Returns true if no write is outstanding.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.get() == 0
    }

    /// Increments now and returns a guard that decrements exactly once on drop.
    pub fn begin(&self) -> ProgressGuard {
        self.increment();
        ProgressGuard {
            counter: self.clone(),
        }
    }
}

/// One outstanding write. Dropping it decrements the counter.
#[derive(Debug)]
#[must_use = "dropping the guard immediately marks the write as finished"]
pub struct ProgressGuard {
    counter: ProgressCounter,
}

impl Drop for ProgressGuard {
    fn drop(&mut self) {
        self.counter.decrement();
    }
}
