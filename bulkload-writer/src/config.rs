//! Writer configuration.

use bulkload_core::{Limits, WriterId};

/// Default number of records per batch.
pub const DEFAULT_BATCH_RECORDS: u32 = 1000;

/// Default number of batches allowed in flight.
pub const DEFAULT_MAX_IN_FLIGHT: u32 = 1000;

/// What the writer does when it observes the first fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Latch the error and return it from every later call.
    #[default]
    Surface,
    /// Log the error and terminate the process with `code`.
    Exit {
        /// Process exit code.
        code: i32,
    },
}

/// Configuration for an [`crate::AsyncBatchWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    /// Identifier used in logs.
    pub writer_id: WriterId,
    /// Records per batch. A batch is cut as soon as it holds this many.
    pub batch_records: u32,
    /// Maximum asynchronous batch writes outstanding at once.
    pub max_in_flight: u32,
    /// Behavior on the first fatal error.
    pub failure_policy: FailurePolicy,
}

impl WriterConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            writer_id: WriterId::new(0),
            batch_records: DEFAULT_BATCH_RECORDS,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            failure_policy: FailurePolicy::Surface,
        }
    }

    /// Creates a configuration for testing: tiny batches, tiny pool.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            writer_id: WriterId::new(0),
            batch_records: 4,
            max_in_flight: 2,
            failure_policy: FailurePolicy::Surface,
        }
    }

    /// Sets the writer id.
    #[must_use]
    pub const fn with_writer_id(mut self, writer_id: WriterId) -> Self {
        self.writer_id = writer_id;
        self
    }

    /// Sets the batch threshold.
    #[must_use]
    pub const fn with_batch_records(mut self, records: u32) -> Self {
        self.batch_records = records;
        self
    }

    /// Sets the in-flight capacity.
    #[must_use]
    pub const fn with_max_in_flight(mut self, capacity: u32) -> Self {
        self.max_in_flight = capacity;
        self
    }

    /// Sets the failure policy.
    #[must_use]
    pub const fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Validates this configuration against `limits`.
    ///
    /// # Errors
    /// Returns an error if the batch threshold or the in-flight capacity is
    /// zero or above its limit.
    pub const fn validate(&self, limits: &Limits) -> bulkload_core::Result<()> {
        if let Err(e) = limits.validate() {
            return Err(e);
        }
        if let Err(e) = limits.check_batch_records(self.batch_records) {
            return Err(e);
        }
        limits.check_in_flight(self.max_in_flight)
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self::new()
    }
}
