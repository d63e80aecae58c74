//! System limits and configuration bounds.
//!
//! Following `TigerStyle`: put limits on everything.
//! The batch buffer and the in-flight pool both have an explicit maximum, so
//! the memory held by one writer is bounded by
//! `batch_records * (1 + max_in_flight)` records.

/// Upper bounds applied to every writer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of records in one batch.
    pub max_batch_records: u32,
    /// Maximum number of concurrently outstanding asynchronous batch writes.
    pub max_in_flight: u32,
}

impl Limits {
    /// Creates limits with safe defaults.
    ///
    /// 1M records per batch, 65536 batches in flight.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_batch_records: 1_000_000,
            max_in_flight: 65_536,
        }
    }

    /// Validates that all limits are internally consistent.
    ///
    /// # Errors
    /// Returns an error if any limit is zero.
    pub const fn validate(&self) -> crate::Result<()> {
        if self.max_batch_records == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "max_batch_records",
                reason: "must be positive",
            });
        }

        if self.max_in_flight == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "max_in_flight",
                reason: "must be positive",
            });
        }

        Ok(())
    }

    /// Checks a requested batch size against these limits.
    ///
    /// # Errors
    /// Returns an error if `records` is zero or above `max_batch_records`.
    pub const fn check_batch_records(&self, records: u32) -> crate::Result<()> {
        if records == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "batch_records",
                reason: "must be positive",
            });
        }
        if records > self.max_batch_records {
            return Err(crate::Error::LimitExceeded {
                limit: "max_batch_records",
                max: self.max_batch_records as u64,
                actual: records as u64,
            });
        }
        Ok(())
    }

    /// Checks a requested in-flight capacity against these limits.
    ///
    /// # Errors
    /// Returns an error if `capacity` is zero or above `max_in_flight`.
    pub const fn check_in_flight(&self, capacity: u32) -> crate::Result<()> {
        if capacity == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "max_in_flight",
                reason: "must be positive",
            });
        }
        if capacity > self.max_in_flight {
            return Err(crate::Error::LimitExceeded {
                limit: "max_in_flight",
                max: self.max_in_flight as u64,
                actual: capacity as u64,
            });
        }
        Ok(())
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::new()
    }
}
