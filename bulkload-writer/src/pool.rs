//! Bounded pool of in-flight submission slots.
//!
//! Every asynchronous batch write holds one slot from dispatch until its
//! outcome has been observed. Acquiring a slot waits while all `capacity`
//! slots are taken; this is the writer's only admission control.
//!
//! Slots are `tokio::sync::Semaphore` permits. The semaphore is fair, so
//! [`InFlightPool::wait_idle`] (which asks for every permit at once) is not
//! starved by later single-slot requests.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A bounded set of concurrently outstanding submissions.
#[derive(Debug, Clone)]
pub struct InFlightPool {
    semaphore: Arc<Semaphore>,
    capacity: u32,
}

impl InFlightPool {
    /// Creates a pool with `capacity` free slots.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity as usize)),
            capacity,
        }
    }

    /// Returns the pool capacity.
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Returns the number of free slots.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Returns the number of slots currently held.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        (self.capacity as usize).saturating_sub(self.available())
    }

    /// Returns true if every slot is free.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }

    /// Takes a slot if one is free.
    #[must_use]
    pub fn try_acquire(&self) -> Option<InFlightSlot> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| InFlightSlot { _permit: permit })
    }

    /// Takes a slot, waiting while the pool is saturated.
    ///
    /// # Panics
    /// Panics if the semaphore was closed. The pool owns it and never closes it.
    pub async fn acquire(&self) -> InFlightSlot {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("in-flight semaphore is never closed");
        InFlightSlot { _permit: permit }
    }

    /// Waits until every slot is free, then releases them again.
    ///
    /// # Panics
    /// Panics if the semaphore was closed. The pool owns it and never closes it.
    pub async fn wait_idle(&self) {
        let _all = self
            .semaphore
            .acquire_many(self.capacity)
            .await
            .expect("in-flight semaphore is never closed");
    }
}

/// One held slot. Dropping it returns the slot to the pool.
#[derive(Debug)]
pub struct InFlightSlot {
    _permit: OwnedSemaphorePermit,
}
