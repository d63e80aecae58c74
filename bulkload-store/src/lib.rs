//! Bulkload Store - the key-value store contract consumed by the batch writer.
//!
//! The writer treats the store as an external collaborator. It needs exactly
//! two things from it:
//!
//! - **Batch write**: write one batch, resolving once it is durable or has
//!   failed, reporting per-record failures alongside batch-level ones.
//! - **Sync**: make everything written so far durable.
//!
//! The writer derives both of its submission paths from these: the
//! asynchronous path runs `write_batch` on a spawned task, the synchronous
//! drain path awaits `write_batch` followed by `sync` in place.
//!
//! # Testing
//!
//! [`SimulatedKvStore`] is an in-memory implementation with deterministic
//! fault injection, injectable latency and a hold gate that parks writes so
//! backpressure can be observed:
//!
//! ```ignore
//! use bulkload_store::{SimulatedKvStore, StoreFaultConfig};
//!
//! let store = SimulatedKvStore::with_faults(42, StoreFaultConfig::flaky());
//! store.hold();      // writes park until released
//! store.release();
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod simulated;
mod store;

pub use error::{StoreError, StoreResult};
pub use simulated::{FaultStats, SimulatedKvStore, StoreFaultConfig};
pub use store::{KvStore, RecordFailure, WriteReceipt};
