//! Bulkload Writer - bounded asynchronous batch writes with backpressure.
//!
//! Sits between a high-throughput record producer and a [`KvStore`]. Records
//! are grouped into fixed-size batches; each full batch becomes one
//! asynchronous store write, and at most `max_in_flight` writes are
//! outstanding at any time. A producer that outruns the store waits in `set`.
//!
//! # Components
//!
//! - [`ProgressCounter`]: shared count of writes issued but not yet resolved.
//! - [`AsyncBatchWriter`]: buffers records, dispatches full batches, latches
//!   the first fatal store error.
//! - Flushing: [`AsyncBatchWriter::drain`] writes and syncs the residual
//!   batch, [`AsyncBatchWriter::wait_idle`] waits for the pool to empty and
//!   syncs the completed batches. [`AsyncBatchWriter::finish`] does both.
//!
//! # Design Principles (`TigerStyle`)
//!
//! - **Bounded memory**: one filling buffer plus at most `max_in_flight` batches
//! - **Fail fast**: the first store error stops the writer; no retry
//! - **Explicit limits**: configuration is validated against [`Limits`]
//! - **No unsafe code**: Safety > Performance
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(SimulatedKvStore::new(42));
//! let mut writer = AsyncBatchWriter::new(store, ProgressCounter::new(), WriterConfig::default())?;
//! writer.set("key", "value", 0).await?;
//! let report = writer.finish().await?;
//! ```
//!
//! [`KvStore`]: bulkload_store::KvStore
//! [`Limits`]: bulkload_core::Limits

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
mod fatal;
mod pool;
mod progress;
mod stats;
mod writer;

pub use config::{FailurePolicy, WriterConfig, DEFAULT_BATCH_RECORDS, DEFAULT_MAX_IN_FLIGHT};
pub use error::{WriterError, WriterResult};
pub use fatal::FatalLatch;
pub use pool::{InFlightPool, InFlightSlot};
pub use progress::{ProgressCounter, ProgressGuard};
pub use stats::{WriterStats, WriterStatsSnapshot};
pub use writer::{AsyncBatchWriter, FlushReport, WriterState};
