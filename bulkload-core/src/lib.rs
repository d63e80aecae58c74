//! Bulkload Core - Records, batches and limits shared by the bulkload crates.
//!
//! This crate holds the data model of the batch writer: the immutable
//! [`Record`] triple, the capacity-bounded [`Batch`] it is grouped into, the
//! strongly-typed [`BatchId`] / [`WriterId`] identifiers, and the [`Limits`]
//! that every writer configuration is validated against.
//!
//! # Design Principles (`TigerStyle`)
//!
//! - **Strongly-typed IDs**: A batch number can't be confused with a writer number
//! - **Explicit limits**: Batch size and in-flight capacity have hard maximums
//! - **Explicit types**: Use u32/u64, not usize, in public configuration
//! - **No unsafe code**: Safety > Performance

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod limits;
mod record;
mod types;

pub use error::{Error, Result};
pub use limits::Limits;
pub use record::{Batch, Record};
pub use types::{BatchId, WriterId};
