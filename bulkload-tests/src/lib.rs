//! Bulkload Tests - Deterministic Simulation Testing for the batch writer.
//!
//! This crate contains the DST (Deterministic Simulation Testing) and
//! integration tests for the bulkload crates. Tests are organized by type:
//!
//! ## Test Organization
//!
//! **DST Tests** (`*_dst.rs`): Seeded runs with fault injection
//! - `writer_dst`: `AsyncBatchWriter` over `SimulatedKvStore` with latency
//!   jitter, batch/record/sync faults and crash simulation
//!
//! **Integration Tests** (`*_tests.rs`): Writer behavior end to end
//! - `writer_tests`: batch cutting, backpressure, completion accounting,
//!   order preservation, drain and fatal error propagation
//!
//! **Support Modules**:
//! - `properties`: Load invariants (`OutstandingWrites`, `BatchOrder`, etc.)
//! - `scenarios`: Seeds, record generators and store profiles
//!
//! ## Naming Conventions
//!
//! - DST tests: `test_dst_<component>_<scenario>`
//! - Integration tests: `test_<component>_<scenario>`
//! - Unit tests: Inline in each crate under `#[cfg(test)]`

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod properties;
pub mod scenarios;

// DST test modules (deterministic simulation with fault injection).
#[cfg(test)]
mod writer_dst;
