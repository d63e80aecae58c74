//! Error types for bulkload core operations.
//!
//! Following `TigerStyle`: all errors must be handled explicitly.
//! No silent failures, no ignored errors.

use thiserror::Error;

/// The result type for bulkload core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while validating configuration against [`crate::Limits`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// An invalid argument was provided.
    #[error("invalid argument {name}: {reason}")]
    InvalidArgument {
        /// The name of the argument.
        name: &'static str,
        /// Why it was invalid.
        reason: &'static str,
    },

    /// A resource limit was exceeded.
    #[error("limit {limit} exceeded: {actual} > {max}")]
    LimitExceeded {
        /// Which limit was exceeded.
        limit: &'static str,
        /// The maximum allowed value.
        max: u64,
        /// The actual value that exceeded the limit.
        actual: u64,
    },
}
