//! First-error latch shared by the producer and every completion.
//!
//! The first fatal error wins. Later errors are logged at debug level and
//! dropped; there is no aggregation. Depending on [`FailurePolicy`] the first
//! error either stays latched (and is reported by every later writer call) or
//! terminates the process.

use std::sync::{Arc, OnceLock};

use tracing::{debug, error};

use crate::config::FailurePolicy;
use crate::error::{WriterError, WriterResult};

/// Holds the first fatal error observed by a writer.
#[derive(Debug, Clone)]
pub struct FatalLatch {
    first: Arc<OnceLock<WriterError>>,
    policy: FailurePolicy,
}

impl FatalLatch {
    /// Creates an untripped latch.
    #[must_use]
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            first: Arc::new(OnceLock::new()),
            policy,
        }
    }

    /// Records a fatal error. Returns true if it was the first one.
    ///
    /// Under [`FailurePolicy::Exit`] the first error terminates the process
    /// and this does not return.
    pub fn record(&self, err: WriterError) -> bool {
        let batch_id = err.batch_id().map(|id| id.get());
        let message = err.to_string();
        if self.first.set(err).is_err() {
            debug!(batch_id, error = %message, "Suppressed fatal error after the first");
            return false;
        }

        error!(
            batch_id,
            error = %message,
            "Fatal write error, batch writer stops accepting records"
        );
        if let FailurePolicy::Exit { code } = self.policy {
            std::process::exit(code);
        }
        true
    }

    /// Returns the first fatal error, if any.
    #[must_use]
    pub fn first(&self) -> Option<&WriterError> {
        self.first.get()
    }

    /// Returns true once a fatal error has been recorded.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.first.get().is_some()
    }

    /// Fails with `Aborted` if a fatal error has been recorded.
    ///
    /// # Errors
    /// Returns `Aborted` carrying the first fatal error.
    pub fn check(&self) -> WriterResult<()> {
        match self.first.get() {
            Some(first) => Err(WriterError::Aborted {
                first: Box::new(first.clone()),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use bulkload_core::BatchId;
    use bulkload_store::StoreError;

    use super::*;

    fn store_error(batch: u64) -> WriterError {
        WriterError::StoreWrite {
            batch_id: BatchId::new(batch),
            records: 1,
            source: StoreError::DeviceFull,
        }
    }

    #[test]
    fn test_first_error_wins() {
        let latch = FatalLatch::new(FailurePolicy::Surface);
        assert!(latch.check().is_ok());

        assert!(latch.record(store_error(1)));
        assert!(!latch.record(store_error(2)));

        assert!(latch.is_tripped());
        assert_eq!(latch.first(), Some(&store_error(1)));
        match latch.check() {
            Err(WriterError::Aborted { first }) => assert_eq!(*first, store_error(1)),
            other => panic!("expected Aborted, got {other:?}"),
        }
    }

    #[test]
    fn test_clones_share_state() {
        let latch = FatalLatch::new(FailurePolicy::Surface);
        let shared = latch.clone();
        shared.record(store_error(7));
        assert!(latch.is_tripped());
        assert_eq!(latch.check().unwrap_err().batch_id(), Some(BatchId::new(7)));
    }

    const EXIT_CHILD_ENV: &str = "BULKLOAD_FATAL_EXIT_CHILD";

    #[test]
    fn test_exit_policy_terminates_process() {
        if std::env::var_os(EXIT_CHILD_ENV).is_some() {
            let latch = FatalLatch::new(FailurePolicy::Exit { code: 17 });
            latch.record(store_error(3));
            panic!("record returned under the exit policy");
        }

        // Re-run only this test in a child process that trips the latch.
        let status = std::process::Command::new(std::env::current_exe().unwrap())
            .args([
                "--exact",
                "fatal::tests::test_exit_policy_terminates_process",
                "--nocapture",
                "--test-threads=1",
            ])
            .env(EXIT_CHILD_ENV, "1")
            .status()
            .unwrap();
        assert_eq!(status.code(), Some(17));
    }

    #[test]
    fn test_exit_policy_only_exits_on_first_error() {
        // A tripped latch suppresses later errors without consulting the policy.
        let latch = FatalLatch {
            first: Arc::new(OnceLock::from(store_error(1))),
            policy: FailurePolicy::Exit { code: 17 },
        };
        assert!(!latch.record(store_error(2)));
        assert_eq!(latch.first(), Some(&store_error(1)));
    }
}
