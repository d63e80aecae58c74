//! Stream-end flushing.
//!
//! Finishing a load takes two steps, in either order, and both are needed
//! before every record passed to `set` is known to be durable (or a fatal
//! error is known):
//!
//! 1. [`AsyncBatchWriter::drain`] writes the residual partial batch through
//!    the synchronous path and syncs the store.
//! 2. [`AsyncBatchWriter::wait_idle`] waits until every in-flight slot is
//!    free, then syncs the store if any asynchronous batch completed since
//!    the last sync.
//!
//! Asynchronous completions only mean the store accepted the batch. A batch
//! is durable once a sync issued after its completion has returned.
//!
//! [`AsyncBatchWriter::finish`] runs both, `wait_idle` first.

use bulkload_store::KvStore;
use tracing::{debug, info};

use super::{check_outcome, AsyncBatchWriter, WriterState};
use crate::error::{WriterError, WriterResult};

/// Summary of a finished writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// Records passed to `set`.
    pub records_appended: u64,
    /// Batches written through the asynchronous path.
    pub batches_dispatched: u64,
    /// Records written by the final drain.
    pub records_drained: u64,
    /// Records acknowledged by the store.
    pub records_written: u64,
    /// Progress counter value after the writer went idle.
    pub outstanding: i64,
}

impl<S: KvStore> AsyncBatchWriter<S> {
    /// Writes the residual partial batch synchronously and stops accepting
    /// records.
    ///
    /// Returns the number of records written. An empty buffer is a successful
    /// no-op, and so is a second drain. Batches dispatched earlier are not
    /// awaited; use [`Self::wait_idle`].
    ///
    /// # Errors
    /// - `Aborted` if a fatal error was latched before the drain.
    /// - `StoreWrite` / `RecordWrite` if the residual batch fails, `Sync` if
    ///   the sync after it fails. The error is latched as well.
    #[allow(clippy::cast_possible_truncation)] // Batch sizes are bounded by Limits.
    pub async fn drain(&mut self) -> WriterResult<usize> {
        if self.state == WriterState::Drained {
            return Ok(0);
        }
        self.latch.check()?;

        let batch = self.cut_batch();
        self.state = WriterState::Drained;
        if batch.is_empty() {
            info!(writer_id = self.config.writer_id.get(), "Drain found empty buffer");
            return Ok(0);
        }

        let batch_id = batch.id();
        let records = batch.len() as u32;
        let _progress = self.progress.begin();

        let written = check_outcome(batch_id, records, self.store.write_batch(&batch).await)
            .map_err(|err| self.latch_and_return(err))?;
        // The sync also covers asynchronous batches completed so far.
        self.stats.take_unsynced();
        self.sync_store().await?;

        self.stats.record_drain(written);
        info!(
            writer_id = self.config.writer_id.get(),
            batch_id = batch_id.get(),
            records,
            "Drained residual batch"
        );
        Ok(batch.len())
    }

    /// Waits until every in-flight batch has completed and makes the
    /// completed batches durable.
    ///
    /// # Errors
    /// - `Aborted` if any completion latched a fatal error.
    /// - `Sync` if the store sync fails. The error is latched as well.
    pub async fn wait_idle(&self) -> WriterResult<()> {
        self.pool.wait_idle().await;
        self.latch.check()?;

        let unsynced = self.stats.take_unsynced();
        if unsynced > 0 {
            self.sync_store().await?;
            debug!(
                writer_id = self.config.writer_id.get(),
                batches = unsynced,
                "Synced completed batches"
            );
        }
        Ok(())
    }

    /// Waits for in-flight batches, then drains the buffer.
    ///
    /// Every record passed to `set` is durable once this returns `Ok`.
    ///
    /// # Errors
    /// Returns the first fatal error from any step.
    pub async fn finish(mut self) -> WriterResult<FlushReport> {
        self.wait_idle().await?;
        self.drain().await?;

        let stats = self.stats.snapshot();
        let report = FlushReport {
            records_appended: stats.records_appended,
            batches_dispatched: stats.batches_dispatched,
            records_drained: stats.records_drained,
            records_written: stats.records_written,
            outstanding: self.progress.get(),
        };
        info!(
            writer_id = self.config.writer_id.get(),
            records_appended = report.records_appended,
            records_written = report.records_written,
            batches_dispatched = report.batches_dispatched,
            slot_waits = stats.slot_waits,
            "Batch writer finished"
        );
        Ok(report)
    }

    async fn sync_store(&self) -> WriterResult<()> {
        self.store
            .sync()
            .await
            .map_err(|source| self.latch_and_return(WriterError::Sync { source }))?;
        self.stats.record_sync();
        Ok(())
    }

    fn latch_and_return(&self, err: WriterError) -> WriterError {
        self.latch.record(err.clone());
        err
    }
}
