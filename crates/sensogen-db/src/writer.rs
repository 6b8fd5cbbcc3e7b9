//! The storage writer: flush orchestration, retry, and recovery.
//!
//! The writer owns the single write connection (via [`SqliteStore`]) and is
//! the only component allowed to mutate the store. One call to
//! [`StorageWriter::flush`] is one transactional insert of a whole batch;
//! on failure the batch is never discarded here -- the caller retains it and
//! requeues, which together with store-assigned row identity gives
//! at-least-once flush attempts without duplicate rows.
//!
//! Failure handling per [`crate::error::FailureKind`]:
//!
//! - **Transient** -- sleep per the retry policy and try again; exhausting
//!   the attempt budget surfaces [`FlushError::RetriesExhausted`].
//! - **Corrupt** -- quarantine the store files, recreate a fresh store, and
//!   retry the same batch immediately. One recovery per flush; a second
//!   corruption in the same flush is surfaced.
//! - **Fatal** -- surfaced at once; the process should stop, not spin.

use sensogen_types::Reading;
use tracing::{debug, error, warn};

use crate::error::{DbError, FailureKind, FlushError};
use crate::reading_store::ReadingStore;
use crate::retry::RetryPolicy;
use crate::sqlite::{CheckpointStats, SqliteStore};

/// Counters the writer accumulates over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Rows successfully persisted.
    pub rows_persisted: u64,
    /// Batches successfully committed.
    pub batches_persisted: u64,
    /// Transient failures that led to a backoff sleep.
    pub retries: u64,
    /// Corruption recoveries performed.
    pub recoveries: u64,
}

/// The single writer over the store.
pub struct StorageWriter {
    store: SqliteStore,
    policy: RetryPolicy,
    consecutive_failures: u32,
    stats: WriterStats,
}

impl StorageWriter {
    /// Create a writer over an opened store.
    pub const fn new(store: SqliteStore, policy: RetryPolicy) -> Self {
        Self {
            store,
            policy,
            consecutive_failures: 0,
            stats: WriterStats {
                rows_persisted: 0,
                batches_persisted: 0,
                retries: 0,
                recoveries: 0,
            },
        }
    }

    /// Persist a batch transactionally, retrying transient failures and
    /// recovering from corruption.
    ///
    /// On any error return the batch has NOT been persisted and the caller
    /// must retain it for a later attempt.
    ///
    /// # Errors
    ///
    /// - [`FlushError::RetriesExhausted`] after the configured attempts all
    ///   hit transient contention.
    /// - [`FlushError::RecoveryFailed`] if corruption recovery itself fails
    ///   or corruption recurs within one flush.
    /// - [`FlushError::Fatal`] for non-recoverable storage failures.
    pub async fn flush(&mut self, batch: &[Reading]) -> Result<(), FlushError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut retry = self.policy.start();
        let mut recovered = false;

        loop {
            match ReadingStore::new(self.store.pool()).insert_batch(batch).await {
                Ok(()) => {
                    self.consecutive_failures = 0;
                    self.stats.rows_persisted = self
                        .stats
                        .rows_persisted
                        .saturating_add(u64::try_from(batch.len()).unwrap_or(u64::MAX));
                    self.stats.batches_persisted = self.stats.batches_persisted.saturating_add(1);
                    debug!(rows = batch.len(), "batch flushed");
                    return Ok(());
                }
                Err(e) => match e.kind() {
                    FailureKind::Transient => {
                        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                        if let Some(delay) = retry.backoff(&self.policy) {
                            self.stats.retries = self.stats.retries.saturating_add(1);
                            warn!(
                                attempt = retry.attempt(),
                                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                                error = %e,
                                "transient storage contention; backing off"
                            );
                            tokio::time::sleep(delay).await;
                        } else {
                            warn!(
                                attempts = retry.attempt(),
                                error = %e,
                                "flush retries exhausted; batch retained for a later attempt"
                            );
                            return Err(FlushError::RetriesExhausted {
                                attempts: retry.attempt(),
                                source: e,
                            });
                        }
                    }
                    FailureKind::Corrupt => {
                        if recovered {
                            error!(error = %e, "corruption recurred within one flush");
                            return Err(FlushError::RecoveryFailed { source: e });
                        }
                        recovered = true;
                        self.stats.recoveries = self.stats.recoveries.saturating_add(1);
                        self.store
                            .quarantine_and_recreate()
                            .await
                            .map_err(|source| FlushError::RecoveryFailed { source })?;
                        // Retry the same batch against the fresh store.
                    }
                    FailureKind::Fatal => {
                        error!(error = %e, "fatal storage failure in flush");
                        return Err(FlushError::Fatal { source: e });
                    }
                },
            }
        }
    }

    /// Issue a checkpoint (no-op under the rollback journal).
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the checkpoint statement fails; callers log
    /// and retry on the next interval.
    pub async fn checkpoint(&self) -> Result<Option<CheckpointStats>, DbError> {
        self.store.checkpoint().await
    }

    /// Close the underlying store.
    pub async fn close(&self) {
        self.store.close().await;
    }

    /// The underlying store handle.
    pub const fn store(&self) -> &SqliteStore {
        &self.store
    }

    /// Lifetime counters.
    pub const fn stats(&self) -> &WriterStats {
        &self.stats
    }

    /// Transient failures observed since the last successful flush.
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
