//! The bounded async run loop.
//!
//! One cooperative task drives everything, strictly sequentially per tick:
//! generate readings, evaluate anomalies, append to the batch buffer, flush
//! when a threshold is crossed, checkpoint when due, check run bounds, then
//! sleep for the reading interval. Because flush and checkpoint both run on
//! this single task, they can never overlap.
//!
//! Failure policy in the loop:
//!
//! - A flush that exhausts its transient retries requeues the batch and
//!   generation continues; the rows go out with a later flush (or age out
//!   of the bounded buffer under a sustained outage).
//! - Corruption is recovered inside the writer; the loop only sees it as a
//!   successful (post-recovery) or failed flush.
//! - A fatal storage failure stops the run with an error.
//!
//! Shutdown (signal or bounds) drains the buffer with one final flush so a
//! clean stop loses nothing that the store would accept.

use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use sensogen_db::{BatchBuffer, CheckpointController, FlushError, StorageWriter};

use crate::config::SimulationBoundsConfig;
use crate::tick::{self, SimulationState, TickError};

/// Errors that can occur during the run loop.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick execution failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },

    /// A non-recoverable storage failure.
    #[error("storage error: {source}")]
    Storage {
        /// The underlying flush error.
        #[from]
        source: FlushError,
    },
}

/// Why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// A shutdown signal was received.
    ShutdownSignal,
    /// The configured reading budget was reached.
    MaxReadingsReached,
    /// The configured wall-clock budget was reached.
    MaxRuntimeReached,
}

/// Run boundaries derived from configuration. Zero means unlimited.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunBounds {
    /// Stop after this many readings (0 = unlimited).
    pub max_readings: u64,
    /// Stop after this many wall-clock seconds (0 = unlimited).
    pub max_runtime_seconds: u64,
}

impl From<SimulationBoundsConfig> for RunBounds {
    fn from(config: SimulationBoundsConfig) -> Self {
        Self {
            max_readings: config.max_readings,
            max_runtime_seconds: config.max_runtime_seconds,
        }
    }
}

impl RunBounds {
    fn readings_reached(&self, generated: u64) -> bool {
        self.max_readings > 0 && generated >= self.max_readings
    }

    fn runtime_reached(&self, started: Instant) -> bool {
        self.max_runtime_seconds > 0
            && started.elapsed().as_secs() >= self.max_runtime_seconds
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    /// Why the run ended.
    pub end_reason: EndReason,
    /// Readings generated across all streams.
    pub readings_generated: u64,
    /// Readings the anomaly engine mutated.
    pub anomalies_injected: u64,
    /// Rows committed to the store.
    pub rows_persisted: u64,
    /// Batches committed to the store.
    pub batches_persisted: u64,
    /// Readings dropped by the buffer's retention bound.
    pub readings_evicted: u64,
}

/// Run the generation loop until a bound is hit or shutdown is signalled.
///
/// `shutdown` is a watch channel flipped to `true` by the signal handler;
/// the loop notices it between ticks and during the interval sleep.
///
/// # Errors
///
/// Returns [`RunnerError`] on a tick failure or a storage failure the
/// writer could not absorb (fatal or failed recovery). Transient
/// exhaustion is absorbed here by requeueing.
pub async fn run_simulation(
    state: &mut SimulationState,
    buffer: &mut BatchBuffer,
    writer: &mut StorageWriter,
    checkpoint: &mut CheckpointController,
    bounds: RunBounds,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<RunStats, RunnerError> {
    let started = Instant::now();
    let interval = state.clock.interval();
    let mut readings_generated: u64 = 0;
    let mut anomalies_injected: u64 = 0;
    let mut evicted: u64 = 0;

    info!(
        streams = state.stream_count(),
        interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        max_readings = bounds.max_readings,
        max_runtime_seconds = bounds.max_runtime_seconds,
        "run loop starting"
    );

    let end_reason = loop {
        if *shutdown.borrow() {
            info!("shutdown signal received");
            break EndReason::ShutdownSignal;
        }
        if bounds.runtime_reached(started) {
            info!(
                elapsed_seconds = started.elapsed().as_secs(),
                "wall-clock budget reached"
            );
            break EndReason::MaxRuntimeReached;
        }

        // --- Generate ---
        let readings = tick::run_tick(state)?;
        for reading in readings {
            readings_generated = readings_generated.saturating_add(1);
            if reading.anomaly_flag {
                anomalies_injected = anomalies_injected.saturating_add(1);
            }
            evicted = evicted.saturating_add(buffer.append(reading));
        }

        // --- Flush on threshold ---
        if buffer.should_flush() {
            evicted = evicted.saturating_add(flush_once(buffer, writer).await?);
        }

        // --- Checkpoint on its own timer (same task: never overlaps) ---
        if checkpoint.due() {
            match writer.checkpoint().await {
                Ok(Some(stats)) => debug!(
                    log_pages = stats.log_pages,
                    checkpointed_pages = stats.checkpointed_pages,
                    busy = stats.busy,
                    "checkpoint complete"
                ),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "checkpoint failed; will retry next interval"),
            }
            checkpoint.mark_attempt();
        }

        if bounds.readings_reached(readings_generated) {
            info!(readings_generated, "reading budget reached");
            break EndReason::MaxReadingsReached;
        }

        // --- Sleep until the next tick, waking early on shutdown ---
        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => {}
        }
    };

    // Final drain: flush whatever the buffer still holds.
    if !buffer.is_empty() {
        evicted = evicted.saturating_add(flush_once(buffer, writer).await?);
        if !buffer.is_empty() {
            warn!(
                unflushed = buffer.len(),
                "shutting down with unflushed readings after final flush attempt"
            );
        }
    }

    let writer_stats = *writer.stats();
    Ok(RunStats {
        end_reason,
        readings_generated,
        anomalies_injected,
        rows_persisted: writer_stats.rows_persisted,
        batches_persisted: writer_stats.batches_persisted,
        readings_evicted: evicted,
    })
}

/// Drain the buffer and flush it, requeueing on transient exhaustion.
///
/// Returns the number of readings the requeue evicted (zero on success).
async fn flush_once(
    buffer: &mut BatchBuffer,
    writer: &mut StorageWriter,
) -> Result<u64, RunnerError> {
    let batch = buffer.drain();
    match writer.flush(&batch).await {
        Ok(()) => Ok(0),
        Err(FlushError::RetriesExhausted { attempts, source }) => {
            warn!(
                attempts,
                error = %source,
                rows = batch.len(),
                "flush failed on contention; requeueing batch"
            );
            Ok(buffer.requeue(batch))
        }
        Err(e) => {
            // Fatal or unrecoverable corruption: keep the rows queued for a
            // supervisor that might restart us, and surface the error.
            let _ = buffer.requeue(batch);
            Err(RunnerError::Storage { source: e })
        }
    }
}

/// Log the end-of-run summary.
pub fn log_run_end(stats: &RunStats) {
    info!(
        end_reason = ?stats.end_reason,
        readings_generated = stats.readings_generated,
        anomalies_injected = stats.anomalies_injected,
        rows_persisted = stats.rows_persisted,
        batches_persisted = stats.batches_persisted,
        readings_evicted = stats.readings_evicted,
        "run ended"
    );
}
