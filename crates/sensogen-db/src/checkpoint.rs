//! Checkpoint scheduling.
//!
//! The controller decides WHEN to checkpoint; the store knows HOW (see
//! [`crate::sqlite::SqliteStore::checkpoint`]). Its interval is decoupled
//! from the flush cadence, but both run on the single writer task, so a
//! checkpoint can never overlap a flush in progress.
//!
//! A failed checkpoint is recorded as an attempt all the same: the
//! controller goes quiet until the next interval rather than hammering the
//! store every tick.

use std::time::{Duration, Instant};

use crate::sqlite::JournalMode;

/// Interval tracker for WAL checkpoints.
#[derive(Debug, Clone)]
pub struct CheckpointController {
    interval: Duration,
    mode: JournalMode,
    last_attempt: Instant,
}

impl CheckpointController {
    /// Create a controller. The clock starts at construction time.
    pub fn new(interval: Duration, mode: JournalMode) -> Self {
        Self {
            interval,
            mode,
            last_attempt: Instant::now(),
        }
    }

    /// Whether a checkpoint is due right now.
    pub fn due(&self) -> bool {
        self.due_at(Instant::now())
    }

    /// Whether a checkpoint is due at `now`. Always false under the
    /// rollback journal, which has nothing to checkpoint.
    pub fn due_at(&self, now: Instant) -> bool {
        self.mode.is_wal()
            && now.saturating_duration_since(self.last_attempt) >= self.interval
    }

    /// Record a checkpoint attempt (successful or not) at the current time.
    pub fn mark_attempt(&mut self) {
        self.mark_attempt_at(Instant::now());
    }

    /// [`Self::mark_attempt`] with an explicit clock, for tests.
    pub const fn mark_attempt_at(&mut self, now: Instant) {
        self.last_attempt = now;
    }

    /// The configured interval.
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_due_before_interval() {
        let controller = CheckpointController::new(Duration::from_secs(300), JournalMode::Wal);
        let start = controller.last_attempt;
        assert!(!controller.due_at(start + Duration::from_secs(299)));
        assert!(controller.due_at(start + Duration::from_secs(300)));
    }

    #[test]
    fn rollback_mode_is_never_due() {
        let controller =
            CheckpointController::new(Duration::from_secs(1), JournalMode::Rollback);
        let start = controller.last_attempt;
        assert!(!controller.due_at(start + Duration::from_secs(3600)));
    }

    #[test]
    fn marking_an_attempt_restarts_the_interval() {
        let mut controller = CheckpointController::new(Duration::from_secs(300), JournalMode::Wal);
        let start = controller.last_attempt;
        let later = start + Duration::from_secs(300);
        assert!(controller.due_at(later));
        // A failed attempt still counts: quiet until the next interval.
        controller.mark_attempt_at(later);
        assert!(!controller.due_at(later + Duration::from_secs(299)));
        assert!(controller.due_at(later + Duration::from_secs(300)));
    }
}
