//! The reading clock: counter-derived timestamps for one run.
//!
//! The reading sequence number is the source of truth; the timestamp of
//! reading `n` is always `start + n × interval`, never re-sampled from the
//! wall clock. That keeps the time axis perfectly regular (what downstream
//! time-series tooling expects of synthetic data) and makes every
//! derivation reproducible.
//!
//! All arithmetic is checked: the clock refuses to silently wrap.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Invalid clock configuration.
    #[error("invalid clock configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },

    /// The sequence counter or a timestamp derivation would overflow.
    #[error("reading clock overflow at sequence {seq}")]
    Overflow {
        /// The sequence number that could not be represented.
        seq: u64,
    },
}

/// Clock for one run: a start instant, a fixed interval, and a counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingClock {
    start: DateTime<Utc>,
    interval_ms: i64,
    seq: u64,
}

impl ReadingClock {
    /// Create a clock starting at `start` with the given reading interval.
    ///
    /// The interval is stored with millisecond resolution (rounded), and
    /// must round to at least one millisecond.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] for a non-positive or
    /// non-finite interval.
    pub fn new(start: DateTime<Utc>, interval_seconds: f64) -> Result<Self, ClockError> {
        let interval_ms = interval_to_millis(interval_seconds).ok_or_else(|| {
            ClockError::InvalidConfig {
                reason: format!(
                    "reading interval must round to at least 1 ms (got {interval_seconds} s)"
                ),
            }
        })?;
        Ok(Self {
            start,
            interval_ms,
            seq: 0,
        })
    }

    /// The timestamp of the current (not yet generated) reading.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Overflow`] if `start + seq × interval` cannot
    /// be represented.
    pub fn timestamp(&self) -> Result<DateTime<Utc>, ClockError> {
        let seq_i64 = i64::try_from(self.seq).map_err(|_err| ClockError::Overflow {
            seq: self.seq,
        })?;
        let offset_ms = self
            .interval_ms
            .checked_mul(seq_i64)
            .ok_or(ClockError::Overflow { seq: self.seq })?;
        let offset =
            chrono::Duration::try_milliseconds(offset_ms).ok_or(ClockError::Overflow {
                seq: self.seq,
            })?;
        self.start
            .checked_add_signed(offset)
            .ok_or(ClockError::Overflow { seq: self.seq })
    }

    /// Advance to the next reading. Returns the new sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Overflow`] if the counter would wrap.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.seq = self
            .seq
            .checked_add(1)
            .ok_or(ClockError::Overflow { seq: self.seq })?;
        Ok(self.seq)
    }

    /// The current sequence number (readings generated so far).
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// The reading interval as a standard [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(u64::try_from(self.interval_ms).unwrap_or(0))
    }
}

/// Convert a positive interval in seconds to whole milliseconds.
///
/// Returns `None` for non-finite, non-positive, or sub-millisecond values,
/// and for values beyond `i64` milliseconds. The cast is guarded by the
/// range check above it.
#[allow(clippy::cast_possible_truncation)]
fn interval_to_millis(seconds: f64) -> Option<i64> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    let ms = (seconds * 1000.0).round();
    if ms < 1.0 || ms > 9_007_199_254_740_992.0 {
        return None;
    }
    Some(ms as i64)
}
