//! Ordered, bounded buffer of readings awaiting persistence.
//!
//! The buffer is the hand-off point between generation and storage: the
//! tick loop appends finalized readings, and when either the size or the
//! time threshold is crossed the whole buffer is drained into one
//! transactional flush. Readings are never reordered.
//!
//! A flush that fails is requeued at the front, keeping order ahead of any
//! newer appends. Retention is bounded: under sustained storage failure
//! the buffer holds at most `max_buffered` readings and evicts the oldest
//! first, counting what it dropped (bound memory, keep the freshest
//! window).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use sensogen_types::Reading;
use tracing::warn;

/// Ordered buffer with count and age flush thresholds.
#[derive(Debug)]
pub struct BatchBuffer {
    buf: VecDeque<Reading>,
    batch_size: usize,
    batch_timeout: Duration,
    max_buffered: usize,
    last_flush: Instant,
    evicted: u64,
}

impl BatchBuffer {
    /// Create a buffer.
    ///
    /// `batch_size` and `batch_timeout` are the flush thresholds;
    /// `max_buffered` bounds retention under sustained flush failure.
    /// Threshold validation happens at configuration load, before this is
    /// constructed.
    pub fn new(batch_size: usize, batch_timeout: Duration, max_buffered: usize) -> Self {
        Self {
            buf: VecDeque::new(),
            batch_size,
            batch_timeout,
            max_buffered,
            last_flush: Instant::now(),
            evicted: 0,
        }
    }

    /// Append a reading at the back. Returns the number of old readings
    /// evicted to stay within the retention bound (normally zero).
    pub fn append(&mut self, reading: Reading) -> u64 {
        self.buf.push_back(reading);
        self.enforce_bound()
    }

    /// Reinsert a failed batch at the FRONT, preserving its order ahead of
    /// readings appended since the drain. Returns the number of evictions
    /// the retention bound forced.
    pub fn requeue(&mut self, batch: Vec<Reading>) -> u64 {
        for reading in batch.into_iter().rev() {
            self.buf.push_front(reading);
        }
        self.enforce_bound()
    }

    /// Whether a flush is due right now.
    pub fn should_flush(&self) -> bool {
        self.should_flush_at(Instant::now())
    }

    /// Whether a flush is due at `now`: buffer non-empty AND (count
    /// threshold reached OR age threshold reached), whichever comes first.
    pub fn should_flush_at(&self, now: Instant) -> bool {
        if self.buf.is_empty() {
            return false;
        }
        self.buf.len() >= self.batch_size
            || now.saturating_duration_since(self.last_flush) >= self.batch_timeout
    }

    /// Remove and return all buffered readings in order, resetting the age
    /// clock.
    pub fn drain(&mut self) -> Vec<Reading> {
        self.drain_at(Instant::now())
    }

    /// [`Self::drain`] with an explicit clock, for tests.
    pub fn drain_at(&mut self, now: Instant) -> Vec<Reading> {
        self.last_flush = now;
        self.buf.drain(..).collect()
    }

    /// Number of buffered readings.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Total readings evicted by the retention bound over this buffer's
    /// lifetime.
    pub const fn evicted_total(&self) -> u64 {
        self.evicted
    }

    /// Drop oldest readings until the retention bound holds.
    fn enforce_bound(&mut self) -> u64 {
        let mut dropped: u64 = 0;
        while self.buf.len() > self.max_buffered {
            if self.buf.pop_front().is_none() {
                break;
            }
            dropped = dropped.saturating_add(1);
        }
        if dropped > 0 {
            self.evicted = self.evicted.saturating_add(dropped);
            warn!(
                dropped,
                buffered = self.buf.len(),
                "retention bound exceeded; evicted oldest unflushed readings"
            );
        }
        dropped
    }
}
