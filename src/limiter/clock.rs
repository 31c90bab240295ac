//! Time sources for the limiter.
//!
//! Scores in the activity record are epoch microseconds. Microseconds
//! are exactly representable in an f64 sorted-set score, unlike epoch
//! nanoseconds, and still fine-grained enough that the member sequence
//! number (see `Stamp`) only has to break ties within a microsecond.

use std::sync::atomic::{AtomicI64, Ordering};

/// Source of the current time in epoch microseconds.
pub trait TimeSource: Send + Sync {
    /// Microseconds since the Unix epoch.
    fn now_micros(&self) -> i64;
}

/// Wall-clock time source used in production.
#[derive(Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now_micros(&self) -> i64 {
        chrono::Utc::now().timestamp_micros()
    }
}

/// A manually advanced clock for tests.
#[derive(Debug)]
pub struct ManualClock {
    micros: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at the given epoch microseconds.
    pub fn new(micros: i64) -> Self {
        Self {
            micros: AtomicI64::new(micros),
        }
    }

    /// Advance the clock by the given number of microseconds.
    pub fn advance_micros(&self, delta: i64) {
        self.micros.fetch_add(delta, Ordering::SeqCst);
    }

    /// Advance the clock by the given number of seconds.
    pub fn advance_secs(&self, secs: i64) {
        self.advance_micros(secs * 1_000_000);
    }
}

impl TimeSource for ManualClock {
    fn now_micros(&self) -> i64 {
        self.micros.load(Ordering::SeqCst)
    }
}
