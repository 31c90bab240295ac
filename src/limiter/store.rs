//! Activity store trait for abstracting the shared store backend.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// A single admitted-request entry in an activity record.
///
/// The score orders members by time; the member string carries a
/// process-wide sequence number so two requests landing on the same
/// microsecond never collapse into one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    /// Epoch microseconds of the request, used as the sorted-set score
    pub score_micros: i64,
    /// Tie-breaking sequence number
    pub seq: u64,
}

impl Stamp {
    pub fn new(score_micros: i64, seq: u64) -> Self {
        Self { score_micros, seq }
    }

    /// The member string stored alongside the score.
    pub fn member(&self) -> String {
        format!("{}-{}", self.score_micros, self.seq)
    }
}

/// Outcome of an atomic check-and-record operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowOutcome {
    /// Whether the stamp was recorded (request admitted)
    pub admitted: bool,
    /// Entries in the window after pruning, before any insert
    pub count: u64,
}

/// Trait for activity record storage backends.
///
/// This abstracts over the Redis-backed `RedisStore` and the in-process
/// `MemoryStore` so the limiter and the HTTP layer can work with either.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Atomically prune entries with a score below `cutoff_micros`,
    /// count the survivors, and if the count is below `limit` record
    /// the stamp and reset the record's expiry to `ttl`.
    ///
    /// The prune, count, and insert must be a single atomic unit per
    /// key: two concurrent calls for the same key must never both
    /// observe the last free slot.
    async fn check_and_record(
        &self,
        key: &str,
        cutoff_micros: i64,
        stamp: Stamp,
        limit: u32,
        ttl: Duration,
    ) -> Result<WindowOutcome>;

    /// Prune entries with a score below `cutoff_micros` and return the
    /// surviving count. Never inserts and never extends the record's
    /// expiry.
    async fn prune_and_count(&self, key: &str, cutoff_micros: i64) -> Result<u64>;

    /// Probe store liveness.
    async fn ping(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_member_format() {
        let stamp = Stamp::new(1_700_000_000_000_000, 42);
        assert_eq!(stamp.member(), "1700000000000000-42");
    }

    #[test]
    fn test_stamps_with_equal_scores_are_distinct() {
        let a = Stamp::new(1_700_000_000_000_000, 1);
        let b = Stamp::new(1_700_000_000_000_000, 2);
        assert_ne!(a.member(), b.member());
    }
}
