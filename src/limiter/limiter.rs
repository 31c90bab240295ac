//! Core sliding-window-log rate limiter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{FloodgateError, Result};

use super::clock::{SystemClock, TimeSource};
use super::policy::Policy;
use super::store::{ActivityStore, Stamp};

/// Prefix for activity record keys in the shared store.
const KEY_PREFIX: &str = "rate_limit";

/// The admit/deny decision for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Whether the request is admitted
    pub allowed: bool,
    /// Requests left in the window after this decision
    pub remaining: u32,
}

/// Point-in-time quota state for one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityStats {
    /// The identity being reported on
    pub identity: String,
    /// Maximum admitted requests per window
    pub limit: u32,
    /// Window length in seconds
    #[serde(rename = "window")]
    pub window_seconds: u64,
    /// Requests currently counted in the window
    pub requests_made: u64,
    /// Requests left before the limit is reached
    pub requests_remaining: u32,
}

/// The core rate limiter.
///
/// Holds no per-identity state of its own; every decision is made
/// against the activity record in the shared store, so any number of
/// instances backed by the same store enforce one combined quota.
pub struct RateLimiter {
    store: Arc<dyn ActivityStore>,
    policy: Policy,
    clock: Arc<dyn TimeSource>,
    /// Tie-breaker for stamps landing on the same microsecond
    seq: AtomicU64,
}

impl RateLimiter {
    /// Create a rate limiter over the given store and policy.
    pub fn new(store: Arc<dyn ActivityStore>, policy: Policy) -> Self {
        Self::with_time_source(store, policy, Arc::new(SystemClock))
    }

    /// Create a rate limiter with an explicit time source.
    pub fn with_time_source(
        store: Arc<dyn ActivityStore>,
        policy: Policy,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            store,
            policy,
            clock,
            seq: AtomicU64::new(0),
        }
    }

    /// The policy this limiter enforces.
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Decide whether a request for `identity` may proceed, consuming
    /// one slot from its window if so.
    ///
    /// Admissions report `remaining` relative to the count after the
    /// insert, so a request that fills the last slot reports 0. Denials
    /// never mutate the record beyond the prune.
    pub async fn check_and_consume(&self, identity: &str) -> Result<Decision> {
        if identity.is_empty() {
            return Err(FloodgateError::InvalidIdentity);
        }

        let key = self.record_key(identity);
        let now = self.clock.now_micros();
        let cutoff = now - self.policy.window_micros();
        let stamp = Stamp::new(now, self.seq.fetch_add(1, Ordering::Relaxed));

        trace!(identity = %identity, now = now, "Checking rate limit");

        let outcome = self
            .store
            .check_and_record(&key, cutoff, stamp, self.policy.limit(), self.policy.window())
            .await?;

        let decision = if outcome.admitted {
            Decision {
                allowed: true,
                remaining: self
                    .policy
                    .limit()
                    .saturating_sub(outcome.count as u32)
                    .saturating_sub(1),
            }
        } else {
            debug!(identity = %identity, count = outcome.count, "Rate limit exceeded");
            Decision {
                allowed: false,
                remaining: 0,
            }
        };

        Ok(decision)
    }

    /// Report current quota state for `identity`.
    ///
    /// Prunes expired entries as a side effect but never inserts, so
    /// repeated calls report a stable count while time stands still.
    pub async fn stats(&self, identity: &str) -> Result<IdentityStats> {
        if identity.is_empty() {
            return Err(FloodgateError::InvalidIdentity);
        }

        let key = self.record_key(identity);
        let cutoff = self.clock.now_micros() - self.policy.window_micros();

        let count = self.store.prune_and_count(&key, cutoff).await?;

        Ok(IdentityStats {
            identity: identity.to_string(),
            limit: self.policy.limit(),
            window_seconds: self.policy.window_seconds(),
            requests_made: count,
            requests_remaining: self.policy.limit().saturating_sub(count as u32),
        })
    }

    /// Probe the shared store.
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }

    fn record_key(&self, identity: &str) -> String {
        format!("{}:{}", KEY_PREFIX, identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::{ManualClock, MemoryStore};
    use std::time::Duration;

    fn limiter_with_clock(limit: u32, window_secs: u64) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000_000));
        let policy = Policy::new(limit, Duration::from_secs(window_secs)).unwrap();
        let limiter =
            RateLimiter::with_time_source(Arc::new(MemoryStore::new()), policy, clock.clone());
        (limiter, clock)
    }

    #[tokio::test]
    async fn test_empty_identity_rejected_before_store_access() {
        let (limiter, _clock) = limiter_with_clock(3, 60);
        assert!(matches!(
            limiter.check_and_consume("").await,
            Err(FloodgateError::InvalidIdentity)
        ));
        assert!(matches!(
            limiter.stats("").await,
            Err(FloodgateError::InvalidIdentity)
        ));
    }

    #[tokio::test]
    async fn test_remaining_counts_down_from_limit_minus_one() {
        let (limiter, _clock) = limiter_with_clock(3, 60);

        for expected in [2, 1, 0] {
            let decision = limiter.check_and_consume("u1").await.unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected);
        }
    }

    #[tokio::test]
    async fn test_denial_reports_zero_remaining() {
        let (limiter, _clock) = limiter_with_clock(2, 60);

        limiter.check_and_consume("u1").await.unwrap();
        limiter.check_and_consume("u1").await.unwrap();

        let decision = limiter.check_and_consume("u1").await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test]
    async fn test_identities_are_case_sensitive() {
        let (limiter, _clock) = limiter_with_clock(1, 60);

        assert!(limiter.check_and_consume("User").await.unwrap().allowed);
        assert!(limiter.check_and_consume("user").await.unwrap().allowed);
        assert!(!limiter.check_and_consume("User").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_stats_reflects_admissions() {
        let (limiter, _clock) = limiter_with_clock(3, 60);

        let stats = limiter.stats("u1").await.unwrap();
        assert_eq!(stats.requests_made, 0);
        assert_eq!(stats.requests_remaining, 3);

        limiter.check_and_consume("u1").await.unwrap();
        limiter.check_and_consume("u1").await.unwrap();

        let stats = limiter.stats("u1").await.unwrap();
        assert_eq!(stats.identity, "u1");
        assert_eq!(stats.limit, 3);
        assert_eq!(stats.window_seconds, 60);
        assert_eq!(stats.requests_made, 2);
        assert_eq!(stats.requests_remaining, 1);
    }

    #[tokio::test]
    async fn test_stats_is_observational() {
        let (limiter, _clock) = limiter_with_clock(3, 60);

        limiter.check_and_consume("u1").await.unwrap();
        for _ in 0..5 {
            let stats = limiter.stats("u1").await.unwrap();
            assert_eq!(stats.requests_made, 1);
        }
    }

    #[tokio::test]
    async fn test_expired_entries_free_the_window() {
        let (limiter, clock) = limiter_with_clock(2, 60);

        limiter.check_and_consume("u1").await.unwrap();
        limiter.check_and_consume("u1").await.unwrap();
        assert!(!limiter.check_and_consume("u1").await.unwrap().allowed);

        clock.advance_secs(61);
        let decision = limiter.check_and_consume("u1").await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
    }

    #[tokio::test]
    async fn test_stats_serializes_to_camel_case() {
        let stats = IdentityStats {
            identity: "u1".to_string(),
            limit: 3,
            window_seconds: 60,
            requests_made: 2,
            requests_remaining: 1,
        };

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["identity"], "u1");
        assert_eq!(json["limit"], 3);
        assert_eq!(json["window"], 60);
        assert_eq!(json["requestsMade"], 2);
        assert_eq!(json["requestsRemaining"], 1);
    }
}
