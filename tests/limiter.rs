//! End-to-end limiter behavior over the in-process store.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use floodgate::limiter::{ManualClock, MemoryStore, Policy, RateLimiter};

fn limiter(limit: u32, window_secs: u64) -> (Arc<RateLimiter>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000_000));
    let policy = Policy::new(limit, Duration::from_secs(window_secs)).unwrap();
    let limiter = Arc::new(RateLimiter::with_time_source(
        Arc::new(MemoryStore::new()),
        policy,
        clock.clone(),
    ));
    (limiter, clock)
}

#[tokio::test]
async fn remaining_decreases_by_one_per_admission() {
    let (limiter, _clock) = limiter(5, 60);

    for expected in (0..5).rev() {
        let decision = limiter.check_and_consume("id").await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, expected);
    }
}

#[tokio::test]
async fn over_limit_call_is_denied_without_mutation() {
    let (limiter, _clock) = limiter(3, 60);

    for _ in 0..3 {
        assert!(limiter.check_and_consume("id").await.unwrap().allowed);
    }

    let denied = limiter.check_and_consume("id").await.unwrap();
    assert!(!denied.allowed);
    assert_eq!(denied.remaining, 0);

    // The denial left the record untouched: the observed count is stable.
    let stats = limiter.stats("id").await.unwrap();
    assert_eq!(stats.requests_made, 3);

    let denied_again = limiter.check_and_consume("id").await.unwrap();
    assert!(!denied_again.allowed);
    assert_eq!(limiter.stats("id").await.unwrap().requests_made, 3);
}

#[tokio::test]
async fn window_expiry_restores_quota() {
    let (limiter, clock) = limiter(2, 60);

    assert!(limiter.check_and_consume("id").await.unwrap().allowed);
    assert!(limiter.check_and_consume("id").await.unwrap().allowed);
    assert!(!limiter.check_and_consume("id").await.unwrap().allowed);

    // Just inside the window the identity stays exhausted.
    clock.advance_secs(59);
    assert!(!limiter.check_and_consume("id").await.unwrap().allowed);

    // Past the oldest timestamp's window a slot frees up.
    clock.advance_secs(2);
    assert!(limiter.check_and_consume("id").await.unwrap().allowed);
}

#[tokio::test]
async fn fresh_identity_reports_full_quota() {
    let (limiter, _clock) = limiter(7, 60);

    let stats = limiter.stats("never-seen").await.unwrap();
    assert_eq!(stats.requests_made, 0);
    assert_eq!(stats.requests_remaining, 7);
}

#[tokio::test]
async fn identities_do_not_interact() {
    let (limiter, _clock) = limiter(2, 60);

    assert!(limiter.check_and_consume("a").await.unwrap().allowed);
    assert!(limiter.check_and_consume("a").await.unwrap().allowed);
    assert!(!limiter.check_and_consume("a").await.unwrap().allowed);

    let decision = limiter.check_and_consume("b").await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_calls_admit_exactly_the_limit() {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000_000));
    let policy = Policy::new(5, Duration::from_secs(60)).unwrap();
    let limiter = Arc::new(RateLimiter::with_time_source(
        Arc::new(MemoryStore::new()),
        policy,
        clock,
    ));

    let tasks: Vec<_> = (0..40)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.check_and_consume("hot").await.unwrap() })
        })
        .collect();

    let admitted = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .filter(|d| d.allowed)
        .count();

    assert_eq!(admitted, 5);
    assert_eq!(limiter.stats("hot").await.unwrap().requests_made, 5);
}

#[tokio::test]
async fn documented_scenario_limit_three_window_sixty() {
    let (limiter, _clock) = limiter(3, 60);

    let mut remaining = Vec::new();
    for _ in 0..3 {
        let decision = limiter.check_and_consume("u1").await.unwrap();
        assert!(decision.allowed);
        remaining.push(decision.remaining);
    }
    assert_eq!(remaining, vec![2, 1, 0]);

    let fourth = limiter.check_and_consume("u1").await.unwrap();
    assert!(!fourth.allowed);
    assert_eq!(fourth.remaining, 0);

    let stats = limiter.stats("u1").await.unwrap();
    assert_eq!(stats.identity, "u1");
    assert_eq!(stats.limit, 3);
    assert_eq!(stats.window_seconds, 60);
    assert_eq!(stats.requests_made, 3);
    assert_eq!(stats.requests_remaining, 0);
}
