//! In-process activity store.
//!
//! Same semantics as the Redis store, including whole-record expiry,
//! but scoped to one process. Used by the test suite and suitable for
//! single-instance local runs where no shared quota is needed.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::Result;

use super::store::{ActivityStore, Stamp, WindowOutcome};

struct Record {
    /// (score, member) pairs, kept sorted by score then member
    entries: Vec<(i64, String)>,
    /// When the whole record lapses, refreshed on each admission
    expires_at: Instant,
}

/// Mutex-guarded in-memory store.
///
/// One lock covers the whole table; the prune/count/insert critical
/// section is exactly the lock hold, which gives the same per-key
/// atomicity the Redis script does.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live activity records. Test helper.
    pub fn record_count(&self) -> usize {
        let now = Instant::now();
        self.records
            .lock()
            .values()
            .filter(|r| r.expires_at > now)
            .count()
    }
}

fn prune(record: &mut Record, cutoff_micros: i64) {
    record.entries.retain(|(score, _)| *score >= cutoff_micros);
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn check_and_record(
        &self,
        key: &str,
        cutoff_micros: i64,
        stamp: Stamp,
        limit: u32,
        ttl: Duration,
    ) -> Result<WindowOutcome> {
        let mut records = self.records.lock();
        let now = Instant::now();

        let record = records.entry(key.to_string()).or_insert_with(|| Record {
            entries: Vec::new(),
            expires_at: now + ttl,
        });
        if record.expires_at <= now {
            record.entries.clear();
        }

        prune(record, cutoff_micros);
        let count = record.entries.len() as u64;

        if count < u64::from(limit) {
            let entry = (stamp.score_micros, stamp.member());
            let pos = record.entries.partition_point(|e| *e <= entry);
            record.entries.insert(pos, entry);
            record.expires_at = now + ttl;
            Ok(WindowOutcome {
                admitted: true,
                count,
            })
        } else {
            Ok(WindowOutcome {
                admitted: false,
                count,
            })
        }
    }

    async fn prune_and_count(&self, key: &str, cutoff_micros: i64) -> Result<u64> {
        let mut records = self.records.lock();

        let Some(record) = records.get_mut(key) else {
            return Ok(0);
        };
        if record.expires_at <= Instant::now() {
            records.remove(key);
            return Ok(0);
        }

        prune(record, cutoff_micros);
        Ok(record.entries.len() as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
