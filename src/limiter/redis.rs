//! Redis-backed activity store.
//!
//! Each identity's activity record is a sorted set: score and member
//! both derive from the admission timestamp. The check path runs as a
//! single server-side Lua script, which Redis executes atomically, so
//! prune, count, insert, and expiry refresh are one indivisible unit
//! even under concurrent calls from many service instances.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::config::RedisConfig;
use crate::error::{FloodgateError, Result};

use super::store::{ActivityStore, Stamp, WindowOutcome};

/// Prune entries below the cutoff, count survivors, and admit only if
/// the count is under the limit. Returns {admitted, count}.
const CHECK_AND_RECORD_SCRIPT: &str = r#"
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', '(' .. ARGV[1])
local count = redis.call('ZCARD', KEYS[1])
if count < tonumber(ARGV[2]) then
    redis.call('ZADD', KEYS[1], ARGV[3], ARGV[4])
    redis.call('EXPIRE', KEYS[1], ARGV[5])
    return {1, count}
end
return {0, count}
"#;

/// Activity store backed by a shared Redis instance.
pub struct RedisStore {
    client: redis::Client,
    check_script: redis::Script,
    op_timeout: Duration,
}

impl RedisStore {
    /// Create a store from a connection URL.
    ///
    /// The URL is validated here; the first network round-trip happens
    /// on the first operation.
    pub fn new(url: &str, op_timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| FloodgateError::Config(format!("Invalid Redis URL: {}", e)))?;

        Ok(Self {
            client,
            check_script: redis::Script::new(CHECK_AND_RECORD_SCRIPT),
            op_timeout,
        })
    }

    /// Create a store from validated configuration.
    pub fn from_config(config: &RedisConfig) -> Result<Self> {
        Self::new(&config.url, config.op_timeout())
    }

    /// Run a store operation under the bounded timeout. A call that
    /// does not return in time fails with `StoreUnavailable` rather
    /// than hanging the request.
    async fn bounded<F, T>(&self, op: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, redis::RedisError>>,
    {
        match tokio::time::timeout(self.op_timeout, op).await {
            Ok(result) => {
                result.map_err(|e| FloodgateError::StoreUnavailable(e.to_string()))
            }
            Err(_) => Err(FloodgateError::StoreUnavailable(format!(
                "operation timed out after {:?}",
                self.op_timeout
            ))),
        }
    }

    async fn connection(&self) -> std::result::Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }
}

#[async_trait]
impl ActivityStore for RedisStore {
    async fn check_and_record(
        &self,
        key: &str,
        cutoff_micros: i64,
        stamp: Stamp,
        limit: u32,
        ttl: Duration,
    ) -> Result<WindowOutcome> {
        let (admitted, count): (i64, i64) = self
            .bounded(async {
                let mut conn = self.connection().await?;
                self.check_script
                    .key(key)
                    .arg(cutoff_micros)
                    .arg(limit)
                    .arg(stamp.score_micros)
                    .arg(stamp.member())
                    .arg(ttl.as_secs().max(1))
                    .invoke_async(&mut conn)
                    .await
            })
            .await?;

        debug!(
            key = %key,
            admitted = admitted == 1,
            count = count,
            "Evaluated activity record"
        );

        Ok(WindowOutcome {
            admitted: admitted == 1,
            count: count as u64,
        })
    }

    async fn prune_and_count(&self, key: &str, cutoff_micros: i64) -> Result<u64> {
        let (_removed, count): (i64, i64) = self
            .bounded(async {
                let mut conn = self.connection().await?;
                redis::pipe()
                    .atomic()
                    .cmd("ZREMRANGEBYSCORE")
                    .arg(key)
                    .arg("-inf")
                    .arg(format!("({}", cutoff_micros))
                    .cmd("ZCARD")
                    .arg(key)
                    .query_async(&mut conn)
                    .await
            })
            .await?;

        Ok(count as u64)
    }

    async fn ping(&self) -> Result<()> {
        self.bounded(async {
            let mut conn = self.connection().await?;
            redis::cmd("PING").query_async::<()>(&mut conn).await
        })
        .await
    }
}
