//! Configuration management for Floodgate.
//!
//! Settings are sourced from the environment (`FLOODGATE__` prefix, `__`
//! separator, e.g. `FLOODGATE__REDIS__URL`) layered over an optional
//! config file, with serde defaults for everything else.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{FloodgateError, Result};

/// Main configuration for the Floodgate service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloodgateConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Shared store (Redis) configuration
    #[serde(default)]
    pub redis: RedisConfig,

    /// Rate limit policy configuration
    #[serde(default)]
    pub policy: PolicyConfig,
}

impl Default for FloodgateConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            redis: RedisConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    "0.0.0.0:8000".parse().unwrap()
}

/// Shared store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Upper bound on any single store round-trip, in milliseconds.
    /// A call that exceeds this fails with `StoreUnavailable`.
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            op_timeout_ms: default_op_timeout_ms(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://localhost:6379/0".to_string()
}

fn default_op_timeout_ms() -> u64 {
    2000
}

/// Rate limit policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Maximum admitted requests per window
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Window length in seconds
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            window_seconds: default_window_seconds(),
        }
    }
}

fn default_limit() -> u32 {
    100
}

fn default_window_seconds() -> u64 {
    60
}

impl RedisConfig {
    /// The per-operation timeout as a `Duration`.
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

impl FloodgateConfig {
    /// Load configuration from the environment, layered over an optional
    /// config file.
    pub fn load(file: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("FLOODGATE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| FloodgateError::Config(e.to_string()))?;

        let config: FloodgateConfig = settings
            .try_deserialize()
            .map_err(|e| FloodgateError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the limiter cannot operate under.
    pub fn validate(&self) -> Result<()> {
        if self.policy.limit == 0 {
            return Err(FloodgateError::Config(
                "policy.limit must be greater than zero".into(),
            ));
        }
        if self.policy.window_seconds == 0 {
            return Err(FloodgateError::Config(
                "policy.window_seconds must be greater than zero".into(),
            ));
        }
        if self.redis.url.is_empty() {
            return Err(FloodgateError::Config("redis.url must not be empty".into()));
        }
        if self.redis.op_timeout_ms == 0 {
            return Err(FloodgateError::Config(
                "redis.op_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
