//! Rate limit policy.

use std::time::Duration;

use crate::config::PolicyConfig;
use crate::error::{FloodgateError, Result};

/// A process-wide rate limit policy: at most `limit` admitted requests
/// per identity within any trailing `window`.
///
/// Fixed at startup and passed explicitly to the limiter, never read
/// from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    limit: u32,
    window: Duration,
}

impl Policy {
    /// Create a policy, rejecting degenerate values.
    pub fn new(limit: u32, window: Duration) -> Result<Self> {
        if limit == 0 {
            return Err(FloodgateError::Config(
                "policy limit must be greater than zero".into(),
            ));
        }
        if window.is_zero() {
            return Err(FloodgateError::Config(
                "policy window must be greater than zero".into(),
            ));
        }
        Ok(Self { limit, window })
    }

    /// Build a policy from validated configuration.
    pub fn from_config(config: &PolicyConfig) -> Result<Self> {
        Self::new(config.limit, Duration::from_secs(config.window_seconds))
    }

    /// Maximum admitted requests per window.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Window length in whole seconds, as reported to callers.
    pub fn window_seconds(&self) -> u64 {
        self.window.as_secs()
    }

    /// Window length in microseconds, the resolution of stored scores.
    pub fn window_micros(&self) -> i64 {
        self.window.as_micros() as i64
    }
}
