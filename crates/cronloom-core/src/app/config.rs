//! Runner configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::ConfigError;

/// Upper bound for either duration (about ten years).
pub const MAX_DURATION_MS: u64 = 10 * 365 * 24 * 60 * 60 * 1_000;

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Runner tuning knobs.
///
/// `lock_duration_ms` has to cover execution overrun between progress
/// reports, clock skew across processes and the poll interval; otherwise
/// a slow task can be claimed twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// How often the poll timer fires.
    pub poll_interval_ms: u64,

    /// Lease window a claim reserves a task for.
    pub lock_duration_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            lock_duration_ms: 5 * 60 * 1_000,
        }
    }
}

impl RunnerConfig {
    pub fn new(poll_interval: Duration, lock_duration: Duration) -> Self {
        Self {
            poll_interval_ms: millis(poll_interval),
            lock_duration_ms: millis(lock_duration),
        }
    }

    /// Parse a JSON document; missing fields fall back to defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.lock_duration_ms == 0 {
            return Err(ConfigError::ZeroLockDuration);
        }
        for (field, value_ms) in [
            ("poll_interval_ms", self.poll_interval_ms),
            ("lock_duration_ms", self.lock_duration_ms),
        ] {
            if value_ms > MAX_DURATION_MS {
                return Err(ConfigError::DurationTooLong {
                    field,
                    value_ms,
                    max_ms: MAX_DURATION_MS,
                });
            }
        }
        if self.lock_duration_ms <= self.poll_interval_ms {
            return Err(ConfigError::LockNotLongerThanPoll {
                lock_duration_ms: self.lock_duration_ms,
                poll_interval_ms: self.poll_interval_ms,
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Saturates instead of wrapping when the config was never validated.
    pub fn lock_duration(&self) -> chrono::Duration {
        i64::try_from(self.lock_duration_ms)
            .ok()
            .and_then(chrono::Duration::try_milliseconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Minimum gap between two lease renewals of the same task.
    pub fn progress_write_delay(&self) -> chrono::Duration {
        self.lock_duration() / 5
    }
}
