//! RunnerBuilder - ランナーの構築とワイヤリング
//!
//! 設定は `build()` 時に検証します（Fail-fast）。

use std::sync::Arc;
use std::time::Duration;

use super::config::{self, RunnerConfig};
use super::runner::Runner;
use crate::domain::ConfigError;
use crate::ports::{Clock, EventSink, NoopEventSink, SystemClock, TaskStore};

/// Builds a [`Runner`].
///
/// # 使用例
/// ```ignore
/// let runner = Runner::builder(Arc::new(store))
///     .poll_interval(Duration::from_millis(500))
///     .lock_duration(Duration::from_secs(60))
///     .event_sink(Arc::new(TracingEventSink))
///     .build()?;
/// ```
pub struct RunnerBuilder {
    store: Arc<dyn TaskStore>,
    config: RunnerConfig,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
}

impl RunnerBuilder {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            store,
            config: RunnerConfig::default(),
            clock: Arc::new(SystemClock),
            events: Arc::new(NoopEventSink),
        }
    }

    /// Replace the whole config (e.g. one loaded from JSON).
    pub fn config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.config.poll_interval_ms = config::millis(poll_interval);
        self
    }

    pub fn lock_duration(mut self, lock_duration: Duration) -> Self {
        self.config.lock_duration_ms = config::millis(lock_duration);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn build(self) -> Result<Runner, ConfigError> {
        self.config.validate()?;
        Ok(Runner::from_parts(
            self.store,
            self.clock,
            self.events,
            self.config,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryTaskStore;

    #[test]
    fn build_uses_defaults() {
        let runner = RunnerBuilder::new(Arc::new(InMemoryTaskStore::new()))
            .build()
            .unwrap();
        assert_eq!(runner.config(), &RunnerConfig::default());
        assert!(!runner.is_triggering());
    }

    #[test]
    fn build_rejects_lock_shorter_than_poll() {
        let result = RunnerBuilder::new(Arc::new(InMemoryTaskStore::new()))
            .poll_interval(Duration::from_secs(10))
            .lock_duration(Duration::from_secs(5))
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::LockNotLongerThanPoll {
                lock_duration_ms: 5_000,
                poll_interval_ms: 10_000
            })
        ));
    }
}
