//! Errors - エラー型と分類
//!
//! 3 種類に分かれます:
//! - 登録エラー（プログラミングミス）: 呼び出し元へ即座に返す
//! - 実行エラー（`Task::run` など）: ポーリングループが捕まえて再スケジュール
//! - ストアエラー: リース更新時は握りつぶし、それ以外はログに残す

use thiserror::Error;

/// Invalid task id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskIdError {
    #[error("task id must not be empty")]
    Empty,
}

/// Returned by `Runner::register_task` before any store I/O happens.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("invalid task id: {0}")]
    InvalidTaskId(#[from] TaskIdError),
}

/// Failure reported by a [`TaskStore`](crate::ports::TaskStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached (transient).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Invalid runner configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("lock duration must be greater than zero")]
    ZeroLockDuration,

    #[error(
        "lock duration ({lock_duration_ms}ms) must exceed the poll interval ({poll_interval_ms}ms)"
    )]
    LockNotLongerThanPoll {
        lock_duration_ms: u64,
        poll_interval_ms: u64,
    },

    #[error("{field} ({value_ms}ms) exceeds the maximum of {max_ms}ms")]
    DurationTooLong {
        field: &'static str,
        value_ms: u64,
        max_ms: u64,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Error produced by a task while preparing or performing its work.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TaskError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error, keeping it reachable through `source()`.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Top-level error of the runner API.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
