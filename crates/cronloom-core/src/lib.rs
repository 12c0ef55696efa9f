//! cronloom-core
//!
//! Distributed, priority-ordered, lease-based runner for recurring tasks.
//!
//! Runners in any number of processes share one [`TaskStore`](ports::TaskStore).
//! Each poll, a runner atomically claims the most urgent eligible task it
//! knows, runs it and reschedules it. A given task never runs in two
//! runners at once as long as its lease (`lock_duration`) is renewed via
//! [`Progress`](app::Progress) faster than it expires.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（TaskId, TaskRecord, errors, events）
//! - **ports**: 抽象化レイヤー（TaskStore, CasBackend, Clock, EventSink）
//! - **task**: 呼び出し側が実装する Task trait
//! - **app**: Runner, RunnerBuilder, RunnerConfig, Progress
//! - **impls**: InMemoryTaskStore, CasTaskStore

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use app::{Progress, Runner, RunnerBuilder, RunnerConfig};
pub use domain::{RunnerError, RunnerEvent, TaskError, TaskId, TaskRecord};
pub use task::Task;
