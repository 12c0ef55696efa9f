//! Events - ランナーが発行する観測イベント
//!
//! ログ（tracing）とは別に、利用者が用意した [`EventSink`](crate::ports::EventSink)
//! に送られます。

use serde::Serialize;

use super::ids::TaskId;

/// Lifecycle event of one task execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunnerEvent {
    TaskStarted { task_id: TaskId },
    TaskFinished { task_id: TaskId },
    TaskError { task_id: TaskId, error: String },
}

impl RunnerEvent {
    pub fn task_id(&self) -> &TaskId {
        match self {
            RunnerEvent::TaskStarted { task_id }
            | RunnerEvent::TaskFinished { task_id }
            | RunnerEvent::TaskError { task_id, .. } => task_id,
        }
    }
}
