//! Progress - 実行中タスクからランナーへの進捗通知
//!
//! 通知のたびにリース（`run_since`）を延長しますが、書き込みは
//! `lock_duration / 5` ごとに間引かれます。

use std::fmt;
use std::sync::Arc;

use super::runner::RunnerShared;
use crate::domain::TaskId;

/// Handle passed to [`Task::run`](crate::task::Task::run).
///
/// Cheap to clone; may be moved into sub-tasks spawned by the task.
#[derive(Clone)]
pub struct Progress {
    task_id: TaskId,
    runner: Arc<RunnerShared>,
}

impl Progress {
    pub(crate) fn new(task_id: TaskId, runner: Arc<RunnerShared>) -> Self {
        Self { task_id, runner }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Tell the runner the task is still alive.
    ///
    /// Renews the lease when the last renewal is older than
    /// `lock_duration / 5`. Store errors are swallowed.
    pub async fn report(&self) {
        self.runner.on_task_progress(&self.task_id).await;
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("task_id", &self.task_id)
            .finish_non_exhaustive()
    }
}
