//! Task trait - 呼び出し側が実装する定期タスク
//!
//! # 使用例
//! ```ignore
//! struct Cleanup { period: chrono::Duration }
//!
//! #[async_trait]
//! impl Task for Cleanup {
//!     fn task_id(&self) -> &str { "cleanup" }
//!
//!     async fn run(&self, progress: Progress) -> Result<(), TaskError> {
//!         for batch in batches() {
//!             purge(batch).await?;
//!             progress.report().await;
//!         }
//!         Ok(())
//!     }
//!
//!     fn next_time(&self) -> Result<DateTime<Utc>, TaskError> {
//!         Ok(Utc::now() + self.period)
//!     }
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::app::Progress;
use crate::domain::TaskError;

/// A recurring unit of work known to a runner.
///
/// Only the scheduling metadata is persisted; the instance itself lives in
/// the runner's local registry.
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Cluster-wide id. Must not be blank.
    fn task_id(&self) -> &str;

    /// Perform the work. Call `progress.report()` regularly when the run
    /// can outlast the runner's lock duration, otherwise another runner
    /// may claim the task again.
    async fn run(&self, progress: Progress) -> Result<(), TaskError>;

    /// Next eligibility after a successful run. Read before `run` starts,
    /// so it should be measured from the ideal start, not from completion.
    fn next_time(&self) -> Result<DateTime<Utc>, TaskError>;

    /// Next eligibility after a failed run.
    fn next_time_after_fail(&self) -> Result<DateTime<Utc>, TaskError> {
        self.next_time()
    }
}
