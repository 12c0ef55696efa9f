//! CasBackend port - 原子的 claim を持たないストア向け
//!
//! "find + sort + update + return" を 1 操作で提供できないストアは、
//! 比較交換（compare-and-swap）だけ実装すれば
//! [`CasTaskStore`](crate::impls::CasTaskStore) で `TaskStore` になります。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{StoreError, TaskId, TaskRecord, UpsertOutcome};

/// Minimal store contract: reads plus a conditional write guarded by the
/// previously read `run_since`.
#[async_trait]
pub trait CasBackend: Send + Sync {
    async fn ensure_claim_index(&self) -> Result<(), StoreError>;

    async fn upsert(&self, record: TaskRecord) -> Result<UpsertOutcome, StoreError>;

    /// Records among `ids` with `run_since <= now`, in any order.
    async fn find_eligible(
        &self,
        ids: &[TaskId],
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskRecord>, StoreError>;

    /// Write `run_since` / `last_run_at` only if the stored `run_since` still
    /// equals `expected_run_since`. Returns whether the write happened.
    async fn compare_and_set(
        &self,
        id: &TaskId,
        expected_run_since: DateTime<Utc>,
        run_since: DateTime<Utc>,
        last_run_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn set_run_since(
        &self,
        id: &TaskId,
        run_since: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn get(&self, id: &TaskId) -> Result<Option<TaskRecord>, StoreError>;
}
