//! TaskStore port - タスクレコードの正本（source of truth）
//!
//! ランナー間の協調はすべてこのストアの原子的操作を経由します。
//! プロセス間ロックや合意プロトコルは使いません。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ClaimQuery, StoreError, TaskId, TaskRecord, UpsertOutcome};

/// Document collection holding one [`TaskRecord`] per task id.
///
/// # 設計原則
/// - `claim_next` が唯一の同期プリミティブ。マッチ・ソート・更新・旧状態の
///   返却を 1 つの原子的操作で行う
/// - `upsert` は既存レコードのスケジュール（`run_since` / `last_run_at`）を
///   決して上書きしない
/// - `set_run_since` の失敗は呼び出し側で非致命的に扱われる
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Ensure an index on `(priority desc, run_since asc, id)` exists.
    async fn ensure_claim_index(&self) -> Result<(), StoreError>;

    /// Insert `record` if its id is unknown; otherwise only overwrite
    /// `priority`.
    async fn upsert(&self, record: TaskRecord) -> Result<UpsertOutcome, StoreError>;

    /// Atomically pick the first record matching `query` in
    /// [`claim_order`](crate::domain::claim_order), set its `run_since` to
    /// `query.lock_until` and `last_run_at` to `query.now`, and return the
    /// record as it was before the update.
    async fn claim_next(&self, query: &ClaimQuery) -> Result<Option<TaskRecord>, StoreError>;

    /// Overwrite `run_since`. Returns `false` when the record does not exist.
    async fn set_run_since(
        &self,
        id: &TaskId,
        run_since: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn get(&self, id: &TaskId) -> Result<Option<TaskRecord>, StoreError>;
}
