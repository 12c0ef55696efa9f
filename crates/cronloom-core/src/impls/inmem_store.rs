//! InMemoryTaskStore - 開発用・テスト用の正本
//!
//! # 実装詳細
//! - `HashMap<TaskId, TaskRecord>` を tokio の Mutex で保護
//! - `claim_next` はロック内で「検索・ソート・更新・旧状態の返却」を完結させる
//! - `Clone` は同じ状態を共有する（複数ランナー＝複数プロセスの模擬）
//!
//! `CasBackend` も実装しているので、`CasTaskStore` の検証にも使えます。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{
    ClaimQuery, StoreError, TaskId, TaskRecord, UpsertOutcome, claim_order,
};
use crate::ports::{CasBackend, TaskStore};

#[derive(Debug, Default)]
struct InMemoryStoreState {
    records: HashMap<TaskId, TaskRecord>,
    claim_index_ready: bool,
}

impl InMemoryStoreState {
    fn upsert(&mut self, record: TaskRecord) -> UpsertOutcome {
        match self.records.get_mut(&record.id) {
            Some(existing) => {
                existing.priority = record.priority;
                UpsertOutcome::PriorityUpdated
            }
            None => {
                self.records.insert(record.id.clone(), record);
                UpsertOutcome::Inserted
            }
        }
    }

    fn set_run_since(&mut self, id: &TaskId, run_since: DateTime<Utc>) -> bool {
        match self.records.get_mut(id) {
            Some(record) => {
                record.run_since = run_since;
                true
            }
            None => false,
        }
    }
}

/// Shared in-memory collection of task records.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskStore {
    state: Arc<Mutex<InMemoryStoreState>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records in claim order.
    pub async fn records(&self) -> Vec<TaskRecord> {
        let state = self.state.lock().await;
        let mut records: Vec<TaskRecord> = state.records.values().cloned().collect();
        records.sort_by(claim_order);
        records
    }

    pub async fn is_claim_index_ready(&self) -> bool {
        self.state.lock().await.claim_index_ready
    }

    /// Remove a record (administrative action; the runner never deletes).
    pub async fn remove(&self, id: &TaskId) -> Option<TaskRecord> {
        self.state.lock().await.records.remove(id)
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn ensure_claim_index(&self) -> Result<(), StoreError> {
        self.state.lock().await.claim_index_ready = true;
        Ok(())
    }

    async fn upsert(&self, record: TaskRecord) -> Result<UpsertOutcome, StoreError> {
        Ok(self.state.lock().await.upsert(record))
    }

    async fn claim_next(&self, query: &ClaimQuery) -> Result<Option<TaskRecord>, StoreError> {
        let mut state = self.state.lock().await;

        let Some(id) = state
            .records
            .values()
            .filter(|record| query.matches(record))
            .min_by(|a, b| claim_order(a, b))
            .map(|record| record.id.clone())
        else {
            return Ok(None);
        };

        let Some(record) = state.records.get_mut(&id) else {
            return Ok(None);
        };
        let previous = record.clone();
        record.claim(query.now, query.lock_until);
        Ok(Some(previous))
    }

    async fn set_run_since(
        &self,
        id: &TaskId,
        run_since: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.set_run_since(id, run_since))
    }

    async fn get(&self, id: &TaskId) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self.state.lock().await.records.get(id).cloned())
    }
}

#[async_trait]
impl CasBackend for InMemoryTaskStore {
    async fn ensure_claim_index(&self) -> Result<(), StoreError> {
        TaskStore::ensure_claim_index(self).await
    }

    async fn upsert(&self, record: TaskRecord) -> Result<UpsertOutcome, StoreError> {
        TaskStore::upsert(self, record).await
    }

    async fn find_eligible(
        &self,
        ids: &[TaskId],
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.records.get(id))
            .filter(|record| record.is_eligible(now))
            .cloned()
            .collect())
    }

    async fn compare_and_set(
        &self,
        id: &TaskId,
        expected_run_since: DateTime<Utc>,
        run_since: DateTime<Utc>,
        last_run_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.records.get_mut(id) {
            Some(record) if record.run_since == expected_run_since => {
                record.claim(last_run_at, run_since);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_run_since(
        &self,
        id: &TaskId,
        run_since: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        TaskStore::set_run_since(self, id, run_since).await
    }

    async fn get(&self, id: &TaskId) -> Result<Option<TaskRecord>, StoreError> {
        TaskStore::get(self, id).await
    }
}
