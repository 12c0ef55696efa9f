//! CasTaskStore - compare-and-swap で原子的 claim を模擬
//!
//! # フロー
//! 1. `find_eligible` で候補を読み、claim 順にソート
//! 2. 先頭候補に対して、読んだ `run_since` を条件に `compare_and_set`
//! 3. 競合したら読み直し（`max_claim_attempts` 回まで）
//!
//! 上限に達した場合は「今回は取れなかった」として `None` を返します。
//! 次の tick で再挑戦されます。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::{ClaimQuery, StoreError, TaskId, TaskRecord, UpsertOutcome, claim_order};
use crate::ports::{CasBackend, TaskStore};

pub const DEFAULT_MAX_CLAIM_ATTEMPTS: usize = 5;

/// [`TaskStore`] over a store that only offers conditional writes.
#[derive(Debug, Clone)]
pub struct CasTaskStore<B> {
    backend: B,
    max_claim_attempts: usize,
}

impl<B: CasBackend> CasTaskStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            max_claim_attempts: DEFAULT_MAX_CLAIM_ATTEMPTS,
        }
    }

    /// Bound the optimistic retry loop (at least one attempt is made).
    pub fn with_max_claim_attempts(mut self, attempts: usize) -> Self {
        self.max_claim_attempts = attempts.max(1);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[async_trait]
impl<B: CasBackend> TaskStore for CasTaskStore<B> {
    async fn ensure_claim_index(&self) -> Result<(), StoreError> {
        self.backend.ensure_claim_index().await
    }

    async fn upsert(&self, record: TaskRecord) -> Result<UpsertOutcome, StoreError> {
        self.backend.upsert(record).await
    }

    async fn claim_next(&self, query: &ClaimQuery) -> Result<Option<TaskRecord>, StoreError> {
        for attempt in 1..=self.max_claim_attempts {
            let mut candidates = self
                .backend
                .find_eligible(&query.known_ids, query.now)
                .await?;
            candidates.sort_by(claim_order);

            let Some(best) = candidates.into_iter().next() else {
                return Ok(None);
            };

            let won = self
                .backend
                .compare_and_set(&best.id, best.run_since, query.lock_until, query.now)
                .await?;
            if won {
                return Ok(Some(best));
            }
            debug!(task_id = %best.id, attempt, "claim lost a compare-and-set race");
        }

        debug!(
            attempts = self.max_claim_attempts,
            "giving up claim under contention"
        );
        Ok(None)
    }

    async fn set_run_since(
        &self,
        id: &TaskId,
        run_since: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.backend.set_run_since(id, run_since).await
    }

    async fn get(&self, id: &TaskId) -> Result<Option<TaskRecord>, StoreError> {
        self.backend.get(id).await
    }
}
