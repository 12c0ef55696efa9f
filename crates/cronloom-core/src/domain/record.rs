//! Task record: persisted scheduling metadata for one task id.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// Persisted scheduling metadata, one document per task id.
///
/// Design:
/// - `run_since` is both the next schedule and the lease expiry. A claim
///   pushes it into the future, which makes the record look "not yet
///   eligible" to every other runner.
/// - Re-registration only ever touches `priority`.
///
/// The serialized form is the store document:
/// `{ "_id", "priority", "runSince", "lastRunAt" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    #[serde(rename = "_id")]
    pub id: TaskId,

    /// Higher is more urgent.
    pub priority: i64,

    pub run_since: DateTime<Utc>,

    /// Time of the most recent claim (informational).
    pub last_run_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// A freshly registered record: eligible right away, never run.
    pub fn new(id: TaskId, priority: i64, now: DateTime<Utc>) -> Self {
        Self {
            id,
            priority,
            run_since: now,
            last_run_at: None,
        }
    }

    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.run_since <= now
    }

    /// Apply a claim: lease until `lock_until`, stamp `last_run_at`.
    pub fn claim(&mut self, now: DateTime<Utc>, lock_until: DateTime<Utc>) {
        self.run_since = lock_until;
        self.last_run_at = Some(now);
    }
}

/// Order in which eligible records are claimed: priority descending,
/// then task id ascending.
pub fn claim_order(a: &TaskRecord, b: &TaskRecord) -> Ordering {
    b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id))
}

/// Parameters of one atomic claim.
#[derive(Debug, Clone)]
pub struct ClaimQuery {
    /// Only these ids may be claimed (the runner's local registry).
    pub known_ids: Vec<TaskId>,
    pub now: DateTime<Utc>,
    /// New `run_since` of the claimed record.
    pub lock_until: DateTime<Utc>,
}

impl ClaimQuery {
    pub fn matches(&self, record: &TaskRecord) -> bool {
        record.is_eligible(self.now) && self.known_ids.contains(&record.id)
    }
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// Existing record; only the priority was written.
    PriorityUpdated,
}
