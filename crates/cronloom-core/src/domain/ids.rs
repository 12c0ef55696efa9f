//! Task identifiers.
//!
//! タスク ID は呼び出し側が決める文字列です（ストア側の `_id` と一致）。
//! 空文字は登録時に弾くため、`TaskId` を持っている時点で非空が保証されます。

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::TaskIdError;

/// Identifier of a recurring task, shared cluster-wide.
///
/// `Ord` is the plain string order; the claim query uses it as the
/// tie-break among equal priorities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

impl TaskId {
    /// Validate and wrap a task id. Blank ids are rejected.
    pub fn new(value: impl Into<String>) -> Result<Self, TaskIdError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(TaskIdError::Empty);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TaskId {
    type Error = TaskIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for TaskId {
    type Error = TaskIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
