use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::StoreError;

/// Stable identifier for a task.
///
/// Records written since index-based tracking carry their chain index and are
/// identified by it. Older records fall back to their creation timestamp
/// (seconds since the epoch), which is the only stable datum they carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TaskId {
    Indexed(u64),
    Legacy(i64),
}

impl TaskId {
    pub fn is_legacy(&self) -> bool {
        matches!(self, TaskId::Legacy(_))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Indexed(n) => write!(f, "idx:{}", n),
            TaskId::Legacy(ts) => write!(f, "legacy:{}", ts),
        }
    }
}

impl FromStr for TaskId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(n) = s.strip_prefix("idx:") {
            let n = n
                .parse::<u64>()
                .map_err(|_| StoreError::Serialization(format!("invalid task id: {}", s)))?;
            return Ok(TaskId::Indexed(n));
        }
        if let Some(ts) = s.strip_prefix("legacy:") {
            let ts = ts
                .parse::<i64>()
                .map_err(|_| StoreError::Serialization(format!("invalid task id: {}", s)))?;
            return Ok(TaskId::Legacy(ts));
        }
        Err(StoreError::Serialization(format!("invalid task id: {}", s)))
    }
}
