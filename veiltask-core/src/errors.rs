use thiserror::Error;

use crate::identifier::TaskId;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Fee mismatch: expected {expected}, got {actual}")]
    FeeMismatch { expected: u128, actual: u128 },

    #[error("Invalid record at index {index}: {reason}")]
    InvalidRecord { index: u64, reason: String },

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Failure modes of the FHE decryption client.
///
/// The reconciliation logic only needs the transient/permanent split:
/// transient failures are retried lazily on a later refresh, permanent
/// failures leave the task with an undecrypted placeholder and are not
/// requested again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptError {
    #[error("Transient decryption failure: {0}")]
    Transient(String),

    #[error("Permanent decryption failure: {0}")]
    Permanent(String),
}

impl DecryptError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DecryptError::Transient(_))
    }
}
