use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Address, CipherHandle, EncryptedRecord, TaskReceipt, TaskSubmission};

/// Requests sent to the task gateway. Correlated responses echo the numeric
/// request id; `Authenticate` and `Ping` are fire-and-forget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayRequest {
    // Authentication
    Authenticate {
        address: Address,
        auth_token: String,
    },

    // Task store operations
    GetTasks {
        id: u64,
        owner: Address,
    },
    CreateTask {
        id: u64,
        submission: TaskSubmission,
        fee: u128,
    },
    TaskCreationFee {
        id: u64,
    },

    // Decryption oracle
    Decrypt {
        id: u64,
        handle: CipherHandle,
    },

    // Heartbeat
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayResponse {
    // Authentication responses
    AuthSuccess {
        session_id: Uuid,
    },
    AuthError {
        reason: String,
    },

    // Task store responses
    Tasks {
        id: u64,
        records: Vec<EncryptedRecord>,
    },
    TaskCreated {
        id: u64,
        receipt: TaskReceipt,
    },
    CreationFee {
        id: u64,
        amount: u128,
    },

    // Decryption responses
    Decrypted {
        id: u64,
        plaintext: String,
    },
    DecryptFailed {
        id: u64,
        reason: String,
        retryable: bool,
    },

    // Errors
    Error {
        id: Option<u64>,
        code: ErrorCode,
        message: String,
    },

    // Heartbeat
    Pong,
}

impl GatewayResponse {
    /// Correlation id echoed from the originating request, if any.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            GatewayResponse::Tasks { id, .. }
            | GatewayResponse::TaskCreated { id, .. }
            | GatewayResponse::CreationFee { id, .. }
            | GatewayResponse::Decrypted { id, .. }
            | GatewayResponse::DecryptFailed { id, .. } => Some(*id),
            GatewayResponse::Error { id, .. } => *id,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidAuth,
    UnknownOwner,
    InvalidSubmission,
    FeeMismatch,
    ServerError,
    RateLimitExceeded,
}
