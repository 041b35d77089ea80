use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(#[from] veiltask_core::StoreError),

    #[error("Decryption error: {0}")]
    Decrypt(#[from] veiltask_core::DecryptError),

    #[error("Storage backend error: {0}")]
    Storage(String),

    #[error("Connection lost")]
    ConnectionLost,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Failed to acquire lock: {0}")]
    Lock(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
