//! Veiltask - client-side synchronization for FHE-encrypted to-do tasks
//!
//! This crate provides a unified API for the veiltask client stack: a local
//! decryption cache, reconciliation of encrypted on-chain records into
//! renderable view models, and a WebSocket gateway client.
//!
//! # Example
//!
//! ```ignore
//! use veiltask::{DecryptionCache, GatewayClient, SqliteStorage, TaskSession};
//!
//! let storage = Arc::new(SqliteStorage::new("sqlite:veiltask.db?mode=rwc").await?);
//! let cache = Arc::new(DecryptionCache::open(storage).await?);
//! let gateway = Arc::new(GatewayClient::connect(url, &owner, token, None).await?);
//! let session = TaskSession::new(cache, gateway.clone(), gateway);
//! session.set_account(owner).await?;
//! let tasks = session.refresh().await?;
//! ```

// Re-export client types
pub use veiltask_client::{
    CacheSlot, CacheStorage, ClientError, ClientResult, DecryptionCache, Decryptor,
    EventDispatcher, GatewayClient, MemoryStorage, SqliteStorage, TaskEvent, TaskSession,
    TaskStore,
};

// Re-export core types that embedding applications may need
pub use veiltask_core::errors::{DecryptError, StoreError};
pub use veiltask_core::identifier::TaskId;
pub use veiltask_core::models::{
    Address, CipherHandle, EncryptedRecord, FieldState, PlaintextFields, Task, TaskReceipt,
    TaskStatus, TaskSubmission,
};
pub use veiltask_core::protocol::{GatewayRequest, GatewayResponse};
pub use veiltask_core::StoreResult;
