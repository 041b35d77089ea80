use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::{ClientError, ClientResult};

/// The four persisted cache slots. Each holds one serialized payload and is
/// loaded and saved independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheSlot {
    Fields,
    Decrypted,
    Deleted,
    Completed,
}

impl CacheSlot {
    pub const ALL: [CacheSlot; 4] = [
        CacheSlot::Fields,
        CacheSlot::Decrypted,
        CacheSlot::Deleted,
        CacheSlot::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheSlot::Fields => "fields",
            CacheSlot::Decrypted => "decrypted",
            CacheSlot::Deleted => "deleted",
            CacheSlot::Completed => "completed",
        }
    }
}

/// Persistence seam for the decryption cache. The cache never touches its
/// backing store directly, so tests run against [`MemoryStorage`] and the
/// production path runs against [`crate::database::SqliteStorage`].
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Load the payload last saved to `slot`, if any.
    async fn load(&self, slot: CacheSlot) -> ClientResult<Option<String>>;

    /// Overwrite the payload for `slot`.
    async fn save(&self, slot: CacheSlot, payload: &str) -> ClientResult<()>;

    /// Remove the payload for `slot`.
    async fn clear(&self, slot: CacheSlot) -> ClientResult<()>;
}

/// In-memory backend for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<CacheSlot, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn load(&self, slot: CacheSlot) -> ClientResult<Option<String>> {
        let slots = self
            .slots
            .lock()
            .map_err(|_| ClientError::Lock("memory storage".to_string()))?;
        Ok(slots.get(&slot).cloned())
    }

    async fn save(&self, slot: CacheSlot, payload: &str) -> ClientResult<()> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| ClientError::Lock("memory storage".to_string()))?;
        slots.insert(slot, payload.to_string());
        Ok(())
    }

    async fn clear(&self, slot: CacheSlot) -> ClientResult<()> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| ClientError::Lock("memory storage".to_string()))?;
        slots.remove(&slot);
        Ok(())
    }
}
