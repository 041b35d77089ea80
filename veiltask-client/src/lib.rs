pub mod cache;
pub mod chain;
pub mod database;
pub mod decrypt;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod reconcile;
pub mod session;
pub mod storage;

pub use cache::{CacheSnapshot, DecryptionCache};
pub use chain::TaskStore;
pub use database::SqliteStorage;
pub use decrypt::{decrypt_fields, DecryptTracker, Decryptor};
pub use errors::{ClientError, ClientResult};
pub use events::{EventDispatcher, TaskEvent};
pub use gateway::GatewayClient;
pub use reconcile::{reconcile, ReconcileOutcome};
pub use session::TaskSession;
pub use storage::{CacheSlot, CacheStorage, MemoryStorage};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;
    use veiltask_core::identifier::TaskId;
    use veiltask_core::models::PlaintextFields;

    use crate::cache::DecryptionCache;
    use crate::database::SqliteStorage;
    use crate::storage::{CacheSlot, CacheStorage};

    /// Shared-cache in-memory database, unique per test, so every pooled
    /// connection sees the same data.
    fn memory_db_url() -> String {
        format!("file:{}?mode=memory&cache=shared", Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_sqlite_storage_operations() {
        let storage = SqliteStorage::new(&memory_db_url()).await.unwrap();

        assert_eq!(storage.load(CacheSlot::Fields).await.unwrap(), None);

        storage
            .save(CacheSlot::Deleted, r#"[{"kind":"indexed","value":3}]"#)
            .await
            .unwrap();
        assert_eq!(
            storage.load(CacheSlot::Deleted).await.unwrap(),
            Some(r#"[{"kind":"indexed","value":3}]"#.to_string())
        );

        // Overwrite replaces the payload.
        storage.save(CacheSlot::Deleted, "[]").await.unwrap();
        assert_eq!(
            storage.load(CacheSlot::Deleted).await.unwrap(),
            Some("[]".to_string())
        );

        storage.clear(CacheSlot::Deleted).await.unwrap();
        assert_eq!(storage.load(CacheSlot::Deleted).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cache_persists_through_sqlite() {
        let storage = Arc::new(SqliteStorage::new(&memory_db_url()).await.unwrap());

        let cache = DecryptionCache::open(storage.clone()).await.unwrap();
        cache
            .put(
                TaskId::Indexed(0),
                PlaintextFields::new("Buy milk", "2024-01-01", 1),
            )
            .await
            .unwrap();
        cache.mark_completed(TaskId::Indexed(0)).await.unwrap();
        drop(cache);

        // A fresh cache over the same pool sees the persisted state.
        let reopened = DecryptionCache::open(storage).await.unwrap();
        let fields = reopened.get(&TaskId::Indexed(0)).await.unwrap();
        assert_eq!(fields.title, "Buy milk");
        assert!(reopened.is_completed(&TaskId::Indexed(0)).await);
    }
}
