use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use crate::errors::ClientResult;
use crate::storage::{CacheSlot, CacheStorage};

/// SQL for the cache slot store.
struct Queries;

impl Queries {
    pub const SCHEMA: &'static str = r#"
        CREATE TABLE IF NOT EXISTS cache_slots (
            slot TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
    "#;

    pub const GET_SLOT: &'static str = "SELECT payload FROM cache_slots WHERE slot = ?1";

    pub const UPSERT_SLOT: &'static str = r#"
        INSERT INTO cache_slots (slot, payload, updated_at)
        VALUES (?1, ?2, CURRENT_TIMESTAMP)
        ON CONFLICT(slot) DO UPDATE SET
            payload = excluded.payload,
            updated_at = excluded.updated_at
    "#;

    pub const DELETE_SLOT: &'static str = "DELETE FROM cache_slots WHERE slot = ?1";
}

/// Durable cache backend on SQLite. One row per slot.
pub struct SqliteStorage {
    pub(crate) pool: SqlitePool,
}

impl SqliteStorage {
    pub async fn new(database_url: &str) -> ClientResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::query(Queries::SCHEMA).execute(&pool).await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl CacheStorage for SqliteStorage {
    async fn load(&self, slot: CacheSlot) -> ClientResult<Option<String>> {
        let row = sqlx::query(Queries::GET_SLOT)
            .bind(slot.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get("payload")))
    }

    async fn save(&self, slot: CacheSlot, payload: &str) -> ClientResult<()> {
        sqlx::query(Queries::UPSERT_SLOT)
            .bind(slot.as_str())
            .bind(payload)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn clear(&self, slot: CacheSlot) -> ClientResult<()> {
        sqlx::query(Queries::DELETE_SLOT)
            .bind(slot.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
