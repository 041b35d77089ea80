use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use veiltask_core::digest::payload_checksum;
use veiltask_core::identifier::TaskId;
use veiltask_core::models::PlaintextFields;

use crate::errors::ClientResult;
use crate::storage::{CacheSlot, CacheStorage};

/// Checksummed envelope for the plaintext-field slot. A checksum mismatch is
/// treated the same as a parse failure: the slot loads empty.
#[derive(Debug, Serialize, Deserialize)]
struct FieldSnapshot {
    checksum: String,
    payload: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FieldEntry {
    id: TaskId,
    fields: PlaintextFields,
}

#[derive(Default)]
struct CacheState {
    fields: HashMap<TaskId, PlaintextFields>,
    decrypted: Vec<TaskId>,
    deleted: HashSet<TaskId>,
    completed: HashSet<TaskId>,
}

/// Read-only copy of the cache used by reconciliation, so the reconcile pass
/// sees one consistent view without holding the cache lock.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    pub fields: HashMap<TaskId, PlaintextFields>,
    pub deleted: HashSet<TaskId>,
    pub completed: HashSet<TaskId>,
}

/// Client-side cache of decrypted task fields plus the local-only deleted and
/// completed overlays.
///
/// The cache is advisory: the chain remains the source of truth for record
/// existence and ciphertext content. Entries are populated lazily on first
/// successful decryption and invalidated only by explicit deletion; there is
/// no automatic eviction.
pub struct DecryptionCache {
    storage: Arc<dyn CacheStorage>,
    state: RwLock<CacheState>,
}

impl DecryptionCache {
    /// Load the cache from the injected backend. Malformed persisted data is
    /// never fatal: any slot that fails to parse or fails its checksum loads
    /// empty.
    pub async fn open(storage: Arc<dyn CacheStorage>) -> ClientResult<Self> {
        let fields = match storage.load(CacheSlot::Fields).await? {
            Some(raw) => parse_field_snapshot(&raw),
            None => HashMap::new(),
        };
        let decrypted = match storage.load(CacheSlot::Decrypted).await? {
            Some(raw) => parse_id_list(CacheSlot::Decrypted, &raw),
            None => Vec::new(),
        };
        let deleted: HashSet<TaskId> = match storage.load(CacheSlot::Deleted).await? {
            Some(raw) => parse_id_list(CacheSlot::Deleted, &raw).into_iter().collect(),
            None => HashSet::new(),
        };
        let completed: HashSet<TaskId> = match storage.load(CacheSlot::Completed).await? {
            Some(raw) => parse_id_list(CacheSlot::Completed, &raw).into_iter().collect(),
            None => HashSet::new(),
        };

        tracing::debug!(
            "CACHE: loaded {} field entries, {} deleted, {} completed",
            fields.len(),
            deleted.len(),
            completed.len()
        );

        Ok(Self {
            storage,
            state: RwLock::new(CacheState {
                fields,
                decrypted,
                deleted,
                completed,
            }),
        })
    }

    pub async fn get(&self, id: &TaskId) -> Option<PlaintextFields> {
        self.state.read().await.fields.get(id).cloned()
    }

    /// Store or overwrite the plaintext fields for a task. Idempotent.
    pub async fn put(&self, id: TaskId, fields: PlaintextFields) -> ClientResult<()> {
        let (fields_payload, decrypted_payload) = {
            let mut state = self.state.write().await;
            state.fields.insert(id, fields);
            if !state.decrypted.contains(&id) {
                state.decrypted.push(id);
            }
            (serialize_fields(&state)?, serialize_ids(state.decrypted.iter())?)
        };

        self.storage.save(CacheSlot::Fields, &fields_payload).await?;
        self.storage
            .save(CacheSlot::Decrypted, &decrypted_payload)
            .await?;
        Ok(())
    }

    /// Local deletion overlay. Does not talk to the chain; the id is excluded
    /// from every future reconciled view even while the record persists
    /// on-chain.
    pub async fn mark_deleted(&self, id: TaskId) -> ClientResult<()> {
        let payload = {
            let mut state = self.state.write().await;
            state.deleted.insert(id);
            serialize_ids(state.deleted.iter())?
        };
        self.storage.save(CacheSlot::Deleted, &payload).await
    }

    pub async fn is_deleted(&self, id: &TaskId) -> bool {
        self.state.read().await.deleted.contains(id)
    }

    /// Local completion overlay, analogous contract to [`mark_deleted`].
    ///
    /// [`mark_deleted`]: DecryptionCache::mark_deleted
    pub async fn mark_completed(&self, id: TaskId) -> ClientResult<()> {
        let payload = {
            let mut state = self.state.write().await;
            state.completed.insert(id);
            serialize_ids(state.completed.iter())?
        };
        self.storage.save(CacheSlot::Completed, &payload).await
    }

    pub async fn is_completed(&self, id: &TaskId) -> bool {
        self.state.read().await.completed.contains(id)
    }

    /// Ids with cached plaintext, in order of first decryption.
    pub async fn decrypted_ids(&self) -> Vec<TaskId> {
        self.state.read().await.decrypted.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.fields.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.fields.is_empty()
    }

    pub async fn snapshot(&self) -> CacheSnapshot {
        let state = self.state.read().await;
        CacheSnapshot {
            fields: state.fields.clone(),
            deleted: state.deleted.clone(),
            completed: state.completed.clone(),
        }
    }

    /// Wipe all four slots. Used when the active account changes.
    pub async fn clear(&self) -> ClientResult<()> {
        {
            let mut state = self.state.write().await;
            *state = CacheState::default();
        }
        for slot in CacheSlot::ALL {
            self.storage.clear(slot).await?;
        }
        Ok(())
    }
}

fn serialize_fields(state: &CacheState) -> ClientResult<String> {
    let entries: Vec<FieldEntry> = state
        .decrypted
        .iter()
        .filter_map(|id| {
            state.fields.get(id).map(|fields| FieldEntry {
                id: *id,
                fields: fields.clone(),
            })
        })
        .collect();
    let payload = serde_json::to_string(&entries)?;
    let snapshot = FieldSnapshot {
        checksum: payload_checksum(&payload),
        payload,
    };
    Ok(serde_json::to_string(&snapshot)?)
}

fn serialize_ids<'a>(ids: impl Iterator<Item = &'a TaskId>) -> ClientResult<String> {
    Ok(serde_json::to_string(&ids.collect::<Vec<_>>())?)
}

fn parse_field_snapshot(raw: &str) -> HashMap<TaskId, PlaintextFields> {
    let snapshot: FieldSnapshot = match serde_json::from_str(raw) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!("CACHE: malformed field snapshot, starting empty: {}", e);
            return HashMap::new();
        }
    };
    if payload_checksum(&snapshot.payload) != snapshot.checksum {
        tracing::warn!("CACHE: field snapshot checksum mismatch, starting empty");
        return HashMap::new();
    }
    let entries: Vec<FieldEntry> = match serde_json::from_str(&snapshot.payload) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("CACHE: malformed field entries, starting empty: {}", e);
            return HashMap::new();
        }
    };
    entries.into_iter().map(|e| (e.id, e.fields)).collect()
}

fn parse_id_list(slot: CacheSlot, raw: &str) -> Vec<TaskId> {
    match serde_json::from_str(raw) {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!(
                "CACHE: malformed {} slot, starting empty: {}",
                slot.as_str(),
                e
            );
            Vec::new()
        }
    }
}
