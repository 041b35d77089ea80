use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;
use veiltask_core::identifier::TaskId;
use veiltask_core::models::{Address, EncryptedRecord, Task, TaskReceipt, TaskSubmission};

use crate::cache::DecryptionCache;
use crate::chain::TaskStore;
use crate::decrypt::{decrypt_fields, DecryptTracker, Decryptor};
use crate::errors::{ClientError, ClientResult};
use crate::events::EventDispatcher;
use crate::reconcile::reconcile;

/// Client session tying the cache, the on-chain store and the decryption
/// client together for one active owner address.
///
/// `refresh` returns the reconciled list immediately; decryption of any
/// still-encrypted fields happens out-of-band, landing in the cache so the
/// next refresh renders plaintext. Decryption results that arrive after the
/// active account has changed are discarded.
pub struct TaskSession {
    cache: Arc<DecryptionCache>,
    store: Arc<dyn TaskStore>,
    decryptor: Arc<dyn Decryptor>,
    tracker: Arc<DecryptTracker>,
    event_dispatcher: Arc<EventDispatcher>,
    account: RwLock<Option<Address>>,
    epoch: Arc<AtomicU64>,
    session_id: Uuid,
}

impl TaskSession {
    pub fn new(
        cache: Arc<DecryptionCache>,
        store: Arc<dyn TaskStore>,
        decryptor: Arc<dyn Decryptor>,
    ) -> Self {
        Self {
            cache,
            store,
            decryptor,
            tracker: Arc::new(DecryptTracker::new()),
            event_dispatcher: Arc::new(EventDispatcher::new()),
            account: RwLock::new(None),
            epoch: Arc::new(AtomicU64::new(0)),
            session_id: Uuid::new_v4(),
        }
    }

    pub fn event_dispatcher(&self) -> Arc<EventDispatcher> {
        self.event_dispatcher.clone()
    }

    pub async fn active_account(&self) -> Option<Address> {
        self.account.read().await.clone()
    }

    /// Switch the active owner address. Bumps the session epoch so in-flight
    /// decryption results for the previous account are discarded; switching
    /// to a different address also wipes the cache, whose identifiers are
    /// only meaningful per owner.
    pub async fn set_account(&self, owner: Address) -> ClientResult<()> {
        let previous = {
            let mut account = self.account.write().await;
            let previous = account.take();
            *account = Some(owner.clone());
            previous
        };
        self.epoch.fetch_add(1, Ordering::SeqCst);

        if let Some(previous) = previous {
            if previous != owner {
                tracing::info!(
                    "SESSION {}: account changed {} -> {}, clearing cache",
                    self.session_id,
                    previous,
                    owner
                );
                self.cache.clear().await?;
                self.tracker.reset();
            }
        }

        self.event_dispatcher.emit_account_changed(&owner);
        Ok(())
    }

    /// Fetch the active account's on-chain records, reconcile them against
    /// the cache, and kick off out-of-band decryption for anything still
    /// encrypted. Returns the reconciled list; a fetch failure surfaces as a
    /// single error and no partial list.
    pub async fn refresh(&self) -> ClientResult<Vec<Task>> {
        let owner = self
            .active_account()
            .await
            .ok_or_else(|| ClientError::InvalidState("no active account".to_string()))?;
        let epoch = self.epoch.load(Ordering::SeqCst);

        let records = self.store.get_tasks(&owner).await?;
        let snapshot = self.cache.snapshot().await;
        let outcome = reconcile(&records, &snapshot);

        tracing::info!(
            "SESSION {}: refreshed {} -> {} tasks, {} awaiting decryption",
            self.session_id,
            owner,
            outcome.tasks.len(),
            outcome.needs_decryption.len()
        );
        self.event_dispatcher
            .emit_list_refreshed(&owner, outcome.tasks.len());

        for record in outcome.needs_decryption {
            let id = record.task_id();
            // Skips ids already in flight or permanently failed.
            if !self.tracker.begin(id) {
                continue;
            }
            self.spawn_decryption(id, record, epoch);
        }

        Ok(outcome.tasks)
    }

    fn spawn_decryption(&self, id: TaskId, record: EncryptedRecord, epoch: u64) {
        let cache = self.cache.clone();
        let decryptor = self.decryptor.clone();
        let tracker = self.tracker.clone();
        let event_dispatcher = self.event_dispatcher.clone();
        let epoch_counter = self.epoch.clone();
        let session_id = self.session_id;

        tokio::spawn(async move {
            let result = decrypt_fields(decryptor.as_ref(), &record).await;
            tracker.finish(&id);

            // Stale-account guard: the result belongs to the epoch that
            // requested it.
            if epoch_counter.load(Ordering::SeqCst) != epoch {
                tracing::debug!(
                    "SESSION {}: discarding stale decryption result for {}",
                    session_id,
                    id
                );
                return;
            }

            match result {
                Ok(fields) => {
                    if let Err(e) = cache.put(id, fields).await {
                        tracing::error!(
                            "SESSION {}: failed to cache decrypted fields for {}: {}",
                            session_id,
                            id,
                            e
                        );
                        return;
                    }
                    event_dispatcher.emit_task_decrypted(id);
                }
                Err(e) => {
                    tracing::warn!(
                        "SESSION {}: decryption failed for {}: {}",
                        session_id,
                        id,
                        e
                    );
                    if !e.is_transient() {
                        tracker.mark_failed(id);
                    }
                    event_dispatcher.emit_decrypt_failed(id, &e);
                }
            }
        });
    }

    /// Submit a new encrypted task, paying the current creation fee.
    pub async fn create_task(&self, submission: TaskSubmission) -> ClientResult<TaskReceipt> {
        let fee = self.store.task_creation_fee().await?;
        let receipt = self.store.create_task(submission, fee).await?;

        tracing::info!(
            "SESSION {}: created task at index {} (fee {})",
            self.session_id,
            receipt.index,
            receipt.fee_paid
        );
        self.event_dispatcher.emit_task_created(receipt.clone());
        Ok(receipt)
    }

    /// Local completion overlay; never written back to the chain.
    pub async fn complete_task(&self, id: TaskId) -> ClientResult<()> {
        self.cache.mark_completed(id).await?;
        self.event_dispatcher.emit_task_completed(id);
        Ok(())
    }

    /// Local deletion overlay; the record stays on-chain but is excluded from
    /// every future reconciled view.
    pub async fn delete_task(&self, id: TaskId) -> ClientResult<()> {
        self.cache.mark_deleted(id).await?;
        self.event_dispatcher.emit_task_deleted(id);
        Ok(())
    }
}
