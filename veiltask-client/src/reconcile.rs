use veiltask_core::models::{EncryptedRecord, FieldState, Task, TaskStatus};

use crate::cache::CacheSnapshot;

/// Result of one reconciliation pass: the ordered view-model list plus the
/// records whose fields still need an out-of-band decryption.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub tasks: Vec<Task>,
    pub needs_decryption: Vec<EncryptedRecord>,
}

/// Merge the owner's on-chain records with the cache into the task list the
/// rendering layer consumes.
///
/// `records` must be in ascending blockchain-index order as returned by the
/// store; output preserves that ordering. Deleted ids are dropped, cached
/// plaintext is used verbatim, the completed overlay overrides on-chain
/// status, and anything without cached plaintext comes back as an
/// undecrypted placeholder and is reported in `needs_decryption`.
pub fn reconcile(records: &[EncryptedRecord], snapshot: &CacheSnapshot) -> ReconcileOutcome {
    let mut tasks = Vec::with_capacity(records.len());
    let mut needs_decryption = Vec::new();

    for record in records {
        let id = record.task_id();

        if snapshot.deleted.contains(&id) {
            tracing::debug!("RECONCILE: skipping locally deleted task {}", id);
            continue;
        }

        let fields = match snapshot.fields.get(&id) {
            Some(cached) => FieldState::Plaintext(cached.clone()),
            None => {
                needs_decryption.push(record.clone());
                FieldState::Undecrypted
            }
        };

        let status = if snapshot.completed.contains(&id) {
            TaskStatus::Completed
        } else {
            record.status
        };

        tasks.push(Task::from_record(record, id, fields, status));
    }

    ReconcileOutcome {
        tasks,
        needs_decryption,
    }
}
