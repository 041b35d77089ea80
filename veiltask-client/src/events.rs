use tokio::sync::broadcast;
use veiltask_core::errors::DecryptError;
use veiltask_core::identifier::TaskId;
use veiltask_core::models::{Address, TaskReceipt};

/// Notifications for an embedding UI. Delivery is lossy for slow consumers;
/// the next refresh always reproduces current state.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    ListRefreshed { owner: Address, count: usize },
    TaskDecrypted { id: TaskId },
    DecryptFailed {
        id: TaskId,
        transient: bool,
        reason: String,
    },
    TaskCreated { receipt: TaskReceipt },
    TaskCompleted { id: TaskId },
    TaskDeleted { id: TaskId },
    AccountChanged { owner: Address },
    ConnectionChanged { connected: bool },
}

pub struct EventDispatcher {
    tx: broadcast::Sender<TaskEvent>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.tx.subscribe()
    }

    pub fn emit_list_refreshed(&self, owner: &Address, count: usize) {
        self.emit(TaskEvent::ListRefreshed {
            owner: owner.clone(),
            count,
        });
    }

    pub fn emit_task_decrypted(&self, id: TaskId) {
        self.emit(TaskEvent::TaskDecrypted { id });
    }

    pub fn emit_decrypt_failed(&self, id: TaskId, error: &DecryptError) {
        self.emit(TaskEvent::DecryptFailed {
            id,
            transient: error.is_transient(),
            reason: error.to_string(),
        });
    }

    pub fn emit_task_created(&self, receipt: TaskReceipt) {
        self.emit(TaskEvent::TaskCreated { receipt });
    }

    pub fn emit_task_completed(&self, id: TaskId) {
        self.emit(TaskEvent::TaskCompleted { id });
    }

    pub fn emit_task_deleted(&self, id: TaskId) {
        self.emit(TaskEvent::TaskDeleted { id });
    }

    pub fn emit_account_changed(&self, owner: &Address) {
        self.emit(TaskEvent::AccountChanged {
            owner: owner.clone(),
        });
    }

    pub fn emit_connection_changed(&self, connected: bool) {
        self.emit(TaskEvent::ConnectionChanged { connected });
    }

    fn emit(&self, event: TaskEvent) {
        // send only fails with no subscribers, which is fine.
        let _ = self.tx.send(event);
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
