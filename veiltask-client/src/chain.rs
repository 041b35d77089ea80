use async_trait::async_trait;
use veiltask_core::models::{Address, EncryptedRecord, TaskReceipt, TaskSubmission};

use crate::errors::ClientResult;

/// Interface to the on-chain task store.
///
/// `get_tasks` returns the owner's records ordered by blockchain index,
/// ascending. That ordering is canonical: reconciliation matches cache
/// entries back to records through it. A fetch failure is a single error;
/// no partial list is ever returned.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get_tasks(&self, owner: &Address) -> ClientResult<Vec<EncryptedRecord>>;

    async fn create_task(
        &self,
        submission: TaskSubmission,
        fee: u128,
    ) -> ClientResult<TaskReceipt>;

    async fn task_creation_fee(&self) -> ClientResult<u128>;
}
