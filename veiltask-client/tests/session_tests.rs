mod common;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{other_owner, owner, record_at};
use tokio::sync::broadcast;
use tokio::time::timeout;
use veiltask_client::{
    decrypt_fields, ClientError, ClientResult, DecryptionCache, Decryptor, MemoryStorage,
    TaskEvent, TaskSession, TaskStore,
};
use veiltask_core::errors::DecryptError;
use veiltask_core::identifier::TaskId;
use veiltask_core::models::{
    Address, CipherHandle, EncryptedRecord, PlaintextFields, TaskReceipt, TaskStatus,
    TaskSubmission,
};

/// Programmable stand-in for the on-chain task store.
struct MockStore {
    records: Mutex<Vec<EncryptedRecord>>,
    fee: u128,
    fail_fetch: AtomicBool,
}

impl MockStore {
    fn new(records: Vec<EncryptedRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            fee: 1_000,
            fail_fetch: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl TaskStore for MockStore {
    async fn get_tasks(&self, _owner: &Address) -> ClientResult<Vec<EncryptedRecord>> {
        if self.fail_fetch.load(Ordering::Relaxed) {
            return Err(ClientError::Gateway("chain unavailable".to_string()));
        }
        Ok(self.records.lock().unwrap().clone())
    }

    async fn create_task(
        &self,
        submission: TaskSubmission,
        fee: u128,
    ) -> ClientResult<TaskReceipt> {
        let mut records = self.records.lock().unwrap();
        let index = records.len() as u64;
        records.push(EncryptedRecord {
            title: submission.title,
            due_date: submission.due_date,
            priority: submission.priority,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            index: Some(index),
            shared_by: None,
        });
        Ok(TaskReceipt {
            tx_hash: format!("0xreceipt{:02}", index),
            index,
            fee_paid: fee,
        })
    }

    async fn task_creation_fee(&self) -> ClientResult<u128> {
        Ok(self.fee)
    }
}

/// Programmable stand-in for the FHE decryption client.
#[derive(Default)]
struct MockDecryptor {
    plaintexts: Mutex<HashMap<String, String>>,
    transient_failures: Mutex<HashMap<String, usize>>,
    permanent_failures: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockDecryptor {
    fn new() -> Self {
        Self::default()
    }

    fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Register plaintexts for all three handles of a record.
    fn prime(&self, record: &EncryptedRecord, title: &str, due_date: &str, priority: u8) {
        let mut plaintexts = self.plaintexts.lock().unwrap();
        plaintexts.insert(record.title.as_str().to_string(), title.to_string());
        plaintexts.insert(record.due_date.as_str().to_string(), due_date.to_string());
        plaintexts.insert(record.priority.as_str().to_string(), priority.to_string());
    }

    fn fail_transiently(&self, handle: &CipherHandle, times: usize) {
        self.transient_failures
            .lock()
            .unwrap()
            .insert(handle.as_str().to_string(), times);
    }

    fn fail_permanently(&self, handle: &CipherHandle) {
        self.permanent_failures
            .lock()
            .unwrap()
            .insert(handle.as_str().to_string());
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Decryptor for MockDecryptor {
    async fn decrypt(&self, handle: &CipherHandle) -> Result<String, DecryptError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self
            .permanent_failures
            .lock()
            .unwrap()
            .contains(handle.as_str())
        {
            return Err(DecryptError::Permanent("wrong key".to_string()));
        }

        {
            let mut transient = self.transient_failures.lock().unwrap();
            if let Some(remaining) = transient.get_mut(handle.as_str()) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(DecryptError::Transient("oracle busy".to_string()));
                }
            }
        }

        self.plaintexts
            .lock()
            .unwrap()
            .get(handle.as_str())
            .cloned()
            .ok_or_else(|| DecryptError::Permanent("unknown handle".to_string()))
    }
}

struct TestSetup {
    session: TaskSession,
    store: Arc<MockStore>,
    decryptor: Arc<MockDecryptor>,
    cache: Arc<DecryptionCache>,
}

async fn setup(records: Vec<EncryptedRecord>, decryptor: MockDecryptor) -> TestSetup {
    common::init_tracing();
    let cache = Arc::new(
        DecryptionCache::open(Arc::new(MemoryStorage::new()))
            .await
            .unwrap(),
    );
    let store = Arc::new(MockStore::new(records));
    let decryptor = Arc::new(decryptor);
    let session = TaskSession::new(cache.clone(), store.clone(), decryptor.clone());
    session.set_account(owner()).await.unwrap();
    TestSetup {
        session,
        store,
        decryptor,
        cache,
    }
}

/// Wait for the first event matching `pred`, skipping others.
async fn wait_for_event(
    rx: &mut broadcast::Receiver<TaskEvent>,
    pred: impl Fn(&TaskEvent) -> bool,
) -> TaskEvent {
    timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn test_refresh_renders_placeholder_then_plaintext() {
    let record = record_at(0);
    let decryptor = MockDecryptor::new();
    decryptor.prime(&record, "Buy milk", "2024-01-01", 1);
    let setup = setup(vec![record], decryptor).await;
    let mut rx = setup.session.event_dispatcher().subscribe();

    // First refresh: nothing decrypted yet, placeholder rendered.
    let tasks = setup.session.refresh().await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert!(tasks[0].is_encrypted);
    assert_eq!(tasks[0].title_or_placeholder(), "Encrypted task");

    wait_for_event(&mut rx, |e| matches!(e, TaskEvent::TaskDecrypted { id } if *id == TaskId::Indexed(0))).await;

    // Second refresh: plaintext comes from the cache.
    let tasks = setup.session.refresh().await.unwrap();
    assert_eq!(tasks[0].title(), Some("Buy milk"));
    assert_eq!(tasks[0].priority(), Some(1));
    assert_eq!(tasks[0].status, TaskStatus::Pending);

    // Three handles, decrypted exactly once each.
    assert_eq!(setup.decryptor.calls(), 3);
}

#[tokio::test]
async fn test_cached_fields_skip_decryption_entirely() {
    let setup = setup(vec![record_at(0)], MockDecryptor::new()).await;
    setup
        .cache
        .put(
            TaskId::Indexed(0),
            PlaintextFields::new("Buy milk", "2024-01-01", 1),
        )
        .await
        .unwrap();

    let tasks = setup.session.refresh().await.unwrap();
    assert_eq!(tasks[0].title(), Some("Buy milk"));
    assert_eq!(setup.decryptor.calls(), 0);
}

#[tokio::test]
async fn test_fetch_failure_surfaces_single_error() {
    let setup = setup(vec![record_at(0)], MockDecryptor::new()).await;
    setup.store.fail_fetch.store(true, Ordering::Relaxed);

    let err = setup.session.refresh().await.unwrap_err();
    assert!(matches!(err, ClientError::Gateway(_)));
}

#[tokio::test]
async fn test_refresh_requires_account() {
    common::init_tracing();
    let cache = Arc::new(
        DecryptionCache::open(Arc::new(MemoryStorage::new()))
            .await
            .unwrap(),
    );
    let store = Arc::new(MockStore::new(vec![]));
    let session = TaskSession::new(cache, store, Arc::new(MockDecryptor::new()));

    let err = session.refresh().await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidState(_)));
}

#[tokio::test]
async fn test_overlays_through_session() {
    let setup = setup(vec![record_at(0), record_at(1)], MockDecryptor::new()).await;
    let mut rx = setup.session.event_dispatcher().subscribe();

    setup.session.complete_task(TaskId::Indexed(0)).await.unwrap();
    setup.session.delete_task(TaskId::Indexed(1)).await.unwrap();

    wait_for_event(&mut rx, |e| matches!(e, TaskEvent::TaskCompleted { .. })).await;
    wait_for_event(&mut rx, |e| matches!(e, TaskEvent::TaskDeleted { .. })).await;

    let tasks = setup.session.refresh().await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, TaskId::Indexed(0));
    assert_eq!(tasks[0].status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_permanent_failure_is_not_rerequested() {
    let record = record_at(0);
    let decryptor = MockDecryptor::new();
    decryptor.fail_permanently(&record.title);
    let setup = setup(vec![record], decryptor).await;
    let mut rx = setup.session.event_dispatcher().subscribe();

    setup.session.refresh().await.unwrap();
    let event = wait_for_event(&mut rx, |e| matches!(e, TaskEvent::DecryptFailed { .. })).await;
    match event {
        TaskEvent::DecryptFailed { id, transient, .. } => {
            assert_eq!(id, TaskId::Indexed(0));
            assert!(!transient);
        }
        _ => unreachable!(),
    }

    let calls_after_failure = setup.decryptor.calls();

    // Later refreshes keep the placeholder and do not hit the oracle again.
    let tasks = setup.session.refresh().await.unwrap();
    assert!(tasks[0].is_encrypted);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(setup.decryptor.calls(), calls_after_failure);
}

#[tokio::test]
async fn test_stale_decryption_discarded_after_account_switch() {
    let record = record_at(0);
    let decryptor = MockDecryptor::with_delay(Duration::from_millis(100));
    decryptor.prime(&record, "Buy milk", "2024-01-01", 1);
    let setup = setup(vec![record], decryptor).await;
    let mut rx = setup.session.event_dispatcher().subscribe();

    setup.session.refresh().await.unwrap();

    // Switch accounts while the decryption is still in flight.
    setup.session.set_account(other_owner()).await.unwrap();

    // Three handles at 100ms each; wait well past completion.
    tokio::time::sleep(Duration::from_millis(800)).await;

    // The late result was discarded, not cached.
    assert_eq!(setup.cache.get(&TaskId::Indexed(0)).await, None);
    while let Ok(event) = rx.try_recv() {
        assert!(
            !matches!(event, TaskEvent::TaskDecrypted { .. }),
            "stale decryption result must not be announced"
        );
    }
}

#[tokio::test]
async fn test_create_task_pays_current_fee() {
    let setup = setup(vec![], MockDecryptor::new()).await;
    let mut rx = setup.session.event_dispatcher().subscribe();

    let submission = TaskSubmission {
        title: CipherHandle::new("0xnewtitle"),
        due_date: CipherHandle::new("0xnewdue"),
        priority: CipherHandle::new("0xnewprio"),
        proof: "0xproof".to_string(),
    };
    let receipt = setup.session.create_task(submission).await.unwrap();
    assert_eq!(receipt.index, 0);
    assert_eq!(receipt.fee_paid, 1_000);

    wait_for_event(&mut rx, |e| matches!(e, TaskEvent::TaskCreated { .. })).await;

    // The new record shows up on the next refresh.
    let tasks = setup.session.refresh().await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].blockchain_index, Some(0));
}

#[tokio::test]
async fn test_transient_failures_retry_within_one_attempt() {
    let record = record_at(0);
    let decryptor = MockDecryptor::new();
    decryptor.prime(&record, "Buy milk", "2024-01-01", 1);
    decryptor.fail_transiently(&record.title, 2);

    let fields = decrypt_fields(&decryptor, &record).await.unwrap();
    assert_eq!(fields.title, "Buy milk");
    // Two transient failures on the title handle, then three successes.
    assert_eq!(decryptor.calls(), 5);
}

#[tokio::test]
async fn test_garbled_priority_is_permanent() {
    let record = record_at(0);
    let decryptor = MockDecryptor::new();
    decryptor.prime(&record, "Buy milk", "2024-01-01", 1);
    decryptor
        .plaintexts
        .lock()
        .unwrap()
        .insert(record.priority.as_str().to_string(), "not a number".to_string());

    let err = decrypt_fields(&decryptor, &record).await.unwrap_err();
    assert!(!err.is_transient());
}
