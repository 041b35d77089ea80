use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use veiltask_core::errors::DecryptError;
use veiltask_core::identifier::TaskId;
use veiltask_core::models::{CipherHandle, EncryptedRecord, PlaintextFields};

/// Interface to the FHE decryption client.
#[async_trait]
pub trait Decryptor: Send + Sync {
    async fn decrypt(&self, handle: &CipherHandle) -> Result<String, DecryptError>;
}

/// Resolve all three ciphertext handles of a record into plaintext fields.
///
/// Transient failures are retried with capped exponential backoff inside this
/// one attempt; whatever error survives is reported as-is so the caller can
/// decide retry-later versus permanent placeholder.
pub async fn decrypt_fields(
    decryptor: &dyn Decryptor,
    record: &EncryptedRecord,
) -> Result<PlaintextFields, DecryptError> {
    let title = decrypt_with_retry(decryptor, &record.title).await?;
    let due_date = decrypt_with_retry(decryptor, &record.due_date).await?;
    let priority_raw = decrypt_with_retry(decryptor, &record.priority).await?;

    let priority = priority_raw.trim().parse::<u8>().map_err(|e| {
        DecryptError::Permanent(format!("priority plaintext is not an integer: {}", e))
    })?;

    Ok(PlaintextFields::new(title, due_date, priority))
}

async fn decrypt_with_retry(
    decryptor: &dyn Decryptor,
    handle: &CipherHandle,
) -> Result<String, DecryptError> {
    let backoff = ExponentialBackoff {
        initial_interval: std::time::Duration::from_millis(100),
        max_interval: std::time::Duration::from_millis(2000),
        max_elapsed_time: Some(std::time::Duration::from_secs(10)),
        randomization_factor: 0.1,
        ..Default::default()
    };

    retry(backoff, || async {
        match decryptor.decrypt(handle).await {
            Ok(plaintext) => Ok(plaintext),
            Err(e @ DecryptError::Transient(_)) => Err(backoff::Error::transient(e)),
            Err(e) => Err(backoff::Error::permanent(e)),
        }
    })
    .await
}

/// Tracks which task ids have a decryption in flight and which have failed
/// permanently, so concurrent refreshes neither duplicate requests nor
/// re-request handles the oracle has already rejected for good.
#[derive(Default)]
pub struct DecryptTracker {
    in_flight: Mutex<HashSet<TaskId>>,
    failed: Mutex<HashSet<TaskId>>,
}

impl DecryptTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a decryption slot for `id`. Returns false if one is already in
    /// flight or the id has failed permanently.
    pub fn begin(&self, id: TaskId) -> bool {
        if self.is_failed(&id) {
            return false;
        }
        let mut in_flight = match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        in_flight.insert(id)
    }

    pub fn finish(&self, id: &TaskId) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.remove(id);
        }
    }

    pub fn mark_failed(&self, id: TaskId) {
        if let Ok(mut failed) = self.failed.lock() {
            failed.insert(id);
        }
    }

    pub fn is_failed(&self, id: &TaskId) -> bool {
        self.failed
            .lock()
            .map(|failed| failed.contains(id))
            .unwrap_or(false)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Forget permanent failures, e.g. after the active account changes.
    pub fn reset(&self) {
        if let Ok(mut failed) = self.failed.lock() {
            failed.clear();
        }
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.clear();
        }
    }
}
