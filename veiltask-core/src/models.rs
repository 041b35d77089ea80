use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::identifier::TaskId;

/// Lowercase 0x-prefixed account address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.len() != 40 || hex::decode(digits).is_err() {
            return Err(StoreError::InvalidAddress(s.to_string()));
        }
        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

/// Opaque reference to an FHE ciphertext held by the chain. The client never
/// inspects the contents; handles are only passed to the decryption oracle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CipherHandle(String);

impl CipherHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
}

/// Decrypted task fields, the unit stored by the decryption cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextFields {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: String,
    pub priority: u8,
}

impl PlaintextFields {
    pub fn new(title: impl Into<String>, due_date: impl Into<String>, priority: u8) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            due_date: due_date.into(),
            priority,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// On-chain task record as returned by the store, fields still encrypted.
///
/// `index` is absent for records written before index-based tracking; those
/// are identified by their creation timestamp instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedRecord {
    pub title: CipherHandle,
    pub due_date: CipherHandle,
    pub priority: CipherHandle,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub index: Option<u64>,
    pub shared_by: Option<Address>,
}

impl EncryptedRecord {
    /// Stable identifier: chain index when tracked, creation timestamp otherwise.
    pub fn task_id(&self) -> TaskId {
        match self.index {
            Some(n) => TaskId::Indexed(n),
            None => TaskId::Legacy(self.created_at.timestamp()),
        }
    }

    pub fn is_legacy(&self) -> bool {
        self.index.is_none()
    }
}

/// Plaintext availability for a task's encrypted fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FieldState {
    Plaintext(PlaintextFields),
    Undecrypted,
}

impl FieldState {
    pub fn is_decrypted(&self) -> bool {
        matches!(self, FieldState::Plaintext(_))
    }
}

/// Reconciled task view model, merging on-chain metadata with cache-derived
/// plaintext. This is what the rendering layer consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub fields: FieldState,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub shared_by: Option<Address>,
    pub blockchain_index: Option<u64>,
    /// Frontend-assigned identifier, if the embedding UI tracks one.
    pub local_ref: Option<Uuid>,
    pub is_encrypted: bool,
    pub is_shared: bool,
    pub is_legacy: bool,
}

impl Task {
    /// Build a view model from an on-chain record. The sharing invariant
    /// (`is_shared` implies `shared_by` present) holds by construction: both
    /// are derived from the record's `shared_by`.
    pub fn from_record(
        record: &EncryptedRecord,
        id: TaskId,
        fields: FieldState,
        status: TaskStatus,
    ) -> Self {
        let is_encrypted = !fields.is_decrypted();
        Self {
            id,
            fields,
            status,
            created_at: record.created_at,
            shared_by: record.shared_by.clone(),
            blockchain_index: record.index,
            local_ref: None,
            is_encrypted,
            is_shared: record.shared_by.is_some(),
            is_legacy: record.is_legacy(),
        }
    }

    pub fn with_local_ref(mut self, local_ref: Uuid) -> Self {
        self.local_ref = Some(local_ref);
        self
    }

    /// Get the decrypted title, if plaintext is available.
    pub fn title(&self) -> Option<&str> {
        match &self.fields {
            FieldState::Plaintext(f) => Some(&f.title),
            FieldState::Undecrypted => None,
        }
    }

    /// Get the decrypted title, or the placeholder shown while ciphertext is
    /// still pending decryption.
    pub fn title_or_placeholder(&self) -> &str {
        self.title().unwrap_or("Encrypted task")
    }

    pub fn description(&self) -> Option<&str> {
        match &self.fields {
            FieldState::Plaintext(f) => Some(&f.description),
            FieldState::Undecrypted => None,
        }
    }

    pub fn due_date(&self) -> Option<&str> {
        match &self.fields {
            FieldState::Plaintext(f) => Some(&f.due_date),
            FieldState::Undecrypted => None,
        }
    }

    pub fn priority(&self) -> Option<u8> {
        match &self.fields {
            FieldState::Plaintext(f) => Some(f.priority),
            FieldState::Undecrypted => None,
        }
    }
}

/// Ciphertext handles and input proof for a task creation, produced by the
/// embedding application's FHE client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSubmission {
    pub title: CipherHandle,
    pub due_date: CipherHandle,
    pub priority: CipherHandle,
    pub proof: String,
}

/// Confirmation of an accepted task creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReceipt {
    pub tx_hash: String,
    pub index: u64,
    pub fee_paid: u128,
}
