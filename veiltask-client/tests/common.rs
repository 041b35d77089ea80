#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use veiltask_core::models::{Address, CipherHandle, EncryptedRecord, TaskStatus};

pub fn owner() -> Address {
    Address::parse("0xd8da6bf26964af9d7eed9e03e53415d37aa96045").unwrap()
}

pub fn other_owner() -> Address {
    Address::parse("0xab5801a7d398351b8be11c439e05c5b3259aec9b").unwrap()
}

/// Indexed on-chain record with deterministic handles and creation time.
pub fn record_at(index: u64) -> EncryptedRecord {
    EncryptedRecord {
        title: CipherHandle::new(format!("0xtitle{:02}", index)),
        due_date: CipherHandle::new(format!("0xdue{:02}", index)),
        priority: CipherHandle::new(format!("0xprio{:02}", index)),
        status: TaskStatus::Pending,
        created_at: Utc.timestamp_opt(1_700_000_000 + index as i64, 0).unwrap(),
        index: Some(index),
        shared_by: None,
    }
}

/// Record predating index-based tracking, identified by creation timestamp.
pub fn legacy_record(created_at_secs: i64) -> EncryptedRecord {
    EncryptedRecord {
        title: CipherHandle::new(format!("0xlegacytitle{}", created_at_secs)),
        due_date: CipherHandle::new(format!("0xlegacydue{}", created_at_secs)),
        priority: CipherHandle::new(format!("0xlegacyprio{}", created_at_secs)),
        status: TaskStatus::Pending,
        created_at: Utc.timestamp_opt(created_at_secs, 0).unwrap(),
        index: None,
        shared_by: None,
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
