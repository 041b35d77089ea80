use sha2::{Digest, Sha256};

/// SHA-256 hex digest of a persisted cache payload, used to detect snapshot
/// corruption on load.
pub fn payload_checksum(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}
