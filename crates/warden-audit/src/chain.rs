//! Hash-chain primitives.
//!
//! Hash input layout (bytes, in order):
//!   1. trail_id as UTF-8 bytes
//!   2. sequence as 8-byte little-endian
//!   3. recorded_at as RFC 3339 UTF-8 bytes
//!   4. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   5. compact JSON of record

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use warden_contracts::error::{WardenError, WardenResult};

use crate::event::{AuditEvent, AuditRecord};

/// Compute the lowercase hex SHA-256 hash of one audit event.
///
/// Returns `WardenError::AuditWriteFailed` if `record` cannot be serialized.
pub fn hash_event(
    trail_id: &str,
    sequence: u64,
    recorded_at: &DateTime<Utc>,
    record: &AuditRecord,
    prev_hash: &str,
) -> WardenResult<String> {
    let record_json = serde_json::to_vec(record).map_err(|e| WardenError::AuditWriteFailed {
        reason: format!("audit record is not serializable: {e}"),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(trail_id.as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(recorded_at.to_rfc3339().as_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&record_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Verify prev-hash linkage and hash correctness of every event.
///
/// An empty chain is valid.
pub fn verify_chain(events: &[AuditEvent]) -> bool {
    let mut expected_prev = AuditEvent::GENESIS_HASH.to_string();

    for event in events {
        if event.prev_hash != expected_prev {
            return false;
        }

        let recomputed = hash_event(
            &event.trail_id,
            event.sequence,
            &event.recorded_at,
            &event.record,
            &event.prev_hash,
        );
        match recomputed {
            Ok(hash) if hash == event.this_hash => {}
            _ => return false,
        }

        expected_prev = event.this_hash.clone();
    }

    true
}
