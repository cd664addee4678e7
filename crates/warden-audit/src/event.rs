//! Audit record, event, and log types.
//!
//! `AuditRecord` is what happened: an authorization decision, a tenant-scope
//! injection, or a rejected mutation. `AuditEvent` wraps one record with its
//! position in the hash chain. `AuditLog` is the sealed export of a trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_contracts::{decision::Decision, error::GuardError, tenant::GuardWarning};

/// One auditable occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditRecord {
    /// An authorizer decided an action.
    Decision { action: String, decision: Decision },
    /// The tenant guard injected scoping into a payload.
    Injection { warning: GuardWarning },
    /// The tenant guard rejected a mutation.
    Rejection { error: GuardError },
}

impl AuditRecord {
    pub fn decision(action: impl Into<String>, decision: &Decision) -> Self {
        Self::Decision {
            action: action.into(),
            decision: decision.clone(),
        }
    }

    pub fn injection(warning: &GuardWarning) -> Self {
        Self::Injection {
            warning: warning.clone(),
        }
    }

    pub fn rejection(error: &GuardError) -> Self {
        Self::Rejection {
            error: error.clone(),
        }
    }

    /// Short label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decision { .. } => "decision",
            Self::Injection { .. } => "injection",
            Self::Rejection { .. } => "rejection",
        }
    }
}

/// A single entry in the SHA-256 hash chain of one trail.
///
/// Modifying any field, including the embedded `record`, invalidates
/// `this_hash` and every later `prev_hash`; `verify_chain` detects both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Position in the chain, starting at 0.
    pub sequence: u64,

    /// The trail this event belongs to (typically one tenant or request).
    pub trail_id: String,

    /// Wall-clock time (UTC) the event was appended.
    pub recorded_at: DateTime<Utc>,

    pub record: AuditRecord,

    /// Hash of the previous event, or `GENESIS_HASH` for the first event.
    pub prev_hash: String,

    /// Hash of this event's canonical content, as computed by `hash_event()`.
    pub this_hash: String,
}

impl AuditEvent {
    /// The `prev_hash` of the first event in every chain: 64 hex zeros.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A sealed export of one trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub trail_id: String,

    /// All events in chain order (sequence 0 first).
    pub events: Vec<AuditEvent>,

    /// Wall-clock time (UTC) the log was exported.
    pub finalized_at: DateTime<Utc>,

    /// The `this_hash` of the last event. Empty if the log is empty.
    pub terminal_hash: String,
}
