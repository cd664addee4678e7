//! In-memory implementation of `AuditWriter`.
//!
//! Events live in a `Vec` behind `Arc<Mutex<_>>`, so the writer can be shared
//! with the tenant guard's warning hook and with an audited authorizer while
//! the application keeps a handle for `export_log()`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{info, warn};

use warden_contracts::{
    decision::Decision,
    error::{GuardError, WardenError, WardenResult},
    tenant::GuardWarning,
};

use crate::{
    chain::{hash_event, verify_chain},
    event::{AuditEvent, AuditLog, AuditRecord},
    writer::AuditWriter,
};

pub(crate) struct InMemoryState {
    pub(crate) events: Vec<AuditEvent>,
    /// Next sequence number to assign.
    pub(crate) sequence: u64,
    /// `this_hash` of the last event, or `GENESIS_HASH` before the first.
    pub(crate) last_hash: String,
}

impl InMemoryState {
    fn append(&mut self, trail_id: &str, record: &AuditRecord) -> WardenResult<()> {
        let prev_hash = self.last_hash.clone();
        let sequence = self.sequence;
        let recorded_at = Utc::now();
        let this_hash = hash_event(trail_id, sequence, &recorded_at, record, &prev_hash)?;

        self.events.push(AuditEvent {
            sequence,
            trail_id: trail_id.to_string(),
            recorded_at,
            record: record.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });
        self.sequence += 1;
        self.last_hash = this_hash;
        Ok(())
    }
}

/// An append-only audit writer backed by a SHA-256 hash chain.
#[derive(Clone)]
pub struct InMemoryAuditWriter {
    trail_id: String,
    pub(crate) state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryAuditWriter {
    pub fn new(trail_id: impl Into<String>) -> Self {
        let state = InMemoryState {
            events: Vec::new(),
            sequence: 0,
            last_hash: AuditEvent::GENESIS_HASH.to_string(),
        };
        Self {
            trail_id: trail_id.into(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn trail_id(&self) -> &str {
        &self.trail_id
    }

    pub fn record_decision(&self, action: &str, decision: &Decision) -> WardenResult<()> {
        self.write(&AuditRecord::decision(action, decision))
    }

    pub fn record_warning(&self, warning: &GuardWarning) -> WardenResult<()> {
        self.write(&AuditRecord::injection(warning))
    }

    pub fn record_rejection(&self, error: &GuardError) -> WardenResult<()> {
        self.write(&AuditRecord::rejection(error))
    }

    /// A hook for `TenantGuard::on_warn` that appends every injection to
    /// this trail. Append failures are logged, since the hook cannot fail.
    pub fn warning_sink(&self) -> impl Fn(&GuardWarning) + Send + Sync + 'static {
        let writer = self.clone();
        move |warning: &GuardWarning| {
            if let Err(err) = writer.record_warning(warning) {
                warn!(trail_id = %writer.trail_id, error = %err, "failed to audit guard warning");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.read_state().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Export a sealed `AuditLog` containing all events written so far.
    pub fn export_log(&self) -> AuditLog {
        let state = self.read_state();
        let terminal_hash = state
            .events
            .last()
            .map(|e| e.this_hash.clone())
            .unwrap_or_default();

        AuditLog {
            trail_id: self.trail_id.clone(),
            events: state.events.clone(),
            finalized_at: Utc::now(),
            terminal_hash,
        }
    }

    /// Verify that the in-memory chain has not been tampered with.
    pub fn verify_integrity(&self) -> bool {
        verify_chain(&self.read_state().events)
    }

    // Readers tolerate poisoning: a panic mid-append never leaves a partial
    // event behind, so the chain is still consistent.
    fn read_state(&self) -> MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> WardenResult<MutexGuard<'_, InMemoryState>> {
        self.state.lock().map_err(|e| WardenError::AuditWriteFailed {
            reason: format!("audit state lock poisoned: {e}"),
        })
    }
}

impl AuditWriter for InMemoryAuditWriter {
    fn write(&self, record: &AuditRecord) -> WardenResult<()> {
        self.write_state()?.append(&self.trail_id, record)
    }

    fn finalize(&self) -> WardenResult<()> {
        let state = self.write_state()?;
        info!(
            trail_id = %self.trail_id,
            event_count = state.events.len(),
            terminal_hash = %state.last_hash,
            "audit trail finalized"
        );
        Ok(())
    }
}
