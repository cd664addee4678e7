//! The audit sink seam.

use warden_contracts::error::WardenResult;

use crate::event::AuditRecord;

/// Trusted, append-only sink for audit records.
///
/// Records written here are never modified or deleted.
pub trait AuditWriter: Send + Sync {
    /// Append one record to the trail.
    fn write(&self, record: &AuditRecord) -> WardenResult<()>;

    /// Mark the trail complete. Persistent writers flush or seal here.
    fn finalize(&self) -> WardenResult<()>;
}
