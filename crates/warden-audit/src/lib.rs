//! # warden-audit
//!
//! Append-only, SHA-256 hash-chained audit trail for Warden.
//!
//! Authorization decisions, tenant-scope injections, and guard rejections are
//! wrapped in `AuditEvent`s that link to the previous event by hash.
//! Tampering with any event breaks the chain and is detected by
//! `verify_chain`.
//!
//! ```rust,ignore
//! let audit = InMemoryAuditWriter::new("tenant-acme");
//! let guard = TenantGuard::new(config)?.on_warn(audit.warning_sink());
//! let authorizer = AuditedAuthorizer::new(policy, Arc::new(audit.clone()));
//!
//! authorizer.check_detailed("post.update", &input)?;
//! assert!(audit.verify_integrity());
//! ```

pub mod authorizer;
pub mod chain;
pub mod event;
pub mod memory;
pub mod writer;

pub use authorizer::AuditedAuthorizer;
pub use chain::{hash_event, verify_chain};
pub use event::{AuditEvent, AuditLog, AuditRecord};
pub use memory::InMemoryAuditWriter;
pub use writer::AuditWriter;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use warden_contracts::{
        decision::Decision,
        error::{GuardError, GuardErrorCode, WardenError, WardenResult},
        mask::FieldMask,
        tenant::{GuardWarning, WarningCode},
    };
    use warden_policy::{Policy, Rule};

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn warning(path: &str) -> GuardWarning {
        GuardWarning {
            code: WarningCode::InjectTenantField,
            model: "Post".to_string(),
            operation: "create".to_string(),
            path: path.to_string(),
        }
    }

    fn rejection() -> GuardError {
        GuardError::new(
            GuardErrorCode::TenantMismatch,
            "Post",
            "create",
            "Post.data",
            "t1",
        )
        .with_actual("t2")
    }

    fn filled_writer(trail: &str) -> InMemoryAuditWriter {
        let writer = InMemoryAuditWriter::new(trail);
        writer
            .record_decision("post.read", &Decision::default_deny())
            .unwrap();
        writer.record_warning(&warning("Post.data")).unwrap();
        writer.record_rejection(&rejection()).unwrap();
        writer
    }

    // ── 1. Chain integrity ───────────────────────────────────────────────────

    #[test]
    fn test_hash_chain_integrity() {
        let writer = filled_writer("trail-integrity");
        assert_eq!(writer.len(), 3);
        assert!(writer.verify_integrity(), "chain must be valid after sequential writes");
    }

    #[test]
    fn test_tamper_detection() {
        let writer = filled_writer("trail-tamper");

        {
            let mut state = writer.state.lock().unwrap();
            state.events[1].record = AuditRecord::injection(&warning("Post.TAMPERED"));
        }

        assert!(
            !writer.verify_integrity(),
            "chain must detect tampering with a stored event"
        );
    }

    #[test]
    fn test_relinking_is_detected() {
        let writer = filled_writer("trail-relink");
        let mut events = writer.export_log().events;

        events.remove(1);

        assert!(!verify_chain(&events), "dropping an event must break linkage");
    }

    #[test]
    fn test_genesis_hash_and_sequence() {
        let log = filled_writer("trail-genesis").export_log();

        assert_eq!(log.events[0].prev_hash, AuditEvent::GENESIS_HASH);
        for (idx, event) in log.events.iter().enumerate() {
            assert_eq!(event.sequence, idx as u64);
            assert_eq!(event.trail_id, "trail-genesis");
        }
    }

    #[test]
    fn test_export_log() {
        let writer = filled_writer("trail-export");
        writer.finalize().unwrap();

        let log = writer.export_log();

        assert_eq!(log.trail_id, "trail-export");
        assert_eq!(log.events.len(), 3);
        assert_eq!(log.terminal_hash, log.events.last().unwrap().this_hash);
        assert!(verify_chain(&log.events));
    }

    #[test]
    fn test_verify_empty() {
        let writer = InMemoryAuditWriter::new("trail-empty");
        assert!(writer.is_empty());
        assert!(writer.verify_integrity());
        assert_eq!(writer.export_log().terminal_hash, "");
    }

    // ── 2. Record shapes ─────────────────────────────────────────────────────

    #[test]
    fn test_records_serialize_with_kind_tag() {
        let value = serde_json::to_value(AuditRecord::rejection(&rejection())).unwrap();

        assert_eq!(value["kind"], json!("rejection"));
        assert_eq!(value["error"]["code"], json!("TENANT_MISMATCH"));
        assert_eq!(value["error"]["actual_tenant"], json!("t2"));
        assert_eq!(AuditRecord::injection(&warning("Post.data")).kind(), "injection");
    }

    // ── 3. Warning sink ──────────────────────────────────────────────────────

    #[test]
    fn test_warning_sink_appends_to_shared_trail() {
        let writer = InMemoryAuditWriter::new("trail-sink");
        let sink = writer.warning_sink();

        sink(&warning("Post.data"));
        sink(&warning("Post.data.comments.create[0]"));

        let log = writer.export_log();
        assert_eq!(log.events.len(), 2);
        match &log.events[1].record {
            AuditRecord::Injection { warning } => {
                assert_eq!(warning.path, "Post.data.comments.create[0]")
            }
            other => panic!("expected injection record, got {:?}", other),
        }
        assert!(writer.verify_integrity());
    }

    // ── 4. Audited authorizer ────────────────────────────────────────────────

    fn policy() -> Policy<Value> {
        Policy::builder()
            .rule(
                Rule::allow("post.read")
                    .id("public-read")
                    .read_mask(FieldMask::new().field("title")),
            )
            .rule(
                Rule::deny("post.delete")
                    .id("no-delete")
                    .reason("posts are never deleted"),
            )
            .build()
    }

    #[test]
    fn test_audited_authorizer_records_every_decision() {
        let writer = InMemoryAuditWriter::new("trail-authz");
        let authorizer = AuditedAuthorizer::new(policy(), Arc::new(writer.clone()));

        let read = authorizer.check_detailed("post.read", &json!({})).unwrap();
        assert!(read.allow);
        assert!(!authorizer.check("post.delete", &json!({})).unwrap());
        assert!(!authorizer.check("post.publish", &json!({})).unwrap());

        let log = writer.export_log();
        assert_eq!(log.events.len(), 3);
        match &log.events[0].record {
            AuditRecord::Decision { action, decision } => {
                assert_eq!(action, "post.read");
                assert_eq!(decision, &read);
            }
            other => panic!("expected decision record, got {:?}", other),
        }
        match &log.events[2].record {
            AuditRecord::Decision { decision, .. } => {
                assert_eq!(decision, &Decision::default_deny())
            }
            other => panic!("expected decision record, got {:?}", other),
        }
        assert!(writer.verify_integrity());
    }

    struct FailingWriter;

    impl AuditWriter for FailingWriter {
        fn write(&self, _record: &AuditRecord) -> WardenResult<()> {
            Err(WardenError::AuditWriteFailed {
                reason: "disk full".to_string(),
            })
        }

        fn finalize(&self) -> WardenResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_audit_failure_withholds_decision() {
        let authorizer = AuditedAuthorizer::new(policy(), Arc::new(FailingWriter));

        let result = authorizer.check_detailed("post.read", &json!({}));

        assert!(matches!(result, Err(WardenError::AuditWriteFailed { .. })));
    }
}
