//! # warden-contracts
//!
//! Shared types, schemas, and error contracts for the Warden toolkit.
//!
//! All crates in the workspace import from here. No evaluation logic lives in
//! this crate, only data definitions and error types.

pub mod action;
pub mod decision;
pub mod error;
pub mod mask;
pub mod tenant;

pub use action::ActionInput;
pub use decision::{Decision, Effect, DEFAULT_DENY_REASON};
pub use error::{GuardError, GuardErrorCode, GuardResult, WardenError, WardenResult};
pub use mask::{FieldMask, MaskNode};
pub use tenant::{
    GuardMode, GuardWarning, ModelMeta, NestedTarget, RelationOp, TenantMeta, WarningCode,
    WriteOperation, DEFAULT_TENANT_FIELD,
};

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    // ── FieldMask serde ──────────────────────────────────────────────────────

    #[test]
    fn test_field_mask_parses_nested_object() {
        let mask: FieldMask =
            serde_json::from_value(json!({ "title": true, "author": { "name": true } })).unwrap();

        assert_eq!(mask.get("title"), Some(&MaskNode::All));
        match mask.get("author") {
            Some(MaskNode::Nested(inner)) => assert_eq!(inner.get("name"), Some(&MaskNode::All)),
            other => panic!("expected nested mask at 'author', got {:?}", other),
        }
        assert_eq!(
            mask,
            FieldMask::new()
                .field("title")
                .nested("author", FieldMask::new().field("name"))
        );
    }

    #[test]
    fn test_field_mask_rejects_false_leaf() {
        let result: Result<FieldMask, _> = serde_json::from_value(json!({ "title": false }));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("title"), "error should name the bad key: {err}");
    }

    #[test]
    fn test_field_mask_serializes_to_true_leaves() {
        let mask = FieldMask::new()
            .field("title")
            .nested("meta", FieldMask::new().field("tags"));
        assert_eq!(
            serde_json::to_value(&mask).unwrap(),
            json!({ "meta": { "tags": true }, "title": true })
        );
    }

    #[test]
    fn test_field_mask_allows_dotted_paths() {
        let mask = FieldMask::new()
            .field("title")
            .nested("author", FieldMask::new().field("name"));

        assert!(mask.allows("title"));
        assert!(mask.allows("title.anything.below"));
        assert!(mask.allows("author.name"));
        assert!(!mask.allows("author"), "a nested grant does not grant the parent");
        assert!(!mask.allows("author.email"));
        assert!(!mask.allows("body"));
    }

    // ── Decision ─────────────────────────────────────────────────────────────

    #[test]
    fn test_default_deny_shape() {
        let decision = Decision::default_deny();
        assert!(!decision.allow);
        assert_eq!(decision.effect, Effect::Default);
        assert_eq!(decision.reason.as_deref(), Some("DEFAULT_DENY"));
        assert!(decision.matched_rule.is_none());
        assert!(decision.read_mask.is_none());
        assert!(decision.write_mask.is_none());
    }

    #[test]
    fn test_decision_serializes_lowercase_effect_and_skips_empty_fields() {
        let json = serde_json::to_value(Decision::default_deny()).unwrap();
        assert_eq!(
            json,
            json!({ "allow": false, "effect": "default", "reason": "DEFAULT_DENY" })
        );
    }

    // ── Tenant metadata ──────────────────────────────────────────────────────

    #[test]
    fn test_tenant_meta_parses_generator_output() {
        let meta: TenantMeta = serde_json::from_value(json!({
            "Post": {
                "tenantField": "orgId",
                "compositeSelector": "orgId_id",
                "nestedTargets": {
                    "comments": "Comment",
                    "tags": { "$default": "Tag", "connect": "TagLink" }
                }
            },
            "Comment": {}
        }))
        .unwrap();

        assert_eq!(meta.len(), 2);
        assert_eq!(meta.tenant_field("Post"), "orgId");
        assert_eq!(meta.tenant_field("Comment"), "tenantId");
        assert_eq!(meta.tenant_field("Unknown"), "tenantId");

        let post = meta.model("Post").unwrap();
        assert_eq!(post.composite_selector.as_deref(), Some("orgId_id"));
        let tags = &post.nested_targets["tags"];
        assert_eq!(tags.resolve(RelationOp::Connect), Some("TagLink"));
        assert_eq!(tags.resolve(RelationOp::Create), Some("Tag"));
        assert_eq!(
            post.nested_targets["comments"].resolve(RelationOp::Update),
            Some("Comment")
        );
    }

    #[test]
    fn test_per_operation_target_without_default_resolves_to_none() {
        let target = NestedTarget::PerOperation(
            [("create".to_string(), "Tag".to_string())].into_iter().collect(),
        );
        assert_eq!(target.resolve(RelationOp::Create), Some("Tag"));
        assert_eq!(target.resolve(RelationOp::Connect), None);
    }

    #[test]
    fn test_operation_names_round_trip_through_parse() {
        for op in WriteOperation::ALL {
            assert_eq!(WriteOperation::parse(op.as_str()), Some(op));
        }
        for op in RelationOp::ALL {
            assert_eq!(RelationOp::parse(op.as_str()), Some(op));
        }
        assert_eq!(WriteOperation::parse("findMany"), None);
        assert_eq!(RelationOp::parse("include"), None);
    }

    #[test]
    fn test_mode_policy_table() {
        assert!(GuardMode::Assist.allows_rewrite());
        assert!(!GuardMode::Assert.allows_rewrite());
        assert!(!GuardMode::Strict.allows_rewrite());

        assert!(GuardMode::Assist.requires_complete_meta(false));
        assert!(!GuardMode::Assist.requires_complete_meta(true));
        assert!(GuardMode::Assert.requires_complete_meta(false));
        assert!(GuardMode::Assert.requires_complete_meta(true));
        assert!(GuardMode::Strict.requires_complete_meta(false));
        assert!(!GuardMode::Strict.requires_complete_meta(true));
    }

    // ── Errors ───────────────────────────────────────────────────────────────

    #[test]
    fn test_guard_error_serializes_code_and_skips_absent_actual() {
        let err = GuardError::new(
            GuardErrorCode::TenantFieldMissing,
            "Post",
            "create",
            "Post.data",
            "t1",
        );
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "TENANT_FIELD_MISSING");
        assert_eq!(json["expected_tenant"], "t1");
        assert!(json.get("actual_tenant").is_none());
    }

    #[test]
    fn test_guard_error_display_includes_code_and_path() {
        let err = GuardError::new(
            GuardErrorCode::TenantMismatch,
            "Comment",
            "create",
            "Post.data.comments.create[0]",
            "t1",
        )
        .with_actual("t2");
        let msg = err.to_string();
        assert!(msg.contains("TENANT_MISMATCH"));
        assert!(msg.contains("Post.data.comments.create[0]"));
    }

    #[test]
    fn test_warden_error_wraps_guard_error() {
        let err: WardenError = GuardError::new(
            GuardErrorCode::WhereTenantMissing,
            "Post",
            "delete",
            "Post.where",
            "t1",
        )
        .into();
        assert_eq!(err.guard_code(), Some(GuardErrorCode::WhereTenantMissing));
        assert!(err.to_string().contains("WHERE_TENANT_MISSING"));
        assert_eq!(WardenError::config("bad").guard_code(), None);
    }

    #[test]
    fn test_error_config_error_display() {
        let err = WardenError::config("missing tenant id");
        let msg = err.to_string();
        assert!(msg.contains("configuration error"));
        assert!(msg.contains("missing tenant id"));
    }
}
