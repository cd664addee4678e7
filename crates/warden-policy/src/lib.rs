//! # warden-policy
//!
//! An ordered, deny-wins, default-deny policy engine with field-mask merging.
//!
//! ## Overview
//!
//! A [`Policy`] is an immutable list of [`Rule`]s. Each rule applies to one
//! or more action names, has an allow or deny effect, and may carry a `when`
//! predicate plus read/write field masks. Evaluating an action:
//!
//! - any matching deny rule wins immediately,
//! - the first matching allow rule supplies the reason and attrs,
//! - masks from every matching allow rule are merged (deep union),
//! - with no match, the default decision applies (`DEFAULT_DENY`).
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use warden_policy::{Policy, Rule};
//! use warden_contracts::{ActionInput, FieldMask};
//!
//! let policy = Policy::builder()
//!     .rule(Rule::allow("post.update").id("author-edit")
//!         .when(|s: &ActionInput| s.subject["id"] == s.resource.as_ref().unwrap()["authorId"])
//!         .write_mask(FieldMask::new().field("title")))
//!     .build();
//!
//! let decision = policy.check_detailed("post.update", &input);
//! ```
//!
//! Policies can also be declared in TOML; see [`config`].

pub mod config;
pub mod engine;
pub mod evaluator;
pub mod mask;
pub mod rule;

pub use config::{PolicyConfig, PredicateRegistry, RuleConfig};
pub use engine::{Authorizer, DefaultDecision, Policy, PolicyBuilder};
pub use evaluator::evaluate;
pub use mask::merge_masks;
pub use rule::{ActionSet, Match, MatchDetails, Rule, RuleDescriptor, RuleEffect};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::{json, Value};
    use warden_contracts::{ActionInput, Decision, Effect, FieldMask};

    use crate::{
        rule::MaskDescriptor, Authorizer, MatchDetails, Policy, PolicyConfig, PredicateRegistry,
        Rule,
    };

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn input(subject: Value, resource: Value) -> ActionInput {
        ActionInput::new(subject).resource(resource)
    }

    fn resource_field<'a>(s: &'a ActionInput, key: &str) -> Option<&'a Value> {
        s.resource.as_ref().and_then(|r| r.get(key))
    }

    /// The two-rule blog policy: published posts are locked, authors may
    /// edit titles of their own drafts.
    fn blog_policy() -> Policy<ActionInput> {
        Policy::builder()
            .rule(
                Rule::deny("post.update")
                    .id("published-locked")
                    .when(|s: &ActionInput| {
                        resource_field(s, "status") == Some(&json!("published"))
                    }),
            )
            .rule(
                Rule::allow("post.update")
                    .id("author-edit")
                    .when(|s: &ActionInput| {
                        s.subject.get("id").is_some()
                            && s.subject.get("id") == resource_field(s, "authorId")
                    })
                    .write_mask(FieldMask::new().field("title")),
            )
            .build()
    }

    // ── 1. end-to-end ─────────────────────────────────────────────────────────

    #[test]
    fn test_author_may_edit_draft_title() {
        let decision = blog_policy().check_detailed(
            "post.update",
            &input(json!({ "id": "u1" }), json!({ "authorId": "u1", "status": "draft" })),
        );

        assert!(decision.allow);
        assert_eq!(decision.effect, Effect::Allow);
        assert_eq!(decision.matched_rule.as_deref(), Some("author-edit"));
        assert_eq!(decision.write_mask, Some(FieldMask::new().field("title")));
    }

    #[test]
    fn test_published_post_is_locked() {
        let decision = blog_policy().check_detailed(
            "post.update",
            &input(json!({ "id": "u1" }), json!({ "authorId": "u1", "status": "published" })),
        );

        assert!(!decision.allow);
        assert_eq!(decision.effect, Effect::Deny);
        assert_eq!(decision.matched_rule.as_deref(), Some("published-locked"));
    }

    // ── 2. deny wins regardless of order ──────────────────────────────────────

    #[test]
    fn test_deny_wins_regardless_of_declaration_order() {
        let allow = Rule::allow("doc.read").id("allow-all");
        let deny = Rule::deny("doc.read").id("deny-all");
        let subject = input(json!({}), json!({}));

        let deny_last: Policy<ActionInput> = Policy::new(vec![allow.clone(), deny.clone()]);
        let deny_first: Policy<ActionInput> = Policy::new(vec![deny, allow]);

        for policy in [deny_last, deny_first] {
            let decision = policy.check_detailed("doc.read", &subject);
            assert!(!decision.allow);
            assert_eq!(decision.matched_rule.as_deref(), Some("deny-all"));
        }
    }

    #[test]
    fn test_deny_short_circuits_later_rules() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let policy = Policy::builder()
            .rule(Rule::deny("doc.read").id("stop"))
            .rule(Rule::allow("doc.read").when(move |_: &ActionInput| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }))
            .build();

        assert!(!policy.check("doc.read", &input(json!({}), json!({}))));
        assert_eq!(calls.load(Ordering::SeqCst), 0, "rules after a deny must not run");
    }

    // ── 3. default deny ───────────────────────────────────────────────────────

    #[test]
    fn test_default_deny_when_nothing_matches() {
        let decision = blog_policy().check_detailed("post.delete", &input(json!({}), json!({})));
        assert_eq!(decision, Decision::default_deny());
        assert!(decision.matched_rule.is_none());
    }

    #[test]
    fn test_silent_deny_rule_does_not_grant_access() {
        let policy = Policy::builder()
            .rule(Rule::deny("doc.read").when(|_: &ActionInput| false))
            .build();
        let decision = policy.check_detailed("doc.read", &input(json!({}), json!({})));
        assert_eq!(decision.effect, Effect::Default);
        assert!(!decision.allow);
    }

    #[test]
    fn test_custom_default_factory_sees_action() {
        let policy: Policy<ActionInput> = Policy::builder()
            .default_with(|action: &str, _: &ActionInput| Decision {
                reason: Some(format!("no rule for {action}")),
                ..Decision::default_deny()
            })
            .build();

        let decision = policy.check_detailed("doc.read", &input(json!({}), json!({})));
        assert_eq!(decision.reason.as_deref(), Some("no rule for doc.read"));
        assert_eq!(decision.effect, Effect::Default);
    }

    // ── 4. masks ──────────────────────────────────────────────────────────────

    #[test]
    fn test_masks_accumulate_across_allow_rules() {
        let policy = Policy::builder()
            .rule(
                Rule::allow("profile.update")
                    .id("owner")
                    .reason("owner fields")
                    .write_mask(FieldMask::new().field("name")),
            )
            .rule(
                Rule::allow("profile.update")
                    .id("admin-flag")
                    .reason("admin fields")
                    .write_mask(FieldMask::new().field("role")),
            )
            .build();

        let decision = policy.check_detailed("profile.update", &input(json!({}), json!({})));
        assert_eq!(
            decision.write_mask,
            Some(FieldMask::new().field("name").field("role"))
        );
        // Metadata comes from the first allow only.
        assert_eq!(decision.matched_rule.as_deref(), Some("owner"));
        assert_eq!(decision.reason.as_deref(), Some("owner fields"));
    }

    #[test]
    fn test_deny_after_allows_carries_no_masks() {
        let policy = Policy::builder()
            .rule(Rule::allow("doc.read").read_mask(FieldMask::new().field("a")))
            .rule(Rule::allow("doc.read").write_mask(FieldMask::new().field("b")))
            .rule(Rule::deny("doc.read").id("late-deny"))
            .build();

        let decision = policy.check_detailed("doc.read", &input(json!({}), json!({})));
        assert!(!decision.allow);
        assert_eq!(decision.matched_rule.as_deref(), Some("late-deny"));
        assert!(decision.read_mask.is_none());
        assert!(decision.write_mask.is_none());
    }

    #[test]
    fn test_later_allow_attrs_are_dropped_but_masks_kept() {
        let policy = Policy::builder()
            .rule(Rule::allow("doc.read").id("first").when(|_: &ActionInput| {
                MatchDetails::new().attr("source", "first")
            }))
            .rule(Rule::allow("doc.read").id("second").when(|_: &ActionInput| {
                MatchDetails::new()
                    .attr("source", "second")
                    .read_mask(FieldMask::new().field("secret"))
            }))
            .build();

        let decision = policy.check_detailed("doc.read", &input(json!({}), json!({})));
        assert_eq!(decision.attr("source"), Some(&json!("first")));
        assert_eq!(decision.read_mask, Some(FieldMask::new().field("secret")));
    }

    #[test]
    fn test_maskless_allow_stays_maskless() {
        let policy: Policy<ActionInput> = Policy::new(vec![Rule::allow("doc.read")]);
        let decision = policy.check_detailed("doc.read", &input(json!({}), json!({})));
        assert!(decision.allow);
        assert!(decision.read_mask.is_none());
        assert!(decision.write_mask.is_none());
    }

    // ── 5. describe / trait ───────────────────────────────────────────────────

    #[test]
    fn test_describe_lists_rules_in_order() {
        let descriptors = blog_policy().describe();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].id.as_deref(), Some("published-locked"));
        assert!(descriptors[0].conditional);
        assert_eq!(descriptors[0].write_mask, MaskDescriptor::None);
        assert_eq!(
            descriptors[1].write_mask,
            MaskDescriptor::Static(FieldMask::new().field("title"))
        );
        assert_eq!(descriptors[1].actions, vec!["post.update".to_string()]);
    }

    #[test]
    fn test_policy_is_usable_as_authorizer() {
        fn allowed(authz: &dyn Authorizer<ActionInput>, subject: &ActionInput) -> bool {
            authz.check("post.update", subject)
        }

        let policy = blog_policy();
        let draft = input(json!({ "id": "u1" }), json!({ "authorId": "u1", "status": "draft" }));
        let foreign = input(json!({ "id": "u2" }), json!({ "authorId": "u1", "status": "draft" }));
        assert!(allowed(&policy, &draft));
        assert!(!allowed(&policy, &foreign));
    }

    // ── 6. TOML configuration ─────────────────────────────────────────────────

    fn registry() -> PredicateRegistry<ActionInput> {
        let mut registry = PredicateRegistry::new();
        registry.register("is_published", |s: &ActionInput| {
            resource_field(s, "status") == Some(&json!("published"))
        });
        registry.register("is_author", |s: &ActionInput| {
            s.subject.get("id") == resource_field(s, "authorId")
        });
        registry
    }

    #[test]
    fn test_toml_policy_matches_builder_policy() {
        let toml = r#"
            [[rules]]
            id = "published-locked"
            action = "post.update"
            effect = "deny"
            when = "is_published"
            reason = "published posts are read-only"

            [[rules]]
            id = "author-edit"
            action = ["post.update", "post.publish"]
            effect = "allow"
            when = "is_author"
            write_mask = { title = true, meta = { tags = true } }
        "#;

        let policy = PolicyConfig::from_toml_str(toml)
            .unwrap()
            .build(&registry())
            .unwrap();

        let draft = input(json!({ "id": "u1" }), json!({ "authorId": "u1", "status": "draft" }));
        let decision = policy.check_detailed("post.publish", &draft);
        assert!(decision.allow);
        assert_eq!(
            decision.write_mask,
            Some(
                FieldMask::new()
                    .field("title")
                    .nested("meta", FieldMask::new().field("tags"))
            )
        );

        let published =
            input(json!({ "id": "u1" }), json!({ "authorId": "u1", "status": "published" }));
        let denied = policy.check_detailed("post.update", &published);
        assert_eq!(denied.reason.as_deref(), Some("published posts are read-only"));
    }

    #[test]
    fn test_toml_default_override() {
        let toml = r#"
            rules = []

            [default]
            reason = "NO_RULE"
        "#;
        let policy = PolicyConfig::from_toml_str(toml)
            .unwrap()
            .build(&registry())
            .unwrap();
        let decision = policy.check_detailed("anything", &input(json!({}), json!({})));
        assert!(!decision.allow);
        assert_eq!(decision.effect, Effect::Default);
        assert_eq!(decision.reason.as_deref(), Some("NO_RULE"));
    }

    #[test]
    fn test_unregistered_predicate_is_config_error() {
        let toml = r#"
            [[rules]]
            id = "mystery"
            action = "doc.read"
            effect = "allow"
            when = "not_registered"
        "#;

        let result = PolicyConfig::from_toml_str(toml).unwrap().build(&registry());
        match result {
            Err(warden_contracts::WardenError::ConfigError { reason }) => {
                assert!(reason.contains("not_registered"), "unexpected reason: {reason}");
            }
            other => panic!("expected ConfigError, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_toml_parse_error() {
        let result = PolicyConfig::from_toml_str("this is not valid toml ][[[");
        match result {
            Err(warden_contracts::WardenError::ConfigError { reason }) => {
                assert!(reason.contains("failed to parse policy TOML"));
            }
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }
}
