//! Decision and effect types.
//!
//! The policy engine evaluates an action input and produces a `Decision`.
//! Warden is deny-by-default: when no rule matches, the decision carries
//! `Effect::Default` and `allow = false`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::mask::FieldMask;

/// Reason attached to the built-in default decision.
pub const DEFAULT_DENY_REASON: &str = "DEFAULT_DENY";

/// Which kind of outcome produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// An allow rule matched.
    Allow,
    /// A deny rule matched.
    Deny,
    /// No rule matched; the policy's default decision applied.
    Default,
}

/// The result of checking one action input against a policy.
///
/// Decisions are plain values built fresh per evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the action is permitted.
    pub allow: bool,
    pub effect: Effect,
    /// Explanation for audit logs. Predicate-supplied reasons override the
    /// rule's static reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Id of the rule that produced this decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<String>,
    /// Free-form attributes returned by the matching predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Map<String, Value>>,
    /// Fields the subject may read, merged across every matching allow rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_mask: Option<FieldMask>,
    /// Fields the subject may write, merged across every matching allow rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_mask: Option<FieldMask>,
}

impl Decision {
    /// The built-in default: deny with reason `"DEFAULT_DENY"`.
    pub fn default_deny() -> Self {
        Self {
            allow: false,
            effect: Effect::Default,
            reason: Some(DEFAULT_DENY_REASON.to_string()),
            matched_rule: None,
            attrs: None,
            read_mask: None,
            write_mask: None,
        }
    }

    /// Drop both masks. A denied decision grants no fields.
    pub fn without_masks(mut self) -> Self {
        self.read_mask = None;
        self.write_mask = None;
        self
    }

    /// Look up one predicate-supplied attribute.
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.as_ref().and_then(|attrs| attrs.get(key))
    }
}
