//! Single-rule evaluation.
//!
//! `evaluate` decides whether one rule applies to an action invocation and,
//! if so, builds the partial decision the rule contributes:
//!
//! 1. The action must be in the rule's action set.
//! 2. A rule without a predicate matches unconditionally.
//! 3. `Match::NotMatched` means the rule is silent.
//! 4. `Match::Matched(details)` builds a decision; the predicate's reason and
//!    attrs take precedence over the rule's static reason.
//! 5. Masks: the predicate's mask is the merge base and the rule's own
//!    static-or-computed mask is merged on top.

use warden_contracts::decision::Decision;

use crate::{
    mask::merge_masks,
    rule::{Match, MatchDetails, Rule, RuleEffect},
};

/// Evaluate `rule` for `action` and `input`.
///
/// Returns `None` when the rule does not apply. Pure apart from whatever the
/// caller's predicate and mask functions do.
pub fn evaluate<I>(rule: &Rule<I>, action: &str, input: &I) -> Option<Decision> {
    if !rule.applies_to(action) {
        return None;
    }

    let details = match &rule.when {
        None => MatchDetails::default(),
        Some(predicate) => match predicate(input) {
            Match::NotMatched => return None,
            Match::Matched(details) => details,
        },
    };

    let rule_read = rule.read_mask.as_ref().and_then(|m| m.resolve(input));
    let rule_write = rule.write_mask.as_ref().and_then(|m| m.resolve(input));

    Some(Decision {
        allow: rule.effect == RuleEffect::Allow,
        effect: rule.effect.into(),
        reason: details.reason.or_else(|| rule.reason.clone()),
        matched_rule: rule.id.clone(),
        attrs: details.attrs,
        read_mask: merge_masks(details.read_mask.as_ref(), rule_read.as_ref()),
        write_mask: merge_masks(details.write_mask.as_ref(), rule_write.as_ref()),
    })
}
