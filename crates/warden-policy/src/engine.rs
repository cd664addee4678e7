//! Policy engine implementation.
//!
//! `Policy` holds an ordered, immutable rule list and a default decision.
//!
//! Evaluation algorithm (`check_detailed`):
//!
//! 1. Iterate rules in declaration order, evaluating each exactly once.
//! 2. A matching deny rule returns immediately. No later rule is consulted
//!    and no mask accumulated from earlier allow rules is attached.
//! 3. The first matching allow rule becomes the base decision (its reason,
//!    matched rule, and attrs are final). Masks from every matching allow
//!    rule are merged, in encounter order.
//! 4. No allow matched → the default decision (deny, `"DEFAULT_DENY"`,
//!    effect `default` unless overridden). Otherwise the base decision with
//!    the merged masks, when any rule produced one.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use warden_contracts::decision::{Decision, Effect};

use crate::{
    evaluator::evaluate,
    mask::merge_masks,
    rule::{Rule, RuleDescriptor},
};

/// Anything that can decide an action invocation.
///
/// `Policy` is the reference implementation; the trait is the seam for
/// wrappers such as audited authorizers and for test doubles.
pub trait Authorizer<I>: Send + Sync {
    /// Produce the full decision for `action` and `input`.
    fn check_detailed(&self, action: &str, input: &I) -> Decision;

    /// Shorthand for `check_detailed(..).allow`.
    fn check(&self, action: &str, input: &I) -> bool {
        self.check_detailed(action, input).allow
    }
}

/// A factory producing the fallback decision from the action and input.
pub type DefaultFactory<I> = Arc<dyn Fn(&str, &I) -> Decision + Send + Sync>;

/// The decision returned when no allow rule matches.
pub enum DefaultDecision<I> {
    Fixed(Decision),
    Factory(DefaultFactory<I>),
}

impl<I> DefaultDecision<I> {
    fn produce(&self, action: &str, input: &I) -> Decision {
        match self {
            Self::Fixed(decision) => decision.clone(),
            Self::Factory(factory) => factory(action, input),
        }
    }
}

impl<I> Default for DefaultDecision<I> {
    fn default() -> Self {
        Self::Fixed(Decision::default_deny())
    }
}

impl<I> Clone for DefaultDecision<I> {
    fn clone(&self) -> Self {
        match self {
            Self::Fixed(decision) => Self::Fixed(decision.clone()),
            Self::Factory(factory) => Self::Factory(Arc::clone(factory)),
        }
    }
}

impl<I> fmt::Debug for DefaultDecision<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(decision) => f.debug_tuple("Fixed").field(decision).finish(),
            Self::Factory(_) => f.write_str("Factory(<fn>)"),
        }
    }
}

/// An ordered allow/deny rule set.
///
/// Build once, then share freely: a policy is never mutated after `build()`
/// and evaluation holds no state, so concurrent checks need no coordination.
///
/// ```rust,ignore
/// let policy = Policy::builder()
///     .rule(Rule::deny("post.update").id("published-locked").when(is_published))
///     .rule(Rule::allow("post.update").id("author-edit").when(is_author)
///         .write_mask(FieldMask::new().field("title")))
///     .build();
///
/// let decision = policy.check_detailed("post.update", &input);
/// ```
pub struct Policy<I> {
    rules: Vec<Rule<I>>,
    default: DefaultDecision<I>,
}

impl<I> Clone for Policy<I> {
    fn clone(&self) -> Self {
        Self {
            rules: self.rules.clone(),
            default: self.default.clone(),
        }
    }
}

impl<I> fmt::Debug for Policy<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("rules", &self.rules)
            .field("default", &self.default)
            .finish()
    }
}

impl<I> Policy<I> {
    pub fn builder() -> PolicyBuilder<I> {
        PolicyBuilder::new()
    }

    /// A policy with the built-in default decision.
    pub fn new(rules: Vec<Rule<I>>) -> Self {
        Self {
            rules,
            default: DefaultDecision::default(),
        }
    }

    /// Evaluate `action` for `input` and return the full decision.
    ///
    /// Always returns a decision. A panicking predicate unwinds to the caller.
    pub fn check_detailed(&self, action: &str, input: &I) -> Decision {
        let mut base: Option<Decision> = None;
        let mut read_mask = None;
        let mut write_mask = None;

        for rule in &self.rules {
            let Some(decision) = evaluate(rule, action, input) else {
                continue;
            };

            if decision.effect == Effect::Deny {
                debug!(
                    action,
                    rule_id = decision.matched_rule.as_deref().unwrap_or("<anonymous>"),
                    "deny rule matched"
                );
                return decision.without_masks();
            }

            debug!(
                action,
                rule_id = decision.matched_rule.as_deref().unwrap_or("<anonymous>"),
                "allow rule matched"
            );
            read_mask = merge_masks(read_mask.as_ref(), decision.read_mask.as_ref());
            write_mask = merge_masks(write_mask.as_ref(), decision.write_mask.as_ref());
            if base.is_none() {
                base = Some(decision);
            }
        }

        match base {
            None => {
                debug!(action, "no allow rule matched; applying default decision");
                self.default.produce(action, input)
            }
            Some(mut decision) => {
                if read_mask.is_some() || write_mask.is_some() {
                    decision.read_mask = read_mask;
                    decision.write_mask = write_mask;
                }
                decision
            }
        }
    }

    /// Shorthand for `check_detailed(..).allow`.
    pub fn check(&self, action: &str, input: &I) -> bool {
        self.check_detailed(action, input).allow
    }

    /// Summaries of every rule, in declaration order.
    pub fn describe(&self) -> Vec<RuleDescriptor> {
        self.rules.iter().map(Rule::descriptor).collect()
    }

    /// The rules themselves, in declaration order.
    pub fn rules(&self) -> &[Rule<I>] {
        &self.rules
    }
}

impl<I> Authorizer<I> for Policy<I> {
    fn check_detailed(&self, action: &str, input: &I) -> Decision {
        Policy::check_detailed(self, action, input)
    }
}

/// Builder for `Policy`.
pub struct PolicyBuilder<I> {
    rules: Vec<Rule<I>>,
    default: DefaultDecision<I>,
}

impl<I> PolicyBuilder<I> {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            default: DefaultDecision::default(),
        }
    }

    /// Append one rule. Order of calls is evaluation order.
    pub fn rule(mut self, rule: Rule<I>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(mut self, rules: impl IntoIterator<Item = Rule<I>>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Replace the fallback decision with a fixed value.
    pub fn default_decision(mut self, decision: Decision) -> Self {
        self.default = DefaultDecision::Fixed(decision);
        self
    }

    /// Compute the fallback decision from the action and input.
    pub fn default_with<F>(mut self, factory: F) -> Self
    where
        F: Fn(&str, &I) -> Decision + Send + Sync + 'static,
    {
        self.default = DefaultDecision::Factory(Arc::new(factory));
        self
    }

    pub fn build(self) -> Policy<I> {
        Policy {
            rules: self.rules,
            default: self.default,
        }
    }
}

impl<I> Default for PolicyBuilder<I> {
    fn default() -> Self {
        Self::new()
    }
}
