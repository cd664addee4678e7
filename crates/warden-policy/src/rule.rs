//! Rule types.
//!
//! A `Rule` is one allow or deny clause. It applies to one or more action
//! names, optionally guarded by a `when` predicate, and may contribute read
//! and write masks either statically or computed from the input.
//!
//! Predicates return a `Match` rather than overloading on the returned type:
//! a closure returning `bool` converts via `From<bool>`, and a closure that
//! wants to supply a reason, attributes, or masks returns `MatchDetails`.
//!
//! Rules are immutable once a policy is built; cloning a rule clones handles
//! to the same predicate and mask functions.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use warden_contracts::{decision::Effect, mask::FieldMask};

/// The effect a rule produces when it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleEffect {
    Allow,
    Deny,
}

impl From<RuleEffect> for Effect {
    fn from(effect: RuleEffect) -> Self {
        match effect {
            RuleEffect::Allow => Effect::Allow,
            RuleEffect::Deny => Effect::Deny,
        }
    }
}

// ── Action sets ───────────────────────────────────────────────────────────────

/// The action names a rule applies to.
///
/// Written in TOML either as a single string or as a list:
/// ```toml
/// action = "post.update"
/// action = ["post.update", "post.publish"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ActionSetRepr")]
pub struct ActionSet(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum ActionSetRepr {
    One(String),
    Many(Vec<String>),
}

impl From<ActionSetRepr> for ActionSet {
    fn from(repr: ActionSetRepr) -> Self {
        match repr {
            ActionSetRepr::One(action) => Self(vec![action]),
            ActionSetRepr::Many(actions) => Self(actions),
        }
    }
}

impl ActionSet {
    pub fn contains(&self, action: &str) -> bool {
        self.0.iter().any(|a| a == action)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for ActionSet {
    fn from(action: &str) -> Self {
        Self(vec![action.to_string()])
    }
}

impl From<String> for ActionSet {
    fn from(action: String) -> Self {
        Self(vec![action])
    }
}

impl From<Vec<String>> for ActionSet {
    fn from(actions: Vec<String>) -> Self {
        Self(actions)
    }
}

impl From<Vec<&str>> for ActionSet {
    fn from(actions: Vec<&str>) -> Self {
        Self(actions.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ActionSet {
    fn from(actions: [&str; N]) -> Self {
        Self(actions.iter().map(|a| a.to_string()).collect())
    }
}

// ── Predicate results ─────────────────────────────────────────────────────────

/// Extra information a matching predicate can attach to the decision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchDetails {
    /// Overrides the rule's static reason.
    pub reason: Option<String>,
    pub attrs: Option<Map<String, Value>>,
    /// Merge base for the rule's own read mask.
    pub read_mask: Option<FieldMask>,
    /// Merge base for the rule's own write mask.
    pub write_mask: Option<FieldMask>,
}

impl MatchDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Add one attribute.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn read_mask(mut self, mask: FieldMask) -> Self {
        self.read_mask = Some(mask);
        self
    }

    pub fn write_mask(mut self, mask: FieldMask) -> Self {
        self.write_mask = Some(mask);
        self
    }
}

/// The outcome of a rule predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Match {
    /// The rule is silent for this input. For a deny rule this does not grant
    /// anything; it only means this rule does not apply.
    NotMatched,
    Matched(MatchDetails),
}

impl From<bool> for Match {
    fn from(matched: bool) -> Self {
        if matched {
            Self::Matched(MatchDetails::default())
        } else {
            Self::NotMatched
        }
    }
}

impl From<MatchDetails> for Match {
    fn from(details: MatchDetails) -> Self {
        Self::Matched(details)
    }
}

impl From<Option<MatchDetails>> for Match {
    fn from(details: Option<MatchDetails>) -> Self {
        details.map_or(Self::NotMatched, Self::Matched)
    }
}

/// A shared rule predicate.
pub type Predicate<I> = Arc<dyn Fn(&I) -> Match + Send + Sync>;

/// A shared mask function.
pub type MaskFn<I> = Arc<dyn Fn(&I) -> Option<FieldMask> + Send + Sync>;

/// A rule-level mask: fixed, or computed from the input.
pub enum MaskSource<I> {
    Static(FieldMask),
    Computed(MaskFn<I>),
}

impl<I> MaskSource<I> {
    /// Produce the mask for `input`.
    pub fn resolve(&self, input: &I) -> Option<FieldMask> {
        match self {
            Self::Static(mask) => Some(mask.clone()),
            Self::Computed(f) => f(input),
        }
    }
}

impl<I> Clone for MaskSource<I> {
    fn clone(&self) -> Self {
        match self {
            Self::Static(mask) => Self::Static(mask.clone()),
            Self::Computed(f) => Self::Computed(Arc::clone(f)),
        }
    }
}

impl<I> fmt::Debug for MaskSource<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(mask) => f.debug_tuple("Static").field(mask).finish(),
            Self::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

// ── Rules ─────────────────────────────────────────────────────────────────────

/// One allow/deny clause of a policy.
///
/// ```rust,ignore
/// let rule = Rule::allow("post.update")
///     .id("author-can-edit")
///     .when(|input: &ActionInput| input.subject["id"] == input.resource.as_ref().unwrap()["authorId"])
///     .write_mask(FieldMask::new().field("title"));
/// ```
pub struct Rule<I> {
    pub(crate) id: Option<String>,
    pub(crate) actions: ActionSet,
    pub(crate) effect: RuleEffect,
    pub(crate) when: Option<Predicate<I>>,
    pub(crate) reason: Option<String>,
    pub(crate) read_mask: Option<MaskSource<I>>,
    pub(crate) write_mask: Option<MaskSource<I>>,
}

impl<I> Rule<I> {
    /// A rule with the given effect and no predicate (matches unconditionally).
    pub fn new(effect: RuleEffect, actions: impl Into<ActionSet>) -> Self {
        Self {
            id: None,
            actions: actions.into(),
            effect,
            when: None,
            reason: None,
            read_mask: None,
            write_mask: None,
        }
    }

    pub fn allow(actions: impl Into<ActionSet>) -> Self {
        Self::new(RuleEffect::Allow, actions)
    }

    pub fn deny(actions: impl Into<ActionSet>) -> Self {
        Self::new(RuleEffect::Deny, actions)
    }

    /// Stable identifier reported as `matched_rule` in decisions.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Static reason, used unless the predicate supplies one.
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Guard the rule with a predicate returning `bool`, `MatchDetails`,
    /// `Option<MatchDetails>`, or `Match`.
    pub fn when<F, M>(mut self, predicate: F) -> Self
    where
        I: 'static,
        F: Fn(&I) -> M + Send + Sync + 'static,
        M: Into<Match>,
    {
        self.when = Some(Arc::new(move |input: &I| predicate(input).into()));
        self
    }

    /// Guard the rule with an already-shared predicate.
    pub fn when_shared(mut self, predicate: Predicate<I>) -> Self {
        self.when = Some(predicate);
        self
    }

    pub fn read_mask(mut self, mask: FieldMask) -> Self {
        self.read_mask = Some(MaskSource::Static(mask));
        self
    }

    pub fn read_mask_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&I) -> Option<FieldMask> + Send + Sync + 'static,
    {
        self.read_mask = Some(MaskSource::Computed(Arc::new(f)));
        self
    }

    pub fn write_mask(mut self, mask: FieldMask) -> Self {
        self.write_mask = Some(MaskSource::Static(mask));
        self
    }

    pub fn write_mask_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&I) -> Option<FieldMask> + Send + Sync + 'static,
    {
        self.write_mask = Some(MaskSource::Computed(Arc::new(f)));
        self
    }

    pub fn rule_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn effect(&self) -> RuleEffect {
        self.effect
    }

    pub fn actions(&self) -> &ActionSet {
        &self.actions
    }

    /// Return true if this rule is declared for `action`.
    pub fn applies_to(&self, action: &str) -> bool {
        self.actions.contains(action)
    }

    /// A serializable summary of this rule for tooling and audits.
    pub fn descriptor(&self) -> RuleDescriptor {
        RuleDescriptor {
            id: self.id.clone(),
            actions: self.actions.as_slice().to_vec(),
            effect: self.effect,
            reason: self.reason.clone(),
            conditional: self.when.is_some(),
            read_mask: describe_mask(self.read_mask.as_ref()),
            write_mask: describe_mask(self.write_mask.as_ref()),
        }
    }
}

fn describe_mask<I>(source: Option<&MaskSource<I>>) -> MaskDescriptor {
    match source {
        None => MaskDescriptor::None,
        Some(MaskSource::Static(mask)) => MaskDescriptor::Static(mask.clone()),
        Some(MaskSource::Computed(_)) => MaskDescriptor::Computed,
    }
}

impl<I> Clone for Rule<I> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            actions: self.actions.clone(),
            effect: self.effect,
            when: self.when.clone(),
            reason: self.reason.clone(),
            read_mask: self.read_mask.clone(),
            write_mask: self.write_mask.clone(),
        }
    }
}

impl<I> fmt::Debug for Rule<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("actions", &self.actions)
            .field("effect", &self.effect)
            .field("when", &self.when.as_ref().map(|_| "<fn>"))
            .field("reason", &self.reason)
            .field("read_mask", &self.read_mask)
            .field("write_mask", &self.write_mask)
            .finish()
    }
}

/// Read-only view of a rule, as returned by `Policy::describe`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleDescriptor {
    pub id: Option<String>,
    pub actions: Vec<String>,
    pub effect: RuleEffect,
    pub reason: Option<String>,
    /// Whether the rule has a `when` predicate.
    pub conditional: bool,
    pub read_mask: MaskDescriptor,
    pub write_mask: MaskDescriptor,
}

/// How a rule contributes a mask.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "mask")]
pub enum MaskDescriptor {
    None,
    Static(FieldMask),
    Computed,
}
