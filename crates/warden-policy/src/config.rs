//! TOML policy configuration.
//!
//! Predicates are code, so a policy file refers to them by name. The hosting
//! application registers each named predicate in a `PredicateRegistry`, then
//! builds the policy from the parsed file:
//!
//! ```toml
//! [[rules]]
//! id = "published-locked"
//! action = "post.update"
//! effect = "deny"
//! when = "is_published"
//! reason = "published posts are read-only"
//!
//! [[rules]]
//! id = "author-edit"
//! action = ["post.update", "post.publish"]
//! effect = "allow"
//! when = "is_author"
//! write_mask = { title = true, body = true }
//!
//! [default]
//! allow = false
//! reason = "NO_RULE"
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use warden_contracts::{
    decision::{Decision, Effect, DEFAULT_DENY_REASON},
    error::{WardenError, WardenResult},
    mask::FieldMask,
};

use crate::{
    engine::Policy,
    rule::{ActionSet, Match, Predicate, Rule, RuleEffect},
};

/// One rule as written in a policy file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub id: Option<String>,
    pub action: ActionSet,
    pub effect: RuleEffect,
    /// Name of a predicate registered in the `PredicateRegistry`.
    pub when: Option<String>,
    pub reason: Option<String>,
    pub read_mask: Option<FieldMask>,
    pub write_mask: Option<FieldMask>,
}

/// Override for the decision returned when no allow rule matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultConfig {
    #[serde(default)]
    pub allow: bool,
    pub reason: Option<String>,
}

/// The top-level structure of a policy file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Ordered list of rules.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    pub default: Option<DefaultConfig>,
}

impl PolicyConfig {
    /// Parse `s` as a TOML policy document.
    ///
    /// Returns `WardenError::ConfigError` if the TOML is malformed or does
    /// not match the `PolicyConfig` schema.
    pub fn from_toml_str(s: &str) -> WardenResult<Self> {
        toml::from_str(s)
            .map_err(|e| WardenError::config(format!("failed to parse policy TOML: {e}")))
    }

    /// Read the file at `path` and parse it as a TOML policy document.
    pub fn from_file(path: &Path) -> WardenResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            WardenError::config(format!(
                "failed to read policy file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Resolve predicate names against `registry` and build the policy.
    ///
    /// Returns `WardenError::ConfigError` if a rule names a predicate the
    /// registry does not hold, or lists no actions.
    pub fn build<I>(&self, registry: &PredicateRegistry<I>) -> WardenResult<Policy<I>> {
        let mut builder = Policy::builder();

        for (index, rule_config) in self.rules.iter().enumerate() {
            let label = rule_config
                .id
                .clone()
                .unwrap_or_else(|| format!("rules[{index}]"));

            if rule_config.action.as_slice().is_empty() {
                return Err(WardenError::config(format!(
                    "rule '{label}' does not list any action"
                )));
            }

            let mut rule = Rule::new(rule_config.effect, rule_config.action.clone());
            if let Some(id) = &rule_config.id {
                rule = rule.id(id.clone());
            }
            if let Some(reason) = &rule_config.reason {
                rule = rule.reason(reason.clone());
            }
            if let Some(name) = &rule_config.when {
                let predicate = registry.get(name).ok_or_else(|| {
                    WardenError::config(format!(
                        "rule '{label}' references unregistered predicate '{name}'"
                    ))
                })?;
                rule = rule.when_shared(predicate);
            }
            if let Some(mask) = &rule_config.read_mask {
                rule = rule.read_mask(mask.clone());
            }
            if let Some(mask) = &rule_config.write_mask {
                rule = rule.write_mask(mask.clone());
            }

            debug!(rule = %label, "loaded policy rule");
            builder = builder.rule(rule);
        }

        if let Some(default) = &self.default {
            let reason = default.reason.clone().unwrap_or_else(|| {
                if default.allow {
                    "DEFAULT_ALLOW".to_string()
                } else {
                    DEFAULT_DENY_REASON.to_string()
                }
            });
            builder = builder.default_decision(Decision {
                allow: default.allow,
                effect: Effect::Default,
                reason: Some(reason),
                ..Decision::default_deny()
            });
        }

        Ok(builder.build())
    }
}

/// Named predicates available to policy files.
pub struct PredicateRegistry<I> {
    predicates: HashMap<String, Predicate<I>>,
}

impl<I> PredicateRegistry<I> {
    pub fn new() -> Self {
        Self {
            predicates: HashMap::new(),
        }
    }

    /// Register `predicate` under `name`. Registering the same name twice
    /// replaces the previous predicate.
    pub fn register<F, M>(&mut self, name: impl Into<String>, predicate: F)
    where
        I: 'static,
        F: Fn(&I) -> M + Send + Sync + 'static,
        M: Into<Match>,
    {
        let predicate: Predicate<I> = Arc::new(move |input: &I| predicate(input).into());
        self.predicates.insert(name.into(), predicate);
    }

    pub fn get(&self, name: &str) -> Option<Predicate<I>> {
        self.predicates.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }
}

impl<I> Default for PredicateRegistry<I> {
    fn default() -> Self {
        Self::new()
    }
}
