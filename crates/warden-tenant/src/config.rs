//! Guard configuration.
//!
//! A guard can be configured in code or loaded from a TOML or JSON file:
//!
//! ```toml
//! tenantId = "acme"
//! mode = "strict"
//!
//! [rls]
//! enabled = true
//! varName = "app.tenant_id"
//!
//! [meta.Post]
//! tenantField = "tenantId"
//! compositeSelector = "tenantId_id"
//! nestedTargets = { comments = "Comment", tags = { connect = "Tag", "$default" = "Tag" } }
//!
//! [meta.Comment]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use warden_contracts::{
    error::{WardenError, WardenResult},
    tenant::{GuardMode, NestedTarget, RelationOp, TenantMeta, DEFAULT_TARGET_KEY},
};

/// Session variable set by the RLS helper unless configured otherwise.
pub const DEFAULT_RLS_VAR: &str = "app.tenant_id";

fn default_var_name() -> String {
    DEFAULT_RLS_VAR.to_string()
}

/// Whether database row-level security backs the guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RlsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_var_name")]
    pub var_name: String,
}

impl Default for RlsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            var_name: default_var_name(),
        }
    }
}

/// Everything a `TenantGuard` needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardConfig {
    pub tenant_id: String,
    #[serde(default)]
    pub mode: GuardMode,
    #[serde(default)]
    pub meta: TenantMeta,
    #[serde(default)]
    pub rls: RlsConfig,
}

impl GuardConfig {
    /// Assist mode, empty metadata, RLS off.
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            mode: GuardMode::default(),
            meta: TenantMeta::default(),
            rls: RlsConfig::default(),
        }
    }

    pub fn mode(mut self, mode: GuardMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn meta(mut self, meta: TenantMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn rls_enabled(mut self, enabled: bool) -> Self {
        self.rls.enabled = enabled;
        self
    }

    pub fn rls_var_name(mut self, var_name: impl Into<String>) -> Self {
        self.rls.var_name = var_name.into();
        self
    }

    pub fn from_toml_str(s: &str) -> WardenResult<Self> {
        toml::from_str(s)
            .map_err(|e| WardenError::config(format!("failed to parse guard TOML: {e}")))
    }

    pub fn from_json_str(s: &str) -> WardenResult<Self> {
        serde_json::from_str(s)
            .map_err(|e| WardenError::config(format!("failed to parse guard JSON: {e}")))
    }

    /// Load from `path`; `.json` files are parsed as JSON, anything else as TOML.
    pub fn from_file(path: &Path) -> WardenResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            WardenError::config(format!(
                "failed to read guard config '{}': {}",
                path.display(),
                e
            ))
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        debug!(path = %path.display(), json = is_json, "loading guard config");
        if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_toml_str(&contents)
        }
    }

    /// Reject configurations the walker cannot enforce.
    pub fn validate(&self) -> WardenResult<()> {
        if self.tenant_id.trim().is_empty() {
            return Err(WardenError::config("tenant id must not be empty"));
        }
        if self.rls.enabled && self.rls.var_name.trim().is_empty() {
            return Err(WardenError::config(
                "rls.varName must not be empty when RLS is enabled",
            ));
        }

        for (model, meta) in self.meta.models() {
            if meta.tenant_field.as_deref().is_some_and(str::is_empty) {
                return Err(WardenError::config(format!(
                    "model '{model}' declares an empty tenantField"
                )));
            }
            if meta.composite_selector.as_deref().is_some_and(str::is_empty) {
                return Err(WardenError::config(format!(
                    "model '{model}' declares an empty compositeSelector"
                )));
            }
            for (relation, target) in &meta.nested_targets {
                validate_target(model, relation, target)?;
            }
        }
        Ok(())
    }
}

fn validate_target(model: &str, relation: &str, target: &NestedTarget) -> WardenResult<()> {
    match target {
        NestedTarget::Model(name) if name.is_empty() => Err(WardenError::config(format!(
            "relation '{model}.{relation}' targets an empty model name"
        ))),
        NestedTarget::Model(_) => Ok(()),
        NestedTarget::PerOperation(targets) => {
            if targets.is_empty() {
                return Err(WardenError::config(format!(
                    "relation '{model}.{relation}' has an empty target map"
                )));
            }
            for (key, name) in targets {
                if key != DEFAULT_TARGET_KEY && RelationOp::parse(key).is_none() {
                    return Err(WardenError::config(format!(
                        "relation '{model}.{relation}' maps unknown operation '{key}'"
                    )));
                }
                if name.is_empty() {
                    return Err(WardenError::config(format!(
                        "relation '{model}.{relation}' maps '{key}' to an empty model name"
                    )));
                }
            }
            Ok(())
        }
    }
}
