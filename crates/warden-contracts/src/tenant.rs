//! Tenant-isolation metadata, modes, operations, and warnings.
//!
//! `TenantMeta` is produced by schema introspection outside Warden and
//! supplied as plain data. It uses the camelCase JSON layout emitted by the
//! generator:
//!
//! ```json
//! {
//!   "Post": {
//!     "tenantField": "tenantId",
//!     "compositeSelector": "tenantId_id",
//!     "nestedTargets": {
//!       "comments": "Comment",
//!       "tags": { "$default": "Tag", "connect": "TagLink" }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Tenant field name assumed when a model's metadata does not set one.
pub const DEFAULT_TENANT_FIELD: &str = "tenantId";

/// Key of the fallback entry in a per-operation target map.
pub const DEFAULT_TARGET_KEY: &str = "$default";

// ── Modes ─────────────────────────────────────────────────────────────────────

/// How the guard reacts to payloads that are not explicitly tenant-scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardMode {
    /// Inject missing tenant fields and where-scoping, reporting each injection.
    /// Undescribed relations are rejected unless RLS backs the guard.
    #[default]
    Assist,
    /// Never rewrite; every relation must be described by metadata.
    Assert,
    /// Never rewrite; relations must be described unless RLS backs the guard.
    Strict,
}

impl GuardMode {
    /// Return true if missing tenant scoping may be filled in silently.
    pub fn allows_rewrite(&self) -> bool {
        matches!(self, Self::Assist)
    }

    /// Return true if relation-shaped payload keys absent from the metadata
    /// are rejected. Assist matches strict here: injection cannot scope a
    /// relation whose target model is unknown.
    pub fn requires_complete_meta(&self, rls_enabled: bool) -> bool {
        match self {
            Self::Assert => true,
            Self::Assist | Self::Strict => !rls_enabled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assist => "assist",
            Self::Assert => "assert",
            Self::Strict => "strict",
        }
    }
}

impl fmt::Display for GuardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Operations ────────────────────────────────────────────────────────────────

/// Top-level write operations the guard intercepts. Reads pass through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOperation {
    Create,
    CreateMany,
    Update,
    UpdateMany,
    Upsert,
    Delete,
    DeleteMany,
}

impl WriteOperation {
    pub const ALL: [WriteOperation; 7] = [
        Self::Create,
        Self::CreateMany,
        Self::Update,
        Self::UpdateMany,
        Self::Upsert,
        Self::Delete,
        Self::DeleteMany,
    ];

    /// Parse an ORM operation name. Returns `None` for reads and anything
    /// else the guard does not intercept.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::CreateMany => "createMany",
            Self::Update => "update",
            Self::UpdateMany => "updateMany",
            Self::Upsert => "upsert",
            Self::Delete => "delete",
            Self::DeleteMany => "deleteMany",
        }
    }
}

/// Operations that may appear under a relation field of a write payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationOp {
    Create,
    CreateMany,
    Connect,
    ConnectOrCreate,
    Update,
    UpdateMany,
    Upsert,
    Set,
    Disconnect,
    Delete,
    DeleteMany,
}

impl RelationOp {
    /// Every relation operation, in the order the guard processes them.
    pub const ALL: [RelationOp; 11] = [
        Self::Create,
        Self::CreateMany,
        Self::Connect,
        Self::ConnectOrCreate,
        Self::Update,
        Self::UpdateMany,
        Self::Upsert,
        Self::Set,
        Self::Disconnect,
        Self::Delete,
        Self::DeleteMany,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::CreateMany => "createMany",
            Self::Connect => "connect",
            Self::ConnectOrCreate => "connectOrCreate",
            Self::Update => "update",
            Self::UpdateMany => "updateMany",
            Self::Upsert => "upsert",
            Self::Set => "set",
            Self::Disconnect => "disconnect",
            Self::Delete => "delete",
            Self::DeleteMany => "deleteMany",
        }
    }
}

// ── Metadata ──────────────────────────────────────────────────────────────────

/// Where a relation field points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NestedTarget {
    /// Every operation on the relation targets this model.
    Model(String),
    /// Per-operation targets keyed by operation name, with an optional
    /// `$default` fallback.
    PerOperation(BTreeMap<String, String>),
}

impl NestedTarget {
    /// Resolve the target model for `op`: operation override, then
    /// `$default`. Returns `None` when neither is set.
    pub fn resolve(&self, op: RelationOp) -> Option<&str> {
        match self {
            Self::Model(model) => Some(model.as_str()),
            Self::PerOperation(map) => map
                .get(op.as_str())
                .or_else(|| map.get(DEFAULT_TARGET_KEY))
                .map(String::as_str),
        }
    }
}

/// Schema facts about one model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMeta {
    /// Name of the tenant key column. Defaults to `"tenantId"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_field: Option<String>,
    /// Name of the composite unique key combining tenant and primary key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite_selector: Option<String>,
    /// Relation field name → target model.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nested_targets: BTreeMap<String, NestedTarget>,
}

impl ModelMeta {
    pub fn tenant_field(&self) -> &str {
        self.tenant_field.as_deref().unwrap_or(DEFAULT_TENANT_FIELD)
    }
}

/// Model name → `ModelMeta`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantMeta {
    models: BTreeMap<String, ModelMeta>,
}

impl TenantMeta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the metadata for `model`.
    pub fn with_model(mut self, model: impl Into<String>, meta: ModelMeta) -> Self {
        self.models.insert(model.into(), meta);
        self
    }

    pub fn model(&self, model: &str) -> Option<&ModelMeta> {
        self.models.get(model)
    }

    /// The tenant field for `model`, falling back to `"tenantId"` for models
    /// the metadata does not mention.
    pub fn tenant_field<'a>(&'a self, model: &str) -> &'a str {
        self.models
            .get(model)
            .map(ModelMeta::tenant_field)
            .unwrap_or(DEFAULT_TENANT_FIELD)
    }

    pub fn models(&self) -> impl Iterator<Item = (&String, &ModelMeta)> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

// ── Warnings ──────────────────────────────────────────────────────────────────

/// Why the guard rewrote a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    /// A tenant field was injected into a row being written.
    InjectTenantField,
    /// Tenant scoping was injected into a where clause or selector.
    InjectTenantWhere,
}

impl fmt::Display for WarningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InjectTenantField => "INJECT_TENANT_FIELD",
            Self::InjectTenantWhere => "INJECT_TENANT_WHERE",
        })
    }
}

/// Telemetry emitted each time the guard auto-injects tenant scoping.
///
/// Injection is not an error; a high rate suggests client code should be
/// more explicit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardWarning {
    pub code: WarningCode,
    pub model: String,
    pub operation: String,
    pub path: String,
}
