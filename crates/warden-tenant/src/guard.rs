//! The tenant-isolation payload walker.
//!
//! `TenantGuard::enforce` inspects one mutation call before it reaches the
//! store and either scopes it to the configured tenant (rewriting the payload
//! in place when the mode allows) or rejects it with a `GuardError` whose
//! `path` pinpoints the offending record.
//!
//! Walk order per call:
//!
//! 1. Reads and unknown operations pass through untouched.
//! 2. Top-level `where` clauses are scoped (`update*`, `upsert`, `delete*`).
//! 3. Rows being written (`data`, `create`, `update`) are checked for the
//!    tenant field: new rows must carry it, existing rows may omit it, and a
//!    present value must always equal the tenant.
//! 4. Every relation field declared in the metadata is followed into its
//!    nested operations, which are checked against the target model.
//! 5. When the mode requires complete metadata, a relation-shaped key the
//!    metadata does not declare is rejected with `TENANT_META_MISSING`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use warden_contracts::{
    error::{GuardError, GuardErrorCode, GuardResult, WardenResult},
    tenant::{
        GuardMode, GuardWarning, NestedTarget, RelationOp, TenantMeta, WarningCode,
        WriteOperation,
    },
};

use crate::{
    config::{GuardConfig, RlsConfig},
    path::PayloadPath,
};

/// Callback receiving every auto-injection the guard performs.
pub type WarnHook = Arc<dyn Fn(&GuardWarning) + Send + Sync>;

/// One ORM mutation call: `prisma.post.create({ data })` is
/// `MutationCall::new("Post", "create", json!({ "data": ... }))`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationCall {
    pub model: String,
    pub operation: String,
    pub args: Value,
}

impl MutationCall {
    pub fn new(model: impl Into<String>, operation: impl Into<String>, args: Value) -> Self {
        Self {
            model: model.into(),
            operation: operation.into(),
            args,
        }
    }
}

/// A per-tenant guard.
///
/// Construct once per logical tenant-scoped client. The guard holds no
/// per-call state, so one instance can serve concurrent calls as long as each
/// call owns its own arguments.
pub struct TenantGuard {
    tenant_id: String,
    mode: GuardMode,
    meta: TenantMeta,
    rls: RlsConfig,
    on_warn: Option<WarnHook>,
}

impl TenantGuard {
    /// Validate `config` and build a guard.
    ///
    /// Returns `WardenError::ConfigError` for an empty tenant id or malformed
    /// metadata.
    pub fn new(config: GuardConfig) -> WardenResult<Self> {
        config.validate()?;
        debug!(
            tenant_id = %config.tenant_id,
            mode = %config.mode,
            models = config.meta.len(),
            rls_enabled = config.rls.enabled,
            "tenant guard constructed"
        );
        Ok(Self {
            tenant_id: config.tenant_id,
            mode: config.mode,
            meta: config.meta,
            rls: config.rls,
            on_warn: None,
        })
    }

    /// Receive a `GuardWarning` for every auto-injection.
    pub fn on_warn<F>(mut self, hook: F) -> Self
    where
        F: Fn(&GuardWarning) + Send + Sync + 'static,
    {
        self.on_warn = Some(Arc::new(hook));
        self
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn mode(&self) -> GuardMode {
        self.mode
    }

    pub fn meta(&self) -> &TenantMeta {
        &self.meta
    }

    pub fn rls(&self) -> &RlsConfig {
        &self.rls
    }

    /// Scope `call` to this guard's tenant.
    ///
    /// On success `call.args` is ready to forward to the store (possibly
    /// rewritten in assist mode). On failure the call must not be forwarded;
    /// its arguments may have been partially rewritten.
    pub fn enforce(&self, call: &mut MutationCall) -> GuardResult<()> {
        let Some(operation) = WriteOperation::parse(&call.operation) else {
            debug!(
                model = %call.model,
                operation = %call.operation,
                "operation is not a write; passing through"
            );
            return Ok(());
        };

        let walk = Walk {
            guard: self,
            operation: &call.operation,
        };
        let result = walk.enforce_root(&call.model, operation, &mut call.args);

        match &result {
            Ok(()) => debug!(
                model = %call.model,
                operation = %call.operation,
                tenant_id = %self.tenant_id,
                "mutation scoped to tenant"
            ),
            Err(err) => warn!(
                code = %err.code,
                model = %err.model,
                operation = %err.operation,
                path = %err.path,
                tenant_id = %self.tenant_id,
                "tenant guard rejected mutation"
            ),
        }
        result
    }
}

impl fmt::Debug for TenantGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantGuard")
            .field("tenant_id", &self.tenant_id)
            .field("mode", &self.mode)
            .field("meta", &self.meta)
            .field("rls", &self.rls)
            .field("on_warn", &self.on_warn.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

// ── Walker ────────────────────────────────────────────────────────────────────

/// State shared by every step of one `enforce` call.
struct Walk<'a> {
    guard: &'a TenantGuard,
    operation: &'a str,
}

impl<'a> Walk<'a> {
    fn enforce_root(
        &self,
        model: &str,
        operation: WriteOperation,
        args: &mut Value,
    ) -> GuardResult<()> {
        let root = PayloadPath::root(model);
        if args.is_null() {
            *args = Value::Object(Map::new());
        }
        let Value::Object(args) = args else {
            let code = match operation {
                WriteOperation::Create | WriteOperation::CreateMany => {
                    GuardErrorCode::TenantFieldMissing
                }
                _ => GuardErrorCode::WhereTenantMissing,
            };
            return Err(self
                .error(code, model, &root)
                .with_message("mutation arguments must be an object"));
        };

        match operation {
            WriteOperation::Create | WriteOperation::CreateMany => {
                self.ensure_data_in(model, args, "data", &root, true)
            }
            WriteOperation::Update | WriteOperation::UpdateMany => {
                self.ensure_where_in(model, args, "where", &root)?;
                self.ensure_data_in(model, args, "data", &root, false)
            }
            WriteOperation::Upsert => {
                self.ensure_where_in(model, args, "where", &root)?;
                self.ensure_data_in(model, args, "create", &root, true)?;
                self.ensure_data_in(model, args, "update", &root, false)
            }
            WriteOperation::Delete | WriteOperation::DeleteMany => {
                self.ensure_where_in(model, args, "where", &root)
            }
        }
    }

    // ── Rows ──────────────────────────────────────────────────────────────────

    fn ensure_data_in(
        &self,
        model: &str,
        parent: &mut Map<String, Value>,
        key: &str,
        path: &PayloadPath,
        require: bool,
    ) -> GuardResult<()> {
        let data_path = path.key(key);
        match parent.get_mut(key) {
            Some(value) => self.ensure_data(model, value, &data_path, require),
            None if require => Err(self.error(GuardErrorCode::TenantFieldMissing, model, &data_path)),
            None => Ok(()),
        }
    }

    /// Check one row (or list of rows) being written to `model`.
    fn ensure_data(
        &self,
        model: &str,
        value: &mut Value,
        path: &PayloadPath,
        require: bool,
    ) -> GuardResult<()> {
        if let Value::Array(rows) = value {
            for (index, row) in rows.iter_mut().enumerate() {
                self.ensure_data(model, row, &path.index(index), require)?;
            }
            return Ok(());
        }

        let Value::Object(row) = value else {
            if require {
                return Err(self.error(GuardErrorCode::TenantFieldMissing, model, path));
            }
            return Ok(());
        };

        let field = self.guard.meta.tenant_field(model);
        if !self.check_tenant_field(model, row, field, path)? && require {
            if !self.guard.mode.allows_rewrite() {
                return Err(self
                    .error(GuardErrorCode::TenantFieldMissing, model, path)
                    .with_message(format!("new {model} rows must set '{field}'")));
            }
            row.insert(field.to_string(), Value::String(self.guard.tenant_id.clone()));
            self.warn(WarningCode::InjectTenantField, model, path);
        }

        self.ensure_relations(model, row, path)
    }

    /// Follow declared relations and, when required, reject undeclared ones.
    fn ensure_relations(
        &self,
        model: &str,
        row: &mut Map<String, Value>,
        path: &PayloadPath,
    ) -> GuardResult<()> {
        let model_meta = self.guard.meta.model(model);

        if let Some(model_meta) = model_meta {
            for (field, target) in &model_meta.nested_targets {
                if let Some(payload) = row.get_mut(field) {
                    self.process_relation(model, field, target, payload, &path.key(field))?;
                }
            }
        }

        let tenant_field = self.guard.meta.tenant_field(model);
        let reject_unmapped = self
            .guard
            .mode
            .requires_complete_meta(self.guard.rls.enabled);
        for (key, value) in row.iter() {
            let declared = model_meta.is_some_and(|m| m.nested_targets.contains_key(key));
            if declared || key == tenant_field || !looks_like_relation(value) {
                continue;
            }
            let relation_path = path.key(key);
            if reject_unmapped {
                return Err(self
                    .error(GuardErrorCode::TenantMetaMissing, model, &relation_path)
                    .with_message(format!(
                        "relation '{key}' on {model} is not described by tenant metadata"
                    ))
                    .with_meta(json!({ "relation": key })));
            }
            warn!(
                model,
                relation = %key,
                path = %relation_path,
                mode = %self.guard.mode,
                "relation is not described by tenant metadata; not validated"
            );
        }
        Ok(())
    }

    // ── Relations ─────────────────────────────────────────────────────────────

    fn process_relation(
        &self,
        model: &str,
        field: &str,
        target: &'a NestedTarget,
        payload: &mut Value,
        path: &PayloadPath,
    ) -> GuardResult<()> {
        let Value::Object(ops) = payload else {
            return Ok(());
        };

        for op in RelationOp::ALL {
            let Some(op_payload) = ops.get_mut(op.as_str()) else {
                continue;
            };
            let op_path = path.key(op.as_str());
            let Some(target_model) = target.resolve(op) else {
                return Err(self
                    .error(GuardErrorCode::TenantMetaMissing, model, &op_path)
                    .with_message(format!(
                        "no target model for '{}' on relation '{field}' of {model}",
                        op.as_str()
                    ))
                    .with_meta(json!({ "relation": field, "operation": op.as_str() })));
            };

            match op {
                RelationOp::Create => self.ensure_data(target_model, op_payload, &op_path, true)?,
                RelationOp::CreateMany => {
                    self.ensure_create_many(target_model, op_payload, &op_path)?
                }
                RelationOp::Update | RelationOp::UpdateMany | RelationOp::Upsert => {
                    self.each_entry(op_payload, &op_path, |entry, entry_path| {
                        self.ensure_update_entry(op, target_model, entry, entry_path)
                    })?
                }
                RelationOp::Connect
                | RelationOp::Set
                | RelationOp::Disconnect
                | RelationOp::Delete => {
                    self.each_entry(op_payload, &op_path, |entry, entry_path| {
                        self.ensure_selector(target_model, entry, entry_path)
                    })?
                }
                RelationOp::ConnectOrCreate => {
                    self.each_entry(op_payload, &op_path, |entry, entry_path| {
                        self.ensure_connect_or_create(target_model, entry, entry_path)
                    })?
                }
                RelationOp::DeleteMany => {
                    self.each_entry(op_payload, &op_path, |entry, entry_path| {
                        self.ensure_where(target_model, entry, entry_path)
                    })?
                }
            }
        }
        Ok(())
    }

    /// Nested `createMany` wraps its rows in `{ data: [...] }`.
    fn ensure_create_many(
        &self,
        model: &str,
        payload: &mut Value,
        path: &PayloadPath,
    ) -> GuardResult<()> {
        match payload {
            Value::Object(wrapper) if wrapper.contains_key("data") => {
                self.ensure_data_in(model, wrapper, "data", path, true)
            }
            rows => self.ensure_data(model, rows, path, true),
        }
    }

    fn ensure_update_entry(
        &self,
        op: RelationOp,
        model: &str,
        entry: &mut Value,
        path: &PayloadPath,
    ) -> GuardResult<()> {
        let Value::Object(map) = entry else {
            return Ok(());
        };

        if op == RelationOp::Upsert {
            self.ensure_where_in(model, map, "where", path)?;
            self.ensure_data_in(model, map, "create", path, true)?;
            return self.ensure_data_in(model, map, "update", path, false);
        }

        if map.contains_key("where") || map.contains_key("data") {
            self.ensure_where_in(model, map, "where", path)?;
            return self.ensure_data_in(model, map, "data", path, false);
        }

        // To-one shorthand: the entry is the update data itself.
        self.ensure_data(model, entry, path, false)
    }

    fn ensure_connect_or_create(
        &self,
        model: &str,
        entry: &mut Value,
        path: &PayloadPath,
    ) -> GuardResult<()> {
        let Value::Object(map) = entry else {
            return Ok(());
        };
        if let Some(selector) = map.get_mut("where") {
            self.ensure_selector(model, selector, &path.key("where"))?;
        }
        self.ensure_data_in(model, map, "create", path, true)
    }

    /// Check a row reference used by `connect`, `set`, `disconnect`, `delete`.
    ///
    /// Anchors, in order: the tenant field itself, an explicit `where`, the
    /// composite selector. Without any anchor, assist mode injects the tenant
    /// field and modes requiring complete metadata reject the reference.
    fn ensure_selector(
        &self,
        model: &str,
        selector: &mut Value,
        path: &PayloadPath,
    ) -> GuardResult<()> {
        // `disconnect: true` and friends carry no row reference.
        let Value::Object(map) = selector else {
            return Ok(());
        };

        let field = self.guard.meta.tenant_field(model);
        if self.check_tenant_field(model, map, field, path)? {
            return Ok(());
        }
        if let Some(where_value) = map.get_mut("where") {
            return self.ensure_where(model, where_value, &path.key("where"));
        }
        if let Some(composite) = self.composite_selector(model) {
            if let Some(inner) = map.get_mut(composite) {
                return self.ensure_composite(
                    model,
                    inner,
                    &path.key(composite),
                    GuardErrorCode::TenantFieldMissing,
                );
            }
        }

        if self.guard.mode.allows_rewrite() {
            map.insert(field.to_string(), Value::String(self.guard.tenant_id.clone()));
            self.warn(WarningCode::InjectTenantWhere, model, path);
            return Ok(());
        }
        if self
            .guard
            .mode
            .requires_complete_meta(self.guard.rls.enabled)
        {
            return Err(self
                .error(GuardErrorCode::TenantMetaMissing, model, path)
                .with_message(format!(
                    "{model} reference has no tenant field, where clause, or composite selector"
                )));
        }
        // Row-level security backs references the guard cannot anchor.
        Ok(())
    }

    // ── Where clauses ─────────────────────────────────────────────────────────

    fn ensure_where_in(
        &self,
        model: &str,
        parent: &mut Map<String, Value>,
        key: &str,
        path: &PayloadPath,
    ) -> GuardResult<()> {
        let where_path = path.key(key);
        match parent.get_mut(key) {
            Some(where_value) => self.ensure_where(model, where_value, &where_path),
            None => {
                if !self.guard.mode.allows_rewrite() {
                    return Err(self.error(GuardErrorCode::WhereTenantMissing, model, &where_path));
                }
                let field = self.guard.meta.tenant_field(model);
                parent.insert(key.to_string(), json!({ field: self.guard.tenant_id }));
                self.warn(WarningCode::InjectTenantWhere, model, &where_path);
                Ok(())
            }
        }
    }

    /// Scope one where clause to the tenant.
    fn ensure_where(
        &self,
        model: &str,
        where_value: &mut Value,
        path: &PayloadPath,
    ) -> GuardResult<()> {
        let field = self.guard.meta.tenant_field(model);

        if where_value.is_null() {
            if !self.guard.mode.allows_rewrite() {
                return Err(self.error(GuardErrorCode::WhereTenantMissing, model, path));
            }
            *where_value = json!({ field: self.guard.tenant_id });
            self.warn(WarningCode::InjectTenantWhere, model, path);
            return Ok(());
        }

        let Value::Object(map) = where_value else {
            return Err(self
                .error(GuardErrorCode::WhereTenantMissing, model, path)
                .with_message("where clause must be an object"));
        };

        if self.check_tenant_field(model, map, field, path)? {
            return Ok(());
        }
        if let Some(composite) = self.composite_selector(model) {
            if let Some(inner) = map.get_mut(composite) {
                return self.ensure_composite(
                    model,
                    inner,
                    &path.key(composite),
                    GuardErrorCode::WhereTenantMissing,
                );
            }
        }

        if !self.guard.mode.allows_rewrite() {
            return Err(self.error(GuardErrorCode::WhereTenantMissing, model, path));
        }
        map.insert(field.to_string(), Value::String(self.guard.tenant_id.clone()));
        self.warn(WarningCode::InjectTenantWhere, model, path);
        Ok(())
    }

    /// Check the tenant component of a composite unique selector such as
    /// `{ tenantId_id: { tenantId, id } }`.
    fn ensure_composite(
        &self,
        model: &str,
        selector: &mut Value,
        path: &PayloadPath,
        missing: GuardErrorCode,
    ) -> GuardResult<()> {
        let Value::Object(map) = selector else {
            return Err(self
                .error(missing, model, path)
                .with_message("composite selector must be an object"));
        };

        let field = self.guard.meta.tenant_field(model);
        if self.check_tenant_field(model, map, field, path)? {
            return Ok(());
        }
        if !self.guard.mode.allows_rewrite() {
            return Err(self
                .error(missing, model, path)
                .with_message(format!("composite selector is missing '{field}'")));
        }
        map.insert(field.to_string(), Value::String(self.guard.tenant_id.clone()));
        self.warn(WarningCode::InjectTenantWhere, model, path);
        Ok(())
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// Returns `Ok(true)` if `field` is present and names the tenant,
    /// `Ok(false)` if it is absent, and `TENANT_MISMATCH` otherwise.
    fn check_tenant_field(
        &self,
        model: &str,
        map: &Map<String, Value>,
        field: &str,
        path: &PayloadPath,
    ) -> GuardResult<bool> {
        let Some(value) = map.get(field).and_then(tenant_value) else {
            return Ok(false);
        };
        if value.as_str() == Some(self.guard.tenant_id.as_str()) {
            return Ok(true);
        }
        let actual = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Err(self
            .error(GuardErrorCode::TenantMismatch, model, path)
            .with_message(format!(
                "'{field}' is '{actual}' but the guard enforces '{}'",
                self.guard.tenant_id
            ))
            .with_actual(actual))
    }

    fn composite_selector(&self, model: &str) -> Option<&'a str> {
        self.guard
            .meta
            .model(model)
            .and_then(|m| m.composite_selector.as_deref())
    }

    /// Apply `f` to a single entry or to each entry of a list.
    fn each_entry<F>(&self, value: &mut Value, path: &PayloadPath, mut f: F) -> GuardResult<()>
    where
        F: FnMut(&mut Value, &PayloadPath) -> GuardResult<()>,
    {
        match value {
            Value::Array(entries) => {
                for (index, entry) in entries.iter_mut().enumerate() {
                    f(entry, &path.index(index))?;
                }
                Ok(())
            }
            entry => f(entry, path),
        }
    }

    fn warn(&self, code: WarningCode, model: &str, path: &PayloadPath) {
        let warning = GuardWarning {
            code,
            model: model.to_string(),
            operation: self.operation.to_string(),
            path: path.to_string(),
        };
        info!(
            code = %warning.code,
            model = %warning.model,
            operation = %warning.operation,
            path = %warning.path,
            tenant_id = %self.guard.tenant_id,
            "injected tenant scoping"
        );
        if let Some(hook) = &self.guard.on_warn {
            hook(&warning);
        }
    }

    fn error(&self, code: GuardErrorCode, model: &str, path: &PayloadPath) -> GuardError {
        GuardError::new(
            code,
            model,
            self.operation,
            path.to_string(),
            self.guard.tenant_id.as_str(),
        )
    }
}

/// The scalar a tenant field holds: a bare value, or the operand of an
/// `equals` filter or `set` update. `null` counts as absent.
fn tenant_value(value: &Value) -> Option<&Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => match map.get("equals").or_else(|| map.get("set")) {
            Some(inner) if !inner.is_null() => Some(inner),
            _ => Some(value),
        },
        other => Some(other),
    }
}

/// True when `value` is an object holding a relation operation over records,
/// e.g. `{ create: {...} }` or `{ connect: [{...}] }`. Scalar-list updates such
/// as `{ set: ["a", "b"] }` do not qualify.
fn looks_like_relation(value: &Value) -> bool {
    let Value::Object(map) = value else {
        return false;
    };
    map.iter().any(|(key, inner)| {
        RelationOp::parse(key).is_some()
            && match inner {
                Value::Object(_) => true,
                Value::Array(items) => items.iter().any(Value::is_object),
                _ => false,
            }
    })
}
