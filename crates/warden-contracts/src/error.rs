//! Error types for the Warden toolkit.
//!
//! Two layers: `GuardError` is the structured, per-operation failure raised by
//! the tenant guard (and the RLS helper), carrying the exact payload path of
//! the violation. `WardenError` is the crate-wide error that wraps guard
//! failures together with configuration, store, and audit errors.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable code identifying why a tenant guard rejected an operation.
///
/// Serialized as the SCREAMING_SNAKE_CASE strings operators grep for in logs,
/// e.g. `"TENANT_MISMATCH"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardErrorCode {
    /// A row being written carries no tenant field and the mode forbids injection.
    TenantFieldMissing,
    /// A tenant field is present but names a different tenant.
    TenantMismatch,
    /// The payload references a relation the metadata does not describe.
    TenantMetaMissing,
    /// A `where` clause is not scoped to the tenant and the mode forbids injection.
    WhereTenantMissing,
    /// The client handed to the RLS helper cannot open transactions.
    RlsClientMissing,
    /// The transaction handle cannot execute raw statements.
    RlsExecutorMissing,
}

impl GuardErrorCode {
    /// The wire form of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TenantFieldMissing => "TENANT_FIELD_MISSING",
            Self::TenantMismatch => "TENANT_MISMATCH",
            Self::TenantMetaMissing => "TENANT_META_MISSING",
            Self::WhereTenantMissing => "WHERE_TENANT_MISSING",
            Self::RlsClientMissing => "RLS_CLIENT_MISSING",
            Self::RlsExecutorMissing => "RLS_EXECUTOR_MISSING",
        }
    }
}

impl fmt::Display for GuardErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured tenant-isolation failure.
///
/// `path` is a breadcrumb such as `Post.data.comments.create[0]` pointing at
/// the record inside the nested payload where the violation was found.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{code} at {path}: {message}")]
pub struct GuardError {
    /// Why the operation was rejected.
    pub code: GuardErrorCode,
    /// Human-readable explanation.
    pub message: String,
    /// The model being validated when the violation was found.
    pub model: String,
    /// The top-level operation being enforced (e.g. `"create"`).
    pub operation: String,
    /// Breadcrumb to the offending record.
    pub path: String,
    /// The tenant the guard enforces.
    pub expected_tenant: String,
    /// The tenant value found in the payload, when one was present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_tenant: Option<String>,
    /// Extra diagnostic context (e.g. the unmapped relation field).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl GuardError {
    /// Build an error with a message derived from `code`.
    pub fn new(
        code: GuardErrorCode,
        model: impl Into<String>,
        operation: impl Into<String>,
        path: impl Into<String>,
        expected_tenant: impl Into<String>,
    ) -> Self {
        let message = match code {
            GuardErrorCode::TenantFieldMissing => "tenant field is missing from the payload",
            GuardErrorCode::TenantMismatch => "tenant field does not match the enforced tenant",
            GuardErrorCode::TenantMetaMissing => "no tenant metadata describes this relation",
            GuardErrorCode::WhereTenantMissing => "where clause is not scoped to the tenant",
            GuardErrorCode::RlsClientMissing => "client does not support transactions",
            GuardErrorCode::RlsExecutorMissing => {
                "transaction handle cannot execute raw statements"
            }
        };
        Self {
            code,
            message: message.to_string(),
            model: model.into(),
            operation: operation.into(),
            path: path.into(),
            expected_tenant: expected_tenant.into(),
            actual_tenant: None,
            meta: None,
        }
    }

    /// Attach the tenant value found in the payload.
    pub fn with_actual(mut self, actual: impl Into<String>) -> Self {
        self.actual_tenant = Some(actual.into());
        self
    }

    /// Attach diagnostic context.
    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Replace the derived message with a more specific one.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// Convenience alias for guard operations.
pub type GuardResult<T> = Result<T, GuardError>;

/// The unified error type for the Warden crates.
#[derive(Debug, Error)]
pub enum WardenError {
    /// A policy, metadata, or guard configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// The tenant guard rejected an operation.
    #[error("tenant guard rejected operation: {0}")]
    Guard(#[from] GuardError),

    /// The underlying data store failed.
    #[error("store error: {reason}")]
    StoreError { reason: String },

    /// The audit writer could not persist a record.
    ///
    /// Treated as fatal: a decision that cannot be audited is not returned.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },
}

impl WardenError {
    /// Shorthand for building a `ConfigError`.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::ConfigError {
            reason: reason.into(),
        }
    }

    /// The guard error code, if this error came from the tenant guard.
    pub fn guard_code(&self) -> Option<GuardErrorCode> {
        match self {
            Self::Guard(err) => Some(err.code),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the Warden crates.
pub type WardenResult<T> = Result<T, WardenError>;
