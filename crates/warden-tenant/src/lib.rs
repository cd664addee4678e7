//! # warden-tenant
//!
//! Tenant isolation for ORM mutation payloads.
//!
//! A `TenantGuard` is constructed per tenant with schema metadata describing
//! each model's tenant column and relation targets. Every write call is run
//! through `TenantGuard::enforce`, which walks the nested payload, scopes it
//! to the tenant, and rejects anything that would touch another tenant's rows.
//!
//! ```rust,ignore
//! let guard = TenantGuard::new(GuardConfig::new("acme").meta(meta))?
//!     .on_warn(|w| metrics.count(w.code));
//! let client = GuardedClient::new(store, guard);
//! client.execute(MutationCall::new("Post", "create", json!({ "data": { "title": "Hi" } })))?;
//! ```

pub mod client;
pub mod config;
pub mod guard;
pub mod path;
pub mod rls;

pub use client::{GuardedClient, MutationClient};
pub use config::{GuardConfig, RlsConfig, DEFAULT_RLS_VAR};
pub use guard::{MutationCall, TenantGuard, WarnHook};
pub use path::PayloadPath;
pub use rls::{
    with_tenant_rls, RawExecutor, StoreClient, TransactionHandle, Transactional, SET_TENANT_SQL,
};
