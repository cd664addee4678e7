//! Guarded store clients.
//!
//! `GuardedClient` is the interception point: every mutation is enforced by
//! the tenant guard before the wrapped client sees it, and a rejected call
//! never reaches the store.

use serde_json::Value;

use warden_contracts::error::WardenResult;

use crate::guard::{MutationCall, TenantGuard};

/// Anything that executes ORM mutation calls.
pub trait MutationClient {
    fn execute(&self, call: MutationCall) -> WardenResult<Value>;
}

/// A client wrapper that scopes every call to one tenant.
#[derive(Debug)]
pub struct GuardedClient<C> {
    inner: C,
    guard: TenantGuard,
}

impl<C> GuardedClient<C> {
    pub fn new(inner: C, guard: TenantGuard) -> Self {
        Self { inner, guard }
    }

    pub fn guard(&self) -> &TenantGuard {
        &self.guard
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: MutationClient> MutationClient for GuardedClient<C> {
    fn execute(&self, mut call: MutationCall) -> WardenResult<Value> {
        self.guard.enforce(&mut call)?;
        self.inner.execute(call)
    }
}
