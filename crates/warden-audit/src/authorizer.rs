//! Authorization with an audit trail.

use std::sync::Arc;

use tracing::debug;

use warden_contracts::{decision::Decision, error::WardenResult};
use warden_policy::engine::Authorizer;

use crate::{event::AuditRecord, writer::AuditWriter};

/// Wraps an authorizer so every decision is appended to an audit trail
/// before it is returned.
///
/// If the audit write fails the decision is withheld and the error returned:
/// an unaudited allow must not be acted on.
pub struct AuditedAuthorizer<A> {
    inner: A,
    audit: Arc<dyn AuditWriter>,
}

impl<A> AuditedAuthorizer<A> {
    pub fn new(inner: A, audit: Arc<dyn AuditWriter>) -> Self {
        Self { inner, audit }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    pub fn check_detailed<I>(&self, action: &str, input: &I) -> WardenResult<Decision>
    where
        A: Authorizer<I>,
    {
        let decision = self.inner.check_detailed(action, input);
        self.audit.write(&AuditRecord::decision(action, &decision))?;
        debug!(action, allow = decision.allow, "decision audited");
        Ok(decision)
    }

    pub fn check<I>(&self, action: &str, input: &I) -> WardenResult<bool>
    where
        A: Authorizer<I>,
    {
        self.check_detailed(action, input).map(|d| d.allow)
    }
}
