//! Row-level security transaction helper.
//!
//! Databases with row-level security read the tenant from a session variable.
//! `with_tenant_rls` opens a transaction, sets that variable for the
//! transaction's lifetime, and runs the caller's work inside it.
//!
//! The store is reached through small capability traits so the helper can
//! check what a client supports and fail with a precise code when it cannot:
//! a client that cannot open transactions yields `RLS_CLIENT_MISSING`, and a
//! transaction that cannot run raw statements yields `RLS_EXECUTOR_MISSING`.

use serde_json::{json, Value};
use tracing::debug;

use warden_contracts::error::{GuardError, GuardErrorCode, WardenError, WardenResult};

use crate::guard::TenantGuard;

/// Transaction-local session variable assignment.
pub const SET_TENANT_SQL: &str = "SELECT set_config($1, $2, true)";

/// Runs a raw, parameterized statement.
pub trait RawExecutor {
    /// Execute `sql` with positional `params`; returns the affected row count.
    fn execute_raw(&mut self, sql: &str, params: &[Value]) -> WardenResult<u64>;
}

/// An open transaction.
pub trait TransactionHandle {
    /// The raw-statement capability of this transaction, if any.
    fn raw_executor(&mut self) -> Option<&mut dyn RawExecutor>;
}

/// A store that can run work inside a transaction.
///
/// The transaction commits when `body` returns `Ok` and rolls back otherwise.
pub trait Transactional {
    fn transaction(
        &self,
        body: &mut dyn FnMut(&mut dyn TransactionHandle) -> WardenResult<()>,
    ) -> WardenResult<()>;
}

/// Any store client handed to the RLS helper.
pub trait StoreClient {
    /// The transaction capability of this client, if any.
    fn transactional(&self) -> Option<&dyn Transactional>;
}

/// Run `run` inside a transaction with `var_name` set to `tenant_id`.
///
/// The variable is set before `run` starts; `run`'s error aborts the
/// transaction and is returned unchanged.
pub fn with_tenant_rls<T, F>(
    client: &dyn StoreClient,
    tenant_id: &str,
    var_name: &str,
    run: F,
) -> WardenResult<T>
where
    F: FnOnce(&mut dyn TransactionHandle) -> WardenResult<T>,
{
    let transactional = client
        .transactional()
        .ok_or_else(|| rls_error(GuardErrorCode::RlsClientMissing, tenant_id, var_name))?;

    // `transaction` takes a re-callable body; `run` is consumed on first use.
    let mut run = Some(run);
    let mut output = None;

    transactional.transaction(&mut |tx: &mut dyn TransactionHandle| {
        let executor = tx
            .raw_executor()
            .ok_or_else(|| rls_error(GuardErrorCode::RlsExecutorMissing, tenant_id, var_name))?;
        executor.execute_raw(
            SET_TENANT_SQL,
            &[
                Value::String(var_name.to_string()),
                Value::String(tenant_id.to_string()),
            ],
        )?;
        debug!(var_name, tenant_id, "tenant session variable set");

        let run = run
            .take()
            .ok_or_else(|| WardenError::StoreError {
                reason: "transaction body invoked more than once".to_string(),
            })?;
        output = Some(run(tx)?);
        Ok(())
    })?;

    output.ok_or_else(|| WardenError::StoreError {
        reason: "transaction committed without running the body".to_string(),
    })
}

impl TenantGuard {
    /// `with_tenant_rls` using this guard's tenant and configured variable.
    pub fn with_rls<T, F>(&self, client: &dyn StoreClient, run: F) -> WardenResult<T>
    where
        F: FnOnce(&mut dyn TransactionHandle) -> WardenResult<T>,
    {
        with_tenant_rls(client, self.tenant_id(), &self.rls().var_name, run)
    }
}

/// Model and path reported by RLS failures, which concern no payload record.
const RLS_SCOPE: &str = "rls";

fn rls_error(code: GuardErrorCode, tenant_id: &str, var_name: &str) -> WardenError {
    GuardError::new(code, RLS_SCOPE, "withTenantRls", RLS_SCOPE, tenant_id)
        .with_meta(json!({ "varName": var_name }))
        .into()
}
