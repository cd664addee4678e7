//! Warden CLI
//!
//! Validates a tenant guard configuration file and runs a synthetic smoke
//! test against it: one create that must be accepted and one cross-tenant
//! create that must be rejected.
//!
//! Usage:
//!   warden validate guard.toml
//!   warden smoke guard.toml --model Post

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use warden_audit::{AuditWriter, InMemoryAuditWriter};
use warden_contracts::error::{GuardErrorCode, WardenError, WardenResult};
use warden_tenant::{GuardConfig, GuardedClient, MutationCall, MutationClient, TenantGuard};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Warden tenant guard tooling.
#[derive(Parser)]
#[command(
    name = "warden",
    about = "Validate and smoke-test Warden tenant guard configuration",
    long_about = "Loads a tenant guard configuration (TOML, or JSON by extension),\n\
                  validates it, and optionally exercises the guard with one allowed\n\
                  and one cross-tenant create."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load and validate a guard configuration file.
    Validate {
        /// Path to the guard configuration.
        path: PathBuf,
    },
    /// Run one allowed and one cross-tenant create through the guard.
    Smoke {
        /// Path to the guard configuration.
        path: PathBuf,
        /// Model to create rows for.
        #[arg(long)]
        model: String,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Validate { path } => validate(&path),
        Command::Smoke { path, model } => smoke(&path, &model),
    };

    if let Err(e) = result {
        eprintln!("warden: {}", e);
        std::process::exit(1);
    }
}

// ── validate ──────────────────────────────────────────────────────────────────

fn load_guard(path: &Path) -> WardenResult<TenantGuard> {
    let config = GuardConfig::from_file(path)?;
    TenantGuard::new(config)
}

fn validate(path: &Path) -> WardenResult<()> {
    let guard = load_guard(path)?;

    println!("{}: ok", path.display());
    println!("  tenant  : {}", guard.tenant_id());
    println!("  mode    : {}", guard.mode());
    println!(
        "  rls     : {}",
        if guard.rls().enabled {
            format!("enabled ({})", guard.rls().var_name)
        } else {
            "disabled".to_string()
        }
    );
    println!("  models  : {}", guard.meta().len());
    for (model, meta) in guard.meta().models() {
        println!(
            "    {model} (tenant field '{}', {} relation(s))",
            meta.tenant_field(),
            meta.nested_targets.len()
        );
    }
    Ok(())
}

// ── smoke ─────────────────────────────────────────────────────────────────────

/// Stands in for the database: accepts every call and echoes its arguments.
struct EchoStore;

impl MutationClient for EchoStore {
    fn execute(&self, call: MutationCall) -> WardenResult<Value> {
        debug!(model = %call.model, operation = %call.operation, "store received call");
        Ok(call.args)
    }
}

fn smoke(path: &Path, model: &str) -> WardenResult<()> {
    let audit = InMemoryAuditWriter::new(format!("smoke:{}", path.display()));
    let guard = load_guard(path)?.on_warn(audit.warning_sink());

    let tenant = guard.tenant_id().to_string();
    let field = guard.meta().tenant_field(model).to_string();

    // Assist mode may fill in the tenant; the other modes need it spelled out.
    let allowed_data = if guard.mode().allows_rewrite() {
        Map::new()
    } else {
        Map::from_iter([(field.clone(), Value::String(tenant.clone()))])
    };
    let client = GuardedClient::new(EchoStore, guard);

    let stored = client.execute(MutationCall::new(
        model,
        "create",
        json!({ "data": allowed_data }),
    ))?;
    if stored["data"][field.as_str()] != json!(tenant) {
        return Err(WardenError::config(format!(
            "allowed create reached the store without '{field}' = '{tenant}'"
        )));
    }
    println!("[1] allowed create    : ok ({model}.{field} = {tenant})");

    let other = format!("{tenant}-other");
    let foreign = Map::from_iter([(field.clone(), Value::String(other.clone()))]);
    let rejected = client.execute(MutationCall::new(
        model,
        "create",
        json!({ "data": foreign }),
    ));
    match rejected {
        Err(WardenError::Guard(err)) if err.code == GuardErrorCode::TenantMismatch => {
            audit.record_rejection(&err)?;
            println!("[2] cross-tenant create: rejected ({} at {})", err.code, err.path);
        }
        Err(other_err) => return Err(other_err),
        Ok(_) => {
            return Err(WardenError::config(format!(
                "cross-tenant create for '{other}' was not rejected"
            )))
        }
    }

    audit.finalize()?;
    let log = audit.export_log();
    if !audit.verify_integrity() {
        return Err(WardenError::AuditWriteFailed {
            reason: "smoke audit chain failed verification".to_string(),
        });
    }
    println!(
        "[3] audit trail        : {} event(s), terminal hash {}",
        log.events.len(),
        log.terminal_hash
    );

    Ok(())
}
