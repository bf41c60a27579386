//! Subcommand implementations.
//!
//! Each command returns the JSON it wants printed; `main` does the
//! printing. Files are read and written here with `anyhow` context on
//! every failure.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use strat_contracts::{ContractRuntime, TransactionExecutor};
use strat_protocol::config::ExecutionLimits;
use strat_protocol::crypto::{Keypair, PublicKey};
use strat_protocol::storage::{StateSnapshot, StateStore};
use strat_protocol::transaction::{
    create_contract_call, create_contract_deploy, create_transfer, verify_transaction,
    Transaction, Utxo,
};

use crate::cli::{
    ApplyArgs, CallArgs, DeployArgs, FundingArgs, KeygenArgs, QueryArgs, StateArgs,
    TransferArgs, VerifyArgs,
};

// ---------------------------------------------------------------------------
// Key and transaction construction
// ---------------------------------------------------------------------------

pub fn keygen(args: &KeygenArgs) -> Result<Value> {
    let keypair = Keypair::generate();
    let secret = hex::encode(keypair.secret_key_bytes());
    let public = keypair.public_key().to_hex();

    match &args.out {
        Some(path) => {
            write_secret(path, &secret)?;
            tracing::info!(public_key = %public, path = %path.display(), "keypair written");
            Ok(json!({"publicKey": public, "secretKeyFile": path.display().to_string()}))
        }
        None => Ok(json!({"publicKey": public, "secretKey": secret})),
    }
}

/// Creates the key file owner-only from the start, so the secret is never
/// readable by others even briefly.
fn write_secret(path: &Path, secret: &str) -> Result<()> {
    use std::io::Write;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(secret.as_bytes())
        .with_context(|| format!("failed to write secret key to {}", path.display()))
}

pub fn transfer(args: &TransferArgs) -> Result<Value> {
    let (pool, keypair) = funding(&args.funding)?;
    let tx = create_transfer(
        &args.from,
        &args.to,
        args.amount,
        &pool,
        &keypair,
        args.funding.fee,
    )
    .context("failed to build transfer")?;
    emit_transaction(&tx, &args.funding)
}

pub fn deploy(args: &DeployArgs) -> Result<Value> {
    let (pool, keypair) = funding(&args.funding)?;
    let code: Value = read_json(&args.code)?;
    let tx = create_contract_deploy(&args.owner, code, &pool, &keypair, args.funding.fee)
        .context("failed to build deployment")?;
    emit_transaction(&tx, &args.funding)
}

pub fn call(args: &CallArgs) -> Result<Value> {
    let (pool, keypair) = funding(&args.funding)?;
    let params = parse_inline(&args.params)?;
    let tx = create_contract_call(
        &args.caller,
        &args.contract,
        &args.method,
        params,
        &pool,
        &keypair,
        args.funding.fee,
    )
    .context("failed to build contract call")?;
    emit_transaction(&tx, &args.funding)
}

fn funding(args: &FundingArgs) -> Result<(Vec<Utxo>, Keypair)> {
    let pool: Vec<Utxo> = read_json(&args.utxos)?;
    let keypair = Keypair::from_hex(&args.key).context("invalid signing key")?;
    Ok((pool, keypair))
}

fn emit_transaction(tx: &Transaction, args: &FundingArgs) -> Result<Value> {
    tracing::info!(tx_id = tx.id(), kind = %tx.kind(), fee = tx.fee(), "transaction built");
    let value = serde_json::to_value(tx)?;
    match &args.out {
        Some(path) => {
            write_json(path, tx)?;
            Ok(json!({"id": tx.id(), "written": path.display().to_string()}))
        }
        None => Ok(value),
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

pub fn verify(args: &VerifyArgs) -> Result<Value> {
    let tx = read_transaction(&args.tx)?;

    let outcome = match (&args.public_key, &args.utxos, &args.keys) {
        (Some(public_key), _, _) => {
            let key = PublicKey::from_hex(public_key).context("invalid public key")?;
            verify_transaction(&tx, |_| Some(key))
        }
        (None, Some(utxos), Some(keys)) => {
            let pool: Vec<Utxo> = read_json(utxos)?;
            let owners = owner_keys(keys)?;
            verify_transaction(&tx, |input| {
                pool.iter()
                    .find(|u| u.tx_id == input.source_tx_id && u.index == input.output_index)
                    .and_then(|u| owners.get(&u.address).copied())
            })
        }
        _ => bail!("pass --public-key, or --utxos together with --keys"),
    };

    Ok(match outcome {
        Ok(()) => json!({"id": tx.id(), "valid": true}),
        Err(err) => {
            tracing::warn!(tx_id = tx.id(), error = %err, "verification failed");
            json!({"id": tx.id(), "valid": false, "error": err.to_string()})
        }
    })
}

fn owner_keys(path: &Path) -> Result<HashMap<String, PublicKey>> {
    let raw: HashMap<String, String> = read_json(path)?;
    raw.into_iter()
        .map(|(address, hex)| {
            let key = PublicKey::from_hex(&hex)
                .with_context(|| format!("invalid public key for {}", address))?;
            Ok((address, key))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

pub fn apply(args: &ApplyArgs) -> Result<Value> {
    let tx = read_transaction(&args.tx)?;
    let exec = executor(&args.state)?;

    let receipt = exec
        .apply(&tx)
        .with_context(|| format!("failed to apply transaction {}", tx.id()))?;

    save_state(&args.state.state, exec.store())?;
    Ok(serde_json::to_value(&receipt)?)
}

pub fn query(args: &QueryArgs) -> Result<Value> {
    let exec = executor(&args.state)?;
    let params = parse_inline(&args.params)?;
    let invocation = exec
        .query(&args.contract, &args.caller, &args.method, params)
        .with_context(|| format!("query {} on {} failed", args.method, args.contract))?;
    Ok(serde_json::to_value(&invocation)?)
}

fn executor(args: &StateArgs) -> Result<TransactionExecutor> {
    let limits = args
        .max_steps
        .map(ExecutionLimits::with_max_steps)
        .unwrap_or_default();
    let store = load_state(&args.state)?;
    Ok(TransactionExecutor::new(Arc::new(store), ContractRuntime::new(limits)))
}

fn load_state(path: &Path) -> Result<StateStore> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no snapshot found, starting empty");
        return Ok(StateStore::new());
    }
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read state snapshot {}", path.display()))?;
    let snapshot = StateSnapshot::from_json(&json)
        .with_context(|| format!("malformed state snapshot {}", path.display()))?;
    StateStore::from_snapshot(snapshot)
        .with_context(|| format!("failed to restore state from {}", path.display()))
}

fn save_state(path: &Path, store: &StateStore) -> Result<()> {
    let json = store.snapshot().to_json()?;
    fs::write(path, json)
        .with_context(|| format!("failed to write state snapshot {}", path.display()))?;
    tracing::debug!(path = %path.display(), "state saved");
    Ok(())
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let raw = serde_json::to_string_pretty(value)?;
    fs::write(path, raw).with_context(|| format!("failed to write {}", path.display()))
}

fn read_transaction(path: &Path) -> Result<Transaction> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Transaction::from_json(&raw).with_context(|| format!("malformed transaction {}", path.display()))
}

fn parse_inline(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("params are not valid JSON: {}", raw))
}
