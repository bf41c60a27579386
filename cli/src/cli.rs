//! # CLI Interface
//!
//! Argument structure for `strat`, built with `clap` derive. Every flag
//! that names a file or a secret can also come from the environment.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::logging::LogFormat;

/// Offline tool for STRAT transactions and contract state.
///
/// Builds and signs transactions from a UTXO file, verifies them, and
/// applies contract transactions to a JSON state snapshot. Results are
/// printed to stdout as JSON; logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "strat", version, propagate_version = true)]
pub struct StratCli {
    /// Log output format.
    #[arg(long, global = true, env = "STRAT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate an Ed25519 keypair.
    Keygen(KeygenArgs),
    /// Build and sign a value transfer.
    Transfer(TransferArgs),
    /// Build and sign a contract deployment.
    Deploy(DeployArgs),
    /// Build and sign a contract call.
    Call(CallArgs),
    /// Check a transaction's id and input signatures.
    Verify(VerifyArgs),
    /// Execute a transaction against a state snapshot and save the result.
    Apply(ApplyArgs),
    /// Run a contract method against a snapshot without saving anything.
    Query(QueryArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Also write the hex secret key to this file (mode 0600 on Unix).
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Inputs shared by every command that builds a transaction.
#[derive(Args, Debug)]
pub struct FundingArgs {
    /// JSON array of spendable outputs: `[{"txId", "index", "address", "amount"}]`.
    #[arg(long)]
    pub utxos: PathBuf,

    /// Hex-encoded Ed25519 secret key that signs every input.
    #[arg(long, env = "STRAT_KEY", hide_env_values = true)]
    pub key: String,

    /// Fee override. Each transaction kind has its own default.
    #[arg(long)]
    pub fee: Option<u64>,

    /// Write the transaction here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct TransferArgs {
    #[arg(long)]
    pub from: String,

    #[arg(long)]
    pub to: String,

    #[arg(long)]
    pub amount: u64,

    #[command(flatten)]
    pub funding: FundingArgs,
}

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Deployer and initial owner.
    #[arg(long)]
    pub owner: String,

    /// JSON file with the contract code, e.g. `{"token": {...}}`.
    #[arg(long)]
    pub code: PathBuf,

    #[command(flatten)]
    pub funding: FundingArgs,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    #[arg(long)]
    pub caller: String,

    /// Address of the deployed contract.
    #[arg(long)]
    pub contract: String,

    #[arg(long)]
    pub method: String,

    /// Method params as inline JSON.
    #[arg(long, default_value = "null")]
    pub params: String,

    #[command(flatten)]
    pub funding: FundingArgs,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Transaction JSON file.
    #[arg(long)]
    pub tx: PathBuf,

    /// Hex public key expected to have signed every input.
    #[arg(long, conflicts_with_all = ["utxos", "keys"])]
    pub public_key: Option<String>,

    /// UTXO file used to find the owner address of each input.
    #[arg(long, requires = "keys")]
    pub utxos: Option<PathBuf>,

    /// JSON object mapping owner address to hex public key.
    #[arg(long, requires = "utxos")]
    pub keys: Option<PathBuf>,
}

/// Where contract state lives and how much an invocation may spend.
#[derive(Args, Debug)]
pub struct StateArgs {
    /// JSON state snapshot. Created on first apply.
    #[arg(long, env = "STRAT_STATE", default_value = "strat-state.json")]
    pub state: PathBuf,

    /// Step budget per invocation.
    #[arg(long, env = "STRAT_MAX_STEPS")]
    pub max_steps: Option<u64>,
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Transaction JSON file.
    #[arg(long)]
    pub tx: PathBuf,

    #[command(flatten)]
    pub state: StateArgs,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    #[arg(long)]
    pub contract: String,

    #[arg(long, default_value = "0x0")]
    pub caller: String,

    #[arg(long)]
    pub method: String,

    #[arg(long, default_value = "null")]
    pub params: String,

    #[command(flatten)]
    pub state: StateArgs,
}
