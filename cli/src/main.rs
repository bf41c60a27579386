// Copyright (c) 2026 STRAT Contributors. MIT License.
// See LICENSE for details.

//! # strat
//!
//! Offline companion for the STRAT ledger core. Parses CLI arguments,
//! initializes logging and runs one subcommand:
//!
//! - `keygen`   : generate an Ed25519 keypair
//! - `transfer` : build and sign a value transfer
//! - `deploy`   : build and sign a contract deployment
//! - `call`     : build and sign a contract call
//! - `verify`   : check a transaction's id and signatures
//! - `apply`    : execute a transaction against a state snapshot
//! - `query`    : read-only contract call against a snapshot
//! - `version`  : print build version information

mod cli;
mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;
use serde_json::Value;

use cli::{Commands, StratCli};

const DEFAULT_LOG_LEVEL: &str = "strat=info,strat_contracts=info,strat_protocol=warn";

fn main() -> Result<()> {
    let cli = StratCli::parse();
    logging::init_logging(DEFAULT_LOG_LEVEL, cli.log_format)?;

    let output = match &cli.command {
        Commands::Keygen(args) => commands::keygen(args)?,
        Commands::Transfer(args) => commands::transfer(args)?,
        Commands::Deploy(args) => commands::deploy(args)?,
        Commands::Call(args) => commands::call(args)?,
        Commands::Verify(args) => commands::verify(args)?,
        Commands::Apply(args) => commands::apply(args)?,
        Commands::Query(args) => commands::query(args)?,
        Commands::Version => {
            print_version();
            return Ok(());
        }
    };

    print_json(&output)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("strat           {}", env!("CARGO_PKG_VERSION"));
    println!("strat-protocol  {}", env!("CARGO_PKG_VERSION"));
}
