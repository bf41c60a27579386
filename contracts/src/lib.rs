// Copyright (c) 2026 STRAT Contributors. MIT License.
// See LICENSE for details.

//! # STRAT Contracts
//!
//! Executes contract transactions against a [`strat_protocol::storage::StateStore`].
//!
//! - **runtime**: The isolation boundary. Code sees its caller, its params,
//!   a metered view of its own state and an event sink. Nothing else.
//! - **meter**: Deterministic step accounting.
//! - **code**: The closed set of contract shapes: stack-machine scripts
//!   and the built-in token.
//! - **script**: The script interpreter.
//! - **token**: The fungible token and its named operations.
//! - **executor**: Deploy and call transactions, wrapped in checkpoints.
//!
//! ## Failure model
//!
//! 1. A contract that reverts or runs out of steps leaves no trace in
//!    state. The executor reports it in the receipt.
//! 2. Anything that stops execution from starting (bad id, unknown
//!    contract, checkpoint held elsewhere) is an [`ExecutionError`].
//! 3. No retries. A `CheckpointConflict` goes straight back to the caller.

pub mod code;
pub mod error;
pub mod events;
pub mod executor;
pub mod meter;
pub mod runtime;
pub mod script;
pub mod token;

pub use code::ContractCode;
pub use error::ExecutionError;
pub use events::Event;
pub use executor::{contract_address, ExecutionReceipt, ReceiptStatus, TransactionExecutor};
pub use runtime::{ContractRuntime, Invocation};
pub use script::{Op, Script};
pub use token::{TokenCall, TokenSpec};
