// Copyright (c) 2026 STRAT Contributors. MIT License.
// See LICENSE for details.

//! # STRAT Ledger Core
//!
//! The part of STRAT that has to be right: building transactions that
//! conserve value, hashing them the same way on every machine, and keeping
//! contract state in a store that can take a checkpoint and undo it exactly.
//!
//! ## Architecture
//!
//! Modules, leaf-first:
//!
//! - **codec**: Canonical byte encoding. One logical value, one byte string.
//! - **crypto**: SHA-256/BLAKE3 hashing and Ed25519 signatures.
//! - **utxo**: First-fit selection of spendable outputs.
//! - **transaction**: Builder, validation, signing and verification.
//! - **storage**: Versioned per-contract key/value state with checkpoints.
//! - **config**: Protocol constants and execution limits.
//!
//! ## Control Flow
//!
//! ```text
//! TransactionBuilder → select_utxos → codec → sha256 → Ed25519 → Transaction
//!                                                                   │
//!                      strat-contracts executor ← StateStore ←──────┘
//! ```
//!
//! Contract execution itself lives in the `strat-contracts` crate; this
//! crate only knows how to store state and hand out checkpoints.

pub mod codec;
pub mod config;
pub mod crypto;
pub mod storage;
pub mod transaction;
pub mod utxo;
