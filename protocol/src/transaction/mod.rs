//! # Transactions
//!
//! Construction, signing and verification of STRAT transactions. Every
//! value transfer, contract deployment and contract call is a
//! [`Transaction`].
//!
//! ## Layout
//!
//! ```text
//! types.rs        Value types (TransactionKind, Input, Output, Utxo, payloads)
//! error.rs        TransactionError and the ValidationIssue catalogue
//! builder.rs      Transaction and the fluent TransactionBuilder
//! templates.rs    create_transfer / create_contract_deploy / create_contract_call
//! verification.rs Id, structure and per-input signature checks
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Draft**: add inputs and outputs to a [`TransactionBuilder`].
//! 2. **Validate**: [`TransactionBuilder::validate`] lists every problem.
//! 3. **Sign**: [`TransactionBuilder::sign`] signs the canonical digest.
//! 4. **Finalize**: [`TransactionBuilder::finalize`] computes the id and
//!    freezes the result.
//! 5. **Verify**: receivers run [`verify_transaction`] with their own view
//!    of who owns each spent output.
//!
//! The id is `hex(sha256(canonical bytes))`. Signatures are not part of the
//! hashed bytes, so signing after finalizing a draft cannot move the id.

pub mod builder;
pub mod error;
pub mod templates;
pub mod types;
pub mod verification;

pub use builder::{Transaction, TransactionBuilder};
pub use error::{TransactionError, ValidationIssue, ValidationReport};
pub use templates::{create_contract_call, create_contract_deploy, create_transfer};
pub use types::{CallPayload, DeployPayload, Input, Output, TransactionKind, Utxo};
pub use verification::{verify_id, verify_transaction};
