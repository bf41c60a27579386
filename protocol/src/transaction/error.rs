//! Errors and validation findings for transaction construction.
//!
//! Recoverable input problems (`InvalidAddress`, `InvalidAmount`,
//! `InvalidFee`, `InsufficientFunds`, `Validation`) are meant to be fixed by
//! the caller and retried. `Encoding` is a caller bug. Verification failures
//! mean the transaction must be rejected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::EncodingError;

/// One structural or conservation problem found by `validate()`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ValidationIssue {
    #[error("transaction must have at least one input")]
    NoInputs,

    #[error("transaction must have at least one output")]
    NoOutputs,

    #[error("output {index} is invalid: {reason}")]
    InvalidOutput { index: usize, reason: String },

    #[error("contract transaction must carry a payload")]
    MissingPayload,

    #[error("input {source_tx_id}:{output_index} is referenced more than once")]
    DuplicateInput {
        source_tx_id: String,
        output_index: u32,
    },

    #[error("insufficient input amount: inputs total {inputs}, outputs plus fee need {required}")]
    InsufficientInputs { inputs: u64, required: u64 },

    #[error("amount total overflows u64")]
    AmountOverflow,
}

/// The result of `validate()`: every issue found, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn from_issues(errors: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from building, signing and verifying transactions.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Output address is empty or the zero sentinel.
    #[error("invalid output address: {address:?}")]
    InvalidAddress { address: String },

    /// Output amount is not strictly positive.
    #[error("output amount must be positive, got {amount}")]
    InvalidAmount { amount: i64 },

    /// Fee is negative.
    #[error("fee cannot be negative, got {fee}")]
    InvalidFee { fee: i64 },

    /// `finalize()` was called on a draft with validation issues.
    #[error("transaction validation failed: {}", join_issues(.errors))]
    Validation { errors: Vec<ValidationIssue> },

    /// The UTXO pool cannot cover amount plus fee.
    #[error("insufficient funds: pool holds {available}, need {required}")]
    InsufficientFunds { available: u64, required: u64 },

    /// Arithmetic on amounts overflowed.
    #[error("amount arithmetic overflowed")]
    AmountOverflow,

    /// Canonical encoding failed (unsupported payload shape).
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// `sign()` was asked for an input that does not exist.
    #[error("input index {index} out of bounds (transaction has {len} inputs)")]
    InputIndexOutOfBounds { index: usize, len: usize },

    /// Payload does not match the shape its kind requires.
    #[error("invalid payload: {reason}")]
    InvalidPayload { reason: String },

    /// Stored id does not match the recomputed one.
    #[error("transaction id mismatch: expected {expected}, got {actual}")]
    IdMismatch { expected: String, actual: String },

    #[error("input {index} is unsigned")]
    MissingSignature { index: usize },

    #[error("input {index} has a malformed signature: {reason}")]
    MalformedSignature { index: usize, reason: String },

    /// The identity collaborator does not know who owns the spent output.
    #[error("no owner key known for input {index} ({source_tx_id}:{output_index})")]
    UnknownOwner {
        index: usize,
        source_tx_id: String,
        output_index: u32,
    },

    /// Signature does not verify against the owner's public key.
    #[error("input {index} signature does not verify against its owner")]
    InvalidSignature { index: usize },

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_validity_follows_issues() {
        assert!(ValidationReport::from_issues(vec![]).valid);
        assert!(!ValidationReport::from_issues(vec![ValidationIssue::NoInputs]).valid);
    }

    #[test]
    fn validation_error_lists_every_issue() {
        let err = TransactionError::Validation {
            errors: vec![ValidationIssue::NoInputs, ValidationIssue::NoOutputs],
        };
        let msg = err.to_string();
        assert!(msg.contains("at least one input"));
        assert!(msg.contains("at least one output"));
    }

    #[test]
    fn issues_serialize_with_tag() {
        let json = serde_json::to_value(ValidationIssue::InsufficientInputs {
            inputs: 10,
            required: 20,
        })
        .unwrap();
        assert_eq!(json["issue"], "insufficient_inputs");
        assert_eq!(json["required"], 20);
    }
}
