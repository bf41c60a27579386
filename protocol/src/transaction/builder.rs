//! Transaction construction via the builder pattern.
//!
//! A [`TransactionBuilder`] owns a draft exclusively. Mutators consume and
//! return the builder so calls chain; the few that can reject their input
//! (`add_output`, `set_fee`) return `Result` and chain with `?`.
//!
//! ```rust
//! use strat_protocol::crypto::Keypair;
//! use strat_protocol::transaction::TransactionBuilder;
//!
//! # fn main() -> Result<(), strat_protocol::transaction::TransactionError> {
//! let keypair = Keypair::generate();
//! let tx = TransactionBuilder::new()
//!     .add_input("9f2c...", 0, 60)
//!     .add_input("41d7...", 1, 50)
//!     .add_output("B", 80)?
//!     .add_output("A", 29)?
//!     .set_fee(1)?
//!     .sign(&keypair, None)?
//!     .finalize()?;
//! assert_eq!(tx.id(), tx.compute_id()?);
//! # Ok(())
//! # }
//! ```
//!
//! Nothing is validated eagerly beyond the per-field checks. `validate()`
//! collects every issue at once; `finalize()` refuses to produce a
//! transaction while any issue remains.

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{TransactionError, ValidationIssue, ValidationReport};
use super::types::{Input, Output, TransactionKind};
use crate::codec::{encode_transaction, EncodingError};
use crate::config::is_null_address;
use crate::crypto::hash::sha256_array;
use crate::crypto::keys::Keypair;
use crate::crypto::signatures::sign;

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A finalized STRAT transaction.
///
/// Only [`TransactionBuilder::finalize`] and deserialization create one, and
/// no method mutates it afterwards. `id` is `hex(sha256(canonical bytes))`
/// over every field except `id` and the input signatures, so
/// [`Transaction::compute_id`] always reproduces it for an untampered
/// transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    id: String,
    kind: TransactionKind,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    payload: Option<Value>,
    fee: u64,
    timestamp: u64,
}

impl Transaction {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    /// Unix milliseconds at draft creation (or as set explicitly).
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Canonical bytes of every hashed field.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        encode_transaction(
            self.kind,
            &self.inputs,
            &self.outputs,
            self.payload.as_ref(),
            self.fee,
            self.timestamp,
        )
    }

    /// The 32-byte digest every input signs.
    pub fn digest(&self) -> Result<[u8; 32], EncodingError> {
        Ok(sha256_array(&self.canonical_bytes()?))
    }

    /// Recomputes the id from the current field values.
    pub fn compute_id(&self) -> Result<String, EncodingError> {
        Ok(hex::encode(self.digest()?))
    }

    /// Sum of input amounts, `None` on overflow.
    pub fn input_total(&self) -> Option<u64> {
        checked_sum(self.inputs.iter().map(|i| i.amount))
    }

    /// Sum of output amounts, `None` on overflow.
    pub fn output_total(&self) -> Option<u64> {
        checked_sum(self.outputs.iter().map(|o| o.amount))
    }

    /// `true` when every input carries a signature.
    pub fn is_fully_signed(&self) -> bool {
        !self.inputs.is_empty() && self.inputs.iter().all(Input::is_signed)
    }

    /// Structural and conservation findings for this transaction, by the
    /// same rules as [`TransactionBuilder::validate`] (including the
    /// contract-kind exception to the one-output rule).
    pub fn validate(&self) -> ValidationReport {
        ValidationReport::from_issues(collect_issues(
            self.kind,
            &self.inputs,
            &self.outputs,
            self.payload.as_ref(),
            self.fee,
        ))
    }

    /// Pretty JSON in the wire shape.
    pub fn to_json(&self) -> Result<String, TransactionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses the wire shape. The id is *not* checked here; run
    /// [`super::verify_transaction`] on anything received from outside.
    pub fn from_json(json: &str) -> Result<Self, TransactionError> {
        Ok(serde_json::from_str(json)?)
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Transaction`].
///
/// Defaults: kind `standard`, fee 0, no payload, timestamp taken from the
/// UTC clock when the builder is created (override with `set_timestamp`).
/// The timestamp is fixed at creation so finalizing twice yields the same
/// id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBuilder {
    kind: TransactionKind,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    payload: Option<Value>,
    fee: u64,
    timestamp: u64,
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionBuilder {
    /// An empty standard draft stamped with the current time.
    pub fn new() -> Self {
        Self {
            kind: TransactionKind::Standard,
            inputs: Vec::new(),
            outputs: Vec::new(),
            payload: None,
            fee: 0,
            timestamp: now_millis(),
        }
    }

    /// Re-opens a finalized transaction as a draft, signatures included.
    pub fn from_transaction(tx: &Transaction) -> Self {
        Self {
            kind: tx.kind,
            inputs: tx.inputs.clone(),
            outputs: tx.outputs.clone(),
            payload: tx.payload.clone(),
            fee: tx.fee,
            timestamp: tx.timestamp,
        }
    }

    /// Spends `(source_tx_id, index)` worth `amount`.
    pub fn add_input(mut self, source_tx_id: impl Into<String>, index: u32, amount: u64) -> Self {
        self.inputs.push(Input::new(source_tx_id, index, amount));
        self
    }

    /// Pays `amount` to `address`.
    ///
    /// Rejects the zero sentinel (and empty addresses) with `InvalidAddress`
    /// and non-positive amounts with `InvalidAmount`.
    pub fn add_output(
        mut self,
        address: impl Into<String>,
        amount: i64,
    ) -> Result<Self, TransactionError> {
        let address = address.into();
        if is_null_address(&address) {
            return Err(TransactionError::InvalidAddress { address });
        }
        if amount <= 0 {
            return Err(TransactionError::InvalidAmount { amount });
        }
        let amount = u64::try_from(amount).map_err(|_| TransactionError::InvalidAmount { amount })?;
        self.outputs.push(Output::new(address, amount));
        Ok(self)
    }

    /// Sets the fee. Negative fees are rejected with `InvalidFee`.
    pub fn set_fee(mut self, fee: i64) -> Result<Self, TransactionError> {
        self.fee = u64::try_from(fee).map_err(|_| TransactionError::InvalidFee { fee })?;
        Ok(self)
    }

    pub fn set_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn set_kind(mut self, kind: TransactionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Overrides the creation timestamp (Unix milliseconds).
    pub fn set_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Clears the draft back to a fresh standard transaction.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    /// Every structural and conservation problem in the draft.
    ///
    /// Covers: at least one input, at least one output for standard
    /// transactions, a payload for contract transactions, a non-null
    /// address and positive amount on every output, no duplicate
    /// outpoints, and `sum(inputs) >= sum(outputs) + fee`.
    ///
    /// Contract deploys and calls are deliberately allowed to carry no
    /// outputs: a call whose inputs exactly cover the fee has nothing to
    /// pay back, and the payload stands in as the transaction's effect.
    pub fn validate(&self) -> ValidationReport {
        ValidationReport::from_issues(collect_issues(
            self.kind,
            &self.inputs,
            &self.outputs,
            self.payload.as_ref(),
            self.fee,
        ))
    }

    /// The digest inputs sign, computed from the current draft.
    pub fn digest(&self) -> Result<[u8; 32], TransactionError> {
        let bytes = encode_transaction(
            self.kind,
            &self.inputs,
            &self.outputs,
            self.payload.as_ref(),
            self.fee,
            self.timestamp,
        )?;
        Ok(sha256_array(&bytes))
    }

    /// Signs one input (`Some(index)`) or every input (`None`) with the
    /// current digest.
    ///
    /// This proves possession of `keypair` only. Whether that key owns the
    /// referenced outputs is checked by `verify_transaction`.
    pub fn sign(
        mut self,
        keypair: &Keypair,
        input_index: Option<usize>,
    ) -> Result<Self, TransactionError> {
        let digest = self.digest()?;
        let signature = sign(keypair, &digest).to_hex();

        match input_index {
            Some(index) => {
                let len = self.inputs.len();
                let input = self
                    .inputs
                    .get_mut(index)
                    .ok_or(TransactionError::InputIndexOutOfBounds { index, len })?;
                input.signature = Some(signature);
            }
            None => {
                for input in &mut self.inputs {
                    input.signature = Some(signature.clone());
                }
            }
        }

        Ok(self)
    }

    /// Validates the draft and produces the immutable transaction.
    ///
    /// Does not consume the builder; finalizing the same draft twice yields
    /// the same id.
    pub fn finalize(&self) -> Result<Transaction, TransactionError> {
        let report = self.validate();
        if !report.valid {
            tracing::debug!(issues = report.errors.len(), "transaction draft rejected");
            return Err(TransactionError::Validation {
                errors: report.errors,
            });
        }

        let mut tx = Transaction {
            id: String::new(),
            kind: self.kind,
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            payload: self.payload.clone(),
            fee: self.fee,
            timestamp: self.timestamp,
        };
        tx.id = tx.compute_id()?;

        tracing::debug!(
            id = %tx.id,
            kind = %tx.kind,
            inputs = tx.inputs.len(),
            outputs = tx.outputs.len(),
            fee = tx.fee,
            "transaction finalized"
        );
        Ok(tx)
    }

    /// Draft as pretty JSON.
    pub fn to_json(&self) -> Result<String, TransactionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Restores a draft saved with [`Self::to_json`].
    pub fn from_json(json: &str) -> Result<Self, TransactionError> {
        Ok(serde_json::from_str(json)?)
    }
}

// ---------------------------------------------------------------------------
// Validation rules
// ---------------------------------------------------------------------------

fn checked_sum(mut amounts: impl Iterator<Item = u64>) -> Option<u64> {
    amounts.try_fold(0u64, |acc, a| acc.checked_add(a))
}

fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Shared by builder drafts and finalized transactions.
pub(crate) fn collect_issues(
    kind: TransactionKind,
    inputs: &[Input],
    outputs: &[Output],
    payload: Option<&Value>,
    fee: u64,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if inputs.is_empty() {
        issues.push(ValidationIssue::NoInputs);
    }

    if kind.is_contract() {
        if payload.is_none() {
            issues.push(ValidationIssue::MissingPayload);
        }
    } else if outputs.is_empty() {
        issues.push(ValidationIssue::NoOutputs);
    }

    for (index, output) in outputs.iter().enumerate() {
        if is_null_address(&output.address) {
            issues.push(ValidationIssue::InvalidOutput {
                index,
                reason: format!("address {:?} is empty or the zero address", output.address),
            });
        }
        if output.amount == 0 {
            issues.push(ValidationIssue::InvalidOutput {
                index,
                reason: "amount must be positive".to_string(),
            });
        }
    }

    let mut seen = HashSet::with_capacity(inputs.len());
    for input in inputs {
        if !seen.insert(input.outpoint()) {
            issues.push(ValidationIssue::DuplicateInput {
                source_tx_id: input.source_tx_id.clone(),
                output_index: input.output_index,
            });
        }
    }

    let input_total = checked_sum(inputs.iter().map(|i| i.amount));
    let required = checked_sum(outputs.iter().map(|o| o.amount)).and_then(|o| o.checked_add(fee));

    match (input_total, required) {
        (Some(inputs), Some(required)) if inputs < required => {
            issues.push(ValidationIssue::InsufficientInputs { inputs, required });
        }
        (Some(_), Some(_)) => {}
        _ => issues.push(ValidationIssue::AmountOverflow),
    }

    issues
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TS: u64 = 1_700_000_000_000;

    fn draft() -> TransactionBuilder {
        TransactionBuilder::new()
            .set_timestamp(TS)
            .add_input("aa", 0, 60)
            .add_input("bb", 1, 50)
            .add_output("B", 80)
            .unwrap()
            .add_output("A", 29)
            .unwrap()
            .set_fee(1)
            .unwrap()
    }

    #[test]
    fn finalize_is_idempotent() {
        let builder = draft();
        let tx1 = builder.finalize().unwrap();
        let tx2 = builder.finalize().unwrap();
        assert_eq!(tx1.id(), tx2.id());
        assert_eq!(tx1.id().len(), 64);
        assert_eq!(tx1.id(), tx1.compute_id().unwrap());
    }

    #[test]
    fn zero_address_rejected() {
        let err = TransactionBuilder::new().add_output("0x0", 5).unwrap_err();
        assert!(matches!(err, TransactionError::InvalidAddress { .. }));
        let err = TransactionBuilder::new().add_output("", 5).unwrap_err();
        assert!(matches!(err, TransactionError::InvalidAddress { .. }));
    }

    #[test]
    fn non_positive_amount_rejected() {
        for amount in [0, -1, i64::MIN] {
            let err = TransactionBuilder::new().add_output("B", amount).unwrap_err();
            assert!(matches!(err, TransactionError::InvalidAmount { .. }));
        }
    }

    #[test]
    fn negative_fee_rejected_zero_fee_allowed() {
        let err = TransactionBuilder::new().set_fee(-1).unwrap_err();
        assert!(matches!(err, TransactionError::InvalidFee { fee: -1 }));
        assert_eq!(TransactionBuilder::new().set_fee(0).unwrap().fee(), 0);
    }

    #[test]
    fn validate_accumulates_all_errors() {
        let report = TransactionBuilder::new().set_fee(5).unwrap().validate();
        assert!(!report.valid);
        assert_eq!(
            report.errors,
            vec![
                ValidationIssue::NoInputs,
                ValidationIssue::NoOutputs,
                ValidationIssue::InsufficientInputs {
                    inputs: 0,
                    required: 5
                },
            ]
        );
    }

    #[test]
    fn conservation_violation_blocks_finalize() {
        let builder = TransactionBuilder::new()
            .add_input("aa", 0, 50)
            .add_output("B", 50)
            .unwrap()
            .set_fee(1)
            .unwrap();

        match builder.finalize() {
            Err(TransactionError::Validation { errors }) => {
                assert_eq!(
                    errors,
                    vec![ValidationIssue::InsufficientInputs {
                        inputs: 50,
                        required: 51
                    }]
                );
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn exact_conservation_is_valid() {
        let builder = TransactionBuilder::new()
            .add_input("aa", 0, 51)
            .add_output("B", 50)
            .unwrap()
            .set_fee(1)
            .unwrap();
        assert!(builder.validate().valid);
    }

    #[test]
    fn duplicate_outpoint_detected() {
        let report = TransactionBuilder::new()
            .add_input("aa", 0, 50)
            .add_input("aa", 0, 50)
            .add_output("B", 10)
            .unwrap()
            .validate();
        assert_eq!(
            report.errors,
            vec![ValidationIssue::DuplicateInput {
                source_tx_id: "aa".into(),
                output_index: 0
            }]
        );
    }

    #[test]
    fn same_source_different_index_is_fine() {
        let report = TransactionBuilder::new()
            .add_input("aa", 0, 50)
            .add_input("aa", 1, 50)
            .add_output("B", 10)
            .unwrap()
            .validate();
        assert!(report.valid);
    }

    #[test]
    fn overflow_is_reported_not_wrapped() {
        let report = TransactionBuilder::new()
            .add_input("aa", 0, u64::MAX)
            .add_input("bb", 0, 1)
            .add_output("B", 10)
            .unwrap()
            .validate();
        assert_eq!(report.errors, vec![ValidationIssue::AmountOverflow]);
    }

    #[test]
    fn contract_kinds_need_payload_not_outputs() {
        let call = TransactionBuilder::new()
            .set_kind(TransactionKind::ContractCall)
            .add_input("aa", 0, 5)
            .set_fee(5)
            .unwrap();
        assert_eq!(call.validate().errors, vec![ValidationIssue::MissingPayload]);

        let call = call.set_payload(json!({"method": "noop"}));
        assert!(call.validate().valid);
    }

    #[test]
    fn payload_key_order_does_not_change_id() {
        let mut a = serde_json::Map::new();
        a.insert("x".into(), json!(1));
        a.insert("y".into(), json!(2));
        let mut b = serde_json::Map::new();
        b.insert("y".into(), json!(2));
        b.insert("x".into(), json!(1));

        let tx_a = draft().set_payload(Value::Object(a)).finalize().unwrap();
        let tx_b = draft().set_payload(Value::Object(b)).finalize().unwrap();
        assert_eq!(tx_a.id(), tx_b.id());
    }

    #[test]
    fn float_payload_is_an_encoding_error() {
        let err = draft().set_payload(json!({"price": 0.5})).finalize().unwrap_err();
        assert!(matches!(err, TransactionError::Encoding(_)));
    }

    #[test]
    fn signing_does_not_change_id() {
        let kp = Keypair::from_seed(&[1u8; 32]);
        let unsigned = draft().finalize().unwrap();
        let signed = draft().sign(&kp, None).unwrap().finalize().unwrap();
        assert_eq!(unsigned.id(), signed.id());
        assert!(signed.is_fully_signed());
        assert!(!unsigned.is_fully_signed());
    }

    #[test]
    fn sign_all_inputs_identically() {
        let kp = Keypair::from_seed(&[1u8; 32]);
        let tx = draft().sign(&kp, None).unwrap().finalize().unwrap();
        assert_eq!(tx.inputs()[0].signature, tx.inputs()[1].signature);
    }

    #[test]
    fn sign_single_input() {
        let kp = Keypair::from_seed(&[1u8; 32]);
        let builder = draft().sign(&kp, Some(1)).unwrap();
        assert!(builder.inputs()[0].signature.is_none());
        assert!(builder.inputs()[1].signature.is_some());

        let err = draft().sign(&kp, Some(2)).unwrap_err();
        assert!(matches!(
            err,
            TransactionError::InputIndexOutOfBounds { index: 2, len: 2 }
        ));
    }

    #[test]
    fn different_fee_different_id() {
        let a = draft().finalize().unwrap();
        let b = TransactionBuilder::from_transaction(&a)
            .set_fee(0)
            .unwrap()
            .finalize()
            .unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn builder_uses_current_time_if_not_set() {
        let before = now_millis();
        let builder = TransactionBuilder::new();
        let after = now_millis();
        let tx = builder
            .add_input("aa", 0, 2)
            .add_output("B", 1)
            .unwrap()
            .finalize()
            .unwrap();
        assert!(tx.timestamp() >= before && tx.timestamp() <= after);
    }

    #[test]
    fn reset_clears_draft() {
        let mut builder = draft();
        builder.reset();
        assert!(builder.inputs().is_empty());
        assert!(builder.outputs().is_empty());
        assert_eq!(builder.fee(), 0);
        assert_eq!(builder.kind(), TransactionKind::Standard);
    }

    #[test]
    fn transaction_json_roundtrip() {
        let tx = draft().finalize().unwrap();
        let json = tx.to_json().unwrap();
        assert!(json.contains("\"sourceTxId\""));
        assert_eq!(Transaction::from_json(&json).unwrap(), tx);
    }

    #[test]
    fn draft_json_roundtrip() {
        let builder = draft().set_payload(json!({"memo": "rent"}));
        let restored = TransactionBuilder::from_json(&builder.to_json().unwrap()).unwrap();
        assert_eq!(restored, builder);
        assert_eq!(
            restored.finalize().unwrap().id(),
            builder.finalize().unwrap().id()
        );
    }
}
