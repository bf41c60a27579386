//! Core value types for STRAT transactions.
//!
//! These map one-to-one onto the serialized transaction format that
//! collaborators store and exchange:
//!
//! ```text
//! { id, kind, inputs: [{ sourceTxId, outputIndex, amount, signature }],
//!   outputs: [{ address, amount }], payload, fee, timestamp }
//! ```
//!
//! All amounts are `u64` in the smallest unit. No floating point anywhere
//! near value.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::error::TransactionError;

// ---------------------------------------------------------------------------
// TransactionKind
// ---------------------------------------------------------------------------

/// What a transaction does besides moving value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Plain value transfer.
    #[default]
    Standard,
    /// Carries a [`DeployPayload`] creating a new contract.
    ContractDeploy,
    /// Carries a [`CallPayload`] invoking an existing contract.
    ContractCall,
}

impl TransactionKind {
    /// Stable wire name; also what the canonical codec hashes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::ContractDeploy => "contract_deploy",
            Self::ContractCall => "contract_call",
        }
    }

    /// `true` for the kinds that must carry a contract payload.
    pub fn is_contract(&self) -> bool {
        matches!(self, Self::ContractDeploy | Self::ContractCall)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// A reference to a previously created output, spent by this transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Input {
    /// Id of the transaction that created the spent output.
    pub source_tx_id: String,
    /// Position of the spent output in that transaction.
    pub output_index: u32,
    /// Value copied from the spent output, used for conservation checks.
    pub amount: u64,
    /// Hex-encoded Ed25519 signature over the transaction digest.
    /// Absent until signed.
    pub signature: Option<String>,
}

impl Input {
    /// An unsigned input.
    pub fn new(source_tx_id: impl Into<String>, output_index: u32, amount: u64) -> Self {
        Self {
            source_tx_id: source_tx_id.into(),
            output_index,
            amount,
            signature: None,
        }
    }

    /// The `(source_tx_id, output_index)` pair identifying the spent output.
    pub fn outpoint(&self) -> (&str, u32) {
        (&self.source_tx_id, self.output_index)
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

/// A newly created spendable output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// Recipient address. Never empty and never the zero sentinel.
    pub address: String,
    /// Strictly positive value.
    pub amount: u64,
}

impl Output {
    pub fn new(address: impl Into<String>, amount: u64) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }
}

// ---------------------------------------------------------------------------
// Utxo
// ---------------------------------------------------------------------------

/// A spendable output together with where it came from.
///
/// Ownership is by address: whoever `address` names may spend it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub tx_id: String,
    pub index: u32,
    pub address: String,
    pub amount: u64,
}

impl Utxo {
    pub fn new(tx_id: impl Into<String>, index: u32, address: impl Into<String>, amount: u64) -> Self {
        Self {
            tx_id: tx_id.into(),
            index,
            address: address.into(),
            amount,
        }
    }

    /// An unsigned input spending this output.
    pub fn to_input(&self) -> Input {
        Input::new(self.tx_id.clone(), self.index, self.amount)
    }
}

// ---------------------------------------------------------------------------
// Contract payloads
// ---------------------------------------------------------------------------

/// Payload of a `contract_deploy` transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployPayload {
    /// Contract code in its JSON form. Interpreted by the contract runtime.
    pub code: Value,
    /// Deployer and initial owner.
    pub owner: String,
}

/// Payload of a `contract_call` transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallPayload {
    pub contract_address: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    /// Invoking identity, handed to the contract as `caller`.
    pub caller: String,
}

impl DeployPayload {
    pub fn to_value(&self) -> Result<Value, TransactionError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: &Value) -> Result<Self, TransactionError> {
        Self::deserialize(value).map_err(|e| TransactionError::InvalidPayload {
            reason: e.to_string(),
        })
    }
}

impl CallPayload {
    pub fn to_value(&self) -> Result<Value, TransactionError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: &Value) -> Result<Self, TransactionError> {
        Self::deserialize(value).map_err(|e| TransactionError::InvalidPayload {
            reason: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
