//! # Transaction Executor
//!
//! Turns finalized transactions into committed contract state.
//!
//! ```text
//! standard         -> no-op receipt (value movement is the caller's ledger)
//! contract_deploy  -> derive address, checkpoint, store code, construct, commit
//! contract_call    -> load code, checkpoint, invoke, commit
//! ```
//!
//! Every contract execution runs inside a store checkpoint. A revert or
//! step exhaustion rolls the checkpoint back and is reported in the
//! receipt's status; the transaction itself was still processed.
//! Everything else (bad id, bad payload, unknown contract, a checkpoint
//! already open on the address) is returned as an error and nothing is
//! written. Conflicts are not retried here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use strat_protocol::codec::CanonicalEncoder;
use strat_protocol::config::CONTRACT_ADDRESS_CONTEXT;
use strat_protocol::crypto::domain_separated_hash;
use strat_protocol::storage::{Checkpoint, StateStore, StateView};
use strat_protocol::transaction::{
    verify_id, CallPayload, DeployPayload, Transaction, TransactionError, TransactionKind,
};

use crate::code::ContractCode;
use crate::error::ExecutionError;
use crate::events::Event;
use crate::runtime::{ContractRuntime, Invocation, CODE_KEY, DEPLOYER_KEY};

/// Address of a contract deployed by `owner` with `code` in transaction
/// `tx_id`. Hex of a domain-separated BLAKE3 hash over the canonical
/// encoding of the three, so redeploying identical code in a new
/// transaction yields a new address.
pub fn contract_address(owner: &str, code: &Value, tx_id: &str) -> Result<String, ExecutionError> {
    let mut enc = CanonicalEncoder::new();
    enc.put_str(owner)?.put_value(code)?.put_str(tx_id)?;
    Ok(hex::encode(domain_separated_hash(
        CONTRACT_ADDRESS_CONTEXT,
        &enc.finish(),
    )))
}

/// How a processed transaction ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Success,
    Reverted { reason: String },
    ResourceExhausted { used: u64, limit: u64 },
}

impl ReceiptStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// What the executor hands back to the submitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReceipt {
    pub tx_id: String,
    pub kind: TransactionKind,
    pub status: ReceiptStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub events: Vec<Event>,
    pub steps_used: u64,
    /// Version of the contract's state after commit. `None` when nothing
    /// was committed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_version: Option<u64>,
}

impl ExecutionReceipt {
    fn new(tx: &Transaction) -> Self {
        Self {
            tx_id: tx.id().to_string(),
            kind: tx.kind(),
            status: ReceiptStatus::Success,
            contract_address: None,
            result: Value::Null,
            events: Vec::new(),
            steps_used: 0,
            state_version: None,
        }
    }

    fn succeeded(mut self, invocation: Invocation, version: u64) -> Self {
        self.result = invocation.result;
        self.events = invocation.events;
        self.steps_used = invocation.steps_used;
        self.state_version = Some(version);
        self
    }

    fn failed(mut self, err: ExecutionError) -> Result<Self, ExecutionError> {
        match err {
            ExecutionError::ExecutionReverted { reason } => {
                self.status = ReceiptStatus::Reverted { reason };
            }
            ExecutionError::ResourceExhausted { used, limit } => {
                self.steps_used = used;
                self.status = ReceiptStatus::ResourceExhausted { used, limit };
            }
            other => return Err(other),
        }
        Ok(self)
    }
}

/// Applies transactions to a shared [`StateStore`].
///
/// Cheap to clone; clones share the store. Executions on distinct contract
/// addresses may run concurrently from several threads.
#[derive(Debug, Clone)]
pub struct TransactionExecutor {
    store: Arc<StateStore>,
    runtime: ContractRuntime,
}

impl TransactionExecutor {
    pub fn new(store: Arc<StateStore>, runtime: ContractRuntime) -> Self {
        Self { store, runtime }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn runtime(&self) -> ContractRuntime {
        self.runtime
    }

    /// Executes `tx`. See the module docs for what ends up in the receipt
    /// versus the error.
    pub fn apply(&self, tx: &Transaction) -> Result<ExecutionReceipt, ExecutionError> {
        verify_id(tx)?;
        let report = tx.validate();
        if !report.valid {
            return Err(TransactionError::Validation {
                errors: report.errors,
            }
            .into());
        }

        match tx.kind() {
            TransactionKind::Standard => Ok(ExecutionReceipt::new(tx)),
            TransactionKind::ContractDeploy => self.deploy(tx),
            TransactionKind::ContractCall => self.call(tx),
        }
    }

    fn deploy(&self, tx: &Transaction) -> Result<ExecutionReceipt, ExecutionError> {
        let payload = DeployPayload::from_value(required_payload(tx)?)?;
        let code = ContractCode::from_value(&payload.code)?;
        let address = contract_address(&payload.owner, &payload.code, tx.id())?;

        // Checked under the checkpoint so a concurrent deploy of the same
        // transaction cannot slip in between the check and the write.
        let mut cp = self.store.checkpoint(&address)?;
        if cp.get(CODE_KEY).is_some() {
            self.store.rollback(cp);
            return Err(ExecutionError::ContractExists { address });
        }

        let mut receipt = ExecutionReceipt::new(tx);
        let outcome = store_code(&mut cp, &code, &payload.owner).and_then(|()| {
            self.runtime
                .construct(&address, &payload.owner, &code, &mut cp)
        });

        match outcome {
            Ok(invocation) => {
                let version = self.store.commit(cp)?;
                tracing::info!(
                    tx_id = tx.id(),
                    address = %address,
                    kind = code.kind_name(),
                    owner = %payload.owner,
                    "contract deployed"
                );
                receipt.contract_address = Some(address);
                Ok(receipt.succeeded(invocation, version))
            }
            Err(err) => {
                self.store.rollback(cp);
                tracing::warn!(tx_id = tx.id(), address = %address, error = %err, "deploy failed");
                receipt.failed(err)
            }
        }
    }

    fn call(&self, tx: &Transaction) -> Result<ExecutionReceipt, ExecutionError> {
        let payload = CallPayload::from_value(required_payload(tx)?)?;
        let code = self.load_code(&payload.contract_address)?;
        let params = call_params(&payload.method, &payload.params);

        let mut receipt = ExecutionReceipt::new(tx);
        receipt.contract_address = Some(payload.contract_address.clone());

        let mut cp = self.store.checkpoint(&payload.contract_address)?;
        let outcome = self.runtime.invoke(
            &payload.contract_address,
            &payload.caller,
            &params,
            &code,
            &mut cp,
        );

        match outcome {
            Ok(invocation) => {
                let version = self.store.commit(cp)?;
                tracing::info!(
                    tx_id = tx.id(),
                    address = %payload.contract_address,
                    method = %payload.method,
                    version,
                    "contract call committed"
                );
                Ok(receipt.succeeded(invocation, version))
            }
            Err(err) => {
                self.store.rollback(cp);
                tracing::warn!(
                    tx_id = tx.id(),
                    address = %payload.contract_address,
                    method = %payload.method,
                    error = %err,
                    "contract call rolled back"
                );
                receipt.failed(err)
            }
        }
    }

    /// Runs `method` against committed state without keeping any writes.
    /// Still needs the address's checkpoint, so it conflicts with a
    /// concurrent execution on the same contract.
    pub fn query(
        &self,
        address: &str,
        caller: &str,
        method: &str,
        params: Value,
    ) -> Result<Invocation, ExecutionError> {
        let code = self.load_code(address)?;
        let params = call_params(method, &params);

        let mut cp = self.store.checkpoint(address)?;
        let outcome = self.runtime.invoke(address, caller, &params, &code, &mut cp);
        self.store.rollback(cp);
        outcome
    }

    /// Code stored at `address`.
    pub fn load_code(&self, address: &str) -> Result<ContractCode, ExecutionError> {
        let value = self
            .store
            .get(address, CODE_KEY)
            .ok_or_else(|| ExecutionError::ContractNotFound {
                address: address.to_string(),
            })?;
        ContractCode::from_value(&value)
    }
}

fn required_payload(tx: &Transaction) -> Result<&Value, TransactionError> {
    tx.payload().ok_or_else(|| TransactionError::InvalidPayload {
        reason: format!("{} transaction carries no payload", tx.kind()),
    })
}

fn call_params(method: &str, params: &Value) -> Value {
    if params.is_null() {
        json!({ "method": method })
    } else {
        json!({"method": method, "params": params})
    }
}

fn store_code(
    cp: &mut Checkpoint<'_>,
    code: &ContractCode,
    deployer: &str,
) -> Result<(), ExecutionError> {
    cp.put(CODE_KEY, code.to_value()?)?;
    cp.put(DEPLOYER_KEY, json!(deployer))?;
    Ok(())
}
