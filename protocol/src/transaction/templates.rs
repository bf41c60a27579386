//! One-call constructors for the three transaction kinds.
//!
//! Each helper selects inputs from the caller's pool with
//! [`select_utxos`], sends change back to the sender, signs every input
//! with the given keypair and finalizes. The pool is used in the order
//! given; pre-sort it with the helpers in [`crate::utxo`] to change the
//! selection policy.

use serde_json::Value;

use super::builder::{Transaction, TransactionBuilder};
use super::error::TransactionError;
use super::types::{CallPayload, DeployPayload, TransactionKind, Utxo};
use crate::config::{DEFAULT_CALL_FEE, DEFAULT_DEPLOY_FEE, DEFAULT_TRANSFER_FEE};
use crate::crypto::keys::Keypair;
use crate::utxo::{select_utxos, UtxoSelection};

/// Pays `amount` from `from` to `to`. Fee defaults to
/// [`DEFAULT_TRANSFER_FEE`].
///
/// ```rust
/// use strat_protocol::crypto::Keypair;
/// use strat_protocol::transaction::{create_transfer, Utxo};
///
/// let keypair = Keypair::generate();
/// let pool = vec![Utxo::new("t1", 0, "A", 60), Utxo::new("t2", 0, "A", 50)];
/// let tx = create_transfer("A", "B", 80, &pool, &keypair, None).unwrap();
///
/// assert_eq!(tx.outputs().len(), 2);
/// assert_eq!(tx.outputs()[1].amount, 29);
/// ```
pub fn create_transfer(
    from: &str,
    to: &str,
    amount: u64,
    pool: &[Utxo],
    keypair: &Keypair,
    fee: Option<u64>,
) -> Result<Transaction, TransactionError> {
    let fee = fee.unwrap_or(DEFAULT_TRANSFER_FEE);
    let selection = select_utxos(pool, amount, fee)?;

    let builder = fund(TransactionBuilder::new(), &selection)
        .add_output(to, to_signed(amount)?)?;
    let builder = pay_change(builder, from, &selection)?.set_fee(to_signed(fee)?)?;

    builder.sign(keypair, None)?.finalize()
}

/// Deploys `code` owned by `owner`. Fee defaults to
/// [`DEFAULT_DEPLOY_FEE`] and is funded from `pool`.
pub fn create_contract_deploy(
    owner: &str,
    code: Value,
    pool: &[Utxo],
    keypair: &Keypair,
    fee: Option<u64>,
) -> Result<Transaction, TransactionError> {
    let fee = fee.unwrap_or(DEFAULT_DEPLOY_FEE);
    let payload = DeployPayload {
        code,
        owner: owner.to_string(),
    }
    .to_value()?;

    contract_transaction(TransactionKind::ContractDeploy, owner, payload, pool, keypair, fee)
}

/// Calls `method` on the contract at `contract_address`. Fee defaults to
/// [`DEFAULT_CALL_FEE`] and is funded from `pool`.
pub fn create_contract_call(
    caller: &str,
    contract_address: &str,
    method: &str,
    params: Value,
    pool: &[Utxo],
    keypair: &Keypair,
    fee: Option<u64>,
) -> Result<Transaction, TransactionError> {
    let fee = fee.unwrap_or(DEFAULT_CALL_FEE);
    let payload = CallPayload {
        contract_address: contract_address.to_string(),
        method: method.to_string(),
        params,
        caller: caller.to_string(),
    }
    .to_value()?;

    contract_transaction(TransactionKind::ContractCall, caller, payload, pool, keypair, fee)
}

fn contract_transaction(
    kind: TransactionKind,
    sender: &str,
    payload: Value,
    pool: &[Utxo],
    keypair: &Keypair,
    fee: u64,
) -> Result<Transaction, TransactionError> {
    let selection = select_utxos(pool, 0, fee)?;

    let builder = fund(TransactionBuilder::new(), &selection)
        .set_kind(kind)
        .set_payload(payload);
    let builder = pay_change(builder, sender, &selection)?.set_fee(to_signed(fee)?)?;

    builder.sign(keypair, None)?.finalize()
}

fn fund(builder: TransactionBuilder, selection: &UtxoSelection) -> TransactionBuilder {
    selection
        .selected
        .iter()
        .fold(builder, |b, u| b.add_input(u.tx_id.clone(), u.index, u.amount))
}

fn pay_change(
    builder: TransactionBuilder,
    sender: &str,
    selection: &UtxoSelection,
) -> Result<TransactionBuilder, TransactionError> {
    if selection.has_change() {
        builder.add_output(sender, to_signed(selection.change)?)
    } else {
        Ok(builder)
    }
}

fn to_signed(value: u64) -> Result<i64, TransactionError> {
    i64::try_from(value).map_err(|_| TransactionError::AmountOverflow)
}
