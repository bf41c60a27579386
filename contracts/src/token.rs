//! # Token Contract
//!
//! The object-shaped contract: a fungible token with named operations.
//! Each operation is a variant of the closed [`TokenCall`] enum and checks
//! its own preconditions (positive amounts, sufficient balance or
//! allowance, owner-only access) before writing anything.
//!
//! ## State layout
//!
//! All token state lives in the contract's own namespace:
//!
//! ```text
//! name, symbol, decimals, owner, total_supply
//! balance:{address}                 -> u64
//! allowance:{len}:{owner}:{spender} -> u64
//! ```
//!
//! `len` is the byte length of `owner`, so identities that themselves
//! contain `:` cannot alias another owner/spender pair. Absent balance and
//! allowance keys read as zero.
//!
//! ## Events
//!
//! `Transfer {from, to, amount}` on every movement of value, with the zero
//! address standing in for the mint source and the burn sink. `Approval`,
//! `Mint`, `Burn` and `OwnershipTransferred` as their names say.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use strat_protocol::config::{is_null_address, ZERO_ADDRESS};

use crate::error::ExecutionError;
use crate::runtime::ContractContext;

const NAME_KEY: &str = "name";
const SYMBOL_KEY: &str = "symbol";
const DECIMALS_KEY: &str = "decimals";
const OWNER_KEY: &str = "owner";
const TOTAL_SUPPLY_KEY: &str = "total_supply";

fn default_decimals() -> u8 {
    18
}

/// Deploy-time parameters of a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSpec {
    pub name: String,
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// Minted to the deployer by the constructor.
    #[serde(default)]
    pub initial_supply: u64,
}

impl TokenSpec {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals: default_decimals(),
            initial_supply: 0,
        }
    }

    pub fn with_initial_supply(mut self, supply: u64) -> Self {
        self.initial_supply = supply;
        self
    }

    pub fn check(&self) -> Result<(), ExecutionError> {
        if self.name.trim().is_empty() || self.symbol.trim().is_empty() {
            return Err(ExecutionError::InvalidCode {
                reason: "token name and symbol must be non-empty".into(),
            });
        }
        Ok(())
    }
}

/// Every operation a token understands.
///
/// Parsed from the invocation params `{"method": "...", "params": {...}}`.
/// Amounts are signed on the wire so that negative values reach the
/// operation and are rejected there with a clear reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum TokenCall {
    Name,
    Symbol,
    Decimals,
    TotalSupply,
    Owner,
    BalanceOf {
        address: String,
    },
    Allowance {
        owner: String,
        spender: String,
    },
    Transfer {
        to: String,
        amount: i64,
    },
    Approve {
        spender: String,
        amount: i64,
    },
    TransferFrom {
        from: String,
        to: String,
        amount: i64,
    },
    IncreaseAllowance {
        spender: String,
        amount: i64,
    },
    DecreaseAllowance {
        spender: String,
        amount: i64,
    },
    Mint {
        to: String,
        amount: i64,
    },
    Burn {
        amount: i64,
    },
    BurnFrom {
        from: String,
        amount: i64,
    },
    TransferOwnership {
        #[serde(rename = "newOwner")]
        new_owner: String,
    },
    RenounceOwnership,
}

impl TokenCall {
    /// `true` for operations that never write state.
    pub fn is_view(&self) -> bool {
        matches!(
            self,
            Self::Name
                | Self::Symbol
                | Self::Decimals
                | Self::TotalSupply
                | Self::Owner
                | Self::BalanceOf { .. }
                | Self::Allowance { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Constructor and dispatch
// ---------------------------------------------------------------------------

/// Initializes token state; the deployer becomes the owner.
pub(crate) fn construct(
    spec: &TokenSpec,
    ctx: &mut ContractContext<'_>,
) -> Result<Value, ExecutionError> {
    let owner = ctx.caller().to_string();
    if is_null_address(&owner) {
        return Err(ExecutionError::revert("invalid owner address"));
    }

    ctx.store(NAME_KEY, json!(spec.name))?;
    ctx.store(SYMBOL_KEY, json!(spec.symbol))?;
    ctx.store(DECIMALS_KEY, json!(spec.decimals))?;
    ctx.store(OWNER_KEY, json!(owner))?;
    ctx.store(TOTAL_SUPPLY_KEY, json!(spec.initial_supply))?;

    if spec.initial_supply > 0 {
        write_amount(ctx, &balance_key(&owner), spec.initial_supply)?;
        ctx.emit(
            "Transfer",
            json!({"from": ZERO_ADDRESS, "to": owner, "amount": spec.initial_supply}),
        )?;
    }

    Ok(json!({"owner": owner, "totalSupply": spec.initial_supply}))
}

/// Parses the call and runs it.
pub(crate) fn dispatch(ctx: &mut ContractContext<'_>) -> Result<Value, ExecutionError> {
    let call = TokenCall::deserialize(ctx.params())
        .map_err(|e| ExecutionError::revert(format!("invalid token call: {}", e)))?;
    execute(ctx, call)
}

fn execute(ctx: &mut ContractContext<'_>, call: TokenCall) -> Result<Value, ExecutionError> {
    match call {
        TokenCall::Name => Ok(ctx.load(NAME_KEY)?.unwrap_or(Value::Null)),
        TokenCall::Symbol => Ok(ctx.load(SYMBOL_KEY)?.unwrap_or(Value::Null)),
        TokenCall::Decimals => Ok(ctx.load(DECIMALS_KEY)?.unwrap_or(Value::Null)),
        TokenCall::TotalSupply => Ok(json!(read_amount(ctx, TOTAL_SUPPLY_KEY)?)),
        TokenCall::Owner => Ok(json!(current_owner(ctx)?)),
        TokenCall::BalanceOf { address } => Ok(json!(read_amount(ctx, &balance_key(&address))?)),
        TokenCall::Allowance { owner, spender } => {
            Ok(json!(read_amount(ctx, &allowance_key(&owner, &spender))?))
        }

        TokenCall::Transfer { to, amount } => {
            require_address(&to, "recipient")?;
            let amount = positive(amount)?;
            let from = ctx.caller().to_string();
            move_balance(ctx, &from, &to, amount)?;
            ctx.emit("Transfer", json!({"from": from, "to": to, "amount": amount}))?;
            Ok(Value::Bool(true))
        }

        TokenCall::Approve { spender, amount } => {
            require_address(&spender, "spender")?;
            let amount = non_negative(amount)?;
            let owner = ctx.caller().to_string();
            write_amount(ctx, &allowance_key(&owner, &spender), amount)?;
            ctx.emit("Approval", json!({"owner": owner, "spender": spender, "amount": amount}))?;
            Ok(Value::Bool(true))
        }

        TokenCall::TransferFrom { from, to, amount } => {
            require_address(&from, "sender")?;
            require_address(&to, "recipient")?;
            let amount = positive(amount)?;
            let spender = ctx.caller().to_string();
            spend_allowance(ctx, &from, &spender, amount, "allowance exceeded")?;
            move_balance(ctx, &from, &to, amount)?;
            ctx.emit("Transfer", json!({"from": from, "to": to, "amount": amount}))?;
            Ok(Value::Bool(true))
        }

        TokenCall::IncreaseAllowance { spender, amount } => {
            require_address(&spender, "spender")?;
            let added = non_negative(amount)?;
            let owner = ctx.caller().to_string();
            let key = allowance_key(&owner, &spender);
            let updated = read_amount(ctx, &key)?
                .checked_add(added)
                .ok_or_else(|| ExecutionError::revert("allowance overflow"))?;
            write_amount(ctx, &key, updated)?;
            ctx.emit("Approval", json!({"owner": owner, "spender": spender, "amount": updated}))?;
            Ok(Value::Bool(true))
        }

        TokenCall::DecreaseAllowance { spender, amount } => {
            let subtracted = non_negative(amount)?;
            let owner = ctx.caller().to_string();
            let key = allowance_key(&owner, &spender);
            let updated = read_amount(ctx, &key)?
                .checked_sub(subtracted)
                .ok_or_else(|| ExecutionError::revert("decreased allowance below zero"))?;
            write_amount(ctx, &key, updated)?;
            ctx.emit("Approval", json!({"owner": owner, "spender": spender, "amount": updated}))?;
            Ok(Value::Bool(true))
        }

        TokenCall::Mint { to, amount } => {
            require_owner(ctx, "mint")?;
            require_address(&to, "recipient")?;
            let amount = positive(amount)?;

            let supply = read_amount(ctx, TOTAL_SUPPLY_KEY)?
                .checked_add(amount)
                .ok_or_else(|| ExecutionError::revert("total supply overflow"))?;
            credit(ctx, &to, amount)?;
            write_amount(ctx, TOTAL_SUPPLY_KEY, supply)?;

            ctx.emit("Transfer", json!({"from": ZERO_ADDRESS, "to": to, "amount": amount}))?;
            ctx.emit("Mint", json!({"to": to, "amount": amount}))?;
            Ok(Value::Bool(true))
        }

        TokenCall::Burn { amount } => {
            let amount = positive(amount)?;
            let from = ctx.caller().to_string();
            burn(ctx, &from, amount)?;
            Ok(Value::Bool(true))
        }

        TokenCall::BurnFrom { from, amount } => {
            let amount = positive(amount)?;
            let spender = ctx.caller().to_string();
            spend_allowance(ctx, &from, &spender, amount, "burn amount exceeds allowance")?;
            burn(ctx, &from, amount)?;
            Ok(Value::Bool(true))
        }

        TokenCall::TransferOwnership { new_owner } => {
            let old_owner = require_owner(ctx, "transfer ownership")?;
            require_address(&new_owner, "new owner")?;
            ctx.store(OWNER_KEY, json!(new_owner))?;
            ctx.emit(
                "OwnershipTransferred",
                json!({"oldOwner": old_owner, "newOwner": new_owner}),
            )?;
            Ok(Value::Bool(true))
        }

        TokenCall::RenounceOwnership => {
            let old_owner = require_owner(ctx, "renounce ownership")?;
            ctx.store(OWNER_KEY, json!(ZERO_ADDRESS))?;
            ctx.emit(
                "OwnershipTransferred",
                json!({"oldOwner": old_owner, "newOwner": ZERO_ADDRESS}),
            )?;
            Ok(Value::Bool(true))
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn balance_key(address: &str) -> String {
    format!("balance:{}", address)
}

pub fn allowance_key(owner: &str, spender: &str) -> String {
    format!("allowance:{}:{}:{}", owner.len(), owner, spender)
}

fn read_amount(ctx: &mut ContractContext<'_>, key: &str) -> Result<u64, ExecutionError> {
    match ctx.load(key)? {
        None | Some(Value::Null) => Ok(0),
        Some(value) => value
            .as_u64()
            .ok_or_else(|| ExecutionError::revert(format!("corrupt amount at {}", key))),
    }
}

fn write_amount(ctx: &mut ContractContext<'_>, key: &str, amount: u64) -> Result<(), ExecutionError> {
    ctx.store(key, json!(amount))
}

fn current_owner(ctx: &mut ContractContext<'_>) -> Result<String, ExecutionError> {
    match ctx.load(OWNER_KEY)? {
        Some(Value::String(owner)) => Ok(owner),
        _ => Ok(ZERO_ADDRESS.to_string()),
    }
}

/// Reverts unless the caller is the (non-renounced) owner. Returns the owner.
fn require_owner(ctx: &mut ContractContext<'_>, action: &str) -> Result<String, ExecutionError> {
    let owner = current_owner(ctx)?;
    if is_null_address(&owner) {
        return Err(ExecutionError::revert(format!(
            "cannot {}: ownership renounced",
            action
        )));
    }
    if ctx.caller() != owner {
        return Err(ExecutionError::revert(format!("only owner can {}", action)));
    }
    Ok(owner)
}

fn require_address(address: &str, role: &str) -> Result<(), ExecutionError> {
    if is_null_address(address) {
        return Err(ExecutionError::revert(format!("invalid {} address", role)));
    }
    Ok(())
}

fn positive(amount: i64) -> Result<u64, ExecutionError> {
    match u64::try_from(amount) {
        Ok(amount) if amount > 0 => Ok(amount),
        _ => Err(ExecutionError::revert("amount must be positive")),
    }
}

fn non_negative(amount: i64) -> Result<u64, ExecutionError> {
    u64::try_from(amount).map_err(|_| ExecutionError::revert("amount cannot be negative"))
}

fn credit(ctx: &mut ContractContext<'_>, to: &str, amount: u64) -> Result<(), ExecutionError> {
    let key = balance_key(to);
    let balance = read_amount(ctx, &key)?
        .checked_add(amount)
        .ok_or_else(|| ExecutionError::revert("balance overflow"))?;
    write_amount(ctx, &key, balance)
}

fn debit(ctx: &mut ContractContext<'_>, from: &str, amount: u64) -> Result<(), ExecutionError> {
    let key = balance_key(from);
    let balance = read_amount(ctx, &key)?;
    if balance < amount {
        return Err(ExecutionError::revert(format!(
            "insufficient balance: {} has {}, needs {}",
            from, balance, amount
        )));
    }
    write_amount(ctx, &key, balance - amount)
}

fn move_balance(
    ctx: &mut ContractContext<'_>,
    from: &str,
    to: &str,
    amount: u64,
) -> Result<(), ExecutionError> {
    debit(ctx, from, amount)?;
    credit(ctx, to, amount)
}

fn spend_allowance(
    ctx: &mut ContractContext<'_>,
    owner: &str,
    spender: &str,
    amount: u64,
    reason: &str,
) -> Result<(), ExecutionError> {
    let key = allowance_key(owner, spender);
    let allowance = read_amount(ctx, &key)?;
    if allowance < amount {
        return Err(ExecutionError::revert(reason));
    }
    write_amount(ctx, &key, allowance - amount)
}

fn burn(ctx: &mut ContractContext<'_>, from: &str, amount: u64) -> Result<(), ExecutionError> {
    debit(ctx, from, amount)?;
    let supply = read_amount(ctx, TOTAL_SUPPLY_KEY)?
        .checked_sub(amount)
        .ok_or_else(|| ExecutionError::revert("total supply underflow"))?;
    write_amount(ctx, TOTAL_SUPPLY_KEY, supply)?;
    ctx.emit("Transfer", json!({"from": from, "to": ZERO_ADDRESS, "amount": amount}))?;
    ctx.emit("Burn", json!({"from": from, "amount": amount}))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
