//! UTXO selection.
//!
//! [`select_utxos`] is first-fit: it walks the pool in the order given and
//! stops as soon as the running total covers `amount + fee`. Ordering policy
//! belongs to the caller, so this module also ships a few pre-sorting
//! helpers ([`largest_first`], [`closest_fit`]) and an ownership filter.
//!
//! Either the whole requirement is covered or nothing is selected. There is
//! no partial selection.

use crate::transaction::{TransactionError, Utxo};

/// Outputs chosen to fund a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoSelection {
    /// Selected outputs, in pool order.
    pub selected: Vec<Utxo>,
    /// Sum of the selected amounts.
    pub total: u64,
    /// `total - (amount + fee)`. Zero means no change output is needed.
    pub change: u64,
}

impl UtxoSelection {
    pub fn has_change(&self) -> bool {
        self.change > 0
    }
}

/// First-fit selection of outputs covering `amount + fee`.
///
/// # Errors
///
/// - [`TransactionError::InsufficientFunds`] if the whole pool falls short.
/// - [`TransactionError::AmountOverflow`] if `amount + fee` or the pool total
///   does not fit in a `u64`.
pub fn select_utxos(pool: &[Utxo], amount: u64, fee: u64) -> Result<UtxoSelection, TransactionError> {
    let required = amount
        .checked_add(fee)
        .ok_or(TransactionError::AmountOverflow)?;

    let mut selected = Vec::new();
    let mut total: u64 = 0;

    for utxo in pool {
        if total >= required && !selected.is_empty() {
            break;
        }
        total = total
            .checked_add(utxo.amount)
            .ok_or(TransactionError::AmountOverflow)?;
        selected.push(utxo.clone());
    }

    if total < required || selected.is_empty() {
        tracing::debug!(available = total, required, "utxo selection short");
        return Err(TransactionError::InsufficientFunds {
            available: total,
            required,
        });
    }

    tracing::debug!(
        selected = selected.len(),
        total,
        change = total - required,
        "utxo selection"
    );

    Ok(UtxoSelection {
        change: total - required,
        selected,
        total,
    })
}

/// Sum of all amounts in the pool, `None` on overflow.
pub fn total_value(pool: &[Utxo]) -> Option<u64> {
    pool.iter().try_fold(0u64, |acc, u| acc.checked_add(u.amount))
}

/// Outputs spendable by `address`, in their original order.
pub fn owned_by(pool: &[Utxo], address: &str) -> Vec<Utxo> {
    pool.iter().filter(|u| u.address == address).cloned().collect()
}

/// Pool sorted by descending amount. Fewer inputs, more change.
pub fn largest_first(pool: &[Utxo]) -> Vec<Utxo> {
    let mut sorted = pool.to_vec();
    sorted.sort_by(|a, b| b.amount.cmp(&a.amount));
    sorted
}

/// Pool sorted by distance from `target`, smallest distance first.
///
/// Feeding this into [`select_utxos`] tends to pick a single output close
/// to the required amount when one exists.
pub fn closest_fit(pool: &[Utxo], target: u64) -> Vec<Utxo> {
    let mut sorted = pool.to_vec();
    sorted.sort_by_key(|u| u.amount.abs_diff(target));
    sorted
}
