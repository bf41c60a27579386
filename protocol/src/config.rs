//! # Protocol Configuration & Constants
//!
//! Every magic number in STRAT lives here. Hashes and signatures depend on
//! several of them, so changing one after launch forks every participant
//! that replays old transactions.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

/// The zero/burn sentinel. Outputs may never pay it; token burns report it
/// as the counterparty in their `Transfer` events.
pub const ZERO_ADDRESS: &str = "0x0";

/// Returns `true` if `address` is empty or the zero sentinel.
pub fn is_null_address(address: &str) -> bool {
    address.trim().is_empty() || address == ZERO_ADDRESS
}

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

/// Default fee for a plain value transfer.
pub const DEFAULT_TRANSFER_FEE: u64 = 1;

/// Default fee for deploying a contract.
pub const DEFAULT_DEPLOY_FEE: u64 = 10;

/// Default fee for calling a contract.
pub const DEFAULT_CALL_FEE: u64 = 5;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Ed25519 public key length in bytes.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Ed25519 signature length in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// BLAKE3 derive-key context for contract address derivation.
pub const CONTRACT_ADDRESS_CONTEXT: &str = "strat 2026 contract address v1";

/// BLAKE3 derive-key context for state root leaves.
pub const STATE_LEAF_CONTEXT: &str = "strat 2026 state leaf v1";

// ---------------------------------------------------------------------------
// Execution Step Prices
// ---------------------------------------------------------------------------

/// Base charge for entering a contract.
pub const STEP_CALL: u64 = 700;

/// Reading one state key.
pub const STEP_SLOAD: u64 = 200;

/// Writing or deleting one state key.
pub const STEP_SSTORE: u64 = 5_000;

/// Emitting one event.
pub const STEP_LOG: u64 = 375;

/// Cheap stack and arithmetic operations.
pub const STEP_BASE: u64 = 3;

/// Multiplication, division and modulo.
pub const STEP_MUL: u64 = 5;

/// Unconditional jump.
pub const STEP_JUMP: u64 = 8;

/// Conditional jump.
pub const STEP_JUMPI: u64 = 10;

/// Reading `caller` or a call parameter.
pub const STEP_CONTEXT: u64 = 2;

/// Copying one 32-byte word of a script value (push, dup, param, concat).
pub const STEP_COPY_WORD: u64 = 3;

/// Default per-invocation step budget.
pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;

/// Hard cap on script length accepted at deploy time.
pub const MAX_SCRIPT_OPS: usize = 4_096;

/// Hard cap on the script operand stack.
pub const MAX_STACK_DEPTH: usize = 1_024;

/// Largest single value a script may hold on its stack, in bytes. With the
/// stack cap this bounds script memory at 64 MiB.
pub const MAX_VALUE_BYTES: usize = 64 * 1024;

/// Steps charged for copying `bytes` bytes of script data.
pub fn copy_cost(bytes: usize) -> u64 {
    let words = (bytes as u64).saturating_add(31) / 32;
    words.saturating_mul(STEP_COPY_WORD)
}

/// Limits applied to a single contract invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Maximum number of metered steps before `ResourceExhausted`.
    pub max_steps: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl ExecutionLimits {
    /// Limits with a custom step budget.
    pub fn with_max_steps(max_steps: u64) -> Self {
        Self { max_steps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_addresses() {
        assert!(is_null_address(""));
        assert!(is_null_address("   "));
        assert!(is_null_address("0x0"));
        assert!(!is_null_address("alice"));
        assert!(!is_null_address("0x00"));
    }

    #[test]
    fn storage_is_the_expensive_part() {
        assert!(STEP_SSTORE > STEP_SLOAD);
        assert!(STEP_SLOAD > STEP_BASE);
        assert!(STEP_JUMPI > STEP_JUMP);
    }

    #[test]
    fn copy_cost_rounds_up_to_words() {
        assert_eq!(copy_cost(0), 0);
        assert_eq!(copy_cost(1), STEP_COPY_WORD);
        assert_eq!(copy_cost(32), STEP_COPY_WORD);
        assert_eq!(copy_cost(33), 2 * STEP_COPY_WORD);
        assert_eq!(copy_cost(MAX_VALUE_BYTES), 2_048 * STEP_COPY_WORD);
    }

    #[test]
    fn default_limits() {
        assert_eq!(ExecutionLimits::default().max_steps, DEFAULT_MAX_STEPS);
        assert_eq!(ExecutionLimits::with_max_steps(10).max_steps, 10);
    }
}
