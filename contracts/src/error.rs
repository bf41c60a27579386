//! Errors raised while deploying and executing contracts.

use strat_protocol::codec::EncodingError;
use strat_protocol::storage::StateError;
use strat_protocol::transaction::TransactionError;
use thiserror::Error;

/// Everything that can go wrong between a finalized contract transaction
/// and committed state.
///
/// `ExecutionReverted` and `ResourceExhausted` are contract-level failures:
/// the invocation's writes are always discarded. The rest mean the
/// transaction could not be executed at all.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Contract code raised an error or a precondition failed.
    #[error("execution reverted: {reason}")]
    ExecutionReverted { reason: String },

    /// The step budget ran out.
    #[error("resource exhausted: {used} steps used, limit {limit}")]
    ResourceExhausted { used: u64, limit: u64 },

    /// Stored or submitted code does not parse or fails static checks.
    #[error("invalid contract code: {reason}")]
    InvalidCode { reason: String },

    #[error("no contract deployed at {address}")]
    ContractNotFound { address: String },

    #[error("contract already deployed at {address}")]
    ContractExists { address: String },

    /// Includes `CheckpointConflict`, which callers may retry after backoff.
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

impl ExecutionError {
    pub(crate) fn revert(reason: impl Into<String>) -> Self {
        Self::ExecutionReverted {
            reason: reason.into(),
        }
    }

    /// `true` for failures raised by the contract itself (revert or step
    /// exhaustion) rather than by the surrounding machinery.
    pub fn is_contract_failure(&self) -> bool {
        matches!(
            self,
            Self::ExecutionReverted { .. } | Self::ResourceExhausted { .. }
        )
    }

    /// `true` if another execution holds the contract's checkpoint.
    pub fn is_checkpoint_conflict(&self) -> bool {
        matches!(self, Self::State(StateError::CheckpointConflict { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(ExecutionError::revert("nope").is_contract_failure());
        assert!(ExecutionError::ResourceExhausted { used: 10, limit: 5 }.is_contract_failure());

        let conflict = ExecutionError::from(StateError::CheckpointConflict {
            address: "c1".into(),
        });
        assert!(conflict.is_checkpoint_conflict());
        assert!(!conflict.is_contract_failure());
    }

    #[test]
    fn revert_message_carries_reason() {
        let err = ExecutionError::revert("insufficient balance");
        assert_eq!(err.to_string(), "execution reverted: insufficient balance");
    }
}
