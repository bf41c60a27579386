//! # Step Meter
//!
//! Every operation a contract performs costs a fixed number of steps, priced
//! in [`strat_protocol::config`]. The meter is a plain counter with a hard
//! ceiling: the same code against the same state always exhausts at the
//! same step, on every machine. No wall clock is involved.

use strat_protocol::config::ExecutionLimits;

use crate::error::ExecutionError;

/// Deterministic step counter for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepMeter {
    used: u64,
    limit: u64,
}

impl StepMeter {
    pub fn new(limits: ExecutionLimits) -> Self {
        Self {
            used: 0,
            limit: limits.max_steps,
        }
    }

    /// Charges `cost` steps.
    ///
    /// # Errors
    ///
    /// [`ExecutionError::ResourceExhausted`] once the total would exceed the
    /// limit. The meter stays exhausted; every later charge fails too.
    pub fn charge(&mut self, cost: u64) -> Result<(), ExecutionError> {
        let next = self.used.saturating_add(cost);
        if next > self.limit {
            self.used = next;
            return Err(ExecutionError::ResourceExhausted {
                used: next,
                limit: self.limit,
            });
        }
        self.used = next;
        Ok(())
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }
}
