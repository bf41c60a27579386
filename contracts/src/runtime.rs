//! # Contract Runtime
//!
//! Runs one contract invocation against a [`StateView`] and reports what
//! happened. The runtime is the isolation boundary: contract code gets a
//! [`ContractContext`] and nothing else.
//!
//! ## What code can see
//!
//! | Input      | Access                                        |
//! |------------|-----------------------------------------------|
//! | `caller`   | read-only string                              |
//! | `params`   | read-only JSON (`{"method": .., "params": ..}`) |
//! | state      | metered load/store/remove scoped to one address |
//! | `emit`     | append-only event list                        |
//!
//! No clock, no randomness, no I/O. Two runs of the same code with the
//! same inputs over the same state produce the same result, events and
//! writes.
//!
//! ## Atomicity
//!
//! Writes go to an in-memory delta, never straight to the view. Only when
//! the code returns normally is the delta flushed. A revert or step
//! exhaustion drops the delta and the events with it. The executor wraps
//! all of this in a store checkpoint, so even a failed flush cannot leak.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use strat_protocol::codec::encode_value;
use strat_protocol::config::{ExecutionLimits, STEP_CALL, STEP_LOG, STEP_SLOAD, STEP_SSTORE};
use strat_protocol::storage::StateView;

use crate::code::ContractCode;
use crate::error::ExecutionError;
use crate::events::Event;
use crate::meter::StepMeter;

/// Keys starting with this prefix belong to the runtime, not the contract.
pub const RESERVED_PREFIX: &str = "__";

/// Where a contract's code is stored in its own state.
pub const CODE_KEY: &str = "__code";

/// Where the deploying identity is stored.
pub const DEPLOYER_KEY: &str = "__deployer";

/// Pending writes of one invocation. `None` marks a delete.
pub type StateDelta = BTreeMap<String, Option<Value>>;

/// Outcome of a successful invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    pub result: Value,
    pub events: Vec<Event>,
    pub state_delta: StateDelta,
    pub steps_used: u64,
}

// ---------------------------------------------------------------------------
// ContractContext
// ---------------------------------------------------------------------------

/// Everything an executing contract is allowed to touch.
pub struct ContractContext<'a> {
    address: &'a str,
    caller: &'a str,
    params: &'a Value,
    state: &'a dyn StateView,
    delta: StateDelta,
    events: Vec<Event>,
    meter: StepMeter,
}

impl<'a> ContractContext<'a> {
    fn new(
        address: &'a str,
        caller: &'a str,
        params: &'a Value,
        state: &'a dyn StateView,
        meter: StepMeter,
    ) -> Self {
        Self {
            address,
            caller,
            params,
            state,
            delta: StateDelta::new(),
            events: Vec::new(),
            meter,
        }
    }

    pub fn address(&self) -> &str {
        self.address
    }

    pub fn caller(&self) -> &str {
        self.caller
    }

    pub fn params(&self) -> &Value {
        self.params
    }

    pub fn steps_used(&self) -> u64 {
        self.meter.used()
    }

    /// Charges `cost` steps against the invocation budget.
    pub fn charge(&mut self, cost: u64) -> Result<(), ExecutionError> {
        self.meter.charge(cost)
    }

    /// Reads a key, seeing this invocation's own pending writes first.
    pub fn load(&mut self, key: &str) -> Result<Option<Value>, ExecutionError> {
        self.charge(STEP_SLOAD)?;
        match self.delta.get(key) {
            Some(pending) => Ok(pending.clone()),
            None => Ok(self.state.get(key)),
        }
    }

    /// Buffers a write. Reserved keys and values the canonical codec
    /// cannot hash are rejected with a revert.
    pub fn store(&mut self, key: &str, value: Value) -> Result<(), ExecutionError> {
        check_writable(key)?;
        self.charge(STEP_SSTORE)?;
        encode_value(&value).map_err(|e| {
            ExecutionError::revert(format!("value for {:?} cannot be stored: {}", key, e))
        })?;
        self.delta.insert(key.to_string(), Some(value));
        Ok(())
    }

    /// Buffers a delete.
    pub fn remove(&mut self, key: &str) -> Result<(), ExecutionError> {
        check_writable(key)?;
        self.charge(STEP_SSTORE)?;
        self.delta.insert(key.to_string(), None);
        Ok(())
    }

    pub fn emit(&mut self, name: impl Into<String>, payload: Value) -> Result<(), ExecutionError> {
        self.charge(STEP_LOG)?;
        self.events.push(Event::new(name, payload));
        Ok(())
    }
}

fn check_writable(key: &str) -> Result<(), ExecutionError> {
    if key.starts_with(RESERVED_PREFIX) {
        return Err(ExecutionError::revert(format!(
            "key {:?} is reserved",
            key
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ContractRuntime
// ---------------------------------------------------------------------------

/// Stateless executor of contract code. Cheap to clone and share.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContractRuntime {
    limits: ExecutionLimits,
}

impl ContractRuntime {
    pub fn new(limits: ExecutionLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> ExecutionLimits {
        self.limits
    }

    /// Invokes `code` at `address` on behalf of `caller`.
    ///
    /// On success the writes have been flushed to `view` and are listed in
    /// [`Invocation::state_delta`]. On failure `view` is untouched.
    pub fn invoke(
        &self,
        address: &str,
        caller: &str,
        params: &Value,
        code: &ContractCode,
        view: &mut dyn StateView,
    ) -> Result<Invocation, ExecutionError> {
        self.run(address, caller, params, view, |ctx| code.call(ctx))
    }

    /// Runs the deploy-time constructor with `deployer` as caller.
    pub fn construct(
        &self,
        address: &str,
        deployer: &str,
        code: &ContractCode,
        view: &mut dyn StateView,
    ) -> Result<Invocation, ExecutionError> {
        self.run(address, deployer, &Value::Null, view, |ctx| code.construct(ctx))
    }

    fn run<F>(
        &self,
        address: &str,
        caller: &str,
        params: &Value,
        view: &mut dyn StateView,
        entry: F,
    ) -> Result<Invocation, ExecutionError>
    where
        F: FnOnce(&mut ContractContext<'_>) -> Result<Value, ExecutionError>,
    {
        let (result, delta, events, steps_used) = {
            let mut ctx =
                ContractContext::new(address, caller, params, &*view, StepMeter::new(self.limits));

            let outcome = ctx.charge(STEP_CALL).and_then(|()| entry(&mut ctx));
            match outcome {
                Ok(result) => (result, ctx.delta, ctx.events, ctx.meter.used()),
                Err(err) => {
                    tracing::warn!(
                        address,
                        caller,
                        steps = ctx.meter.used(),
                        error = %err,
                        "invocation failed, writes discarded"
                    );
                    return Err(err);
                }
            }
        };

        for (key, value) in &delta {
            match value {
                Some(value) => view.put(key, value.clone())?,
                None => view.delete(key)?,
            }
        }

        tracing::debug!(
            address,
            caller,
            steps = steps_used,
            writes = delta.len(),
            events = events.len(),
            "invocation succeeded"
        );

        Ok(Invocation {
            result,
            events,
            state_delta: delta,
            steps_used,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{Op, Script};
    use serde_json::json;
    use strat_protocol::storage::StateStore;

    fn script(ops: Vec<Op>) -> ContractCode {
        ContractCode::Script(Script::new(ops))
    }

    #[test]
    fn success_flushes_delta_to_view() {
        let store = StateStore::new();
        let code = script(vec![
            Op::Push(json!("greeting")),
            Op::Push(json!("hello")),
            Op::Store,
            Op::Push(json!("greeting")),
            Op::Load,
            Op::Return,
        ]);

        let mut cp = store.checkpoint("c1").unwrap();
        let inv = ContractRuntime::default()
            .invoke("c1", "X", &Value::Null, &code, &mut cp)
            .unwrap();
        assert_eq!(inv.result, json!("hello"));
        assert_eq!(inv.state_delta.get("greeting"), Some(&Some(json!("hello"))));
        assert_eq!(cp.get("greeting"), Some(json!("hello")));
        store.commit(cp).unwrap();
        assert_eq!(store.get("c1", "greeting"), Some(json!("hello")));
    }

    #[test]
    fn revert_after_write_leaves_view_untouched() {
        let store = StateStore::new();
        store.put("c1", "n", json!(1)).unwrap();
        let code = script(vec![
            Op::Push(json!("n")),
            Op::Push(json!(2)),
            Op::Store,
            Op::Push(json!("x")),
            Op::Push(json!("x")),
            Op::Emit("Touched".into()),
            Op::Revert("boom".into()),
        ]);

        let mut cp = store.checkpoint("c1").unwrap();
        let err = ContractRuntime::default()
            .invoke("c1", "X", &Value::Null, &code, &mut cp)
            .unwrap_err();
        assert!(matches!(err, ExecutionError::ExecutionReverted { ref reason } if reason == "boom"));
        assert!(!cp.is_dirty());
        assert_eq!(cp.get("n"), Some(json!(1)));
    }

    #[test]
    fn step_budget_is_enforced() {
        let store = StateStore::new();
        let code = script(vec![Op::Jump(0)]);
        let runtime = ContractRuntime::new(ExecutionLimits::with_max_steps(10_000));

        let mut cp = store.checkpoint("c1").unwrap();
        match runtime.invoke("c1", "X", &Value::Null, &code, &mut cp) {
            Err(ExecutionError::ResourceExhausted { used, limit }) => {
                assert_eq!(limit, 10_000);
                assert!(used > limit);
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[test]
    fn call_cost_alone_can_exhaust() {
        let store = StateStore::new();
        let runtime = ContractRuntime::new(ExecutionLimits::with_max_steps(STEP_CALL - 1));
        let mut cp = store.checkpoint("c1").unwrap();
        assert!(matches!(
            runtime.invoke("c1", "X", &Value::Null, &script(vec![]), &mut cp),
            Err(ExecutionError::ResourceExhausted { .. })
        ));
    }

    #[test]
    fn reserved_keys_are_read_only() {
        let store = StateStore::new();
        let code = script(vec![
            Op::Push(json!(CODE_KEY)),
            Op::Push(json!({"script": {"ops": []}})),
            Op::Store,
        ]);
        let mut cp = store.checkpoint("c1").unwrap();
        let err = ContractRuntime::default()
            .invoke("c1", "X", &Value::Null, &code, &mut cp)
            .unwrap_err();
        assert!(matches!(err, ExecutionError::ExecutionReverted { .. }));
    }

    #[test]
    fn float_values_revert() {
        let store = StateStore::new();
        let code = script(vec![Op::Push(json!("k")), Op::Push(json!(0.5)), Op::Store]);
        let mut cp = store.checkpoint("c1").unwrap();
        assert!(matches!(
            ContractRuntime::default().invoke("c1", "X", &Value::Null, &code, &mut cp),
            Err(ExecutionError::ExecutionReverted { .. })
        ));
    }

    #[test]
    fn storage_is_metered() {
        let store = StateStore::new();
        let code = script(vec![Op::Push(json!("k")), Op::Push(json!(1)), Op::Store]);
        let mut cp = store.checkpoint("c1").unwrap();
        let inv = ContractRuntime::default()
            .invoke("c1", "X", &Value::Null, &code, &mut cp)
            .unwrap();
        assert!(inv.steps_used >= STEP_CALL + STEP_SSTORE);
    }
}
