//! # Script Contracts
//!
//! The function-shaped contract: one program that receives
//! `(state, caller, params)` and returns a result value. Programs are a
//! flat list of stack-machine ops, serialized as JSON so they can travel in
//! a deploy payload:
//!
//! ```json
//! {"script": {"ops": [
//!   {"param": "/params/key"},
//!   {"param": "/params/value"},
//!   "store",
//!   {"push": true},
//!   "return"
//! ]}}
//! ```
//!
//! The machine has no host calls beyond the [`ContractContext`]. Integers
//! are `i64` with checked arithmetic; `null` counts as `0` so a missing
//! balance reads as zero. Jumps are absolute op indices, checked at deploy
//! time. Every op costs steps, so a loop that never ends runs out of budget
//! instead of hanging the node. Ops that copy data also pay per 32-byte
//! word, and no single value may grow past `MAX_VALUE_BYTES`.
//!
//! An optional `init` program runs once at deploy time with the deployer
//! as caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use strat_protocol::config::{
    copy_cost, MAX_SCRIPT_OPS, MAX_STACK_DEPTH, MAX_VALUE_BYTES, STEP_BASE, STEP_CONTEXT,
    STEP_JUMP, STEP_JUMPI, STEP_MUL,
};

use crate::error::ExecutionError;
use crate::runtime::ContractContext;

/// One instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    /// Push a literal.
    Push(Value),
    Pop,
    Dup,
    Swap,
    /// Push the caller identity.
    Caller,
    /// Push the value at a JSON pointer into the invocation params
    /// (`null` if absent). A bare name is treated as `/name`.
    Param(String),
    /// `key -> value`
    Load,
    /// `key value ->`
    Store,
    /// `key ->`
    Delete,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Lt,
    Gt,
    Not,
    And,
    Or,
    /// `a b -> "ab"`; strings, integers, booleans and null only.
    Concat,
    Jump(usize),
    /// Pops a condition; jumps if it is truthy.
    JumpIf(usize),
    /// Pops a payload and emits it under the given name.
    Emit(String),
    /// Pops a condition; reverts with the message if it is falsy.
    Assert(String),
    Revert(String),
    /// Pops the result and stops. An empty stack returns `null`.
    Return,
}

impl Op {
    fn cost(&self) -> u64 {
        match self {
            Op::Mul | Op::Div | Op::Mod => STEP_MUL,
            Op::Jump(_) => STEP_JUMP,
            Op::JumpIf(_) => STEP_JUMPI,
            Op::Caller | Op::Param(_) => STEP_CONTEXT,
            _ => STEP_BASE,
        }
    }
}

/// A deployable script: the call program plus an optional constructor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub ops: Vec<Op>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init: Vec<Op>,
}

impl Script {
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            ops,
            init: Vec::new(),
        }
    }

    pub fn with_init(mut self, init: Vec<Op>) -> Self {
        self.init = init;
        self
    }

    /// Static checks run before a script is stored: length cap and jump
    /// targets inside the program (jumping to `len` halts).
    pub fn check(&self) -> Result<(), ExecutionError> {
        check_program("ops", &self.ops)?;
        check_program("init", &self.init)
    }

    pub(crate) fn run(&self, ctx: &mut ContractContext<'_>) -> Result<Value, ExecutionError> {
        Machine::new(&self.ops).run(ctx)
    }

    pub(crate) fn run_init(&self, ctx: &mut ContractContext<'_>) -> Result<Value, ExecutionError> {
        if self.init.is_empty() {
            return Ok(Value::Null);
        }
        Machine::new(&self.init).run(ctx)
    }
}

fn check_program(name: &str, ops: &[Op]) -> Result<(), ExecutionError> {
    if ops.len() > MAX_SCRIPT_OPS {
        return Err(ExecutionError::InvalidCode {
            reason: format!("{} has {} ops, limit is {}", name, ops.len(), MAX_SCRIPT_OPS),
        });
    }
    for (pc, op) in ops.iter().enumerate() {
        if let Op::Jump(target) | Op::JumpIf(target) = op {
            if *target > ops.len() {
                return Err(ExecutionError::InvalidCode {
                    reason: format!("{} op {} jumps to {}, past the end", name, pc, target),
                });
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

struct Machine<'p> {
    ops: &'p [Op],
    stack: Vec<Value>,
    pc: usize,
}

impl<'p> Machine<'p> {
    fn new(ops: &'p [Op]) -> Self {
        Self {
            ops,
            stack: Vec::new(),
            pc: 0,
        }
    }

    fn run(mut self, ctx: &mut ContractContext<'_>) -> Result<Value, ExecutionError> {
        let ops = self.ops;
        while let Some(op) = ops.get(self.pc) {
            self.pc += 1;
            ctx.charge(op.cost())?;

            match op {
                Op::Push(value) => {
                    charge_copy(ctx, value_size(value))?;
                    self.push(value.clone())?
                }
                Op::Pop => {
                    self.pop()?;
                }
                Op::Dup => {
                    charge_copy(ctx, value_size(self.peek()?))?;
                    let top = self.peek()?.clone();
                    self.push(top)?;
                }
                Op::Swap => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(b)?;
                    self.push(a)?;
                }
                Op::Caller => self.push(Value::String(ctx.caller().to_string()))?,
                Op::Param(path) => {
                    let value = lookup(ctx.params(), path);
                    charge_copy(ctx, value_size(&value))?;
                    self.push(value)?;
                }
                Op::Load => {
                    let key = self.pop_key()?;
                    let value = ctx.load(&key)?.unwrap_or(Value::Null);
                    self.push(value)?;
                }
                Op::Store => {
                    let value = self.pop()?;
                    let key = self.pop_key()?;
                    ctx.store(&key, value)?;
                }
                Op::Delete => {
                    let key = self.pop_key()?;
                    ctx.remove(&key)?;
                }
                Op::Add => self.arith(i64::checked_add)?,
                Op::Sub => self.arith(i64::checked_sub)?,
                Op::Mul => self.arith(i64::checked_mul)?,
                Op::Div => {
                    self.check_divisor()?;
                    self.arith(i64::checked_div)?
                }
                Op::Mod => {
                    self.check_divisor()?;
                    self.arith(i64::checked_rem)?
                }
                Op::Eq => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(a == b))?;
                }
                Op::Lt => self.compare(|a, b| a < b)?,
                Op::Gt => self.compare(|a, b| a > b)?,
                Op::Not => {
                    let v = self.pop()?;
                    self.push(Value::Bool(!truthy(&v)))?;
                }
                Op::And => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(truthy(&a) && truthy(&b)))?;
                }
                Op::Or => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(truthy(&a) || truthy(&b)))?;
                }
                Op::Concat => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    let (a, b) = (stringify(&a)?, stringify(&b)?);
                    let len = a.len().saturating_add(b.len());
                    charge_copy(ctx, len)?;
                    let mut joined = String::with_capacity(len);
                    joined.push_str(&a);
                    joined.push_str(&b);
                    self.push(Value::String(joined))?;
                }
                Op::Jump(target) => self.pc = *target,
                Op::JumpIf(target) => {
                    if truthy(&self.pop()?) {
                        self.pc = *target;
                    }
                }
                Op::Emit(name) => {
                    let payload = self.pop()?;
                    ctx.emit(name.clone(), payload)?;
                }
                Op::Assert(reason) => {
                    if !truthy(&self.pop()?) {
                        return Err(ExecutionError::revert(reason.clone()));
                    }
                }
                Op::Revert(reason) => return Err(ExecutionError::revert(reason.clone())),
                Op::Return => return Ok(self.stack.pop().unwrap_or(Value::Null)),
            }
        }

        Ok(self.stack.pop().unwrap_or(Value::Null))
    }

    fn push(&mut self, value: Value) -> Result<(), ExecutionError> {
        if self.stack.len() >= MAX_STACK_DEPTH {
            return Err(ExecutionError::revert("stack overflow"));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, ExecutionError> {
        self.stack
            .pop()
            .ok_or_else(|| ExecutionError::revert(format!("stack underflow at op {}", self.pc - 1)))
    }

    fn peek(&self) -> Result<&Value, ExecutionError> {
        self.stack
            .last()
            .ok_or_else(|| ExecutionError::revert(format!("stack underflow at op {}", self.pc - 1)))
    }

    fn pop_key(&mut self) -> Result<String, ExecutionError> {
        match self.pop()? {
            Value::String(key) => Ok(key),
            other => Err(ExecutionError::revert(format!(
                "state key must be a string, got {}",
                other
            ))),
        }
    }

    fn pop_int(&mut self) -> Result<i64, ExecutionError> {
        let value = self.pop()?;
        as_int(&value)
    }

    fn arith(&mut self, f: fn(i64, i64) -> Option<i64>) -> Result<(), ExecutionError> {
        let b = self.pop_int()?;
        let a = self.pop_int()?;
        let result = f(a, b).ok_or_else(|| ExecutionError::revert("integer overflow"))?;
        self.push(Value::from(result))
    }

    fn compare(&mut self, f: fn(i64, i64) -> bool) -> Result<(), ExecutionError> {
        let b = self.pop_int()?;
        let a = self.pop_int()?;
        self.push(Value::Bool(f(a, b)))
    }

    fn check_divisor(&self) -> Result<(), ExecutionError> {
        if as_int(self.peek()?)? == 0 {
            return Err(ExecutionError::revert("division by zero"));
        }
        Ok(())
    }
}

/// Rejects oversized values before charging for the copy, so a
/// doubling loop reverts long before it can allocate much.
fn charge_copy(ctx: &mut ContractContext<'_>, bytes: usize) -> Result<(), ExecutionError> {
    if bytes > MAX_VALUE_BYTES {
        return Err(ExecutionError::revert(format!(
            "value of {} bytes exceeds the {} byte limit",
            bytes, MAX_VALUE_BYTES
        )));
    }
    ctx.charge(copy_cost(bytes))
}

/// Approximate in-memory footprint of a value.
fn value_size(value: &Value) -> usize {
    match value {
        Value::Null | Value::Bool(_) => 1,
        Value::Number(_) => 8,
        Value::String(s) => s.len(),
        Value::Array(items) => items.iter().map(value_size).fold(0, usize::saturating_add),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| k.len().saturating_add(value_size(v)))
            .fold(0, usize::saturating_add),
    }
}

fn lookup(params: &Value, path: &str) -> Value {
    let found = if path.is_empty() || path.starts_with('/') {
        params.pointer(path)
    } else {
        params.pointer(&format!("/{}", path))
    };
    found.cloned().unwrap_or(Value::Null)
}

fn as_int(value: &Value) -> Result<i64, ExecutionError> {
    match value {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| ExecutionError::revert(format!("{} is not a 64-bit integer", n))),
        other => Err(ExecutionError::revert(format!(
            "expected an integer, got {}",
            other
        ))),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() != Some(0) && n.as_u64() != Some(0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn stringify(value: &Value) -> Result<String, ExecutionError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        other => Err(ExecutionError::revert(format!("cannot concat {}", other))),
    }
}
