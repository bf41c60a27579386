//! Deployable contract code.
//!
//! Code travels in a deploy payload as JSON and is stored under the
//! contract's reserved `__code` key in the same form. Two shapes exist:
//!
//! ```json
//! {"script": {"ops": [...], "init": [...]}}
//! {"token": {"name": "Test", "symbol": "TST", "initialSupply": 1000}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExecutionError;
use crate::runtime::ContractContext;
use crate::script::Script;
use crate::token::{self, TokenSpec};

/// Closed set of contract shapes the runtime can execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractCode {
    /// A stack-machine program: one entry point, arbitrary logic.
    Script(Script),
    /// The built-in fungible token with named operations.
    Token(TokenSpec),
}

impl ContractCode {
    /// Parses and statically checks code from its JSON form.
    pub fn from_value(value: &Value) -> Result<Self, ExecutionError> {
        let code = Self::deserialize(value).map_err(|e| ExecutionError::InvalidCode {
            reason: e.to_string(),
        })?;
        code.check()?;
        Ok(code)
    }

    pub fn to_value(&self) -> Result<Value, ExecutionError> {
        serde_json::to_value(self).map_err(|e| ExecutionError::InvalidCode {
            reason: e.to_string(),
        })
    }

    pub fn check(&self) -> Result<(), ExecutionError> {
        match self {
            Self::Script(script) => script.check(),
            Self::Token(spec) => spec.check(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Script(_) => "script",
            Self::Token(_) => "token",
        }
    }

    pub(crate) fn construct(&self, ctx: &mut ContractContext<'_>) -> Result<Value, ExecutionError> {
        match self {
            Self::Script(script) => script.run_init(ctx),
            Self::Token(spec) => token::construct(spec, ctx),
        }
    }

    pub(crate) fn call(&self, ctx: &mut ContractContext<'_>) -> Result<Value, ExecutionError> {
        match self {
            Self::Script(script) => script.run(ctx),
            Self::Token(_) => token::dispatch(ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Op;
    use serde_json::json;

    #[test]
    fn parses_both_shapes() {
        let token = ContractCode::from_value(&json!({
            "token": {"name": "Test", "symbol": "TST", "initialSupply": 5}
        }))
        .unwrap();
        assert_eq!(token.kind_name(), "token");
        match &token {
            ContractCode::Token(spec) => {
                assert_eq!(spec.decimals, 18);
                assert_eq!(spec.initial_supply, 5);
            }
            other => panic!("unexpected {:?}", other),
        }

        let script = ContractCode::from_value(&json!({"script": {"ops": ["caller", "return"]}})).unwrap();
        assert_eq!(script, ContractCode::Script(Script::new(vec![Op::Caller, Op::Return])));
    }

    #[test]
    fn value_form_is_stable() {
        let code = ContractCode::Token(TokenSpec::new("Test", "TST"));
        let value = code.to_value().unwrap();
        assert_eq!(ContractCode::from_value(&value).unwrap(), code);
    }

    #[test]
    fn rejects_unknown_and_invalid_code() {
        for bad in [
            json!({"wasm": "00ff"}),
            json!("token"),
            json!({"token": {"name": "", "symbol": "X"}}),
            json!({"script": {"ops": [{"jump": 9}]}}),
        ] {
            assert!(matches!(
                ContractCode::from_value(&bad),
                Err(ExecutionError::InvalidCode { .. })
            ));
        }
    }
}
