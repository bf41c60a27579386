//! Contract events.
//!
//! Events are appended in emission order and handed back with the
//! invocation result. A reverted invocation emits nothing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One `emit(name, payload)` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub payload: Value,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}
