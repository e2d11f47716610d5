//! The uniform `{"JSONRPC", "RESULT", "ID"}` response envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "JSONRPC")]
    pub jsonrpc: String,
    #[serde(rename = "RESULT")]
    pub result: Vec<Value>,
    #[serde(rename = "ID")]
    pub id: String,
}

impl Envelope {
    pub fn new(result: Vec<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result,
            id: String::new(),
        }
    }

    pub fn into_value(self) -> Value {
        serde_json::json!({
            "JSONRPC": self.jsonrpc,
            "RESULT": self.result,
            "ID": self.id,
        })
    }
}

/// Wrap a decoded backend result in the envelope.
///
/// Objects already carrying `RESULT` pass through untouched, arrays become
/// the `RESULT` list, and any other value becomes its single element.
/// Applying it twice gives the same value as applying it once.
pub fn normalize(raw: Value) -> Value {
    match raw {
        Value::Object(ref map) if map.contains_key("RESULT") => raw,
        Value::Array(items) => Envelope::new(items).into_value(),
        other => Envelope::new(vec![other]).into_value(),
    }
}
