//! Input validation for tool calls.

use serde_json::{Map, Value};

use crate::error::{BridgeError, BridgeResult};

/// Wire name of the tool identifier.
pub const TOOL_ID_KEY: &str = "TOOL_ID";

/// Reject empty or whitespace-only tool identifiers.
pub fn validate_tool_id(tool_id: &str) -> BridgeResult<()> {
    if tool_id.trim().is_empty() {
        return Err(BridgeError::MissingIdentifier);
    }
    Ok(())
}

/// Split a `{"TOOL_ID": ..., ...args}` payload into the identifier and the
/// remaining arguments.
///
/// A missing, empty or non-string `TOOL_ID` is `MissingIdentifier`.
pub fn split_tool_call(json_data: &Map<String, Value>) -> BridgeResult<(String, Map<String, Value>)> {
    let tool_id = json_data
        .get(TOOL_ID_KEY)
        .and_then(Value::as_str)
        .ok_or(BridgeError::MissingIdentifier)?;
    validate_tool_id(tool_id)?;

    let args = json_data
        .iter()
        .filter(|(key, _)| key.as_str() != TOOL_ID_KEY)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Ok((tool_id.to_string(), args))
}

/// Parse a `KEY=VALUE` CLI argument. The value is read as JSON when it
/// parses, otherwise kept as a string.
pub fn parse_key_value(arg: &str) -> Result<(String, Value), String> {
    let (key, raw) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", arg))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", arg));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}
