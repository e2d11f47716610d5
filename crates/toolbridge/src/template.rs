//! Reshapes flat caller arguments into the nested body a tool expects.

use serde_json::{json, Map, Value};

use crate::schema::ParameterTemplate;

/// Fill a parameter template with caller-supplied values.
///
/// The template drives iteration, so the result has exactly the template's
/// keys and nesting. For each key:
/// - group + object value: recurse into the value
/// - group + any other value: the caller value replaces the whole group
/// - group + no value: recurse with the same outer values, so flat
///   arguments reach leaves inside unnamed groups
/// - leaf: the caller value if present, else the placeholder
///
/// Caller keys that the template doesn't name are dropped. An empty template
/// therefore yields an empty map; `Bridge::try_invoke` sends the arguments
/// unshaped in that case.
pub fn fill(template: &ParameterTemplate, values: &Map<String, Value>) -> Map<String, Value> {
    fill_group(template.as_map(), values)
}

fn fill_group(group: &Map<String, Value>, values: &Map<String, Value>) -> Map<String, Value> {
    group
        .iter()
        .map(|(key, node)| {
            let filled = match (node, values.get(key)) {
                (Value::Object(inner), Some(Value::Object(given))) => {
                    Value::Object(fill_group(inner, given))
                }
                (Value::Object(_), Some(given)) => given.clone(),
                (Value::Object(inner), None) => Value::Object(fill_group(inner, values)),
                (_, Some(given)) => given.clone(),
                (placeholder, None) => placeholder.clone(),
            };
            (key.clone(), filled)
        })
        .collect()
}

/// Body sent for a tool whose template is unknown and the miss policy is
/// `forward`: the raw arguments under `IMPORT.IMPORTING_DATA`.
pub fn forward_unshaped(values: &Map<String, Value>) -> Value {
    json!({ "IMPORT": { "IMPORTING_DATA": values } })
}
