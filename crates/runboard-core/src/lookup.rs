use serde_json::Value;

pub const UNKNOWN_MODEL: &str = "unknown";

/// Depth-first search for the first string-valued `model` field anywhere in
/// an arbitrary config blob. Best-effort accessor: absence is `None`, never
/// an error.
pub fn find_model(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) => {
            if let Some(model) = map.get("model").and_then(|v| v.as_str()) {
                return Some(model);
            }
            map.values().find_map(find_model)
        }
        Value::Array(items) => items.iter().find_map(find_model),
        _ => None,
    }
}
