use serde_json::Value;

/// Depth-first search for `key`: the current object's own keys are checked
/// before descending into its values, arrays are walked in order. Null values
/// do not count as a hit.
pub fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => {
            if let Some(hit) = map.get(key).filter(|v| !v.is_null()) {
                return Some(hit);
            }
            map.values().find_map(|v| find_key(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_key(v, key)),
        _ => None,
    }
}

/// String form of a scalar price value; empty strings, zero-like falsy values
/// and non-scalars yield `None`.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) if n.as_f64().is_some_and(|v| v != 0.0) => Some(n.to_string()),
        _ => None,
    }
}
