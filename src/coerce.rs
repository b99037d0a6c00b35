//! Loose-JSON coercion helpers shared by the input and decision normalizers.

use serde_json::{Map, Value};

/// Trimmed non-empty string, or `None` for anything else.
pub fn safe_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        _ => None,
    }
}

/// Finite number from a JSON number or a numeric string.
pub fn to_number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Strictly positive finite number, else `None`.
pub fn positive_number(value: Option<&Value>) -> Option<f64> {
    to_number(value).filter(|n| *n > 0.0)
}

/// Array of strings; non-arrays become empty, non-string or blank items are dropped.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| safe_string(Some(item)))
            .collect(),
        _ => Vec::new(),
    }
}

/// The value as an object, if it is one.
pub fn as_object(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value.and_then(Value::as_object)
}
