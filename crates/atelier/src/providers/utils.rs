use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref FUNCTION_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid regex");
    static ref INVALID_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_-]").expect("valid regex");
}

/// Both wire protocols restrict function names to [a-zA-Z0-9_-].
pub fn is_valid_function_name(name: &str) -> bool {
    FUNCTION_NAME.is_match(name)
}

pub fn sanitize_function_name(name: &str) -> String {
    INVALID_CHARS.replace_all(name, "_").to_string()
}

/// Providers occasionally return arguments as a JSON-encoded string instead
/// of an object; normalize to an object where possible.
pub fn normalize_arguments(value: Value) -> Value {
    match value {
        Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        other => other,
    }
}
