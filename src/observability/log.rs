//! Helpers for putting structured values into log fields.

use serde::Serialize;

/// Render `value` as compact JSON for a log field.
pub fn json<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_string(value) {
        Ok(s) => s,
        Err(e) => format!("<unserializable: {}>", e),
    }
}

/// Collapse a multi-line payload onto one line.
pub fn strip_newlines(s: &str) -> String {
    s.chars().filter(|c| *c != '\n' && *c != '\r').collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json as value;

    #[test]
    fn test_json_field() {
        assert_eq!(json(&value!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(json("x"), r#""x""#);
    }

    #[test]
    fn test_strip_newlines() {
        assert_eq!(strip_newlines("{\n  \"a\": 1\r\n}"), "{  \"a\": 1}");
    }
}
