//! Pass/fail decision for one test case.

use kata_eval::{to_canonical_json, Value};

/// Does `actual` match the pre-serialised `expected` text?
///
/// The canonical JSON of `actual` must equal `expected` byte for byte. Only
/// when that fails, and `delta` is given, and `expected` is a number, is a
/// numeric `actual` accepted inside `expected ± delta / 2` (inclusive).
pub fn compare(actual: &Value, expected: &str, delta: Option<f64>) -> bool {
    if to_canonical_json(actual).as_deref() == Some(expected) {
        return true;
    }
    match (delta, actual, expected_number(expected)) {
        (Some(delta), Value::Number(actual), Some(expected)) => {
            let half = delta / 2.0;
            expected - half <= *actual && *actual <= expected + half
        }
        _ => false,
    }
}

/// `expected` as a number, if it is JSON number text.
pub fn expected_number(expected: &str) -> Option<f64> {
    match serde_json::from_str::<serde_json::Value>(expected) {
        Ok(serde_json::Value::Number(n)) => n.as_f64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(x: f64) -> Value {
        Value::Number(x)
    }

    #[test]
    fn exact_serialised_match_ignores_delta() {
        assert!(compare(&n(5.0), "5", None));
        assert!(compare(&n(5.0), "5", Some(0.0)));
        assert!(compare(&Value::string("hi"), r#""hi""#, Some(1.0)));
        assert!(compare(&Value::array(vec![n(1.0), n(2.0)]), "[1,2]", None));
    }

    #[test]
    fn serialisation_must_match_byte_for_byte() {
        assert!(!compare(&n(5.0), "5.0", None));
        assert!(!compare(&Value::array(vec![n(1.0)]), "[ 1 ]", None));
        assert!(!compare(&Value::string("5"), "5", None));
        assert!(!compare(&Value::Undefined, "undefined", None));
    }

    #[test]
    fn tolerance_window_is_half_delta_inclusive() {
        assert!(compare(&n(3.15), "3.14", Some(0.02)));
        assert!(compare(&n(3.135), "3.14", Some(0.02)));
        assert!(!compare(&n(3.16), "3.14", Some(0.02)));
        assert!(!compare(&n(3.12), "3.14", Some(0.02)));
    }

    #[test]
    fn tolerance_needs_numbers_on_both_sides() {
        assert!(!compare(&Value::string("3.14"), "3.14", Some(1.0)));
        assert!(!compare(&n(3.0), r#""3""#, Some(1.0)));
        assert!(!compare(&n(3.0), "3.1", None));
    }

    #[test]
    fn key_order_matters() {
        let mut entries = indexmap::IndexMap::new();
        entries.insert("b".to_string(), n(1.0));
        entries.insert("a".to_string(), n(2.0));
        let value = Value::object(entries);
        assert!(compare(&value, r#"{"b":1,"a":2}"#, None));
        assert!(!compare(&value, r#"{"a":2,"b":1}"#, None));
    }
}
