//! Comparison backend
//!
//! The assertion adapter delegates every actual comparison here. Values are
//! `serde_json::Value` and the semantics are deliberately JS-flavored to
//! match the legacy API: loose equality coerces across numbers, numeric
//! strings, and booleans; strict equality requires the same JSON type; deep
//! equality compares structures recursively with numeric tolerance for
//! integer/float representation differences.

use serde_json::Value;

/// JS-style truthiness: `null`, `false`, `0`, NaN, and `""` are falsy;
/// arrays and objects are always truthy.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn as_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Loose equality with numeric coercion: `2 == "2"`, `1 == true`.
pub fn loose_eq(actual: &Value, expected: &Value) -> bool {
    if deep_eq(actual, expected) {
        return true;
    }
    match (as_numeric(actual), as_numeric(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Strict equality: same JSON type and equal value. Numbers compare by
/// value, so `2` equals `2.0` but never `"2"`.
pub fn strict_eq(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}

/// Recursive structural equality with numeric tolerance at the leaves.
pub fn deep_eq(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| deep_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).map(|y| deep_eq(x, y)).unwrap_or(false))
        }
        _ => actual == expected,
    }
}
