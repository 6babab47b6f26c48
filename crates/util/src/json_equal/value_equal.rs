use serde_json::{Number, Value};

/// Deep value equality between two JSON values.
///
/// Unlike `Value`'s `PartialEq`, numbers compare by numeric value, so an
/// integer `1` equals a float `1.0`. Objects compare key-by-key regardless
/// of insertion order.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use registrar_util::json_equal::value_equal;
///
/// assert!(value_equal(&json!({"n": 1, "tags": ["a"]}), &json!({"tags": ["a"], "n": 1.0})));
/// assert!(!value_equal(&json!(0), &json!(false)));
/// ```
pub fn value_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => number_equal(a, b),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| value_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| value_equal(x, y)))
        }
        _ => false,
    }
}

/// Equality over attribute slots where `None` stands for "absent".
///
/// Absent equals only absent; in particular absent is not equal to `null`.
pub fn slot_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => value_equal(a, b),
        _ => false,
    }
}

fn number_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
