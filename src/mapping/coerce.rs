//! Value coercion: shapes a local value to a remote field's declared type
//!
//! Pure, no I/O. Survey input is free-form, so coercion never fails:
//! numbers that do not parse become `0`, and multi-option fields always
//! get a sequence.

use crate::schema::FieldDataType;
use serde_json::{Number, Value};

/// Shape `value` for a field of type `data_type`.
pub fn coerce(value: &Value, data_type: &FieldDataType) -> Value {
    match data_type {
        FieldDataType::MultiOption => coerce_multi_option(value),
        FieldDataType::Number => coerce_number(value),
        FieldDataType::SingleOption | FieldDataType::Text | FieldDataType::Other(_) => {
            Value::String(stringify(value))
        }
    }
}

fn coerce_multi_option(value: &Value) -> Value {
    match value {
        Value::Array(_) => value.clone(),
        Value::String(s) if s.contains(',') => Value::Array(
            s.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| Value::String(part.to_string()))
                .collect(),
        ),
        Value::String(s) => Value::Array(vec![Value::String(s.trim().to_string())]),
        Value::Null => Value::Array(Vec::new()),
        other => Value::Array(vec![other.clone()]),
    }
}

fn coerce_number(value: &Value) -> Value {
    let parsed = match value {
        Value::Number(_) => return value.clone(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };

    match parsed {
        Some(n) if n.is_finite() => number_value(n),
        _ => Value::Number(Number::from(0)),
    }
}

/// Integral floats go out as integers so `"150"` becomes `150`, not `150.0`.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or_else(|| Value::Number(Number::from(0)))
    }
}

/// Render any JSON value as the string a text field should hold.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(items) => items.iter().map(stringify).collect::<Vec<_>>().join(", "),
        Value::Object(_) => value.to_string(),
    }
}

/// Values that must never reach a payload: null, empty strings, empty lists.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
