//! Dynamic value exchanged with converters and validators.
//!
//! Values keep their native JSON shape: numbers stay numbers, strings stay
//! strings, objects and arrays stay structured.

pub use serde_json::{Map, Value};

/// Short name of a value's shape, used in mismatch diagnostics.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
