use std::fmt;

use ordered_float::OrderedFloat;

use crate::error::SchemaError;
use crate::value::Value;

/// The one concrete value a literal schema accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    String(String),
    Bool(bool),
    Number(OrderedFloat<f64>),
    Null,
    Undefined,
    /// Only reachable through [`crate::schema::nan`].
    NaN,
}

impl Literal {
    /// Generic path. Rejects NaN and container values.
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        match value {
            Value::String(s) => Ok(Literal::String(s)),
            Value::Bool(b) => Ok(Literal::Bool(b)),
            Value::Number(n) if n.is_nan() => Err(SchemaError::NanLiteral),
            Value::Number(n) => Ok(Literal::Number(OrderedFloat(n))),
            Value::Null => Ok(Literal::Null),
            Value::Undefined => Ok(Literal::Undefined),
            other => Err(SchemaError::UnsupportedLiteral(other.kind().to_owned())),
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Literal::String(a), Value::String(b)) => a == b,
            (Literal::Bool(a), Value::Bool(b)) => a == b,
            (Literal::Number(a), Value::Number(b)) => a.0 == *b,
            (Literal::Null, Value::Null) => true,
            (Literal::Undefined, Value::Undefined) => true,
            (Literal::NaN, Value::Number(b)) => b.is_nan(),
            _ => false,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Literal::String(s) => Value::String(s.clone()),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Number(n) => Value::Number(n.0),
            Literal::Null => Value::Null,
            Literal::Undefined => Value::Undefined,
            Literal::NaN => Value::Number(f64::NAN),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "{s:?}"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Number(n) => write!(f, "{}", n.0),
            Literal::Null => f.write_str("null"),
            Literal::Undefined => f.write_str("undefined"),
            Literal::NaN => f.write_str("NaN"),
        }
    }
}

/// Short rendering of a received value for literal mismatches.
pub(crate) fn preview(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{s:?}"),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.kind().to_owned(),
    }
}
