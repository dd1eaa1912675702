//! Value - self-describing scalar attributes.
//!
//! A `Value` carries its own type name on the wire, so it can be
//! reconstructed without any external schema knowledge. It covers the
//! printable scalars that appear as "value object" attributes in
//! serialized records.
//!
//! # Example
//!
//! ```rust,ignore
//! use objectdb::Value;
//!
//! let v = Value::Double(0.25);
//! assert_eq!(v.type_name(), "double");
//! let back = Value::parse("double", "0.25").unwrap();
//! assert_eq!(v, back);
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A self-describing scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Double(f64),
    Bool(bool),
    Str(String),
}

impl Value {
    /// The type tag written alongside this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
        }
    }

    /// Reconstruct a value from its type tag and printed form.
    pub fn parse(type_name: &str, text: &str) -> Result<Value> {
        let text = text.trim();
        match type_name {
            "int" => text
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| bad_value(type_name, text)),
            "double" => text
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|_| bad_value(type_name, text)),
            "bool" => match text {
                "0" => Ok(Value::Bool(false)),
                "1" => Ok(Value::Bool(true)),
                _ => text
                    .parse::<i64>()
                    .map(|n| Value::Bool(n != 0))
                    .map_err(|_| bad_value(type_name, text)),
            },
            "string" => Ok(Value::Str(text.to_string())),
            _ => Err(Error::Format(format!(
                "unknown value type tag '{}'",
                type_name
            ))),
        }
    }

    /// Get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as double
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Int(0)
    }
}

fn bad_value(type_name: &str, text: &str) -> Error {
    Error::Format(format!(
        "could not parse '{}' as value type '{}'",
        text, type_name
    ))
}

// Conversions
impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Int(n) => serde_json::Value::Number(n.into()),
            Value::Double(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Str(s) => serde_json::Value::String(s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{}", n),
            // booleans print as 0/1 to match the primitive encoding
            Value::Bool(b) => write!(f, "{}", *b as i64),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}
