//! Value types carried by variables.
//!
//! A variable has one fixed [`ValueType`]. Values travel through the graph as
//! the dynamically typed [`Value`]; the [`Scalar`] trait maps plain Rust types
//! onto it for typed access.
//!
//! # Text encoding
//!
//! | type      | tag         | text                          |
//! |-----------|-------------|-------------------------------|
//! | `Bool`    | `"boolean"` | `"true"` / `"false"`          |
//! | `Int`     | `"int"`     | decimal, e.g. `"-12"`         |
//! | `Float`   | `"float"`   | shortest round-trip decimal   |
//! | `String`  | `"string"`  | raw text                      |
//! | `Void`    | `"void"`    | no payload                    |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    String,
    Void,
}

impl ValueType {
    /// Wire tag, also used as the single field key of scalar messages.
    pub fn tag(&self) -> &'static str {
        match self {
            ValueType::Bool => "boolean",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::Void => "void",
        }
    }

    pub fn from_tag(tag: &str) -> Option<ValueType> {
        match tag {
            "boolean" => Some(ValueType::Bool),
            "int" => Some(ValueType::Int),
            "float" => Some(ValueType::Float),
            "string" => Some(ValueType::String),
            "void" => Some(ValueType::Void),
            _ => None,
        }
    }

    /// Parse wire text into a value of this type.
    pub fn parse(&self, text: &str) -> Option<Value> {
        match self {
            ValueType::Bool => match text.trim() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            ValueType::Int => text.trim().parse::<i64>().ok().map(Value::Int),
            ValueType::Float => text.trim().parse::<f64>().ok().map(Value::Float),
            ValueType::String => Some(Value::Text(text.to_string())),
            ValueType::Void => Some(Value::Void),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A dynamically typed variable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Void,
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Text(_) => ValueType::String,
            Value::Void => ValueType::Void,
        }
    }

    /// Wire text, `None` for void.
    pub fn encode(&self) -> Option<String> {
        match self {
            Value::Bool(v) => Some(v.to_string()),
            Value::Int(v) => Some(v.to_string()),
            Value::Float(v) => Some(v.to_string()),
            Value::Text(v) => Some(v.clone()),
            Value::Void => None,
        }
    }

    /// Whether assigning `next` over `self` counts as a change.
    ///
    /// Void never compares equal, so a void assignment always propagates.
    pub fn differs_from(&self, next: &Value) -> bool {
        matches!(next, Value::Void) || self != next
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encode() {
            Some(text) => f.write_str(&text),
            None => f.write_str("<void>"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Void
    }
}

/// Rust types that map one-to-one onto a [`ValueType`].
pub trait Scalar: Sized + Into<Value> {
    const TYPE: ValueType;

    fn from_value(value: &Value) -> Option<Self>;
}

impl Scalar for bool {
    const TYPE: ValueType = ValueType::Bool;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl Scalar for i64 {
    const TYPE: ValueType = ValueType::Int;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }
}

impl Scalar for f64 {
    const TYPE: ValueType = ValueType::Float;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_float()
    }
}

impl Scalar for String {
    const TYPE: ValueType = ValueType::String;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl Scalar for () {
    const TYPE: ValueType = ValueType::Void;

    fn from_value(value: &Value) -> Option<Self> {
        matches!(value, Value::Void).then_some(())
    }
}
