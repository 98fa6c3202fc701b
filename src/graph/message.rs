//! Flat typed messages.
//!
//! A [`Message`] is a `type` tag plus a field → text map. The same shape is
//! used for in-process delivery along message-mode links, for node-level
//! multi-field updates and for the control messages of the mutation
//! protocol. Messages are immutable once built.

use crate::error::{GraphError, Result};
use crate::graph::value::{Value, ValueType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Control message tag that grows the graph.
pub const CREATE_NODE: &str = "CreateNode";
/// Control message tag that shrinks the graph.
pub const DELETE_NODE: &str = "DeleteNode";

/// A typed, flat field → value payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    fields: HashMap<String, String>,
}

impl Message {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: HashMap::new(),
        }
    }

    /// Builder-style field insertion.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Encode a scalar value: one field keyed by the type tag, none for void.
    pub fn scalar(value: &Value) -> Self {
        let ty = value.value_type();
        let message = Message::new(ty.tag());
        match value.encode() {
            Some(text) => message.with_field(ty.tag(), text),
            None => message,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Like [`field`](Self::field) but a missing field is an error.
    pub fn check_field(&self, name: &str) -> Result<&str> {
        self.field(name)
            .ok_or_else(|| GraphError::FieldMissing(name.to_string()))
    }

    /// Required integer field.
    pub fn check_int(&self, name: &str) -> Result<i64> {
        let text = self.check_field(name)?;
        text.trim().parse::<i64>().map_err(|_| {
            GraphError::Malformed(format!("field '{}' is not an integer: {:?}", name, text))
        })
    }

    /// Soft type check: true when the message tag differs from `name`.
    ///
    /// Callers decide whether to honour the delivery anyway.
    pub fn type_differs(&self, name: &str) -> bool {
        self.kind != name
    }

    /// Decode a scalar payload for a variable of type `ty`.
    ///
    /// Non-void payloads must carry exactly one field. Void accepts any
    /// message since its arrival is the signal.
    pub fn decode_scalar(&self, ty: ValueType) -> Result<Value> {
        if ty == ValueType::Void {
            return Ok(Value::Void);
        }
        if self.fields.len() != 1 {
            return Err(GraphError::Malformed(format!(
                "{} message must carry exactly one field, found {}",
                ty,
                self.fields.len()
            )));
        }
        let text = self.fields.values().next().map(String::as_str).unwrap_or_default();
        ty.parse(text)
            .ok_or_else(|| GraphError::Malformed(format!("cannot parse {:?} as {}", text, ty)))
    }
}
