//! Per-type validity predicates attachable to a variable.

use crate::graph::value::{Value, ValueType};

/// Rules for string-valued variables.
#[derive(Debug, Clone, PartialEq)]
pub enum TextRule {
    /// Any text.
    Any,
    /// One of a fixed list of values.
    OneOf(Vec<String>),
    /// `[A-Za-z_][A-Za-z0-9_]*`
    Identifier,
    /// A single path component: no separators, not `.` or `..`.
    FileName,
    /// Identifiers joined by dots, e.g. `ga.population`.
    DottedIdentifier,
}

/// A validity predicate for one value type.
#[derive(Debug, Clone, PartialEq)]
pub enum Restriction {
    IntRange { min: Option<i64>, max: Option<i64> },
    FloatRange { min: Option<f64>, max: Option<f64> },
    Text(TextRule),
}

impl Restriction {
    pub fn int_min(min: i64) -> Self {
        Restriction::IntRange {
            min: Some(min),
            max: None,
        }
    }

    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Restriction::Text(TextRule::OneOf(values.into_iter().map(Into::into).collect()))
    }

    /// The value type this restriction can judge.
    pub fn applies_to(&self) -> ValueType {
        match self {
            Restriction::IntRange { .. } => ValueType::Int,
            Restriction::FloatRange { .. } => ValueType::Float,
            Restriction::Text(_) => ValueType::String,
        }
    }

    /// Pure predicate. Values of a foreign type are never valid.
    pub fn valid(&self, value: &Value) -> bool {
        match (self, value) {
            (Restriction::IntRange { min, max }, Value::Int(v)) => {
                min.map_or(true, |m| *v >= m) && max.map_or(true, |m| *v <= m)
            }
            (Restriction::FloatRange { min, max }, Value::Float(v)) => {
                !v.is_nan() && min.map_or(true, |m| *v >= m) && max.map_or(true, |m| *v <= m)
            }
            (Restriction::Text(rule), Value::Text(text)) => rule.valid(text),
            _ => false,
        }
    }
}

impl TextRule {
    pub fn valid(&self, text: &str) -> bool {
        match self {
            TextRule::Any => true,
            TextRule::OneOf(values) => values.iter().any(|v| v == text),
            TextRule::Identifier => is_identifier(text),
            TextRule::FileName => {
                !text.is_empty()
                    && text != "."
                    && text != ".."
                    && !text.contains(['/', '\\', '\0'])
            }
            TextRule::DottedIdentifier => text.split('.').all(is_identifier),
        }
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
