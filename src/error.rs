//! Error handling for vargraph
//!
//! This module defines the crate-wide error type and a Result alias.
//! Errors are grouped into classes (see [`ErrorClass`]) so callers can tell a
//! schema/code mismatch apart from bad runtime input without string matching.

use thiserror::Error;

/// Broad category of a [`GraphError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Misuse of the variable contract. Indicates a bug in node code.
    Usage,
    /// Malformed or invalid input. Logged and dropped.
    Input,
    /// A start transition was blocked by missing children.
    Dependency,
    /// An identity or name did not resolve.
    Identity,
    /// Configuration, IO and other environment failures.
    Runtime,
}

/// Main error type for vargraph operations
#[derive(Error, Debug)]
pub enum GraphError {
    /// Read or write of a variable that does not hold state
    #[error("Variable '{0}' is not state-holding")]
    NotStateHolding(String),

    /// Read of a state-holding variable that has no value yet
    #[error("Variable '{0}' has no value")]
    Uninitialized(String),

    /// A required message field is absent
    #[error("Field missing: {0}")]
    FieldMissing(String),

    /// Message or field content could not be interpreted
    #[error("Malformed input: {0}")]
    Malformed(String),

    /// Identity not present in the registry
    #[error("Unknown identity: {0}")]
    UnknownIdentity(i64),

    /// Name not present in the registry
    #[error("Unknown name: {0}")]
    UnknownName(String),

    /// CreateNode with a type tag that has no schema
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// Identity outside the valid range
    #[error("Invalid identity: {0}")]
    InvalidIdentity(i64),

    /// Node cannot be attached at the requested position
    #[error("Invalid placement: {0}")]
    InvalidPlacement(String),

    /// Name already registered
    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    /// Required child nodes are missing
    #[error("Dependency unsatisfied: {0}")]
    DependencyUnsatisfied(String),

    /// Direct link between variables of different value types
    #[error("Type mismatch: {source_type} cannot feed {target_type}")]
    TypeMismatch {
        source_type: String,
        target_type: String,
    },

    /// Link would exceed the target's inbound limit
    #[error("Variable '{variable}' accepts at most {max} inbound links")]
    InboundLimit { variable: String, max: u32 },

    /// Propagation nested deeper than the configured limit
    #[error("Cascade exceeded maximum depth of {0}")]
    CascadeDepth(usize),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<GraphError>,
    },
}

impl GraphError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        GraphError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            GraphError::NotStateHolding(_) | GraphError::CascadeDepth(_) => ErrorClass::Usage,
            GraphError::Uninitialized(_)
            | GraphError::FieldMissing(_)
            | GraphError::Malformed(_)
            | GraphError::UnknownNodeType(_)
            | GraphError::InvalidIdentity(_)
            | GraphError::InvalidPlacement(_)
            | GraphError::DuplicateName(_)
            | GraphError::TypeMismatch { .. }
            | GraphError::InboundLimit { .. } => ErrorClass::Input,
            GraphError::DependencyUnsatisfied(_) => ErrorClass::Dependency,
            GraphError::UnknownIdentity(_) | GraphError::UnknownName(_) => ErrorClass::Identity,
            GraphError::Config(_) | GraphError::Serialization(_) | GraphError::Io(_) => {
                ErrorClass::Runtime
            }
            GraphError::WithContext { source, .. } => source.class(),
        }
    }

    /// True for errors that indicate a bug in node code rather than bad input.
    pub fn is_usage_error(&self) -> bool {
        self.class() == ErrorClass::Usage
    }
}

/// Result type alias for vargraph operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
