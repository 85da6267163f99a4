//! Schema errors
//!
//! Every variant is fatal: a schema that fails here cannot back a document.

use crate::key::KeyError;

/// Errors raised while loading or preprocessing a schema
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Node without an id
    #[error("node #{position} under '{parent}' has no id")]
    MissingId { parent: String, position: usize },

    /// Id contains `.` or `:`
    #[error("id '{id}' contains reserved separator '{separator}'")]
    ForbiddenSeparator { id: String, separator: char },

    /// Top-level id collides with a document-level answer key
    #[error("id '{id}' is reserved for document-level answers")]
    ReservedId { id: String },

    /// Same key path declared more than once
    #[error("duplicate id '{key}' ({count} occurrences)")]
    DuplicateId { key: String, count: usize },

    /// Validation pattern does not compile
    #[error("invalid validation pattern '{pattern}' on '{id}': {message}")]
    InvalidRegex {
        id: String,
        pattern: String,
        message: String,
    },

    /// Repeat bounds contradict each other
    #[error("invalid repeat bounds on '{id}': min {min} > max {max}")]
    InvalidRepeatBounds { id: String, min: usize, max: usize },

    /// Initial instance count exceeds the maximum
    #[error("invalid repeat bounds on '{id}': initRepeat {init} > maxRepeat {max}")]
    InvalidInitRepeat { id: String, init: usize, max: usize },

    /// Declared `value` does not fit the node
    #[error("invalid value for '{id}': {reason}")]
    InvalidDefault { id: String, reason: String },

    /// Schema text is not valid JSON
    #[error("invalid schema JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Schema text is not valid YAML
    #[error("invalid schema YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Malformed composite key
    #[error("invalid key: {0}")]
    Key(#[from] KeyError),
}

impl SchemaError {
    /// Check if the error comes from the schema text rather than its structure
    #[inline]
    #[must_use]
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Json(_) | Self::Yaml(_))
    }
}
