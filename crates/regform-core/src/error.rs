//! Error types for regform Core
//!
//! Provides error handling for:
//! - Schema and configuration failures at construction
//! - Structural edits (repeat add/remove) that break their bounds
//! - Answer maps that cannot be resolved against the document
//! - Embargo submit gate and file listing failures

use crate::config::ConfigError;
use crate::embargo::EmbargoError;
use crate::files::ListingError;
use crate::node::NodeId;
use regform_schema::SchemaError;

/// Main document error type
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Schema is malformed
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Configuration is invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Handle does not name a live node
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// Operation needs a repeat wrapper of `repeat` type
    #[error("'{id}' is not a user-repeatable section")]
    NotRepeatable { id: String },

    /// Repeat bounds would be broken
    #[error("'{id}' would leave its repeat bounds ({count} instances, min {min}, max {max:?})")]
    RepeatBounds {
        id: String,
        count: usize,
        min: usize,
        max: Option<usize>,
    },

    /// Operation needs an answer-bearing node
    #[error("'{id}' does not hold an answer")]
    NotAnItem { id: String },

    /// Value does not fit the node
    #[error("invalid value for '{id}': {reason}")]
    InvalidValue { id: String, reason: String },

    /// Two nodes computed the same composite key
    #[error("duplicate key '{key}' in index")]
    DuplicateKey { key: String },

    /// A full pass over an answer map resolved nothing
    #[error("answers could not be resolved after {passes} passes: {unresolved:?}")]
    UnserializeStalled {
        passes: usize,
        unresolved: Vec<String>,
    },

    /// Embargo submit gate failed
    #[error("embargo error: {0}")]
    Embargo(#[from] EmbargoError),

    /// File listing provider failed
    #[error("file listing error: {0}")]
    Listing(#[from] ListingError),
}

impl DocumentError {
    /// Check if the error means the schema or answer data is unusable
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Schema(_) | Self::Config(_) | Self::DuplicateKey { .. } | Self::UnserializeStalled { .. }
        )
    }
}
