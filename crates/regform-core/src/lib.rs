//! regform Core
//!
//! Live document model for schema-driven registration forms.
//!
//! # Core Concepts
//!
//! - [`Document`]: pages of [`ContentNode`] trees, a page cursor and the
//!   composite-key indexes that map answer keys to nodes
//! - Repetition: `repeat` wrappers grow on demand ([`Document::add_repeat`]),
//!   `each` wrappers mirror another node's children
//! - Persistence: [`Document::serialize`] produces a flat answer map plus a
//!   completeness flag; [`Document::unserialize`] restores one, growing
//!   repeats to fit
//! - Reads are computed: visibility, templated text and derived options are
//!   evaluated against the current answers; [`Document::revision`] tells the
//!   host when to re-read
//!
//! # Example
//!
//! ```rust
//! use regform_core::prelude::*;
//! use serde_json::json;
//!
//! let schema = Schema::from_json(
//!     r#"{"pages": [{"id": "p1", "contents": [
//!         {"id": "authors", "type": "section", "canRepeat": true, "maxRepeat": 3,
//!          "contents": [{"id": "name", "required": true}]}
//!     ]}]}"#,
//! ).unwrap();
//! let mut doc = Document::new(schema).unwrap();
//!
//! let report = doc
//!     .unserialize(json!({"authors:1.name": "Grace"}).as_object().unwrap())
//!     .unwrap();
//! assert_eq!(report.applied, vec!["authors:1.name"]);
//!
//! let out = doc.serialize();
//! assert!(!out.complete); // authors:0.name is still empty
//! assert_eq!(out.data["authors:1.name"], json!("Grace"));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod document;
pub mod embargo;
pub mod error;
pub mod files;
pub mod index;
pub mod item;
pub mod node;
pub mod page;
pub mod section;

mod repeat;
mod resolve;
mod tree;

pub use config::{ConfigError, EmbargoConfig, EngineConfig};
pub use document::{Document, Serialized, UnserializeReport};
pub use embargo::{Embargo, EmbargoError, RegistrationChoice, EMBARGO_END_DATE_KEY, REGISTRATION_CHOICE_KEY};
pub use error::DocumentError;
pub use files::{FileCache, FileListing, FileRequest, ListingError, StaticListing};
pub use index::{IndexAction, KeyIndex};
pub use item::{is_empty_value, CompiledRule, FileItem, Item, ItemOptions};
pub use node::{ContentNode, DisplayRule, NodeId, NodeKind, TextField, TextKind, Uid};
pub use page::Page;
pub use section::{RepeatMode, RepeatSpec, Section};
pub use tree::DocumentBuilder;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::document::{Document, Serialized, UnserializeReport};
    pub use crate::embargo::RegistrationChoice;
    pub use crate::error::DocumentError;
    pub use crate::files::{FileListing, StaticListing};
    pub use crate::node::{NodeId, TextKind};
    pub use regform_schema::{Schema, SchemaNode, SchemaPage};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
