//! regform Schema
//!
//! Declarative description of a registration form.
//!
//! # Core Concepts
//!
//! - [`Schema`]: ordered pages of [`SchemaNode`] trees, loaded from JSON or YAML
//! - [`KeyPath`]: composite answer key (`authors:1.name`)
//! - [`Reference`] / [`Template`]: typed `$ctx` / `$svy` / `$parent` references
//! - [`preprocess_schema`]: wraps repeatable nodes and rejects malformed ids
//!
//! # Example
//!
//! ```rust
//! use regform_schema::{preprocess_schema, Schema};
//! use serde_json::Value;
//!
//! let mut schema = Schema::from_json(
//!     r#"{"pages": [{"id": "p1", "contents": [
//!         {"id": "authors", "type": "section", "canRepeat": true,
//!          "contents": [{"id": "name"}]}
//!     ]}]}"#,
//! ).unwrap();
//!
//! preprocess_schema(&mut schema, &Value::Null).unwrap();
//! assert!(schema.pages[0].contents[0].repeat_section);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod key;
mod node;
mod preprocess;
mod reference;
mod schema;
mod template;

pub use error::SchemaError;
pub use key::{
    KeyError, KeyPath, Segment, EMBARGO_END_DATE_KEY, INDEX_SEPARATOR, KEY_SEPARATOR,
    REGISTRATION_CHOICE_KEY, RESERVED_CHARS, RESERVED_KEYS,
};
pub use node::{NodeType, OptionsSource, RepeatType, SchemaNode, ValidationRule};
pub use preprocess::{preprocess, preprocess_schema, IdCounts};
pub use reference::{lookup_context, Reference};
pub use schema::{Schema, SchemaPage};
pub use template::{is_template, value_text, Template, TemplatePart};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
