//! Whole-schema documents
//!
//! Uses serde_json / serde_yaml to load `{ pages: [...] }` schemas.

use crate::error::SchemaError;
use crate::node::SchemaNode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Top-level page of a schema
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaPage {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub contents: Vec<SchemaNode>,
}

impl SchemaPage {
    /// New page
    #[must_use]
    pub fn new(id: impl Into<String>, contents: Vec<SchemaNode>) -> Self {
        Self {
            id: id.into(),
            title: None,
            contents,
        }
    }

    /// With title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// A registration schema: ordered pages of node trees
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub pages: Vec<SchemaPage>,
}

impl Schema {
    /// Schema from pages
    #[inline]
    #[must_use]
    pub fn new(pages: Vec<SchemaPage>) -> Self {
        Self { pages }
    }

    /// Parse from JSON text
    ///
    /// # Errors
    /// Returns error if the JSON is invalid or does not describe a schema
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse from YAML text
    ///
    /// # Errors
    /// Returns error if the YAML is invalid or does not describe a schema
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Convert from an already parsed JSON value
    ///
    /// # Errors
    /// Returns error if the value does not describe a schema
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Parse text, choosing YAML for `.yaml`/`.yml` paths and JSON otherwise
    ///
    /// # Errors
    /// Returns error if the text does not parse in the chosen format
    pub fn from_text(path: &Path, text: &str) -> Result<Self, SchemaError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml(text),
            _ => Self::from_json(text),
        }
    }

    /// Number of schema nodes, wrappers and templates included
    #[must_use]
    pub fn node_count(&self) -> usize {
        fn count(node: &SchemaNode) -> usize {
            1 + node.contents.iter().map(count).sum::<usize>()
                + node.template.as_deref().map_or(0, count)
        }
        self.pages
            .iter()
            .flat_map(|p| p.contents.iter())
            .map(count)
            .sum()
    }
}
