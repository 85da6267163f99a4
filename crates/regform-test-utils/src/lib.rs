//! Testing utilities for regform workspace
//!
//! Shared fixture schemas and helpers.

#![allow(missing_docs)]

use chrono::NaiveDate;
use regform_core::{Document, EngineConfig};
use regform_schema::{Schema, SchemaNode, SchemaPage};
use serde_json::{json, Map, Value};

/// Three-page registration exercising repeats, `each`, display rules,
/// validation and file answers
pub const REGISTRATION_JSON: &str = r#"{
  "pages": [
    {
      "id": "details",
      "title": "Study details for {{$ctx.project}}",
      "contents": [
        {"id": "title", "label": "Title", "required": true},
        {"id": "description", "type": "textarea"},
        {
          "id": "authors",
          "type": "section",
          "canRepeat": true,
          "minRepeat": 1,
          "maxRepeat": 3,
          "contents": [
            {"id": "name", "required": true},
            {
              "id": "email",
              "validation": [{"regex": "^[^@]+@[^@]+$", "message": "Enter a valid email"}]
            }
          ]
        }
      ]
    },
    {
      "id": "design",
      "title": "Design",
      "contents": [
        {"id": "kind", "type": "choice", "options": ["experiment", "survey", "other"], "required": true},
        {"id": "other_kind", "required": true, "displayRules": {"kind": "other"}},
        {"id": "keyword", "canRepeat": true, "minRepeat": 0, "initRepeat": 1},
        {"id": "lead_keyword", "type": "choice", "options": "$root.keyword"},
        {
          "id": "arms",
          "type": "section",
          "canRepeat": true,
          "minRepeat": 1,
          "contents": [{"id": "arm_name", "required": true}]
        },
        {"id": "data", "type": "file"}
      ]
    },
    {
      "id": "outcomes",
      "title": "Outcomes",
      "contents": [
        {
          "id": "outcome",
          "type": "section",
          "each": "$parent.arms",
          "contents": [
            {"id": "measure", "label": "Primary measure for {{$ctx.item.arm_name}}"}
          ]
        }
      ]
    }
  ]
}"#;

/// The registration fixture, parsed
pub fn registration_schema() -> Schema {
    Schema::from_json(REGISTRATION_JSON).unwrap()
}

/// Context the registration fixture reads through `$ctx`
pub fn registration_context() -> Value {
    json!({"project": "Soil Carbon"})
}

/// The registration fixture, built with its context
pub fn registration_document() -> Document {
    Document::builder(registration_schema())
        .context(registration_context())
        .build()
        .unwrap()
}

/// Single page holding one repeatable `authors` section with a required
/// `name`
pub fn authors_schema(min: usize, max: Option<usize>) -> Schema {
    let authors = SchemaNode::section("authors")
        .with_contents(vec![SchemaNode::item("name").required()])
        .repeatable(min, max);
    Schema::new(vec![SchemaPage::new("p1", vec![authors])])
}

/// Build with default configuration
pub fn build(schema: Schema) -> Document {
    Document::new(schema).unwrap()
}

/// Build with a configuration
pub fn build_with(schema: Schema, config: EngineConfig) -> Document {
    Document::builder(schema).config(config).build().unwrap()
}

/// Answer map from a JSON object literal
pub fn answers(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("answers must be a JSON object, got {other}"),
    }
}

/// Serialized answers without the embargo keys
pub fn answers_only(doc: &mut Document) -> Map<String, Value> {
    doc.serialize()
        .data
        .into_iter()
        .filter(|(key, _)| !regform_core::embargo::is_reserved_key(key))
        .collect()
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}
