//! Schema nodes
//!
//! The immutable, declarative description of one section, item or file
//! question. Field names follow the camelCase JSON the schemas are written in.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// Declared node type
///
/// `section` and `file` select their own runtime variants; every other type
/// string names an item widget (`text`, `textarea`, `choice`, …).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    /// Container of other nodes
    Section,
    /// `(container, path)` file reference
    File,
    /// Multi-valued choice
    Checkbox,
    /// Any other item widget
    Field(String),
}

impl NodeType {
    /// Whether answers of this type are lists
    #[inline]
    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self, Self::Checkbox)
    }

    /// Type name as written in schemas
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Section => "section",
            Self::File => "file",
            Self::Checkbox => "checkbox",
            Self::Field(name) => name,
        }
    }
}

impl Default for NodeType {
    fn default() -> Self {
        Self::Field("text".to_string())
    }
}

impl From<String> for NodeType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "section" => Self::Section,
            "file" => Self::File,
            "checkbox" => Self::Checkbox,
            _ => Self::Field(name),
        }
    }
}

impl From<NodeType> for String {
    fn from(node_type: NodeType) -> Self {
        node_type.as_str().to_string()
    }
}

impl Display for NodeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a repeat wrapper produces its instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatType {
    /// User-driven add/remove between `minRepeat` and `maxRepeat`
    Repeat,
    /// One instance per item of another node's contents
    Each,
}

/// Where an item's choices come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionsSource {
    /// Fixed choices
    List(Vec<Value>),
    /// Reference to a node whose children (or list value) supply the choices
    Reference(String),
}

/// Regex rule checked against an item's answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRule {
    /// Pattern the answer must match
    pub regex: String,
    /// Message shown when it does not
    #[serde(default)]
    pub message: String,
}

/// One node of the declarative schema tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaNode {
    /// Node id, unique among siblings and free of reserved separators
    pub id: String,

    /// Declared type
    #[serde(rename = "type")]
    pub node_type: NodeType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,

    /// Initial answer (may be a template string)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contents: Vec<SchemaNode>,

    pub can_repeat: bool,
    pub min_repeat: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_repeat: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_repeat: Option<usize>,

    /// Reference to the node whose contents drive an `each` projection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub each: Option<String>,

    /// Equality constraints on other answers, all of which must hold
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub display_rules: IndexMap<String, Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OptionsSource>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validation: Vec<ValidationRule>,

    pub required: bool,
    pub multiple: bool,
    pub disable: bool,

    /// Set by preprocessing on synthetic repeat wrappers
    pub repeat_section: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_type: Option<RepeatType>,
    #[serde(rename = "_template", skip_serializing_if = "Option::is_none")]
    pub template: Option<Box<SchemaNode>>,
}

impl Default for SchemaNode {
    fn default() -> Self {
        Self {
            id: String::new(),
            node_type: NodeType::default(),
            title: None,
            label: None,
            caption: None,
            value: None,
            contents: Vec::new(),
            can_repeat: false,
            min_repeat: 1,
            max_repeat: None,
            init_repeat: None,
            each: None,
            display_rules: IndexMap::new(),
            options: None,
            validation: Vec::new(),
            required: false,
            multiple: false,
            disable: false,
            repeat_section: false,
            repeat_type: None,
            template: None,
        }
    }
}

impl SchemaNode {
    /// New node of the given type
    #[must_use]
    pub fn new(id: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            ..Self::default()
        }
    }

    /// New section
    #[inline]
    #[must_use]
    pub fn section(id: impl Into<String>) -> Self {
        Self::new(id, NodeType::Section)
    }

    /// New text item
    #[inline]
    #[must_use]
    pub fn item(id: impl Into<String>) -> Self {
        Self::new(id, NodeType::default())
    }

    /// New file item
    #[inline]
    #[must_use]
    pub fn file(id: impl Into<String>) -> Self {
        Self::new(id, NodeType::File)
    }

    /// With title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// With child nodes
    #[must_use]
    pub fn with_contents(mut self, contents: Vec<SchemaNode>) -> Self {
        self.contents = contents;
        self
    }

    /// Mark as required
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark as multi-valued
    #[must_use]
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Make repeatable within bounds
    #[must_use]
    pub fn repeatable(mut self, min: usize, max: Option<usize>) -> Self {
        self.can_repeat = true;
        self.min_repeat = min;
        self.max_repeat = max;
        self
    }

    /// Project one instance per item of the referenced node
    #[must_use]
    pub fn each_of(mut self, reference: impl Into<String>) -> Self {
        self.each = Some(reference.into());
        self
    }

    /// Add a display rule
    #[must_use]
    pub fn shown_when(mut self, key: impl Into<String>, expected: impl Into<Value>) -> Self {
        self.display_rules.insert(key.into(), expected.into());
        self
    }

    /// Add a validation rule
    #[must_use]
    pub fn validated_by(mut self, regex: impl Into<String>, message: impl Into<String>) -> Self {
        self.validation.push(ValidationRule {
            regex: regex.into(),
            message: message.into(),
        });
        self
    }

    /// Whether this node is a section (including repeat wrappers)
    #[inline]
    #[must_use]
    pub fn is_section(&self) -> bool {
        self.node_type == NodeType::Section
    }

    /// Whether answers to this node are lists
    #[inline]
    #[must_use]
    pub fn is_list(&self) -> bool {
        self.multiple || self.node_type.is_list()
    }

    /// Whether preprocessing must wrap this node into a repeat section
    #[inline]
    #[must_use]
    pub fn wants_repeat(&self) -> bool {
        !self.repeat_section && (self.can_repeat || self.each.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let node: SchemaNode = serde_json::from_value(json!({
            "id": "authors",
            "type": "section",
            "canRepeat": true,
            "maxRepeat": 3,
            "displayRules": {"hasAuthors": "yes"},
            "contents": [{"id": "name", "required": true}]
        }))
        .unwrap();

        assert_eq!(node.node_type, NodeType::Section);
        assert!(node.can_repeat);
        assert_eq!(node.min_repeat, 1);
        assert_eq!(node.max_repeat, Some(3));
        assert_eq!(node.display_rules["hasAuthors"], json!("yes"));
        assert_eq!(node.contents[0].node_type, NodeType::Field("text".into()));
        assert!(node.contents[0].required);
    }

    #[test]
    fn node_type_round_trips_as_string() {
        let t: NodeType = serde_json::from_value(json!("checkbox")).unwrap();
        assert!(t.is_list());
        assert_eq!(serde_json::to_value(NodeType::Field("choice".into())).unwrap(), json!("choice"));
    }

    #[test]
    fn options_accept_list_or_reference() {
        let list: OptionsSource = serde_json::from_value(json!(["a", "b"])).unwrap();
        assert_eq!(list, OptionsSource::List(vec![json!("a"), json!("b")]));

        let reference: OptionsSource = serde_json::from_value(json!("$parent.arms")).unwrap();
        assert_eq!(reference, OptionsSource::Reference("$parent.arms".into()));
    }

    #[test]
    fn template_field_uses_underscore_name() {
        let wrapper = SchemaNode {
            repeat_section: true,
            template: Some(Box::new(SchemaNode::item("q"))),
            ..SchemaNode::section("q")
        };
        let value = serde_json::to_value(&wrapper).unwrap();
        assert_eq!(value["_template"]["id"], json!("q"));
        assert_eq!(value["repeatSection"], json!(true));
    }

    #[test]
    fn builder_helpers() {
        let node = SchemaNode::item("email")
            .required()
            .validated_by("@", "must contain @")
            .shown_when("contact", "email");
        assert!(node.required);
        assert_eq!(node.validation.len(), 1);
        assert!(!node.wants_repeat());
        assert!(SchemaNode::section("s").repeatable(1, Some(2)).wants_repeat());
    }
}
