//! Content nodes
//!
//! One runtime node per schema node. Nodes live in the document's arena and
//! refer to each other by [`NodeId`]; a node back-references its parent but
//! never owns it.

use crate::item::{FileItem, Item};
use crate::section::Section;
use indexmap::IndexMap;
use regform_schema::{Reference, SchemaNode, Template};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// Handle to a node in a document
///
/// Arena slots are reused once freed; the handle also carries the node's
/// uid, so a handle to a freed node never resolves to its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    pub(crate) slot: usize,
    pub(crate) uid: Uid,
}

impl NodeId {
    #[inline]
    pub(crate) fn new(slot: usize, uid: Uid) -> Self {
        Self { slot, uid }
    }

    /// Identity of the node this handle was issued for
    #[inline]
    #[must_use]
    pub fn uid(self) -> Uid {
        self.uid
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.uid.0)
    }
}

/// Monotonic node identity, for host-side addressing (DOM ids and the like)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct Uid(pub u64);

/// Text field that is either fixed or re-rendered on every read
#[derive(Debug, Clone, PartialEq)]
pub enum TextField {
    Plain(String),
    Template(Template),
}

impl TextField {
    pub(crate) fn from_schema(text: Option<&String>) -> Option<Self> {
        text.map(|t| match Template::parse(t) {
            Some(template) => Self::Template(template),
            None => Self::Plain(t.clone()),
        })
    }
}

/// Which text field to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Title,
    Label,
    Caption,
}

/// One display rule: the answer at `key` must equal `expected`
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRule {
    pub key: String,
    pub reference: Reference,
    pub expected: Value,
}

/// Variant payload of a node
#[derive(Debug, Clone)]
pub enum NodeKind {
    Section(Section),
    Item(Item),
    File(FileItem),
}

/// A live schema node
#[derive(Debug, Clone)]
pub struct ContentNode {
    pub(crate) uid: Uid,
    pub(crate) id: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) page: usize,
    pub(crate) title: Option<TextField>,
    pub(crate) label: Option<TextField>,
    pub(crate) caption: Option<TextField>,
    pub(crate) display_rules: Vec<DisplayRule>,
    pub(crate) disable: bool,
    /// Source item this node projects, for `each` instances
    pub(crate) each_source: Option<NodeId>,
    pub(crate) kind: NodeKind,
}

impl ContentNode {
    /// Copy the schema fields shared by every variant
    pub(crate) fn new(
        schema: &SchemaNode,
        uid: Uid,
        parent: Option<NodeId>,
        page: usize,
        kind: NodeKind,
    ) -> Self {
        let display_rules = schema
            .display_rules
            .iter()
            .map(|(key, expected)| DisplayRule {
                key: key.clone(),
                reference: Reference::parse(key),
                expected: expected.clone(),
            })
            .collect();

        Self {
            uid,
            id: schema.id.clone(),
            parent,
            page,
            title: TextField::from_schema(schema.title.as_ref()),
            label: TextField::from_schema(schema.label.as_ref()),
            caption: TextField::from_schema(schema.caption.as_ref()),
            display_rules,
            disable: schema.disable,
            each_source: None,
            kind,
        }
    }

    #[inline]
    #[must_use]
    pub fn uid(&self) -> Uid {
        self.uid
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Index of the owning page
    #[inline]
    #[must_use]
    pub fn page(&self) -> usize {
        self.page
    }

    #[inline]
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disable
    }

    /// Display rules as declared
    #[must_use]
    pub fn display_rules(&self) -> IndexMap<&str, &Value> {
        self.display_rules
            .iter()
            .map(|rule| (rule.key.as_str(), &rule.expected))
            .collect()
    }

    /// Source item of an `each` instance
    #[inline]
    #[must_use]
    pub fn each_source(&self) -> Option<NodeId> {
        self.each_source
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[inline]
    #[must_use]
    pub fn as_section(&self) -> Option<&Section> {
        match &self.kind {
            NodeKind::Section(section) => Some(section),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn as_section_mut(&mut self) -> Option<&mut Section> {
        match &mut self.kind {
            NodeKind::Section(section) => Some(section),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_item(&self) -> Option<&Item> {
        match &self.kind {
            NodeKind::Item(item) => Some(item),
            NodeKind::File(file) => Some(file.item()),
            NodeKind::Section(_) => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_file(&self) -> Option<&FileItem> {
        match &self.kind {
            NodeKind::File(file) => Some(file),
            _ => None,
        }
    }

    /// Child handles (empty for items)
    #[inline]
    #[must_use]
    pub fn contents(&self) -> &[NodeId] {
        match self.as_section() {
            Some(section) => section.contents(),
            None => &[],
        }
    }

    /// Whether this node is a repeat wrapper
    #[inline]
    #[must_use]
    pub fn is_repeat_wrapper(&self) -> bool {
        self.as_section().is_some_and(Section::is_repeat_wrapper)
    }

    /// Whether this node holds an answer
    #[inline]
    #[must_use]
    pub fn holds_value(&self) -> bool {
        !matches!(self.kind, NodeKind::Section(_))
    }

    pub(crate) fn text_field(&self, kind: TextKind) -> Option<&TextField> {
        match kind {
            TextKind::Title => self.title.as_ref(),
            TextKind::Label => self.label.as_ref(),
            TextKind::Caption => self.caption.as_ref(),
        }
    }
}
