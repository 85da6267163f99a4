//! Document construction
//!
//! Schema → preprocessing → pages → node trees → key index → `each`
//! projections.

use crate::config::EngineConfig;
use crate::document::Document;
use crate::error::DocumentError;
use crate::item::{FileItem, Item};
use crate::node::{ContentNode, NodeId, NodeKind, Uid};
use crate::page::Page;
use crate::section::{RepeatMode, Section};
use regform_schema::{lookup_context, preprocess_schema, NodeType, Schema, SchemaNode, Template};
use serde_json::Value;

/// Builder for [`Document`]
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    schema: Schema,
    config: EngineConfig,
    context: Value,
    containers: Vec<String>,
}

impl DocumentBuilder {
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            config: EngineConfig::default(),
            context: Value::Null,
            containers: Vec::new(),
        }
    }

    /// With engine configuration
    #[inline]
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// With page context, read by `$ctx` references
    #[inline]
    #[must_use]
    pub fn context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    /// With containers the host already knows about
    #[must_use]
    pub fn containers(mut self, containers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.containers = containers.into_iter().map(Into::into).collect();
        self
    }

    /// Build the document
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the schema is
    /// malformed (missing or reserved ids, duplicate key paths, bad rules)
    pub fn build(self) -> Result<Document, DocumentError> {
        self.config.validate()?;

        let mut schema = self.schema;
        preprocess_schema(&mut schema, &self.context)?;

        let mut doc = Document::empty(self.config, self.context, self.containers);
        for (page_index, page_schema) in schema.pages.iter().enumerate() {
            let title = page_schema
                .title
                .as_deref()
                .map(|t| render_context(t, &doc.context));
            doc.pages.push(Page::new(page_schema.id.clone(), title));

            for node_schema in &page_schema.contents {
                let id = doc.build_node(node_schema, None, page_index)?;
                doc.pages[page_index].contents.push(id);
            }
        }

        doc.rebuild_index()?;
        doc.sync_each()?;

        tracing::info!(
            pages = doc.pages.len(),
            nodes = doc.node_count(),
            keys = doc.index.len(),
            "document built"
        );
        Ok(doc)
    }
}

/// Render a template that may only read the page context
fn render_context(text: &str, context: &Value) -> String {
    match Template::parse(text) {
        Some(template) => template.render(|reference| match reference {
            regform_schema::Reference::Context(path) => lookup_context(context, path).cloned(),
            regform_schema::Reference::Literal(value) => Some(value.clone()),
            _ => None,
        }),
        None => text.to_string(),
    }
}

impl Document {
    fn next_uid(&mut self) -> Uid {
        let uid = Uid(self.next_uid);
        self.next_uid += 1;
        uid
    }

    /// Place a node in a free slot, or at the end of the arena
    fn alloc(&mut self, node: ContentNode) -> NodeId {
        let uid = node.uid;
        match self.free_slots.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NodeId::new(slot, uid)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId::new(self.nodes.len() - 1, uid)
            }
        }
    }

    /// Build the runtime subtree for a (preprocessed) schema node
    ///
    /// `repeat` wrappers are filled with their initial instances; `each`
    /// wrappers stay empty until the projection is synchronised.
    pub(crate) fn build_node(
        &mut self,
        schema: &SchemaNode,
        parent: Option<NodeId>,
        page: usize,
    ) -> Result<NodeId, DocumentError> {
        let kind = match schema.node_type {
            NodeType::Section => NodeKind::Section(Section::from_schema(schema)),
            NodeType::File => NodeKind::File(FileItem::from_schema(schema)?),
            NodeType::Checkbox | NodeType::Field(_) => NodeKind::Item(Item::from_schema(schema)?),
        };
        let uid = self.next_uid();
        let id = self.alloc(ContentNode::new(schema, uid, parent, page, kind));

        let repeat = self
            .get(id)?
            .as_section()
            .and_then(Section::repeat)
            .map(|spec| (spec.mode().clone(), spec.template().clone()));

        match repeat {
            Some((RepeatMode::Fixed { init, .. }, template)) => {
                for _ in 0..init {
                    let child = self.build_node(&template, Some(id), page)?;
                    self.push_child(id, child)?;
                }
            }
            Some((RepeatMode::Each { .. }, _)) => {}
            None => {
                for child_schema in &schema.contents {
                    let child = self.build_node(child_schema, Some(id), page)?;
                    self.push_child(id, child)?;
                }
            }
        }

        Ok(id)
    }

    pub(crate) fn push_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DocumentError> {
        let node = self.get_mut(parent)?;
        match node.as_section_mut() {
            Some(section) => {
                section.contents.push(child);
                Ok(())
            }
            None => Err(DocumentError::NotRepeatable { id: node.id.clone() }),
        }
    }

    /// Release a subtree's arena slots for reuse
    pub(crate) fn free_subtree(&mut self, id: NodeId) {
        let Some(node) = self.node(id) else {
            return;
        };
        let children = node.contents().to_vec();
        for child in children {
            self.free_subtree(child);
        }
        self.nodes[id.slot] = None;
        self.free_slots.push(id.slot);
    }
}
