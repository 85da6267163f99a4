//! Reference resolution, computed reads and visibility
//!
//! Everything here is read-only and evaluated on demand: values with their
//! templated defaults, rendered text fields, derived option lists and the
//! display-rule checks.

use crate::document::Document;
use crate::item::ItemOptions;
use crate::node::{NodeId, NodeKind, TextField, TextKind};
use regform_schema::{lookup_context, Reference, Template};
use serde_json::Value;

/// Nesting limit for references that read templated values
const MAX_RESOLVE_DEPTH: usize = 16;

/// `$ctx` head that reads the source item of an `each` instance
const EACH_ITEM: &str = "item";

impl Document {
    /// Find the node for `key` as seen from `from`
    ///
    /// Looks in the local index of `from` (when a section) and of each of its
    /// ancestors, then the page index, then the document index.
    #[must_use]
    pub fn get_key(&self, from: NodeId, key: &str) -> Option<NodeId> {
        let page = self.node(from)?.page;
        let mut cursor = Some(from);
        while let Some(current) = cursor {
            let node = self.node(current)?;
            if let Some(found) = node.as_section().and_then(|s| s.index().get(key)) {
                return Some(found);
            }
            cursor = node.parent;
        }
        self.pages
            .get(page)
            .and_then(|p| p.index().get(key))
            .or_else(|| self.index.get(key))
    }

    /// Node a reference points at, as seen from `from`
    #[must_use]
    pub fn resolve_node(&self, from: NodeId, reference: &Reference) -> Option<NodeId> {
        match reference {
            Reference::Answer(key) => self.get_key(from, key),
            Reference::Root(key) => self.index.get(key),
            Reference::Relative { ups, key } => {
                let page = self.node(from)?.page;
                let mut scope = Some(from);
                for _ in 0..*ups {
                    scope = match scope {
                        Some(node) => self.node(node)?.parent,
                        None => return None,
                    };
                }
                match (scope, key) {
                    (Some(node), None) => Some(node),
                    (Some(node), Some(key)) => self.node(node)?.as_section()?.index().get(key),
                    (None, None) => None,
                    (None, Some(key)) => self
                        .pages
                        .get(page)
                        .and_then(|p| p.index().get(key))
                        .or_else(|| self.index.get(key)),
                }
            }
            Reference::Context(_) | Reference::Literal(_) => None,
        }
    }

    /// Value a reference evaluates to, as seen from `from`
    #[must_use]
    pub fn resolve_value(&self, from: NodeId, reference: &Reference) -> Option<Value> {
        self.resolve_at(from, reference, 0)
    }

    fn resolve_at(&self, from: NodeId, reference: &Reference, depth: usize) -> Option<Value> {
        if depth > MAX_RESOLVE_DEPTH {
            tracing::warn!(node = %from, "reference nesting too deep");
            return None;
        }
        match reference {
            Reference::Literal(value) => Some(value.clone()),
            Reference::Context(path) => self.context_value(from, path, depth),
            _ => self
                .resolve_node(from, reference)
                .and_then(|node| self.value_at(node, depth + 1)),
        }
    }

    /// `$ctx.item.<key>` reads the nearest `each` instance's source; any
    /// other path reads the page context
    fn context_value(&self, from: NodeId, path: &[String], depth: usize) -> Option<Value> {
        if path.first().map(String::as_str) == Some(EACH_ITEM) {
            if let Some(source) = self.each_source_of(from) {
                let rest = &path[1..];
                if rest.is_empty() {
                    return self.value_at(source, depth + 1);
                }
                let key = rest.join(".");
                let target = self.node(source)?.as_section()?.index().get(&key)?;
                return self.value_at(target, depth + 1);
            }
        }
        lookup_context(&self.context, path).cloned()
    }

    /// Source item of the nearest enclosing `each` instance
    fn each_source_of(&self, from: NodeId) -> Option<NodeId> {
        let mut cursor = Some(from);
        while let Some(current) = cursor {
            let node = self.node(current)?;
            if let Some(source) = node.each_source() {
                return Some(source);
            }
            cursor = node.parent;
        }
        None
    }

    /// Current answer of an item (templated default applied); `None` for
    /// sections
    #[must_use]
    pub fn value(&self, id: NodeId) -> Option<Value> {
        self.value_at(id, 0)
    }

    fn value_at(&self, id: NodeId, depth: usize) -> Option<Value> {
        match &self.node(id)?.kind {
            NodeKind::Item(item) => {
                Some(item.current_value(|template| self.render_at(id, template, depth)))
            }
            NodeKind::File(file) => Some(file.serialize()),
            NodeKind::Section(_) => None,
        }
    }

    fn render_at(&self, from: NodeId, template: &Template, depth: usize) -> String {
        template.render(|reference| self.resolve_at(from, reference, depth + 1))
    }

    /// Title, label or caption with templates rendered
    #[must_use]
    pub fn text(&self, id: NodeId, kind: TextKind) -> Option<String> {
        match self.node(id)?.text_field(kind)? {
            TextField::Plain(text) => Some(text.clone()),
            TextField::Template(template) => Some(self.render_at(id, template, 0)),
        }
    }

    /// Choice list of an item
    ///
    /// A derived list holds the values of the source node's children, or the
    /// source's own list value. An unresolved source yields no options.
    #[must_use]
    pub fn options(&self, id: NodeId) -> Vec<Value> {
        let Some(item) = self.node(id).and_then(|n| n.as_item()) else {
            return Vec::new();
        };
        match item.options() {
            None => Vec::new(),
            Some(ItemOptions::Static(values)) => values.clone(),
            Some(ItemOptions::Derived(reference)) => {
                let Some(source) = self.resolve_node(id, reference) else {
                    return Vec::new();
                };
                let Some(node) = self.node(source) else {
                    return Vec::new();
                };
                if node.as_section().is_some() {
                    return node
                        .contents()
                        .iter()
                        .filter_map(|&child| self.value(child))
                        .filter(|v| !v.is_null())
                        .collect();
                }
                match self.value(source) {
                    Some(Value::Array(values)) => values,
                    Some(Value::Null) | None => Vec::new(),
                    Some(value) => vec![value],
                }
            }
        }
    }

    /// Own display rules hold
    ///
    /// Every rule must match; a rule whose key does not resolve never does.
    #[must_use]
    pub fn is_visible(&self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        node.display_rules.iter().all(|rule| {
            self.resolve_value(id, &rule.reference)
                .is_some_and(|actual| actual == rule.expected)
        })
    }

    /// Visible along with every ancestor
    #[must_use]
    pub fn is_displayed(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if !self.is_visible(current) {
                return false;
            }
            cursor = self.node(current).and_then(|n| n.parent);
        }
        true
    }
}
