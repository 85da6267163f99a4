//! Repeat preprocessing
//!
//! Runs once over the raw schema before any document node is built:
//! - templated ids are resolved against the page context
//! - ids are checked for presence and reserved characters; top-level ids
//!   may not take a document-level answer key
//! - every repeatable child (`canRepeat` or `each`) is replaced by a repeat
//!   wrapper section holding a blank-titled copy of the original as `_template`
//! - every key path is counted so duplicates can be reported once the whole
//!   schema has been seen

use crate::error::SchemaError;
use crate::key::{KeyPath, Segment, RESERVED_CHARS, RESERVED_KEYS};
use crate::node::{NodeType, RepeatType, SchemaNode};
use crate::reference::{lookup_context, Reference};
use crate::schema::Schema;
use crate::template::{is_template, Template};
use indexmap::IndexMap;
use serde_json::Value;

/// Occurrence count per key path (repeat positions omitted)
#[derive(Debug, Clone, Default)]
pub struct IdCounts {
    seen: IndexMap<String, usize>,
}

impl IdCounts {
    /// Create empty counts
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of a key path
    pub fn record(&mut self, path: &KeyPath) {
        *self.seen.entry(path.to_string()).or_insert(0) += 1;
    }

    /// Occurrences of a key path
    #[must_use]
    pub fn count(&self, key: &str) -> usize {
        self.seen.get(key).copied().unwrap_or(0)
    }

    /// Key paths seen more than once, in first-seen order
    #[must_use]
    pub fn duplicates(&self) -> Vec<(&str, usize)> {
        self.seen
            .iter()
            .filter(|(_, &count)| count > 1)
            .map(|(key, &count)| (key.as_str(), count))
            .collect()
    }

    /// Fail on the first duplicated key path
    ///
    /// # Errors
    /// Returns [`SchemaError::DuplicateId`] if any path was recorded twice
    pub fn check(&self) -> Result<(), SchemaError> {
        match self.duplicates().first() {
            Some(&(key, count)) => Err(SchemaError::DuplicateId {
                key: key.to_string(),
                count,
            }),
            None => Ok(()),
        }
    }

    /// Number of distinct key paths
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if nothing was recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Preprocess the children of `node` in place
///
/// `node` itself is assumed already checked; its key path is `prefix`.
///
/// # Errors
/// Returns error on a missing id, a reserved separator, or contradictory
/// repeat bounds. Duplicates are only recorded in `counts`.
pub fn preprocess(
    node: &mut SchemaNode,
    prefix: &KeyPath,
    counts: &mut IdCounts,
    context: &Value,
) -> Result<(), SchemaError> {
    if let Some(template) = node.template.as_deref_mut() {
        preprocess_contents(&mut template.contents, prefix, counts, context)?;
    }
    preprocess_contents(&mut node.contents, prefix, counts, context)
}

/// Preprocess every page of a schema and reject duplicate key paths
///
/// # Errors
/// Returns the first structural error, or [`SchemaError::DuplicateId`]
pub fn preprocess_schema(schema: &mut Schema, context: &Value) -> Result<IdCounts, SchemaError> {
    let mut counts = IdCounts::new();
    for page in &mut schema.pages {
        if is_template(&page.id) {
            page.id = resolve_context_text(&page.id, context);
        }
        preprocess_contents(&mut page.contents, &KeyPath::root(), &mut counts, context)?;
    }
    counts.check()?;
    tracing::debug!(paths = counts.len(), "schema preprocessed");
    Ok(counts)
}

fn preprocess_contents(
    contents: &mut [SchemaNode],
    prefix: &KeyPath,
    counts: &mut IdCounts,
    context: &Value,
) -> Result<(), SchemaError> {
    for (position, child) in contents.iter_mut().enumerate() {
        if is_template(&child.id) {
            child.id = resolve_context_text(&child.id, context);
        }
        check_id(&child.id, prefix, position)?;

        if child.wants_repeat() {
            *child = wrap_repeat(child)?;
        }

        let path = prefix.child(Segment::plain(child.id.clone()));
        counts.record(&path);
        preprocess(child, &path, counts, context)?;
    }
    Ok(())
}

fn check_id(id: &str, prefix: &KeyPath, position: usize) -> Result<(), SchemaError> {
    if id.is_empty() {
        return Err(SchemaError::MissingId {
            parent: prefix.to_string(),
            position,
        });
    }
    if let Some(separator) = id.chars().find(|c| RESERVED_CHARS.contains(c)) {
        return Err(SchemaError::ForbiddenSeparator {
            id: id.to_string(),
            separator,
        });
    }
    if prefix.is_empty() && RESERVED_KEYS.contains(&id) {
        return Err(SchemaError::ReservedId { id: id.to_string() });
    }
    Ok(())
}

/// Build the repeat wrapper standing in for a repeatable node
fn wrap_repeat(original: &SchemaNode) -> Result<SchemaNode, SchemaError> {
    if let Some(max) = original.max_repeat {
        if original.min_repeat > max {
            return Err(SchemaError::InvalidRepeatBounds {
                id: original.id.clone(),
                min: original.min_repeat,
                max,
            });
        }
        if let Some(init) = original.init_repeat.filter(|&init| init > max) {
            return Err(SchemaError::InvalidInitRepeat {
                id: original.id.clone(),
                init,
                max,
            });
        }
    }

    let mut template = original.clone();
    template.title = None;
    template.can_repeat = false;
    template.each = None;
    template.display_rules.clear();

    let repeat_type = if original.each.is_some() {
        RepeatType::Each
    } else {
        RepeatType::Repeat
    };

    Ok(SchemaNode {
        id: original.id.clone(),
        node_type: NodeType::Section,
        title: original.title.clone(),
        label: original.label.clone(),
        caption: original.caption.clone(),
        display_rules: original.display_rules.clone(),
        disable: original.disable,
        min_repeat: original.min_repeat,
        max_repeat: original.max_repeat,
        init_repeat: original.init_repeat,
        each: original.each.clone(),
        repeat_section: true,
        repeat_type: Some(repeat_type),
        template: Some(Box::new(template)),
        ..SchemaNode::default()
    })
}

/// Render a template using only `$ctx` references
fn resolve_context_text(source: &str, context: &Value) -> String {
    match Template::parse(source) {
        Some(template) => template.render(|reference| match reference {
            Reference::Context(path) => lookup_context(context, path).cloned(),
            Reference::Literal(value) => Some(value.clone()),
            _ => None,
        }),
        None => source.to_string(),
    }
}
