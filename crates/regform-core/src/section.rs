//! Section nodes and repeat wrappers

use crate::index::KeyIndex;
use crate::node::{NodeId, Uid};
use regform_schema::{Reference, RepeatType, SchemaNode};
use std::collections::HashMap;

/// How a repeat wrapper derives its instances
#[derive(Debug, Clone)]
pub enum RepeatMode {
    /// User-driven add/remove
    Fixed {
        min: usize,
        max: Option<usize>,
        init: usize,
    },
    /// One instance per item of the referenced node's contents
    Each {
        source: Reference,
        /// Instance built for each source item, keyed by source identity
        cache: HashMap<Uid, NodeId>,
    },
}

/// Repeat wrapper state
#[derive(Debug, Clone)]
pub struct RepeatSpec {
    pub(crate) mode: RepeatMode,
    pub(crate) template: Box<SchemaNode>,
}

impl RepeatSpec {
    pub(crate) fn from_schema(schema: &SchemaNode) -> Option<Self> {
        if !schema.repeat_section {
            return None;
        }
        let template = schema.template.clone()?;
        let mode = match (schema.repeat_type, schema.each.as_deref()) {
            (Some(RepeatType::Each), Some(source)) => RepeatMode::Each {
                source: Reference::parse(source),
                cache: HashMap::new(),
            },
            _ => {
                let init = schema.init_repeat.unwrap_or(1).max(schema.min_repeat);
                RepeatMode::Fixed {
                    min: schema.min_repeat,
                    max: schema.max_repeat,
                    init: schema.max_repeat.map_or(init, |max| init.min(max)),
                }
            }
        };
        Some(Self { mode, template })
    }

    #[inline]
    #[must_use]
    pub fn mode(&self) -> &RepeatMode {
        &self.mode
    }

    /// Schema every instance is cloned from
    #[inline]
    #[must_use]
    pub fn template(&self) -> &SchemaNode {
        &self.template
    }

    /// Repeat type as declared
    #[inline]
    #[must_use]
    pub fn repeat_type(&self) -> RepeatType {
        match self.mode {
            RepeatMode::Fixed { .. } => RepeatType::Repeat,
            RepeatMode::Each { .. } => RepeatType::Each,
        }
    }

    /// `(min, max)` for user-driven repeats
    #[inline]
    #[must_use]
    pub fn bounds(&self) -> Option<(usize, Option<usize>)> {
        match self.mode {
            RepeatMode::Fixed { min, max, .. } => Some((min, max)),
            RepeatMode::Each { .. } => None,
        }
    }
}

/// Section payload: ordered children plus a local key index
#[derive(Debug, Clone, Default)]
pub struct Section {
    pub(crate) contents: Vec<NodeId>,
    pub(crate) index: KeyIndex,
    pub(crate) repeat: Option<RepeatSpec>,
}

impl Section {
    /// Plain (non-repeating) section
    #[inline]
    #[must_use]
    pub fn plain() -> Self {
        Self::default()
    }

    pub(crate) fn from_schema(schema: &SchemaNode) -> Self {
        Self {
            contents: Vec::new(),
            index: KeyIndex::new(),
            repeat: RepeatSpec::from_schema(schema),
        }
    }

    #[inline]
    #[must_use]
    pub fn contents(&self) -> &[NodeId] {
        &self.contents
    }

    /// Keys of descendants relative to this section
    #[inline]
    #[must_use]
    pub fn index(&self) -> &KeyIndex {
        &self.index
    }

    #[inline]
    #[must_use]
    pub fn repeat(&self) -> Option<&RepeatSpec> {
        self.repeat.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn is_repeat_wrapper(&self) -> bool {
        self.repeat.is_some()
    }

    /// Number of children (instances, for a wrapper)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.contents.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrapper(node: SchemaNode, repeat_type: RepeatType) -> SchemaNode {
        SchemaNode {
            repeat_section: true,
            repeat_type: Some(repeat_type),
            template: Some(Box::new(SchemaNode::section(node.id.clone()))),
            ..node
        }
    }

    #[test]
    fn plain_section_has_no_repeat() {
        let section = Section::from_schema(&SchemaNode::section("s"));
        assert!(!section.is_repeat_wrapper());
        assert!(section.is_empty());
    }

    #[test]
    fn fixed_repeat_raises_init_to_min() {
        let mut node = SchemaNode::section("s");
        node.min_repeat = 2;
        node.max_repeat = Some(4);
        let spec = RepeatSpec::from_schema(&wrapper(node, RepeatType::Repeat)).unwrap();
        match spec.mode() {
            RepeatMode::Fixed { min, max, init } => {
                assert_eq!((*min, *max, *init), (2, Some(4), 2));
            }
            RepeatMode::Each { .. } => panic!("expected fixed mode"),
        }
        assert_eq!(spec.repeat_type(), RepeatType::Repeat);
    }

    #[test]
    fn default_init_never_exceeds_max() {
        let mut node = SchemaNode::section("s");
        node.min_repeat = 0;
        node.max_repeat = Some(0);
        let spec = RepeatSpec::from_schema(&wrapper(node, RepeatType::Repeat)).unwrap();
        assert!(matches!(spec.mode(), RepeatMode::Fixed { init: 0, .. }));
    }

    #[test]
    fn each_repeat_parses_source() {
        let node = SchemaNode::section("s").each_of("$parent.arms");
        let spec = RepeatSpec::from_schema(&wrapper(node, RepeatType::Each)).unwrap();
        assert!(spec.bounds().is_none());
        assert!(matches!(
            spec.mode(),
            RepeatMode::Each { source: Reference::Relative { ups: 1, .. }, .. }
        ));
    }
}
