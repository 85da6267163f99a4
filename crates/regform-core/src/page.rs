//! Pages: top-level groupings of the document

use crate::index::KeyIndex;
use crate::node::NodeId;

/// One page of the document
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub(crate) id: String,
    pub(crate) title: Option<String>,
    pub(crate) contents: Vec<NodeId>,
    pub(crate) index: KeyIndex,
}

impl Page {
    pub(crate) fn new(id: impl Into<String>, title: Option<String>) -> Self {
        Self {
            id: id.into(),
            title,
            contents: Vec::new(),
            index: KeyIndex::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Title with `$ctx` templates already rendered
    #[inline]
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Top-level nodes
    #[inline]
    #[must_use]
    pub fn contents(&self) -> &[NodeId] {
        &self.contents
    }

    /// Keys of every node on this page
    #[inline]
    #[must_use]
    pub fn index(&self) -> &KeyIndex {
        &self.index
    }
}
