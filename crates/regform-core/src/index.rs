//! Composite-key index
//!
//! Provides [`KeyIndex`], an insertion-ordered map from composite key to node,
//! and the document operations that keep every index level in step with the
//! tree:
//! - the document-wide index (full keys)
//! - one index per page (same keys, page-scoped)
//! - one index per section (keys relative to that section)

use crate::document::Document;
use crate::error::DocumentError;
use crate::node::NodeId;
use indexmap::IndexMap;
use regform_schema::{KeyPath, Segment};

/// Whether [`Document::update_idx`] adds or removes entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexAction {
    Add,
    Remove,
}

/// Insertion-ordered composite key → node map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyIndex {
    entries: IndexMap<String, NodeId>,
}

impl KeyIndex {
    /// Create empty index
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookup node by key
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<NodeId> {
        self.entries.get(key).copied()
    }

    /// Check if key is present
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert a key
    ///
    /// # Errors
    /// Returns error if the key already names a different node
    pub fn insert(&mut self, key: String, node: NodeId) -> Result<(), DocumentError> {
        match self.entries.get(&key) {
            Some(&existing) if existing != node => Err(DocumentError::DuplicateKey { key }),
            Some(_) => Ok(()),
            None => {
                self.entries.insert(key, node);
                Ok(())
            }
        }
    }

    /// Remove a key if it still names `node`
    ///
    /// Returns whether an entry was removed.
    pub fn remove(&mut self, key: &str, node: NodeId) -> bool {
        if self.get(key) == Some(node) {
            self.entries.shift_remove(key);
            true
        } else {
            false
        }
    }

    pub(crate) fn apply(
        &mut self,
        action: IndexAction,
        key: String,
        node: NodeId,
    ) -> Result<(), DocumentError> {
        match action {
            IndexAction::Add => self.insert(key, node),
            IndexAction::Remove => {
                self.remove(&key, node);
                Ok(())
            }
        }
    }

    /// Drop every entry
    #[inline]
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Get total key count
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if index is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.entries.iter().map(|(k, &v)| (k.as_str(), v))
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Key under which `node` is indexed
    #[must_use]
    pub fn key_of(&self, node: NodeId) -> Option<&str> {
        self.entries
            .iter()
            .find(|&(_, &v)| v == node)
            .map(|(k, _)| k.as_str())
    }
}

impl Document {
    /// Position of a repeated instance within its wrapper
    #[must_use]
    pub fn instance_position(&self, id: NodeId) -> Option<usize> {
        let parent = self.node(id)?.parent?;
        let wrapper = self.node(parent)?;
        if !wrapper.is_repeat_wrapper() {
            return None;
        }
        wrapper.contents().iter().position(|&c| c == id)
    }

    /// Key segment a node contributes: `id`, or `id:position` for instances
    #[must_use]
    pub fn segment(&self, id: NodeId) -> Option<Segment> {
        let node = self.node(id)?;
        Some(match self.instance_position(id) {
            Some(position) => Segment::indexed(node.id.clone(), position),
            None => Segment::plain(node.id.clone()),
        })
    }

    /// Key of `id` relative to `owner` (`None` = page and document level)
    ///
    /// Repeat wrappers contribute no segment to their descendants' keys; their
    /// instances carry the id with a position instead.
    #[must_use]
    pub fn relative_key(&self, owner: Option<NodeId>, id: NodeId) -> Option<KeyPath> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if Some(current) == owner {
                break;
            }
            chain.push(current);
            cursor = self.node(current)?.parent;
        }
        if owner.is_some() && cursor.is_none() {
            return None;
        }

        let mut key = KeyPath::root();
        for &node in chain.iter().rev() {
            if node != id && self.node(node)?.is_repeat_wrapper() {
                continue;
            }
            key.push(self.segment(node)?);
        }
        Some(key)
    }

    /// Document-wide key of a node
    #[must_use]
    pub fn key_of(&self, id: NodeId) -> Option<String> {
        self.relative_key(None, id).map(|k| k.to_string())
    }

    /// Lookup node by document-wide key
    #[inline]
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<NodeId> {
        self.index.get(key)
    }

    /// Document-wide index
    #[inline]
    #[must_use]
    pub fn index(&self) -> &KeyIndex {
        &self.index
    }

    /// Add or remove the keys of `id` and its whole subtree at every level
    /// that owns an index
    ///
    /// Keys are computed from the current ancestor chain. Children are
    /// processed before their parent. `refresh` bumps the revision.
    ///
    /// # Errors
    /// Returns error if a handle is stale or an added key is taken
    pub fn update_idx(
        &mut self,
        id: NodeId,
        action: IndexAction,
        refresh: bool,
    ) -> Result<(), DocumentError> {
        let children = self.get(id)?.contents().to_vec();
        for child in children {
            self.update_idx(child, action, false)?;
        }

        let (page, mut cursor) = {
            let node = self.get(id)?;
            (node.page, node.parent)
        };

        while let Some(owner) = cursor {
            let key = self
                .relative_key(Some(owner), id)
                .ok_or(DocumentError::UnknownNode(id))?
                .to_string();
            let owner_node = self.get_mut(owner)?;
            cursor = owner_node.parent;
            if let Some(section) = owner_node.as_section_mut() {
                section.index.apply(action, key, id)?;
            }
        }

        let key = self
            .relative_key(None, id)
            .ok_or(DocumentError::UnknownNode(id))?
            .to_string();
        if let Some(page) = self.pages.get_mut(page) {
            page.index.apply(action, key.clone(), id)?;
        }
        self.index.apply(action, key, id)?;

        if refresh {
            self.bump();
        }
        Ok(())
    }

    /// Rebuild every index level from the tree
    ///
    /// # Errors
    /// Returns error if two nodes compute the same key
    pub fn rebuild_index(&mut self) -> Result<(), DocumentError> {
        self.index.clear();
        for page in &mut self.pages {
            page.index.clear();
        }
        for node in self.nodes.iter_mut().flatten() {
            if let Some(section) = node.as_section_mut() {
                section.index.clear();
            }
        }

        let roots: Vec<NodeId> = self
            .pages
            .iter()
            .flat_map(|p| p.contents.iter().copied())
            .collect();
        for root in roots {
            self.update_idx(root, IndexAction::Add, false)?;
        }

        tracing::debug!(keys = self.index.len(), "key index rebuilt");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Uid;

    fn node(n: usize) -> NodeId {
        NodeId::new(n, Uid(n as u64))
    }

    #[test]
    fn insert_and_lookup() {
        let mut index = KeyIndex::new();
        index.insert("a.b".into(), node(1)).unwrap();
        assert_eq!(index.get("a.b"), Some(node(1)));
        assert!(index.contains("a.b"));
        assert_eq!(index.key_of(node(1)), Some("a.b"));
    }

    #[test]
    fn insert_rejects_key_taken_by_other_node() {
        let mut index = KeyIndex::new();
        index.insert("q".into(), node(1)).unwrap();
        assert!(index.insert("q".into(), node(1)).is_ok());
        assert!(matches!(
            index.insert("q".into(), node(2)),
            Err(DocumentError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn remove_only_matching_node() {
        let mut index = KeyIndex::new();
        index.insert("q".into(), node(1)).unwrap();
        assert!(!index.remove("q", node(2)));
        assert!(index.remove("q", node(1)));
        assert!(index.is_empty());
    }

    #[test]
    fn remove_keeps_insertion_order() {
        let mut index = KeyIndex::new();
        for (i, key) in ["a", "b", "c"].iter().enumerate() {
            index.insert((*key).to_string(), node(i)).unwrap();
        }
        index.remove("b", node(1));
        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["a", "c"]);
    }
}
