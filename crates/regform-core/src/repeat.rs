//! Repetition engine
//!
//! `repeat` wrappers grow and shrink on request within their bounds. `each`
//! wrappers mirror the contents of a source node: one instance per source
//! item, reused while the source item lives.

use crate::document::Document;
use crate::error::DocumentError;
use crate::index::IndexAction;
use crate::node::{NodeId, Uid};
use crate::section::{RepeatMode, Section};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Upper bound on projection rounds per synchronisation
const MAX_EACH_ROUNDS: usize = 16;

impl Document {
    /// The wrapper `id` belongs to: itself when a wrapper, else its parent
    /// when that is a wrapper
    #[must_use]
    pub fn wrapper_of(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id)?;
        if node.is_repeat_wrapper() {
            return Some(id);
        }
        let parent = node.parent?;
        self.node(parent)?.is_repeat_wrapper().then_some(parent)
    }

    /// Number of instances in a wrapper
    #[must_use]
    pub fn instance_count(&self, wrapper: NodeId) -> Option<usize> {
        let section = self.node(wrapper)?.as_section()?;
        section.is_repeat_wrapper().then(|| section.len())
    }

    fn fixed_bounds(&self, wrapper: NodeId) -> Option<(usize, Option<usize>)> {
        self.node(wrapper)?
            .as_section()
            .and_then(Section::repeat)
            .and_then(|spec| spec.bounds())
    }

    /// Effective instance cap: the declared maximum, else the configured one
    pub(crate) fn instance_limit(&self, max: Option<usize>) -> usize {
        max.unwrap_or(self.config.max_instances)
    }

    fn repeat_enabled(&self, wrapper: NodeId) -> bool {
        !self.config.disable_all && self.node(wrapper).is_some_and(|n| !n.is_disabled())
    }

    /// Whether the host may offer "add" on a wrapper (or one of its instances)
    #[must_use]
    pub fn can_add(&self, id: NodeId) -> bool {
        let Some(wrapper) = self.wrapper_of(id) else {
            return false;
        };
        let Some((_, max)) = self.fixed_bounds(wrapper) else {
            return false;
        };
        let count = self.instance_count(wrapper).unwrap_or_default();
        self.repeat_enabled(wrapper) && count < self.instance_limit(max)
    }

    /// Whether the host may offer "remove" on a wrapper (or one of its instances)
    #[must_use]
    pub fn can_remove(&self, id: NodeId) -> bool {
        let Some(wrapper) = self.wrapper_of(id) else {
            return false;
        };
        let Some((min, _)) = self.fixed_bounds(wrapper) else {
            return false;
        };
        let count = self.instance_count(wrapper).unwrap_or_default();
        self.repeat_enabled(wrapper) && count > min
    }

    /// Append an instance to a `repeat` wrapper
    ///
    /// `data` pre-fills the instance; its keys are relative to the instance.
    /// With `update`, `each` projections are re-synchronised and the revision
    /// bumped.
    ///
    /// # Errors
    /// Returns error if `wrapper` is not a `repeat` wrapper or is full (at
    /// `maxRepeat`, or at `EngineConfig::max_instances` when undeclared)
    pub fn add_repeat(
        &mut self,
        wrapper: NodeId,
        data: Option<&Map<String, Value>>,
        update: bool,
    ) -> Result<NodeId, DocumentError> {
        let (template, page, count, min, max) = {
            let node = self.get(wrapper)?;
            let spec = node
                .as_section()
                .and_then(Section::repeat)
                .ok_or_else(|| DocumentError::NotRepeatable { id: node.id.clone() })?;
            let Some((min, max)) = spec.bounds() else {
                return Err(DocumentError::NotRepeatable { id: node.id.clone() });
            };
            (spec.template().clone(), node.page, node.contents().len(), min, max)
        };

        let limit = self.instance_limit(max);
        if count >= limit {
            return Err(DocumentError::RepeatBounds {
                id: self.get(wrapper)?.id.clone(),
                count,
                min,
                max: Some(limit),
            });
        }

        let instance = self.build_node(&template, Some(wrapper), page)?;
        self.push_child(wrapper, instance)?;
        self.update_idx(instance, IndexAction::Add, false)?;

        if let Some(data) = data {
            for (key, value) in data {
                let target = self
                    .get(instance)?
                    .as_section()
                    .and_then(|s| s.index().get(key));
                match target {
                    Some(target) => {
                        if !self.unserialize_node(target, value.clone())? {
                            tracing::warn!(key = %key, "pre-fill value does not fit its item");
                        }
                    }
                    None => tracing::warn!(key = %key, "pre-fill key not found in new instance"),
                }
            }
        }

        tracing::debug!(wrapper = %wrapper, instance = %instance, count = count + 1, "repeat added");
        if update {
            self.sync_each()?;
            self.bump();
        }
        Ok(instance)
    }

    /// Remove an instance from its `repeat` wrapper
    ///
    /// Later instances shift down one position; their keys are re-derived and
    /// their values stay with them.
    ///
    /// # Errors
    /// Returns error if `instance` is not in a `repeat` wrapper or removal
    /// would go below the minimum
    pub fn remove_repeat(&mut self, instance: NodeId) -> Result<(), DocumentError> {
        let wrapper = self
            .get(instance)?
            .parent
            .filter(|&p| self.node(p).is_some_and(|n| n.is_repeat_wrapper()))
            .ok_or_else(|| DocumentError::NotRepeatable {
                id: self.node(instance).map(|n| n.id.clone()).unwrap_or_default(),
            })?;

        let (name, siblings, min, max) = {
            let node = self.get(wrapper)?;
            let bounds = node.as_section().and_then(Section::repeat).and_then(|s| s.bounds());
            let Some((min, max)) = bounds else {
                return Err(DocumentError::NotRepeatable { id: node.id.clone() });
            };
            (node.id.clone(), node.contents().to_vec(), min, max)
        };

        if siblings.len() <= min {
            return Err(DocumentError::RepeatBounds {
                id: name,
                count: siblings.len(),
                min,
                max,
            });
        }

        for &sibling in &siblings {
            self.update_idx(sibling, IndexAction::Remove, false)?;
        }
        if let Some(section) = self.get_mut(wrapper)?.as_section_mut() {
            section.contents.retain(|&c| c != instance);
        }
        self.free_subtree(instance);
        for &sibling in siblings.iter().filter(|&&s| s != instance) {
            self.update_idx(sibling, IndexAction::Add, false)?;
        }

        tracing::debug!(wrapper = %wrapper, count = siblings.len() - 1, "repeat removed");
        self.sync_each()?;
        self.bump();
        Ok(())
    }

    /// Bring every `each` wrapper in line with its source
    ///
    /// Repeats until no wrapper changes, since one projection can be the
    /// source of another. Returns whether anything changed.
    ///
    /// # Errors
    /// Returns error if re-indexing a projection collides with another key
    pub(crate) fn sync_each(&mut self) -> Result<bool, DocumentError> {
        let mut changed_any = false;
        for round in 0..MAX_EACH_ROUNDS {
            let wrappers: Vec<NodeId> = self
                .nodes()
                .filter(|(_, n)| {
                    n.as_section()
                        .and_then(Section::repeat)
                        .is_some_and(|s| matches!(s.mode(), RepeatMode::Each { .. }))
                })
                .map(|(id, _)| id)
                .collect();

            let mut changed = false;
            for wrapper in wrappers {
                changed |= self.sync_each_wrapper(wrapper)?;
            }
            if !changed {
                return Ok(changed_any);
            }
            changed_any = true;
            tracing::debug!(round, "each projections changed");
        }
        tracing::warn!(rounds = MAX_EACH_ROUNDS, "each projections did not settle");
        Ok(changed_any)
    }

    fn sync_each_wrapper(&mut self, wrapper: NodeId) -> Result<bool, DocumentError> {
        // An earlier wrapper in this round may have dropped this one
        let Some(node) = self.node(wrapper) else {
            return Ok(false);
        };
        let Some((source, cache, template)) = node
            .as_section()
            .and_then(Section::repeat)
            .and_then(|spec| match spec.mode() {
                RepeatMode::Each { source, cache } => {
                    Some((source.clone(), cache.clone(), spec.template().clone()))
                }
                RepeatMode::Fixed { .. } => None,
            })
        else {
            return Ok(false);
        };
        let page = node.page;
        let old_contents = node.contents().to_vec();

        let sources: Vec<NodeId> = self
            .resolve_node(wrapper, &source)
            .and_then(|src| self.node(src))
            .map(|n| n.contents().to_vec())
            .unwrap_or_default();

        let mut contents = Vec::with_capacity(sources.len());
        let mut next_cache: HashMap<Uid, NodeId> = HashMap::with_capacity(sources.len());
        for src in sources {
            let uid = self.get(src)?.uid;
            let instance = match cache.get(&uid) {
                Some(&cached) if self.node(cached).is_some() => cached,
                _ => {
                    let built = self.build_node(&template, Some(wrapper), page)?;
                    self.get_mut(built)?.each_source = Some(src);
                    built
                }
            };
            next_cache.insert(uid, instance);
            contents.push(instance);
        }

        if contents == old_contents {
            return Ok(false);
        }

        for &old in &old_contents {
            self.update_idx(old, IndexAction::Remove, false)?;
        }
        for &old in &old_contents {
            if !contents.contains(&old) {
                self.free_subtree(old);
            }
        }
        if let Some(section) = self.get_mut(wrapper)?.as_section_mut() {
            section.contents.clone_from(&contents);
            if let Some(spec) = section.repeat.as_mut() {
                if let RepeatMode::Each { cache, .. } = &mut spec.mode {
                    *cache = next_cache;
                }
            }
        }
        for &instance in &contents {
            self.update_idx(instance, IndexAction::Add, false)?;
        }

        tracing::debug!(
            wrapper = %wrapper,
            before = old_contents.len(),
            after = contents.len(),
            "each projection synced"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::document::Document;
    use crate::error::DocumentError;
    use regform_schema::{Schema, SchemaNode, SchemaPage};
    use serde_json::json;

    fn authors(min: usize, max: Option<usize>) -> Document {
        let node = SchemaNode::section("authors")
            .with_contents(vec![SchemaNode::item("name")])
            .repeatable(min, max);
        Document::new(Schema::new(vec![SchemaPage::new("p", vec![node])])).unwrap()
    }

    #[test]
    fn add_respects_max() {
        let mut doc = authors(1, Some(2));
        let wrapper = doc.lookup("authors").unwrap();
        assert!(doc.can_add(wrapper));
        doc.add_repeat(wrapper, None, true).unwrap();
        assert!(!doc.can_add(wrapper));
        assert!(matches!(
            doc.add_repeat(wrapper, None, true),
            Err(DocumentError::RepeatBounds { count: 2, .. })
        ));
    }

    #[test]
    fn unbounded_repeat_stops_at_configured_cap() {
        let node = SchemaNode::section("authors")
            .with_contents(vec![SchemaNode::item("name")])
            .repeatable(1, None);
        let mut doc = Document::builder(Schema::new(vec![SchemaPage::new("p", vec![node])]))
            .config(crate::config::EngineConfig::new().with_max_instances(2))
            .build()
            .unwrap();
        let wrapper = doc.lookup("authors").unwrap();
        doc.add_repeat(wrapper, None, true).unwrap();
        assert!(!doc.can_add(wrapper));
        assert!(matches!(
            doc.add_repeat(wrapper, None, true),
            Err(DocumentError::RepeatBounds { count: 2, max: Some(2), .. })
        ));
    }

    #[test]
    fn remove_respects_min() {
        let mut doc = authors(1, None);
        let first = doc.lookup("authors:0").unwrap();
        assert!(!doc.can_remove(first));
        assert!(matches!(
            doc.remove_repeat(first),
            Err(DocumentError::RepeatBounds { .. })
        ));
    }

    #[test]
    fn add_pre_fills_relative_keys() {
        let mut doc = authors(1, None);
        let wrapper = doc.lookup("authors").unwrap();
        let data = json!({"name": "Grace"});
        doc.add_repeat(wrapper, data.as_object(), true).unwrap();
        let name = doc.lookup("authors:1.name").unwrap();
        assert_eq!(doc.value(name), Some(json!("Grace")));
    }

    #[test]
    fn disable_all_blocks_affordances() {
        let node = SchemaNode::section("authors")
            .with_contents(vec![SchemaNode::item("name")])
            .repeatable(0, None);
        let doc = Document::builder(Schema::new(vec![SchemaPage::new("p", vec![node])]))
            .config(crate::config::EngineConfig::new().with_disable_all(true))
            .build()
            .unwrap();
        let wrapper = doc.lookup("authors").unwrap();
        assert!(!doc.can_add(wrapper));
        assert!(!doc.can_remove(wrapper));
    }

    #[test]
    fn plain_nodes_are_not_repeatable() {
        let mut doc = Document::new(Schema::new(vec![SchemaPage::new(
            "p",
            vec![SchemaNode::item("q")],
        )]))
        .unwrap();
        let q = doc.lookup("q").unwrap();
        assert!(!doc.can_add(q));
        assert!(!doc.can_remove(q));
        assert!(matches!(
            doc.add_repeat(q, None, true),
            Err(DocumentError::NotRepeatable { .. })
        ));
    }
}
