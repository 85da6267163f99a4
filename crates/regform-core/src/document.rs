//! Document view-model
//!
//! The [`Document`] owns the node arena, the pages, every key index, the
//! page cursor, the file listing cache and the embargo sub-model. Reads
//! (values, visibility, options, rendered text) are computed on demand;
//! every mutation bumps [`Document::revision`].

use crate::config::EngineConfig;
use crate::embargo::{is_reserved_key, Embargo, RegistrationChoice};
use crate::error::DocumentError;
use crate::files::FileCache;
use crate::index::KeyIndex;
use crate::item::Item;
use crate::node::{ContentNode, NodeId, NodeKind};
use crate::page::Page;
use crate::section::{RepeatMode, Section};
use crate::tree::DocumentBuilder;
use chrono::NaiveDate;
use indexmap::IndexMap;
use regform_schema::{KeyPath, Schema};
use serde::Serialize;
use serde_json::{Map, Value};

/// Output of [`Document::serialize`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Serialized {
    /// Answers in key-index order, plus the embargo keys
    pub data: IndexMap<String, Value>,
    /// No displayed required item is empty
    pub complete: bool,
}

/// Outcome of [`Document::unserialize`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnserializeReport {
    /// Keys whose value was stored
    pub applied: Vec<String>,
    /// Keys whose value or position did not fit the schema
    pub rejected: Vec<String>,
    /// Passes taken
    pub passes: usize,
}

enum Locate {
    Found(NodeId),
    Pending,
    Rejected(String),
}

enum Growth {
    Ready,
    Pending,
    Rejected(String),
}

/// Live registration document
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) config: EngineConfig,
    pub(crate) context: Value,
    pub(crate) nodes: Vec<Option<ContentNode>>,
    pub(crate) free_slots: Vec<usize>,
    pub(crate) next_uid: u64,
    pub(crate) pages: Vec<Page>,
    pub(crate) index: KeyIndex,
    pub(crate) current_index: isize,
    pub(crate) files: FileCache,
    pub(crate) known_containers: Vec<String>,
    pub(crate) embargo: Embargo,
    pub(crate) revision: u64,
}

impl Document {
    /// Start building a document from a schema
    #[inline]
    #[must_use]
    pub fn builder(schema: Schema) -> DocumentBuilder {
        DocumentBuilder::new(schema)
    }

    /// Build with default configuration and an empty context
    ///
    /// # Errors
    /// Returns error if the schema is malformed
    pub fn new(schema: Schema) -> Result<Self, DocumentError> {
        Self::builder(schema).build()
    }

    pub(crate) fn empty(config: EngineConfig, context: Value, containers: Vec<String>) -> Self {
        Self {
            config,
            context,
            nodes: Vec::new(),
            free_slots: Vec::new(),
            next_uid: 0,
            pages: Vec::new(),
            index: KeyIndex::new(),
            current_index: 0,
            files: FileCache::new(),
            known_containers: containers,
            embargo: Embargo::new(),
            revision: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Page context (`$ctx`)
    #[inline]
    #[must_use]
    pub fn context(&self) -> &Value {
        &self.context
    }

    #[inline]
    #[must_use]
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    #[inline]
    #[must_use]
    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    /// Live node behind a handle
    #[inline]
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&ContentNode> {
        self.nodes
            .get(id.slot)
            .and_then(Option::as_ref)
            .filter(|n| n.uid == id.uid)
    }

    /// Every live node with its handle
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &ContentNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (NodeId::new(i, n.uid), n)))
    }

    /// Number of live nodes
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    /// Change counter; increases on every mutation
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    pub(crate) fn bump(&mut self) {
        self.revision += 1;
    }

    pub(crate) fn get(&self, id: NodeId) -> Result<&ContentNode, DocumentError> {
        self.node(id).ok_or(DocumentError::UnknownNode(id))
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Result<&mut ContentNode, DocumentError> {
        self.nodes
            .get_mut(id.slot)
            .and_then(Option::as_mut)
            .filter(|n| n.uid == id.uid)
            .ok_or(DocumentError::UnknownNode(id))
    }

    // Navigation

    /// Cursor position; may lie outside the page range
    #[inline]
    #[must_use]
    pub fn current_index(&self) -> isize {
        self.current_index
    }

    /// Page under the cursor
    #[must_use]
    pub fn current_page(&self) -> Option<&Page> {
        usize::try_from(self.current_index)
            .ok()
            .and_then(|i| self.pages.get(i))
    }

    /// Move the cursor forward (unclamped)
    pub fn next(&mut self) {
        self.current_index += 1;
        self.bump();
    }

    /// Move the cursor back (unclamped)
    pub fn previous(&mut self) {
        self.current_index -= 1;
        self.bump();
    }

    /// Move the cursor to a page
    pub fn go_to(&mut self, index: isize) {
        self.current_index = index;
        self.bump();
    }

    #[inline]
    #[must_use]
    pub fn is_first(&self) -> bool {
        self.current_index <= 0
    }

    #[inline]
    #[must_use]
    pub fn is_last(&self) -> bool {
        let last = isize::try_from(self.pages.len()).unwrap_or(isize::MAX) - 1;
        self.current_index >= last
    }

    // Answers

    /// Store an answer on an item or file item
    ///
    /// File items take `[containerId, path]`.
    ///
    /// # Errors
    /// Returns error if `id` is a section or the value does not fit
    pub fn set_value(&mut self, id: NodeId, value: Value) -> Result<(), DocumentError> {
        let (name, outcome) = {
            let node = self.get_mut(id)?;
            let name = node.id.clone();
            let outcome = match &mut node.kind {
                NodeKind::Item(item) => item.set(value).map(|()| None),
                NodeKind::File(file) => file.unserialize(value).map(Some),
                NodeKind::Section(_) => return Err(DocumentError::NotAnItem { id: name }),
            };
            (name, outcome)
        };

        match outcome {
            Ok(container) => {
                if let Some(container) = container {
                    self.remember_container(&container);
                }
                self.bump();
                Ok(())
            }
            Err(reason) => Err(DocumentError::InvalidValue { id: name, reason }),
        }
    }

    /// Store an answer by document-wide key
    ///
    /// # Errors
    /// Returns error if the key is unknown or the value does not fit
    pub fn set_answer(&mut self, key: &str, value: Value) -> Result<(), DocumentError> {
        let id = self
            .lookup(key)
            .ok_or_else(|| DocumentError::NotAnItem { id: key.to_string() })?;
        self.set_value(id, value)
    }

    /// Restore a persisted answer on one node; reports whether it was accepted
    pub(crate) fn unserialize_node(&mut self, id: NodeId, value: Value) -> Result<bool, DocumentError> {
        let container = match &mut self.get_mut(id)?.kind {
            NodeKind::Item(item) => return Ok(item.unserialize(value)),
            NodeKind::File(file) => match file.unserialize(value) {
                Ok(container) => container,
                Err(_) => return Ok(false),
            },
            NodeKind::Section(_) => return Ok(false),
        };
        self.remember_container(&container);
        Ok(true)
    }

    /// Persisted form of one node; `None` for sections
    #[must_use]
    pub fn serialize_node(&self, id: NodeId) -> Option<Value> {
        match &self.node(id)?.kind {
            NodeKind::Section(_) => None,
            NodeKind::File(file) => Some(file.serialize()),
            NodeKind::Item(_) => self.value(id),
        }
    }

    /// Whether a node is a displayed, required, empty answer
    #[must_use]
    pub fn is_missing(&self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        let empty = match &node.kind {
            NodeKind::Section(_) => return false,
            NodeKind::File(file) => file.item().is_required() && file.is_empty(),
            NodeKind::Item(item) => {
                item.is_required()
                    && self
                        .value(id)
                        .map_or(true, |v| crate::item::is_empty_value(&v))
            }
        };
        empty && self.is_displayed(id)
    }

    /// Keys of every displayed required item that is still empty
    #[must_use]
    pub fn missing(&self) -> Vec<String> {
        self.index
            .iter()
            .filter(|(_, id)| self.is_missing(*id))
            .map(|(key, _)| key.to_string())
            .collect()
    }

    /// Missing, or failing a rule under strict validation
    fn blocks_completion(&self, id: NodeId) -> bool {
        self.is_missing(id)
            || (self.config.strict_validation && self.is_displayed(id) && !self.is_valid(id))
    }

    /// Whether a page has no displayed required empty item
    ///
    /// Under strict validation a displayed item failing a rule also counts.
    #[must_use]
    pub fn is_page_complete(&self, page: usize) -> bool {
        self.pages
            .get(page)
            .is_some_and(|p| p.index.iter().all(|(_, id)| !self.blocks_completion(id)))
    }

    /// Answers in key-index order plus the completeness flag
    ///
    /// The first displayed, required, empty item clears `complete` and moves
    /// the cursor to its page.
    pub fn serialize(&mut self) -> Serialized {
        let mut data = IndexMap::with_capacity(self.index.len() + 2);
        let mut first_missing = None;

        for (key, id) in self.index.iter() {
            let Some(value) = self.serialize_node(id) else {
                continue;
            };
            if first_missing.is_none() && self.blocks_completion(id) {
                first_missing = self.node(id).map(ContentNode::page);
            }
            data.insert(key.to_string(), value);
        }

        for (key, value) in self.embargo.serialize() {
            data.insert(key.to_string(), value);
        }

        if let Some(page) = first_missing {
            self.current_index = isize::try_from(page).unwrap_or(isize::MAX);
            self.bump();
        }

        Serialized {
            data,
            complete: first_missing.is_none(),
        }
    }

    /// Restore a flat answer map
    ///
    /// Repeat wrappers grow on demand to fit indexed keys. Keys that cannot be
    /// placed yet are retried after `each` projections are re-synchronised.
    ///
    /// # Errors
    /// Returns error if a pass makes no progress or the pass limit is reached
    pub fn unserialize(&mut self, data: &Map<String, Value>) -> Result<UnserializeReport, DocumentError> {
        let mut report = UnserializeReport::default();
        let mut pending: Vec<(&String, &Value)> = Vec::new();

        for (key, value) in data {
            if !is_reserved_key(key) {
                pending.push((key, value));
                continue;
            }
            match self.embargo.unserialize(key, value) {
                Ok(()) => report.applied.push(key.clone()),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "rejected embargo answer");
                    report.rejected.push(key.clone());
                }
            }
        }

        while !pending.is_empty() {
            if report.passes >= self.config.max_unserialize_passes {
                return Err(DocumentError::UnserializeStalled {
                    passes: report.passes,
                    unresolved: pending.iter().map(|(k, _)| (*k).clone()).collect(),
                });
            }
            report.passes += 1;

            let before = pending.len();
            let mut deferred = Vec::new();
            for (key, value) in pending {
                match self.locate(key)? {
                    Locate::Found(id) => {
                        if self.unserialize_node(id, value.clone())? {
                            report.applied.push(key.clone());
                        } else {
                            tracing::warn!(key = %key, "answer does not fit its item");
                            report.rejected.push(key.clone());
                        }
                    }
                    Locate::Rejected(reason) => {
                        tracing::warn!(key = %key, reason = %reason, "answer rejected");
                        report.rejected.push(key.clone());
                    }
                    Locate::Pending => deferred.push((key, value)),
                }
            }

            let projected = self.sync_each()?;
            tracing::debug!(
                pass = report.passes,
                resolved = before - deferred.len(),
                deferred = deferred.len(),
                "unserialize pass"
            );

            if deferred.len() == before && !projected {
                return Err(DocumentError::UnserializeStalled {
                    passes: report.passes,
                    unresolved: deferred.iter().map(|(k, _)| (*k).clone()).collect(),
                });
            }
            pending = deferred;
        }

        self.bump();
        Ok(report)
    }

    /// Find the node for a key, growing repeat wrappers along the way
    fn locate(&mut self, key: &str) -> Result<Locate, DocumentError> {
        let path: KeyPath = match key.parse() {
            Ok(path) => path,
            Err(e) => return Ok(Locate::Rejected(format!("{e}"))),
        };
        if path.is_empty() {
            return Ok(Locate::Rejected("empty key".to_string()));
        }

        let mut prefix = KeyPath::root();
        for segment in path.iter() {
            if let Some(index) = segment.index() {
                let Some(target) = index.checked_add(1) else {
                    return Ok(Locate::Rejected(format!("repeat index {index} out of range")));
                };
                let wrapper_key = prefix.child(segment.unindexed()).to_string();
                let Some(wrapper) = self.index.get(&wrapper_key) else {
                    return Ok(Locate::Pending);
                };
                match self.grow(wrapper, target)? {
                    Growth::Ready => {}
                    Growth::Pending => return Ok(Locate::Pending),
                    Growth::Rejected(reason) => return Ok(Locate::Rejected(reason)),
                }
            }
            prefix.push(segment.clone());
            if !self.index.contains(&prefix.to_string()) {
                return Ok(Locate::Pending);
            }
        }

        Ok(self
            .index
            .get(&path.to_string())
            .map_or(Locate::Pending, Locate::Found))
    }

    /// Make sure a wrapper holds at least `target` instances
    ///
    /// Targets past the wrapper's instance cap are rejected before anything
    /// is built.
    fn grow(&mut self, wrapper: NodeId, target: usize) -> Result<Growth, DocumentError> {
        let (name, count, mode) = {
            let node = self.get(wrapper)?;
            let Some(spec) = node.as_section().and_then(Section::repeat) else {
                return Ok(Growth::Rejected(format!("'{}' is not repeatable", node.id)));
            };
            let mode = match spec.mode() {
                RepeatMode::Fixed { max, .. } => Some(*max),
                RepeatMode::Each { .. } => None,
            };
            (node.id.clone(), node.contents().len(), mode)
        };

        match mode {
            None if count >= target => Ok(Growth::Ready),
            None => Ok(Growth::Pending),
            Some(max) if target > self.instance_limit(max) => Ok(Growth::Rejected(format!(
                "'{name}' allows at most {} instances",
                self.instance_limit(max)
            ))),
            Some(_) => {
                for _ in count..target {
                    self.add_repeat(wrapper, None, false)?;
                }
                Ok(Growth::Ready)
            }
        }
    }

    // Validation

    /// First failing rule message of an item, or empty
    #[must_use]
    pub fn validation_message(&self, id: NodeId) -> String {
        self.checked_item(id)
            .map(|(item, value)| item.validate_text(&value))
            .unwrap_or_default()
    }

    /// Item behind `id` with the value its rules are checked against
    fn checked_item(&self, id: NodeId) -> Option<(&Item, Value)> {
        let node = self.node(id)?;
        let value = match &node.kind {
            NodeKind::Section(_) => return None,
            NodeKind::File(file) => Value::String(file.path().to_string()),
            NodeKind::Item(_) => self.value(id).unwrap_or(Value::Null),
        };
        Some((node.as_item()?, value))
    }

    /// Validity of an item, or of every item under a section
    ///
    /// Rules are advisory unless `strict_validation` is configured.
    #[must_use]
    pub fn is_valid(&self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        match &node.kind {
            NodeKind::Section(section) => section.contents().iter().all(|&c| self.is_valid(c)),
            NodeKind::File(_) | NodeKind::Item(_) => self
                .checked_item(id)
                .is_some_and(|(item, value)| item.is_valid(&value, self.config.strict_validation)),
        }
    }

    /// Messages of every displayed item failing a rule, by key
    #[must_use]
    pub fn validation_messages(&self) -> IndexMap<String, String> {
        self.index
            .iter()
            .filter(|(_, id)| self.is_displayed(*id))
            .filter_map(|(key, id)| {
                let message = self.validation_message(id);
                (!message.is_empty()).then(|| (key.to_string(), message))
            })
            .collect()
    }

    // Embargo

    #[inline]
    #[must_use]
    pub fn embargo(&self) -> &Embargo {
        &self.embargo
    }

    pub fn set_registration_choice(&mut self, choice: RegistrationChoice) {
        self.embargo.set_choice(choice);
        self.bump();
    }

    pub fn set_embargo_end_date(&mut self, end_date: Option<NaiveDate>) {
        self.embargo.set_end_date(end_date);
        self.bump();
    }

    /// Check the embargo gate, then serialize
    ///
    /// # Errors
    /// Returns error if the embargo end date is missing or out of range
    pub fn submit(&mut self, today: NaiveDate) -> Result<Serialized, DocumentError> {
        self.embargo.validate(today, &self.config.embargo)?;
        Ok(self.serialize())
    }
}
