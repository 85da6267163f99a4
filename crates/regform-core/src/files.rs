//! File listings for file items
//!
//! Listings are fetched asynchronously through a [`FileListing`] provider.
//! The document issues a [`FileRequest`] per container; each request carries
//! a generation number and only a response matching the latest generation is
//! stored.

use crate::document::Document;
use crate::error::DocumentError;
use crate::node::{NodeId, NodeKind};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;

/// File listing provider errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ListingError {
    /// Container does not exist or is not accessible
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// Transport or backend failure
    #[error("listing failed: {0}")]
    Failed(String),
}

/// Source of file listings per container
#[async_trait]
pub trait FileListing: Send + Sync {
    /// List file paths in a container
    async fn list_files(&self, container_id: &str) -> Result<Vec<String>, ListingError>;
}

/// In-memory provider
#[derive(Debug, Clone, Default)]
pub struct StaticListing {
    containers: HashMap<String, Vec<String>>,
}

impl StaticListing {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a container and its files
    #[must_use]
    pub fn with_container(
        mut self,
        container_id: impl Into<String>,
        files: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.containers.insert(
            container_id.into(),
            files.into_iter().map(Into::into).collect(),
        );
        self
    }
}

#[async_trait]
impl FileListing for StaticListing {
    async fn list_files(&self, container_id: &str) -> Result<Vec<String>, ListingError> {
        self.containers
            .get(container_id)
            .cloned()
            .ok_or_else(|| ListingError::ContainerNotFound(container_id.to_string()))
    }
}

/// Outstanding listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRequest {
    pub container: String,
    pub generation: u64,
}

#[derive(Debug, Clone, Default)]
struct CacheEntry {
    generation: u64,
    files: Option<Vec<String>>,
}

/// Listings per container, guarded by request generations
#[derive(Debug, Clone, Default)]
pub struct FileCache {
    entries: HashMap<String, CacheEntry>,
}

impl FileCache {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request; supersedes any earlier one for the container
    pub fn request(&mut self, container: &str) -> FileRequest {
        let entry = self.entries.entry(container.to_string()).or_default();
        entry.generation += 1;
        FileRequest {
            container: container.to_string(),
            generation: entry.generation,
        }
    }

    /// Store a response; returns false when the request was superseded
    pub fn receive(&mut self, request: &FileRequest, files: Vec<String>) -> bool {
        match self.entries.get_mut(&request.container) {
            Some(entry) if entry.generation == request.generation => {
                entry.files = Some(files);
                true
            }
            _ => false,
        }
    }

    /// Cached listing
    #[must_use]
    pub fn get(&self, container: &str) -> Option<&[String]> {
        self.entries
            .get(container)
            .and_then(|e| e.files.as_deref())
    }

    /// Whether a listing has been requested (and possibly stored)
    #[inline]
    #[must_use]
    pub fn is_known(&self, container: &str) -> bool {
        self.entries.contains_key(container)
    }
}

impl Document {
    /// Containers seen in answers or supplied by the host, most recent first
    #[inline]
    #[must_use]
    pub fn known_containers(&self) -> &[String] {
        &self.known_containers
    }

    pub(crate) fn remember_container(&mut self, container: &str) {
        if !self.known_containers.iter().any(|c| c == container) {
            self.known_containers.insert(0, container.to_string());
        }
    }

    /// Request a listing unless one is already cached or in flight
    pub fn request_files(&mut self, container: &str) -> Option<FileRequest> {
        if self.files.is_known(container) {
            return None;
        }
        Some(self.files.request(container))
    }

    /// Request a fresh listing, superseding any request in flight
    pub fn refresh_files(&mut self, container: &str) -> FileRequest {
        self.files.request(container)
    }

    /// Store a listing response
    ///
    /// Returns false (and drops the files) when the request is stale.
    pub fn receive_files(&mut self, request: &FileRequest, files: Vec<String>) -> bool {
        let accepted = self.files.receive(request, files);
        if accepted {
            self.bump();
        } else {
            tracing::warn!(
                container = %request.container,
                generation = request.generation,
                "dropping stale file listing"
            );
        }
        accepted
    }

    /// Files available to a file item: the cached listing of its container
    #[must_use]
    pub fn files(&self, id: NodeId) -> Option<&[String]> {
        let container = self.node(id)?.as_file()?.container()?;
        self.files.get(container)
    }

    /// Select the container of a file item
    ///
    /// # Errors
    /// Returns error if `id` is not a file item
    pub fn select_container(
        &mut self,
        id: NodeId,
        container: &str,
    ) -> Result<Option<FileRequest>, DocumentError> {
        let node = self.get_mut(id)?;
        let NodeKind::File(file) = &mut node.kind else {
            return Err(DocumentError::NotAnItem { id: node.id.clone() });
        };
        file.select(container);
        self.remember_container(container);
        self.bump();
        Ok(self.request_files(container))
    }

    /// Choose a path within the selected container
    ///
    /// # Errors
    /// Returns error if `id` is not a file item
    pub fn set_file(&mut self, id: NodeId, path: &str) -> Result<(), DocumentError> {
        let node = self.get_mut(id)?;
        let NodeKind::File(file) = &mut node.kind else {
            return Err(DocumentError::NotAnItem { id: node.id.clone() });
        };
        file.set_path(path);
        self.bump();
        Ok(())
    }

    /// Fetch and store the listing of a file item's container
    ///
    /// # Errors
    /// Returns error if `id` is not a file item or the provider fails
    pub async fn load_files(
        &mut self,
        id: NodeId,
        provider: &dyn FileListing,
    ) -> Result<usize, DocumentError> {
        let node = self.get(id)?;
        let Some(file) = node.as_file() else {
            return Err(DocumentError::NotAnItem { id: node.id.clone() });
        };
        let Some(container) = file.container().map(str::to_string) else {
            return Ok(0);
        };

        let request = self.refresh_files(&container);
        let files = provider.list_files(&container).await?;
        let count = files.len();
        self.receive_files(&request, files);
        Ok(count)
    }

    /// Fetch every known container that has no listing yet, concurrently
    ///
    /// Failed containers are logged and left unlisted.
    pub async fn load_pending_files(&mut self, provider: &dyn FileListing) -> usize {
        let containers = self.known_containers.clone();
        let requests: Vec<FileRequest> = containers
            .iter()
            .filter_map(|c| self.request_files(c))
            .collect();

        let responses = join_all(
            requests
                .iter()
                .map(|request| provider.list_files(&request.container)),
        )
        .await;

        let mut loaded = 0;
        for (request, response) in requests.iter().zip(responses) {
            match response {
                Ok(files) => {
                    if self.receive_files(request, files) {
                        loaded += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(container = %request.container, error = %e, "file listing failed");
                }
            }
        }
        loaded
    }
}
