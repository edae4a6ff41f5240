//! Collaborator contracts consumed by the engine.
//!
//! The engine never talks to the network, the filesystem or a text model
//! directly. Everything outside pacing, gating and the ledger comes in
//! through these traits; [`Collaborators`] bundles one implementation of
//! each for a run.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use cadence_core::types::{CandidateDetails, CandidateItem, EnrichmentContext};

use crate::error::{ActionError, CleanupError};

/// Where candidates come from.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Up to `limit` recent items posted under `topic_tag`.
    async fn fetch_recent_candidates(
        &self,
        topic_tag: &str,
        limit: usize,
    ) -> Result<Vec<CandidateItem>, ActionError>;

    async fn is_author_followed(&self, author_id: &str) -> Result<bool, ActionError>;
}

/// Performs the actual engagement calls.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn like(&self, target_id: &str) -> Result<(), ActionError>;

    async fn comment(&self, target_id: &str, text: &str) -> Result<(), ActionError>;
}

/// Produces comment bodies.
///
/// `Ok(None)` means "do not comment on this item" (own post, sensitive
/// media, nothing worth saying) and is not an error.
pub trait CommentGenerator: Send + Sync {
    fn generate(
        &self,
        details: &CandidateDetails,
        allow_sensitive: bool,
        enrichment: Option<&EnrichmentContext>,
    ) -> Result<Option<String>, ActionError>;
}

/// A locally fetched copy of an item's media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaHandle {
    pub path: PathBuf,
}

/// Fetches media to a temporary location and disposes of it.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// `None` when the media could not be fetched.
    async fn fetch(&self, url: &str) -> Option<MediaHandle>;

    /// Dispose of a handle. `None` is a no-op.
    fn release(&self, handle: Option<MediaHandle>) -> Result<(), CleanupError>;
}

/// Optional extra context for the comment generator, such as the account
/// owner's reading history.
#[async_trait]
pub trait EnrichmentSource: Send + Sync {
    async fn lookup(
        &self,
        candidate: &CandidateItem,
    ) -> Result<Option<EnrichmentContext>, ActionError>;
}

/// The full set of collaborators for one engagement run.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn ContentSource>,
    pub executor: Arc<dyn ActionExecutor>,
    pub generator: Arc<dyn CommentGenerator>,
    pub media: Arc<dyn MediaFetcher>,
    pub enrichment: Option<Arc<dyn EnrichmentSource>>,
}

/// Media fetcher for runs that never download anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMedia;

#[async_trait]
impl MediaFetcher for NoMedia {
    async fn fetch(&self, _url: &str) -> Option<MediaHandle> {
        None
    }

    fn release(&self, _handle: Option<MediaHandle>) -> Result<(), CleanupError> {
        Ok(())
    }
}

/// Releases its handle exactly once when dropped, on every exit path.
pub(crate) struct MediaGuard<'a> {
    fetcher: &'a dyn MediaFetcher,
    handle: Option<MediaHandle>,
    target_id: &'a str,
}

impl<'a> MediaGuard<'a> {
    pub(crate) fn new(
        fetcher: &'a dyn MediaFetcher,
        handle: Option<MediaHandle>,
        target_id: &'a str,
    ) -> Self {
        Self {
            fetcher,
            handle,
            target_id,
        }
    }

    pub(crate) fn path(&self) -> Option<PathBuf> {
        self.handle.as_ref().map(|h| h.path.clone())
    }
}

impl Drop for MediaGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.fetcher.release(self.handle.take()) {
            tracing::warn!(target_id = %self.target_id, error = %e, "Media release failed");
        }
    }
}
