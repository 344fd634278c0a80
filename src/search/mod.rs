//! Search index lifecycle.
//!
//! Full rebuilds never touch the index readers are using:
//!
//! ```text
//!   Idle ──begin_build──▶ Building ──stream_tree──▶ (all batches loaded)
//!    ▲                        │                            │
//!    │                     abort                        commit
//!    │                        ▼                            ▼
//!    └──────────────── alias unchanged        alias → new index,
//!                                              stale indices deleted
//! ```
//!
//! 1. [`Indexer::begin_build`] creates `<alias>-<UTC %Y%m%dt%H%M%S>` with the
//!    document mapping. An "already exists" answer is not an error.
//! 2. [`IndexBuild::stream_tree`] walks the source root and bulk-loads one
//!    document per directory and per media file, in batches of `chunk_size`,
//!    retrying each batch up to `max_retries` times. Documents that still
//!    fail are collected and reported as one [`SearchError::PartialFailure`]
//!    after the whole tree has been streamed.
//! 3. [`IndexBuild::commit`] repoints the alias in a single request and
//!    deletes every other `<alias>-*` index.
//!
//! The editor keeps the live index current between rebuilds with
//! [`Indexer::add_one`] and [`Indexer::remove_one`], which write through the
//! alias.
//!
//! The engine itself sits behind [`SearchBackend`]: [`elastic`] talks to
//! Elasticsearch over HTTP, [`memory`] keeps everything in process for tests
//! and engine-less deployments.

mod document;
pub mod elastic;
pub mod memory;

pub use document::{DATE_FORMAT, DocumentDate, DocumentType, SearchDocument, document_id, walk_tree};

use crate::album::Gallery;
use crate::config::{SearchBackendKind, SearchConfig};
use crate::paths;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Fields queried, with their boosts.
pub const QUERY_FIELDS: [(&str, f64); 7] = [
    ("title", 3.0),
    ("keywords", 10.0),
    ("summary", 5.0),
    ("description", 3.0),
    ("path", 1.0),
    ("date", 2.0),
    ("type", 1.0),
];

/// With up to three terms all must match; beyond that 66% must.
pub const MINIMUM_SHOULD_MATCH: &str = "3<66%";

/// Result count when the caller gives none.
pub const DEFAULT_LIMIT: usize = 100;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Search engine returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Index already exists: {0}")]
    IndexExists(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Path is outside the source root: {0}")]
    OutsideRoot(PathBuf),
    #[error("Search engine unavailable: {0}")]
    Unavailable(String),
    #[error("{failed} document(s) failed to index, {indexed} succeeded; first failure: {first}")]
    PartialFailure {
        indexed: usize,
        failed: usize,
        first: String,
    },
}

/// A document the engine refused in an otherwise successful bulk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFailure {
    pub id: String,
    pub reason: String,
}

/// One scored hit.
#[derive(Debug, Clone, Serialize)]
pub struct Hit {
    pub id: String,
    pub score: f64,
    pub document: SearchDocument,
}

/// Query answer: total matches and the first `limit` hits.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub total: u64,
    pub hits: Vec<Hit>,
}

/// A free-text query over [`QUERY_FIELDS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, limit: usize) -> Self {
        Self {
            text: text.into(),
            limit,
        }
    }

    /// Request body for the engine's `_search` endpoint.
    pub fn to_json(&self) -> Value {
        let fields: Vec<String> = QUERY_FIELDS
            .iter()
            .map(|(name, boost)| {
                if *boost == 1.0 {
                    name.to_string()
                } else {
                    format!("{name}^{boost}")
                }
            })
            .collect();
        json!({
            "query": {
                "combined_fields": {
                    "query": self.text,
                    "fields": fields,
                    "operator": "or",
                    "minimum_should_match": MINIMUM_SHOULD_MATCH,
                }
            },
            "size": self.limit,
        })
    }
}

/// Number of query terms that must match under [`MINIMUM_SHOULD_MATCH`].
pub fn required_matches(terms: usize) -> usize {
    if terms <= 3 { terms } else { terms * 66 / 100 }
}

/// Index mapping sent on creation.
pub fn index_mapping() -> Value {
    let date = json!({"type": "date", "format": "strict_date_optional_time||epoch_second"});
    json!({
        "properties": {
            "path": {"type": "text"},
            "title": {"type": "text"},
            "keywords": {"type": "text"},
            "summary": {"type": "text"},
            "description": {"type": "text"},
            "user": {"type": "text"},
            "createdate": date,
            "moddate": date,
            "date": {"type": "text"},
            "type": {"type": "text"},
        }
    })
}

/// Operations the lifecycle needs from a search engine.
///
/// `index` arguments accept either a concrete index name or an alias that
/// points at exactly one index.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &str;

    /// Create an index. An existing index yields [`SearchError::IndexExists`].
    async fn create_index(&self, index: &str, mapping: &Value) -> Result<(), SearchError>;

    /// Upsert documents by id. `Err` means the request as a whole failed;
    /// per-document rejections come back in the `Ok` list.
    async fn bulk_index(&self, index: &str, docs: &[SearchDocument]) -> Result<Vec<BulkFailure>, SearchError>;

    /// Delete one document. A missing document yields [`SearchError::NotFound`].
    async fn delete_document(&self, index: &str, id: &str) -> Result<(), SearchError>;

    /// Indices the alias currently points at (empty if it doesn't exist).
    async fn alias_targets(&self, alias: &str) -> Result<Vec<String>, SearchError>;

    /// Point `alias` at `index` only, in one atomic step.
    async fn swap_alias(&self, alias: &str, index: &str) -> Result<(), SearchError>;

    /// Indices whose names start with `prefix`.
    async fn list_indices(&self, prefix: &str) -> Result<Vec<String>, SearchError>;

    async fn delete_index(&self, index: &str) -> Result<(), SearchError>;

    async fn search(&self, index: &str, query: &SearchQuery) -> Result<SearchResults, SearchError>;

    /// Engine health status string (`green`, `yellow`, ...).
    async fn health(&self) -> Result<String, SearchError>;
}

/// Batching and retry policy for bulk loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkSettings {
    pub chunk_size: usize,
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub initial_backoff: Duration,
}

impl Default for BulkSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            max_retries: 2,
            initial_backoff: Duration::from_secs(2),
        }
    }
}

impl BulkSettings {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            max_retries: config.max_retries,
            ..Self::default()
        }
    }
}

/// Build the configured backend.
pub fn backend_from_config(config: &SearchConfig) -> Result<Arc<dyn SearchBackend>, SearchError> {
    Ok(match config.backend {
        SearchBackendKind::Elasticsearch => Arc::new(elastic::ElasticBackend::new(&config.address, config.request_timeout())?),
        SearchBackendKind::Memory => Arc::new(memory::MemoryBackend::new()),
    })
}

/// Counts from one streamed tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamReport {
    pub indexed: usize,
    pub batches: usize,
}

/// Result of a committed rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub index: String,
    pub indexed: usize,
    pub batches: usize,
    pub removed: Vec<String>,
}

/// Keeps one alias's documents in step with a gallery tree.
#[derive(Clone)]
pub struct Indexer {
    backend: Arc<dyn SearchBackend>,
    alias: String,
    gallery: Gallery,
    settings: BulkSettings,
}

impl Indexer {
    pub fn new(backend: Arc<dyn SearchBackend>, alias: impl Into<String>, gallery: Gallery) -> Self {
        Self {
            backend,
            alias: alias.into(),
            gallery,
            settings: BulkSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: BulkSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn backend(&self) -> &dyn SearchBackend {
        self.backend.as_ref()
    }

    /// Timestamped index name for a build started at `at`.
    pub fn build_name(&self, at: DateTime<Utc>) -> String {
        format!("{}-{}", self.alias, at.format("%Y%m%dt%H%M%S"))
    }

    /// Start a rebuild into a fresh index named for the current time.
    pub async fn begin_build(&self) -> Result<IndexBuild<'_>, SearchError> {
        self.begin_build_at(Utc::now()).await
    }

    /// Start a rebuild into the index named for `at`.
    pub async fn begin_build_at(&self, at: DateTime<Utc>) -> Result<IndexBuild<'_>, SearchError> {
        let name = self.build_name(at);
        match self.backend.create_index(&name, &index_mapping()).await {
            Ok(()) => tracing::info!("created index {name}"),
            Err(SearchError::IndexExists(_)) => tracing::info!("index {name} already exists, reusing it"),
            Err(e) => return Err(e),
        }
        Ok(IndexBuild {
            indexer: self,
            name,
            report: StreamReport::default(),
        })
    }

    /// Full rebuild of the tree under the gallery root.
    ///
    /// On any failure the new index is dropped and the alias left alone.
    pub async fn rebuild(&self) -> Result<RebuildReport, SearchError> {
        let mut build = self.begin_build().await?;
        let root = self.gallery.root().to_path_buf();
        let streamed = build.stream_tree(&root).await.map(|_| ());
        if let Err(e) = streamed {
            build.abort().await;
            return Err(e);
        }
        build.commit().await
    }

    /// Upsert the document for one album or media file into the live index.
    pub async fn add_one(&self, path: &Path) -> Result<(), SearchError> {
        let doc = SearchDocument::from_path(self.gallery.root(), path, self.gallery.classifier())?;
        tracing::debug!("indexing {}", doc.path);
        let failures = self.send_batch(&self.alias, vec![doc]).await;
        match failures.first() {
            None => Ok(()),
            Some(first) => Err(SearchError::PartialFailure {
                indexed: 0,
                failed: failures.len(),
                first: first.reason.clone(),
            }),
        }
    }

    /// Delete the document for `path` from the live index. Absent documents
    /// are not an error.
    pub async fn remove_one(&self, path: &Path) -> Result<(), SearchError> {
        let rel = paths::relative(self.gallery.root(), path).ok_or_else(|| SearchError::OutsideRoot(path.to_path_buf()))?;
        match self.backend.delete_document(&self.alias, &document_id(&rel)).await {
            Ok(()) => {
                tracing::debug!("removed {rel} from index");
                Ok(())
            }
            Err(SearchError::NotFound(_)) => {
                tracing::debug!("{rel} was not indexed");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Query the live index.
    pub async fn search(&self, text: &str, limit: usize) -> Result<SearchResults, SearchError> {
        self.backend.search(&self.alias, &SearchQuery::new(text, limit)).await
    }

    pub async fn health(&self) -> Result<String, SearchError> {
        self.backend.health().await
    }

    /// Send one batch with retries. Returns the documents that never made it.
    async fn send_batch(&self, index: &str, mut docs: Vec<SearchDocument>) -> Vec<BulkFailure> {
        let mut backoff = self.settings.initial_backoff;
        let mut attempt = 0;
        loop {
            let failures = match self.backend.bulk_index(index, &docs).await {
                Ok(failures) => failures,
                Err(e) => docs
                    .iter()
                    .map(|d| BulkFailure {
                        id: d.id.clone(),
                        reason: e.to_string(),
                    })
                    .collect(),
            };
            if failures.is_empty() {
                return failures;
            }
            if attempt >= self.settings.max_retries {
                for failure in &failures {
                    tracing::warn!("failed to process {}: {}", failure.id, failure.reason);
                }
                return failures;
            }
            attempt += 1;
            tracing::warn!(
                "{} of {} document(s) rejected by {}, retry {attempt}/{}",
                failures.len(),
                docs.len(),
                self.backend.name(),
                self.settings.max_retries
            );
            docs.retain(|d| failures.iter().any(|f| f.id == d.id));
            if !backoff.is_zero() {
                tokio::time::sleep(backoff).await;
            }
            backoff *= 2;
        }
    }
}

/// An index being populated. The alias does not see it until [`commit`](Self::commit).
pub struct IndexBuild<'a> {
    indexer: &'a Indexer,
    name: String,
    report: StreamReport,
}

impl IndexBuild<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn report(&self) -> &StreamReport {
        &self.report
    }

    /// Load every album and media file under `root` into the build index.
    pub async fn stream_tree(&mut self, root: &Path) -> Result<&StreamReport, SearchError> {
        let indexer = self.indexer;
        let gallery = &indexer.gallery;
        let chunk_size = indexer.settings.chunk_size.max(1);
        let mut failures: Vec<BulkFailure> = Vec::new();
        let mut batch = Vec::with_capacity(chunk_size);

        for entry in walk_tree(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("failed to read entry: {e}");
                    failures.push(BulkFailure {
                        id: e.path().map(|p| p.display().to_string()).unwrap_or_default(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            tracing::info!("processing {}", entry.path().display());
            match SearchDocument::from_path(gallery.root(), entry.path(), gallery.classifier()) {
                Ok(doc) => batch.push(doc),
                Err(e) => failures.push(BulkFailure {
                    id: entry.path().display().to_string(),
                    reason: e.to_string(),
                }),
            }
            if batch.len() >= chunk_size {
                self.flush(&mut batch, &mut failures).await;
            }
        }
        if !batch.is_empty() {
            self.flush(&mut batch, &mut failures).await;
        }

        match failures.first() {
            None => {
                tracing::info!(
                    "streamed {} document(s) into {} in {} batch(es)",
                    self.report.indexed,
                    self.name,
                    self.report.batches
                );
                Ok(&self.report)
            }
            Some(first) => Err(SearchError::PartialFailure {
                indexed: self.report.indexed,
                failed: failures.len(),
                first: first.reason.clone(),
            }),
        }
    }

    async fn flush(&mut self, batch: &mut Vec<SearchDocument>, failures: &mut Vec<BulkFailure>) {
        let docs = std::mem::take(batch);
        let sent = docs.len();
        let failed = self.indexer.send_batch(&self.name, docs).await;
        self.report.batches += 1;
        self.report.indexed += sent - failed.len();
        failures.extend(failed);
    }

    /// Point the alias at this index and delete the other `<alias>-*` indices.
    pub async fn commit(self) -> Result<RebuildReport, SearchError> {
        let backend = self.indexer.backend();
        let alias = self.indexer.alias();

        let previous = backend.alias_targets(alias).await?;
        backend.swap_alias(alias, &self.name).await?;
        tracing::info!("alias {alias} now points at {} (was {previous:?})", self.name);

        let mut removed = Vec::new();
        for index in backend.list_indices(&format!("{alias}-")).await? {
            if index != self.name {
                backend.delete_index(&index).await?;
                tracing::info!("deleted stale index {index}");
                removed.push(index);
            }
        }

        Ok(RebuildReport {
            index: self.name,
            indexed: self.report.indexed,
            batches: self.report.batches,
            removed,
        })
    }

    /// Drop the partially built index. Failures are logged; the next
    /// successful commit removes whatever is left.
    pub async fn abort(self) {
        let backend = self.indexer.backend();
        if backend.alias_targets(self.indexer.alias()).await.is_ok_and(|t| t.contains(&self.name)) {
            tracing::warn!("not deleting {}: it is the live index", self.name);
            return;
        }
        match backend.delete_index(&self.name).await {
            Ok(()) => tracing::info!("abandoned index {}", self.name),
            Err(e) => tracing::warn!("failed to delete abandoned index {}: {e}", self.name),
        }
    }
}
