//! In-process search backend.
//!
//! Indices are maps of documents behind a [`RwLock`], so all trait methods
//! work on `&self`. Scoring approximates the engine's combined-fields query:
//! each query term that appears in a field adds that field's boost, and a
//! document matches when enough distinct terms are found (see
//! [`required_matches`]).
//!
//! Failure injection hooks let tests exercise retries and partial failures.

use super::{
    BulkFailure, Hit, QUERY_FIELDS, SearchBackend, SearchDocument, SearchError, SearchQuery, SearchResults,
    required_matches,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    indices: BTreeMap<String, BTreeMap<String, SearchDocument>>,
    aliases: HashMap<String, String>,
}

impl State {
    fn resolve<'a>(&'a self, name: &'a str) -> Result<&'a str, SearchError> {
        if let Some(target) = self.aliases.get(name) {
            return Ok(target);
        }
        if self.indices.contains_key(name) {
            return Ok(name);
        }
        Err(SearchError::NotFound(format!("index {name}")))
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<State>,
    fail_requests: AtomicUsize,
    bulk_requests: AtomicUsize,
    rejected: Mutex<Vec<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` bulk requests outright.
    pub fn fail_next_requests(&self, n: usize) {
        self.fail_requests.store(n, Ordering::SeqCst);
    }

    /// Reject every document whose path contains `fragment`.
    pub fn reject_paths_containing(&self, fragment: impl Into<String>) {
        if let Ok(mut rejected) = self.rejected.lock() {
            rejected.push(fragment.into());
        }
    }

    /// Number of bulk requests received, failed ones included.
    pub fn bulk_requests(&self) -> usize {
        self.bulk_requests.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.fail_requests
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn is_rejected(&self, doc: &SearchDocument) -> bool {
        self.rejected
            .lock()
            .map(|r| r.iter().any(|f| doc.path.contains(f.as_str())))
            .unwrap_or(false)
    }
}

/// Lowercased alphanumeric runs.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Combined-fields score, or `None` if the document doesn't match.
fn score(doc: &SearchDocument, terms: &[String]) -> Option<f64> {
    let mut total = 0.0;
    let mut matched = 0;
    for term in terms {
        let mut term_score = 0.0;
        for (field, boost) in QUERY_FIELDS {
            if let Some(text) = doc.field(field)
                && tokenize(text).iter().any(|t| t == term)
            {
                term_score += boost;
            }
        }
        if term_score > 0.0 {
            matched += 1;
            total += term_score;
        }
    }
    (matched > 0 && matched >= required_matches(terms.len())).then_some(total)
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_index(&self, index: &str, _mapping: &Value) -> Result<(), SearchError> {
        let mut state = self.state.write().await;
        if state.indices.contains_key(index) {
            return Err(SearchError::IndexExists(index.to_string()));
        }
        state.indices.insert(index.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn bulk_index(&self, index: &str, docs: &[SearchDocument]) -> Result<Vec<BulkFailure>, SearchError> {
        self.bulk_requests.fetch_add(1, Ordering::SeqCst);
        if self.take_failure() {
            return Err(SearchError::Unavailable("injected request failure".into()));
        }
        let mut state = self.state.write().await;
        let target = state.resolve(index)?.to_string();
        let mut failures = Vec::new();
        let Some(store) = state.indices.get_mut(&target) else {
            return Err(SearchError::NotFound(format!("index {target}")));
        };
        for doc in docs {
            if self.is_rejected(doc) {
                failures.push(BulkFailure {
                    id: doc.id.clone(),
                    reason: format!("document {} rejected", doc.path),
                });
            } else {
                store.insert(doc.id.clone(), doc.clone());
            }
        }
        Ok(failures)
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<(), SearchError> {
        let mut state = self.state.write().await;
        let target = state.resolve(index)?.to_string();
        match state.indices.get_mut(&target).and_then(|s| s.remove(id)) {
            Some(_) => Ok(()),
            None => Err(SearchError::NotFound(format!("document {id}"))),
        }
    }

    async fn alias_targets(&self, alias: &str) -> Result<Vec<String>, SearchError> {
        let state = self.state.read().await;
        Ok(state.aliases.get(alias).cloned().into_iter().collect())
    }

    async fn swap_alias(&self, alias: &str, index: &str) -> Result<(), SearchError> {
        let mut state = self.state.write().await;
        if !state.indices.contains_key(index) {
            return Err(SearchError::NotFound(format!("index {index}")));
        }
        state.aliases.insert(alias.to_string(), index.to_string());
        Ok(())
    }

    async fn list_indices(&self, prefix: &str) -> Result<Vec<String>, SearchError> {
        let state = self.state.read().await;
        Ok(state.indices.keys().filter(|k| k.starts_with(prefix)).cloned().collect())
    }

    async fn delete_index(&self, index: &str) -> Result<(), SearchError> {
        let mut state = self.state.write().await;
        if state.indices.remove(index).is_none() {
            return Err(SearchError::NotFound(format!("index {index}")));
        }
        state.aliases.retain(|_, target| target != index);
        Ok(())
    }

    async fn search(&self, index: &str, query: &SearchQuery) -> Result<SearchResults, SearchError> {
        let state = self.state.read().await;
        let target = state.resolve(index)?;
        let terms = tokenize(&query.text);

        let mut hits: Vec<Hit> = state
            .indices
            .get(target)
            .into_iter()
            .flat_map(|store| store.values())
            .filter_map(|doc| {
                score(doc, &terms).map(|score| Hit {
                    id: doc.id.clone(),
                    score,
                    document: doc.clone(),
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.document.path.cmp(&b.document.path))
        });
        let total = hits.len() as u64;
        hits.truncate(query.limit);
        Ok(SearchResults { total, hits })
    }

    async fn health(&self) -> Result<String, SearchError> {
        Ok("green".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataRecord;
    use crate::search::{DocumentType, index_mapping};

    fn doc(path: &str, fields: &[(&str, &str)], kind: DocumentType) -> SearchDocument {
        let mut meta = MetadataRecord::default();
        for (k, v) in fields {
            meta.set(*k, *v);
        }
        SearchDocument::from_record(path.to_string(), &meta, kind)
    }

    async fn loaded(docs: &[SearchDocument]) -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend.create_index("g-1", &index_mapping()).await.unwrap();
        backend.bulk_index("g-1", docs).await.unwrap();
        backend.swap_alias("g", "g-1").await.unwrap();
        backend
    }

    fn paths(results: &SearchResults) -> Vec<&str> {
        results.hits.iter().map(|h| h.document.path.as_str()).collect()
    }

    #[test]
    fn tokenizer_splits_paths_and_words() {
        assert_eq!(tokenize("trip/Photo-1.JPG"), vec!["trip", "photo", "1", "jpg"]);
        assert!(tokenize("  ").is_empty());
    }

    #[tokio::test]
    async fn keyword_boost_outranks_title() {
        let backend = loaded(&[
            doc("a.jpg", &[("title", "sunset")], DocumentType::Image),
            doc("b.jpg", &[("keywords", "sunset")], DocumentType::Image),
        ])
        .await;
        let results = backend.search("g", &SearchQuery::new("Sunset", 10)).await.unwrap();
        assert_eq!(paths(&results), vec!["b.jpg", "a.jpg"]);
        assert_eq!(results.hits[0].score, 10.0);
    }

    #[tokio::test]
    async fn short_queries_require_every_term() {
        let backend = loaded(&[
            doc("a.jpg", &[("title", "red boat")], DocumentType::Image),
            doc("b.jpg", &[("title", "red car")], DocumentType::Image),
        ])
        .await;
        let results = backend.search("g", &SearchQuery::new("red boat", 10)).await.unwrap();
        assert_eq!(paths(&results), vec!["a.jpg"]);
    }

    #[tokio::test]
    async fn long_queries_need_two_thirds() {
        let backend = loaded(&[doc("a.jpg", &[("summary", "one two three")], DocumentType::Image)]).await;
        let hit = backend.search("g", &SearchQuery::new("one two three four", 10)).await.unwrap();
        assert_eq!(hit.total, 1);
        let miss = backend.search("g", &SearchQuery::new("one five six seven", 10)).await.unwrap();
        assert_eq!(miss.total, 0);
    }

    #[tokio::test]
    async fn type_field_is_searchable() {
        let backend = loaded(&[
            doc("trip", &[], DocumentType::Album),
            doc("notes.pdf", &[], DocumentType::OtherMedia),
        ])
        .await;
        let results = backend.search("g", &SearchQuery::new("media", 10)).await.unwrap();
        assert_eq!(paths(&results), vec!["notes.pdf"]);
    }

    #[tokio::test]
    async fn limit_caps_hits_not_total() {
        let docs: Vec<_> = (0..5)
            .map(|i| doc(&format!("p{i}.jpg"), &[("keywords", "cat")], DocumentType::Image))
            .collect();
        let backend = loaded(&docs).await;
        let results = backend.search("g", &SearchQuery::new("cat", 2)).await.unwrap();
        assert_eq!(results.total, 5);
        assert_eq!(paths(&results), vec!["p0.jpg", "p1.jpg"]);
    }

    #[tokio::test]
    async fn create_existing_index_is_reported() {
        let backend = MemoryBackend::new();
        backend.create_index("g-1", &index_mapping()).await.unwrap();
        assert!(matches!(
            backend.create_index("g-1", &index_mapping()).await,
            Err(SearchError::IndexExists(_))
        ));
    }

    #[tokio::test]
    async fn swap_replaces_previous_target() {
        let backend = MemoryBackend::new();
        backend.create_index("g-1", &index_mapping()).await.unwrap();
        backend.create_index("g-2", &index_mapping()).await.unwrap();
        backend.swap_alias("g", "g-1").await.unwrap();
        backend.swap_alias("g", "g-2").await.unwrap();
        assert_eq!(backend.alias_targets("g").await.unwrap(), vec!["g-2"]);
        assert!(backend.swap_alias("g", "missing").await.is_err());
    }

    #[test]
    fn names_resolve_through_aliases() {
        let mut state = State::default();
        state.indices.insert("g-1".into(), BTreeMap::new());
        state.aliases.insert("g".into(), "g-1".into());
        assert_eq!(state.resolve("g").unwrap(), "g-1");
        assert_eq!(state.resolve("g-1").unwrap(), "g-1");
        assert!(matches!(state.resolve("other"), Err(SearchError::NotFound(_))));
    }
}
