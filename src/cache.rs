//! Rendered-page cache.
//!
//! Album pages are expensive to build (every child's sidecar is read and
//! every image probed), so the public gallery keeps rendered HTML in a
//! key/value store. Correctness depends entirely on explicit invalidation:
//! the editor deletes the affected keys after every mutation, and nothing
//! expires on its own.
//!
//! ## Keys and values
//!
//! Keys are `page:<relative path>` (see [`page_key`]). Values are arbitrary
//! JSON; pages are stored as [`CachedPage`] `{version, body}`. A page written
//! by a different crate version is treated as a miss and deleted, so a
//! deploy never serves markup from the previous templates.
//!
//! ## Backends
//!
//! | Backend | Storage |
//! |---------|---------|
//! | [`MemoryCache`] | process-local map, lost on restart |
//! | [`FileCache`] | one JSON file per key, named by the key's SHA-256 |
//! | [`NoCache`] | nothing, every lookup misses |
//!
//! The store is constructed once at startup and passed to whoever needs it.
//! Callers on the request path go through [`get_page`]/[`put_page`]/
//! [`invalidate`], which log store errors and carry on uncached.

use crate::config::{CacheBackendKind, CacheConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;

/// Version stamped on cached pages.
pub const PAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Cache is closed")]
    Closed,
    #[error("Cache task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Key/value store for JSON values.
///
/// `get` distinguishes a missing key (`Ok(None)`) from a stored `null`
/// (`Ok(Some(Value::Null))`).
#[async_trait]
pub trait PageCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;
    async fn set(&self, key: &str, value: &Value) -> Result<(), CacheError>;
    /// Remove a key. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;
    async fn count(&self) -> Result<usize, CacheError>;
    /// Release the store. Later calls fail with [`CacheError::Closed`].
    async fn close(&self) -> Result<(), CacheError>;
}

/// Build the configured store.
pub fn from_config(config: &CacheConfig) -> Arc<dyn PageCache> {
    match config.backend {
        CacheBackendKind::Memory => Arc::new(MemoryCache::new()),
        CacheBackendKind::File => Arc::new(FileCache::new(&config.path)),
        CacheBackendKind::None => Arc::new(NoCache),
    }
}

// ============================================================================
// Memory
// ============================================================================

#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Value>>,
    closed: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), CacheError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(CacheError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PageCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        self.ensure_open()?;
        tracing::debug!("cache get: {key}");
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), CacheError> {
        self.ensure_open()?;
        tracing::debug!("cache set: {key}");
        self.entries.write().await.insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.ensure_open()?;
        tracing::debug!("cache delete: {key}");
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.ensure_open()?;
        Ok(self.entries.read().await.contains_key(key))
    }

    async fn count(&self) -> Result<usize, CacheError> {
        self.ensure_open()?;
        Ok(self.entries.read().await.len())
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.closed.store(true, Ordering::SeqCst);
        self.entries.write().await.clear();
        Ok(())
    }
}

// ============================================================================
// File
// ============================================================================

/// On-disk entry; the key is kept so hash collisions read as misses.
#[derive(Serialize, Deserialize)]
struct FileEntry {
    key: String,
    value: Value,
}

/// One JSON file per key under a directory, created on first write.
pub struct FileCache {
    dir: PathBuf,
    closed: AtomicBool,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{:x}.json", Sha256::digest(key.as_bytes())))
    }

    fn ensure_open(&self) -> Result<(), CacheError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(CacheError::Closed)
        } else {
            Ok(())
        }
    }

    async fn read_entry(&self, key: &str) -> Result<Option<FileEntry>, CacheError> {
        let bytes = match tokio::fs::read(self.entry_path(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: FileEntry = serde_json::from_slice(&bytes)?;
        Ok((entry.key == key).then_some(entry))
    }
}

/// Write `json` to `path` through a temp file in the same directory.
fn write_atomic(dir: &Path, path: &Path, json: &[u8]) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::Builder::new().prefix(".").suffix(".tmp").tempfile_in(dir)?;
    tmp.write_all(json)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl PageCache for FileCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        self.ensure_open()?;
        tracing::debug!("cache get: {key}");
        Ok(self.read_entry(key).await?.map(|e| e.value))
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), CacheError> {
        self.ensure_open()?;
        tracing::debug!("cache set: {key}");
        let json = serde_json::to_vec(&FileEntry {
            key: key.to_string(),
            value: value.clone(),
        })?;
        let dir = self.dir.clone();
        let path = self.entry_path(key);
        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &json)).await??;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.ensure_open()?;
        tracing::debug!("cache delete: {key}");
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.ensure_open()?;
        Ok(self.read_entry(key).await?.is_some())
    }

    async fn count(&self) -> Result<usize, CacheError> {
        self.ensure_open()?;
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut count = 0;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.ends_with(".json") && !name.starts_with('.') {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Disabled
// ============================================================================

/// A store that keeps nothing.
pub struct NoCache;

#[async_trait]
impl PageCache for NoCache {
    async fn get(&self, _key: &str) -> Result<Option<Value>, CacheError> {
        Ok(None)
    }
    async fn set(&self, _key: &str, _value: &Value) -> Result<(), CacheError> {
        Ok(())
    }
    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }
    async fn exists(&self, _key: &str) -> Result<bool, CacheError> {
        Ok(false)
    }
    async fn count(&self) -> Result<usize, CacheError> {
        Ok(0)
    }
    async fn close(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

// ============================================================================
// Pages
// ============================================================================

/// A rendered page and the crate version that rendered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPage {
    pub version: String,
    pub body: String,
}

/// Cache key for the page at a root-relative path.
pub fn page_key(rel: &str) -> String {
    format!("page:{}", rel.trim_matches('/'))
}

/// Cached page body, if present and rendered by this version.
///
/// Store errors and undecodable entries count as misses.
pub async fn get_page(cache: &dyn PageCache, key: &str) -> Option<String> {
    let value = match cache.get(key).await {
        Ok(Some(value)) => value,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!("cache get failed for {key}: {e}");
            return None;
        }
    };
    match serde_json::from_value::<CachedPage>(value) {
        Ok(page) if page.version == PAGE_VERSION => Some(page.body),
        Ok(page) => {
            tracing::info!("dropping {key} cached by version {}", page.version);
            invalidate(cache, key).await;
            None
        }
        Err(e) => {
            tracing::warn!("undecodable cache entry {key}: {e}");
            invalidate(cache, key).await;
            None
        }
    }
}

/// Store a rendered page, logging failures.
pub async fn put_page(cache: &dyn PageCache, key: &str, body: &str) {
    let page = CachedPage {
        version: PAGE_VERSION.to_string(),
        body: body.to_string(),
    };
    let result = match serde_json::to_value(&page) {
        Ok(value) => cache.set(key, &value).await,
        Err(e) => Err(e.into()),
    };
    if let Err(e) = result {
        tracing::warn!("cache set failed for {key}: {e}");
    }
}

/// Delete a key, logging failures.
pub async fn invalidate(cache: &dyn PageCache, key: &str) {
    if let Err(e) = cache.delete(key).await {
        tracing::warn!("cache delete failed for {key}: {e}");
    }
}
