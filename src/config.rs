//! Gallery configuration.
//!
//! Configuration is layered: stock defaults are overridden by an optional
//! TOML file, which is in turn overridden by `GALLERY_*` environment
//! variables. Every layer is sparse, so a config file only needs the keys it
//! wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! source = "albums"         # Album root served by the gallery
//! theme = "theme"           # Theme directory (static/ assets live here)
//! log_level = "info"        # error | warn | info | debug | trace
//!
//! [media]
//! image_extensions = ["jpg", "jpeg", "png", "gif"]
//! video_extensions = ["avi", "mp4", "webm", "ogv", "3gp"]
//!
//! [server]
//! host = "localhost"
//! port = 8080
//! editor = true             # Mount the /edit routes
//!
//! [search]
//! backend = "elasticsearch" # elasticsearch | memory
//! address = "http://localhost:9200"
//! index = "gallery"         # Alias name; physical indices are <index>-<timestamp>
//! chunk_size = 1000         # Documents per bulk request
//! max_retries = 2           # Retries per bulk request before giving up
//! request_timeout_secs = 60
//!
//! [cache]
//! backend = "memory"        # memory | file | none
//! path = ".gallery-cache"   # Used by the file backend
//! ```
//!
//! ## Environment Overrides
//!
//! | Variable | Key |
//! |---|---|
//! | `GALLERY_SOURCE` | `source` |
//! | `GALLERY_THEME` | `theme` |
//! | `GALLERY_LOG_LEVEL` | `log_level` |
//! | `GALLERY_SERVER_HOST` | `server.host` |
//! | `GALLERY_SERVER_PORT` | `server.port` |
//! | `GALLERY_ES_ADDRESS` | `search.address` |
//! | `GALLERY_ES_INDEX` | `search.index` |
//! | `GALLERY_ES_CHUNK_SIZE` | `search.chunk_size` |
//! | `GALLERY_IMG_EXTENSIONS` | `media.image_extensions` (comma separated) |
//! | `GALLERY_VIDEO_EXTENSIONS` | `media.video_extensions` (comma separated) |
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid value for {var}: {value}")]
    Env { var: String, value: String },
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Gallery configuration.
///
/// All fields have sensible defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// Root directory of the album tree.
    pub source: PathBuf,
    /// Theme directory; `static/` under it is served at `/static`.
    pub theme: PathBuf,
    /// Default tracing filter when `RUST_LOG` is not set.
    pub log_level: String,
    pub media: MediaConfig,
    pub server: ServerConfig,
    pub search: SearchConfig,
    pub cache: CacheConfig,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("albums"),
            theme: PathBuf::from("theme"),
            log_level: "info".to_string(),
            media: MediaConfig::default(),
            server: ServerConfig::default(),
            search: SearchConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

impl GalleryConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "log_level must be one of {LOG_LEVELS:?}, got {:?}",
                self.log_level
            )));
        }
        if self.search.chunk_size == 0 {
            return Err(ConfigError::Validation(
                "search.chunk_size must be non-zero".into(),
            ));
        }
        if self.search.index.is_empty() {
            return Err(ConfigError::Validation(
                "search.index must not be empty".into(),
            ));
        }
        if self.media.image_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "media.image_extensions must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Directory served at `/static`.
    pub fn static_dir(&self) -> PathBuf {
        self.theme.join("static")
    }
}

/// Extension allow-lists used by the type classifier.
///
/// Extensions are stored lower-cased without the leading dot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MediaConfig {
    pub image_extensions: Vec<String>,
    pub video_extensions: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            image_extensions: ["jpg", "jpeg", "png", "gif"].map(String::from).to_vec(),
            video_extensions: ["avi", "mp4", "webm", "ogv", "3gp"]
                .map(String::from)
                .to_vec(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Mount the editing routes under `/edit`.
    pub editor: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            editor: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackendKind {
    Elasticsearch,
    Memory,
}

/// Search engine connection and bulk-load settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub backend: SearchBackendKind,
    pub address: String,
    /// Public alias name. Physical indices are named `<index>-<timestamp>`.
    pub index: String,
    pub chunk_size: usize,
    pub max_retries: u32,
    pub request_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: SearchBackendKind::Elasticsearch,
            address: "http://localhost:9200".to_string(),
            index: "gallery".to_string(),
            chunk_size: 1000,
            max_retries: 2,
            request_timeout_secs: 60,
        }
    }
}

impl SearchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Memory,
    File,
    None,
}

/// Page cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Memory,
            path: PathBuf::from(".gallery-cache"),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(GalleryConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

enum EnvKind {
    Str,
    Int,
    List,
}

/// `(variable, key path, kind)` for every supported environment override.
const ENV_OVERRIDES: &[(&str, &[&str], EnvKind)] = &[
    ("GALLERY_SOURCE", &["source"], EnvKind::Str),
    ("GALLERY_THEME", &["theme"], EnvKind::Str),
    ("GALLERY_LOG_LEVEL", &["log_level"], EnvKind::Str),
    ("GALLERY_SERVER_HOST", &["server", "host"], EnvKind::Str),
    ("GALLERY_SERVER_PORT", &["server", "port"], EnvKind::Int),
    ("GALLERY_ES_ADDRESS", &["search", "address"], EnvKind::Str),
    ("GALLERY_ES_INDEX", &["search", "index"], EnvKind::Str),
    ("GALLERY_ES_CHUNK_SIZE", &["search", "chunk_size"], EnvKind::Int),
    ("GALLERY_IMG_EXTENSIONS", &["media", "image_extensions"], EnvKind::List),
    ("GALLERY_VIDEO_EXTENSIONS", &["media", "video_extensions"], EnvKind::List),
];

/// Build an overlay table from environment variables.
///
/// `lookup` is injected so tests don't have to mutate the process environment.
pub fn env_overlay(lookup: impl Fn(&str) -> Option<String>) -> Result<toml::Value, ConfigError> {
    let mut root = toml::Table::new();
    for (var, key_path, kind) in ENV_OVERRIDES {
        let Some(raw) = lookup(var) else { continue };
        let value = match kind {
            EnvKind::Str => toml::Value::String(raw),
            EnvKind::Int => raw
                .trim()
                .parse::<i64>()
                .map(toml::Value::Integer)
                .map_err(|_| ConfigError::Env {
                    var: var.to_string(),
                    value: raw.clone(),
                })?,
            EnvKind::List => toml::Value::Array(
                raw.split(',')
                    .map(|s| s.trim().trim_start_matches('.').to_lowercase())
                    .filter(|s| !s.is_empty())
                    .map(toml::Value::String)
                    .collect(),
            ),
        };
        insert_path(&mut root, key_path, value);
    }
    Ok(toml::Value::Table(root))
}

fn insert_path(table: &mut toml::Table, path: &[&str], value: toml::Value) {
    match path {
        [] => {}
        [last] => {
            table.insert(last.to_string(), value);
        }
        [head, rest @ ..] => {
            let child = table
                .entry(head.to_string())
                .or_insert_with(|| toml::Value::Table(toml::Table::new()));
            if let toml::Value::Table(child) = child {
                insert_path(child, rest, value);
            }
        }
    }
}

/// Merge overlays onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlays: Vec<toml::Value>) -> Result<GalleryConfig, ConfigError> {
    let merged = overlays
        .into_iter()
        .fold(stock_defaults_value(), merge_toml);
    let config: GalleryConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config: stock defaults, then `path` (if it exists), then the
/// process environment.
pub fn load_config(path: &Path) -> Result<GalleryConfig, ConfigError> {
    let mut overlays = Vec::new();
    if let Some(file) = load_raw_config(path)? {
        overlays.push(file);
    }
    overlays.push(env_overlay(|var| std::env::var(var).ok())?);
    resolve_config(overlays)
}

/// Returns a fully-commented stock config file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Gallery Configuration
# =====================
# All settings are optional. Values shown below are the defaults.
# Every key can also be overridden with a GALLERY_* environment variable.
# Unknown keys will cause an error.

# Album root. Directories are albums, files are media, and each entry may
# carry a JSON sidecar (index.meta.json for albums, <name>.meta.json for media).
source = "albums"

# Theme directory. Files under <theme>/static are served at /static.
theme = "theme"

# Log level when RUST_LOG is unset: error | warn | info | debug | trace
log_level = "info"

# ---------------------------------------------------------------------------
# Media classification
# ---------------------------------------------------------------------------
[media]
# Lower-case extensions without the dot.
image_extensions = ["jpg", "jpeg", "png", "gif"]
video_extensions = ["avi", "mp4", "webm", "ogv", "3gp"]

# ---------------------------------------------------------------------------
# HTTP server
# ---------------------------------------------------------------------------
[server]
host = "localhost"
port = 8080
# Mount the editing interface under /edit.
editor = true

# ---------------------------------------------------------------------------
# Search engine
# ---------------------------------------------------------------------------
[search]
# elasticsearch | memory
backend = "elasticsearch"
address = "http://localhost:9200"
# Public alias. Rebuilds create <index>-<timestamp> and swap the alias.
index = "gallery"
# Documents per bulk request.
chunk_size = 1000
# Retries per bulk request before the documents are reported as failed.
max_retries = 2
request_timeout_secs = 60

# ---------------------------------------------------------------------------
# Page cache
# ---------------------------------------------------------------------------
[cache]
# memory | file | none
backend = "memory"
# Directory used by the file backend.
path = ".gallery-cache"
"##
}
