//! Metadata sidecar store.
//!
//! Every album and media file may carry a JSON sidecar holding its title,
//! keywords, summary, description and any number of extra fields:
//!
//! ```text
//! albums/
//! ├── trip/
//! │   ├── index.meta.json          # Album sidecar (inside the directory)
//! │   ├── photo1.jpg
//! │   ├── photo1.meta.json         # Media sidecar (beside the file, same stem)
//! │   └── thumbnails/
//! │       └── thumb.jpg
//! ```
//!
//! ## Required keys
//!
//! `title`, `keywords`, `summary` and `description` are always present on a
//! [`MetadataRecord`]: missing keys default to the empty string both when a
//! sidecar is read and when one is written. A missing sidecar is not an
//! error, it simply reads as the defaults.
//!
//! ## Writes
//!
//! Records are replaced wholesale. The new content is written to a temp file
//! in the same directory and renamed over the sidecar, so a failed write
//! leaves the previous sidecar intact.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Sidecar filename used inside album directories.
pub const ALBUM_SIDECAR: &str = "index.meta.json";

/// Extension that marks a media sidecar (`photo.jpg` → `photo.meta.json`).
pub const SIDECAR_EXTENSION: &str = "meta.json";

/// Keys every record carries, defaulting to `""`.
pub const REQUIRED_KEYS: [&str; 4] = ["title", "keywords", "summary", "description"];

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid sidecar {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Sidecar {0} is not a JSON object")]
    NotAnObject(PathBuf),
}

/// Flat key/value metadata for one album or media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct MetadataRecord {
    fields: Map<String, Value>,
}

impl Default for MetadataRecord {
    fn default() -> Self {
        Self::from(Map::new())
    }
}

impl From<Map<String, Value>> for MetadataRecord {
    fn from(mut fields: Map<String, Value>) -> Self {
        for key in REQUIRED_KEYS {
            fields
                .entry(key)
                .or_insert_with(|| Value::String(String::new()));
        }
        Self { fields }
    }
}

impl From<MetadataRecord> for Map<String, Value> {
    fn from(record: MetadataRecord) -> Self {
        record.fields
    }
}

impl MetadataRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Text form of a field: strings verbatim, other scalars rendered,
    /// missing/null/compound values as `""`.
    pub fn text(&self, key: &str) -> String {
        match self.fields.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        }
    }

    pub fn title(&self) -> String {
        self.text("title")
    }

    /// Numeric form of a field, accepting numbers and numeric strings.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.fields.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Remove a field. Required keys are reset to `""` rather than removed.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if REQUIRED_KEYS.contains(&key) {
            self.fields
                .insert(key.to_string(), Value::String(String::new()))
        } else {
            self.fields.remove(key)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

/// Is this filename a sidecar rather than content?
pub fn is_sidecar(name: &str) -> bool {
    name.ends_with(".meta.json")
}

/// Sidecar location for an album directory or media file.
pub fn sidecar_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(ALBUM_SIDECAR)
    } else {
        path.with_extension(SIDECAR_EXTENSION)
    }
}

/// Read the sidecar for `path`, filling required keys with defaults.
///
/// A missing sidecar returns the defaults. An unreadable or malformed one is
/// an error; callers that must not fail (page rendering) fall back to
/// [`read_or_default`].
pub fn read(path: &Path) -> Result<MetadataRecord, MetadataError> {
    let sidecar = sidecar_path(path);
    let content = match std::fs::read_to_string(&sidecar) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(MetadataRecord::default());
        }
        Err(source) => {
            return Err(MetadataError::Io {
                path: sidecar,
                source,
            });
        }
    };
    let value: Value = serde_json::from_str(&content).map_err(|source| MetadataError::Parse {
        path: sidecar.clone(),
        source,
    })?;
    match value {
        Value::Object(fields) => Ok(MetadataRecord::from(fields)),
        _ => Err(MetadataError::NotAnObject(sidecar)),
    }
}

/// Read the sidecar, logging and returning defaults on any error.
pub fn read_or_default(path: &Path) -> MetadataRecord {
    read(path).unwrap_or_else(|e| {
        tracing::warn!("unreadable metadata, using defaults: {e}");
        MetadataRecord::default()
    })
}

/// Replace the sidecar for `path` with `record`.
///
/// The directory holding the sidecar must already exist.
pub fn write(path: &Path, record: &MetadataRecord) -> Result<(), MetadataError> {
    let sidecar = sidecar_path(path);
    let io_err = |source| MetadataError::Io {
        path: sidecar.clone(),
        source,
    };
    let dir = sidecar
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let json = serde_json::to_string_pretty(record).map_err(|source| MetadataError::Parse {
        path: sidecar.clone(),
        source,
    })?;

    // The sidecar suffix keeps the temp file out of album listings
    let mut tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".meta.json")
        .tempfile_in(dir)
        .map_err(io_err)?;
    tmp.write_all(json.as_bytes()).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(&sidecar).map_err(|e| io_err(e.error))?;
    tracing::debug!("wrote metadata {}", sidecar.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    // =========================================================================
    // Sidecar location
    // =========================================================================

    #[test]
    fn album_sidecar_lives_inside_directory() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(sidecar_path(tmp.path()), tmp.path().join("index.meta.json"));
    }

    #[test]
    fn media_sidecar_replaces_extension() {
        let tmp = TempDir::new().unwrap();
        let img = tmp.path().join("photo1.jpg");
        assert_eq!(sidecar_path(&img), tmp.path().join("photo1.meta.json"));
    }

    #[test]
    fn media_without_extension_gets_suffix() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("README");
        assert_eq!(sidecar_path(&file), tmp.path().join("README.meta.json"));
    }

    #[test]
    fn sidecar_names_detected() {
        assert!(is_sidecar("index.meta.json"));
        assert!(is_sidecar("photo.meta.json"));
        assert!(!is_sidecar("photo.json"));
        assert!(!is_sidecar("photo.jpg"));
    }

    // =========================================================================
    // read()
    // =========================================================================

    #[test]
    fn missing_sidecar_reads_defaults() {
        let tmp = TempDir::new().unwrap();
        let record = read(&tmp.path().join("photo.jpg")).unwrap();
        for key in REQUIRED_KEYS {
            assert_eq!(record.get(key), Some(&json!("")));
        }
    }

    #[test]
    fn partial_sidecar_is_overlaid_on_defaults() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("test.meta.json"),
            r#"{"title": "foo", "fancy": [1, 2, 3]}"#,
        )
        .unwrap();

        let record = read(&tmp.path().join("test")).unwrap();
        assert_eq!(record.title(), "foo");
        assert_eq!(record.get("fancy"), Some(&json!([1, 2, 3])));
        assert_eq!(record.text("summary"), "");
    }

    #[test]
    fn malformed_sidecar_is_an_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("index.meta.json"), "{not json").unwrap();
        assert!(matches!(read(tmp.path()), Err(MetadataError::Parse { .. })));
        assert_eq!(read_or_default(tmp.path()), MetadataRecord::default());
    }

    #[test]
    fn non_object_sidecar_is_an_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("index.meta.json"), "[1, 2]").unwrap();
        assert!(matches!(read(tmp.path()), Err(MetadataError::NotAnObject(_))));
    }

    // =========================================================================
    // write()
    // =========================================================================

    #[test]
    fn write_then_read_preserves_every_key() {
        let tmp = TempDir::new().unwrap();
        let album = tmp.path().join("trip");
        fs::create_dir(&album).unwrap();

        let mut record = MetadataRecord::default();
        record.set("title", "Summer Trip");
        record.set("keywords", "beach sun");
        record.set("sort", "-meta.orderweight");
        record.set("createdate", 1_700_000_000.5);
        record.set("nested", json!({"a": [1, 2]}));
        write(&album, &record).unwrap();

        assert_eq!(read(&album).unwrap(), record);
    }

    #[test]
    fn write_fills_required_keys_on_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test");
        let mut fields = Map::new();
        fields.insert("fancy".into(), json!([1, 2, 3]));
        write(&path, &MetadataRecord::from(fields)).unwrap();

        let raw: Value =
            serde_json::from_str(&fs::read_to_string(tmp.path().join("test.meta.json")).unwrap())
                .unwrap();
        for key in REQUIRED_KEYS {
            assert_eq!(raw[key], json!(""));
        }
        assert_eq!(raw["fancy"], json!([1, 2, 3]));
    }

    #[test]
    fn write_replaces_wholesale() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("photo.jpg");

        let mut first = MetadataRecord::default();
        first.set("extra", "old");
        write(&path, &first).unwrap();

        let mut second = MetadataRecord::default();
        second.set("title", "new");
        write(&path, &second).unwrap();

        let record = read(&path).unwrap();
        assert_eq!(record.title(), "new");
        assert!(!record.contains("extra"));
    }

    #[test]
    fn write_into_missing_directory_fails_without_creating_it() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing").join("photo.jpg");
        assert!(write(&path, &MetadataRecord::default()).is_err());
        assert!(!tmp.path().join("missing").exists());
    }

    #[test]
    fn unicode_written_unescaped() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("photo.jpg");
        let mut record = MetadataRecord::default();
        record.set("title", "Pôle Sud");
        write(&path, &record).unwrap();
        let raw = fs::read_to_string(tmp.path().join("photo.meta.json")).unwrap();
        assert!(raw.contains("Pôle Sud"));
    }

    // =========================================================================
    // Field accessors
    // =========================================================================

    #[test]
    fn text_renders_scalars() {
        let mut record = MetadataRecord::default();
        record.set("weight", 10);
        record.set("flag", true);
        record.set("list", json!([1]));
        assert_eq!(record.text("weight"), "10");
        assert_eq!(record.text("flag"), "true");
        assert_eq!(record.text("list"), "");
        assert_eq!(record.text("absent"), "");
    }

    #[test]
    fn number_accepts_numeric_strings() {
        let mut record = MetadataRecord::default();
        record.set("createdate", "1700000000.25");
        record.set("moddate", 5);
        assert_eq!(record.number("createdate"), Some(1_700_000_000.25));
        assert_eq!(record.number("moddate"), Some(5.0));
        assert_eq!(record.number("title"), None);
    }

    #[test]
    fn removing_required_key_resets_it() {
        let mut record = MetadataRecord::default();
        record.set("title", "x");
        record.set("thumbnail", "thumbnails/x.jpg");
        record.remove("title");
        record.remove("thumbnail");
        assert_eq!(record.get("title"), Some(&json!("")));
        assert!(!record.contains("thumbnail"));
    }
}
