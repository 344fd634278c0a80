//! Flat search documents projected from albums and media files.

use crate::media::{Classifier, MediaKind};
use crate::metadata::{self, MetadataRecord};
use crate::paths;
use crate::thumbnail::THUMBNAILS_DIR;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use walkdir::WalkDir;

use super::SearchError;

/// Display format for the `date` field.
pub const DATE_FORMAT: &str = "%A %d %B %Y %I:%M:%S %p";

/// Value of the document `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    Album,
    Image,
    Video,
    #[serde(rename = "Other Media")]
    OtherMedia,
}

impl DocumentType {
    pub fn label(self) -> &'static str {
        match self {
            DocumentType::Album => "Album",
            DocumentType::Image => "Image",
            DocumentType::Video => "Video",
            DocumentType::OtherMedia => "Other Media",
        }
    }
}

impl From<MediaKind> for DocumentType {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Image => DocumentType::Image,
            MediaKind::Video => DocumentType::Video,
            MediaKind::File => DocumentType::OtherMedia,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One indexed album or media file.
///
/// Text fields are omitted when empty. The identifier is not part of the
/// stored source; it travels beside it as the engine's document id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    #[serde(skip)]
    pub id: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub createdate: Option<DocumentDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moddate: Option<DocumentDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "type")]
    pub kind: DocumentType,
}

/// Stable document id for a root-relative path: SHA-256 hex.
pub fn document_id(rel: &str) -> String {
    format!("{:x}", Sha256::digest(rel.as_bytes()))
}

fn non_empty(meta: &MetadataRecord, key: &str) -> Option<String> {
    let value = meta.text(key);
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// A `createdate`/`moddate` value in one of the two forms the index
/// mapping accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentDate {
    /// Seconds since the Unix epoch.
    Epoch(f64),
    /// RFC 3339 timestamp in UTC.
    Iso(String),
}

impl DocumentDate {
    /// Parse a sidecar value: numbers and numeric strings are epoch seconds,
    /// other strings are RFC 3339, `YYYY-MM-DD[THH:MM:SS]` (read as UTC) or
    /// rejected.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().map(DocumentDate::Epoch),
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return None;
                }
                if let Ok(secs) = s.parse::<f64>() {
                    return Some(DocumentDate::Epoch(secs));
                }
                parse_iso(s).map(|dt| DocumentDate::Iso(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
            }
            _ => None,
        }
    }

    /// Rendered for display with [`DATE_FORMAT`], in UTC.
    pub fn display(&self) -> Option<String> {
        self.instant().map(|dt| dt.format(DATE_FORMAT).to_string())
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            DocumentDate::Epoch(secs) => from_epoch(*secs),
            DocumentDate::Iso(s) => parse_iso(s),
        }
    }
}

fn from_epoch(epoch_seconds: f64) -> Option<DateTime<Utc>> {
    if !epoch_seconds.is_finite() {
        return None;
    }
    let secs = epoch_seconds.floor();
    let nanos = ((epoch_seconds - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
}

fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Read a date field, logging values that are neither epoch nor ISO.
fn date_field(meta: &MetadataRecord, key: &str) -> Option<DocumentDate> {
    let value = meta.get(key)?;
    let parsed = DocumentDate::from_value(value);
    if parsed.is_none() && !matches!(value, Value::Null) && value.as_str().is_none_or(|s| !s.trim().is_empty()) {
        tracing::warn!("ignoring unparseable {key} {value}");
    }
    parsed
}

impl SearchDocument {
    /// Project the album directory or media file at `path`.
    ///
    /// Sidecar problems are logged and the defaults indexed.
    pub fn from_path(root: &Path, path: &Path, classifier: &Classifier) -> Result<Self, SearchError> {
        let rel = paths::relative(root, path).ok_or_else(|| SearchError::OutsideRoot(path.to_path_buf()))?;
        let meta = metadata::read_or_default(path);
        let kind = if path.is_dir() {
            DocumentType::Album
        } else {
            classifier.classify(path).into()
        };
        Ok(Self::from_record(rel, &meta, kind))
    }

    pub fn from_record(rel: String, meta: &MetadataRecord, kind: DocumentType) -> Self {
        let createdate = date_field(meta, "createdate");
        Self {
            id: document_id(&rel),
            path: rel,
            title: non_empty(meta, "title"),
            keywords: non_empty(meta, "keywords"),
            summary: non_empty(meta, "summary"),
            description: non_empty(meta, "description"),
            user: non_empty(meta, "user"),
            date: createdate.as_ref().and_then(DocumentDate::display),
            createdate,
            moddate: date_field(meta, "moddate"),
            kind,
        }
    }

    /// Text of a searchable field by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "path" => Some(&self.path),
            "title" => self.title.as_deref(),
            "keywords" => self.keywords.as_deref(),
            "summary" => self.summary.as_deref(),
            "description" => self.description.as_deref(),
            "date" => self.date.as_deref(),
            "type" => Some(self.kind.label()),
            _ => None,
        }
    }
}

/// Every indexable path under `root`, parents before children.
///
/// Skips the root itself, `thumbnails/` directories and sidecar files.
/// Unreadable entries are logged and skipped.
pub fn walk_tree(root: &Path) -> impl Iterator<Item = walkdir::Result<walkdir::DirEntry>> {
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && e.file_name() == THUMBNAILS_DIR))
        .filter(|e| match e {
            Ok(entry) => !(entry.file_type().is_file() && metadata::is_sidecar(&entry.file_name().to_string_lossy())),
            Err(_) => true,
        })
}
