//! Media type classification.
//!
//! Maps a file extension to a semantic kind (image, video, generic file)
//! using the configured allow-lists, and to a MIME type using a fixed table.
//! Comparison is case-insensitive; a file with no extension is always a
//! generic file.

use crate::config::MediaConfig;
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Semantic kind of a media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    File,
}

impl MediaKind {
    /// Label used for the search document `type` field.
    pub fn search_label(self) -> &'static str {
        match self {
            MediaKind::Image => "Image",
            MediaKind::Video => "Video",
            MediaKind::File => "Other Media",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::File => "file",
        })
    }
}

const MIME_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("png", "image/png"),
    ("avi", "video/x-msvideo"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("ogv", "video/ogg"),
    ("3gp", "video/3gpp"),
];

const DEFAULT_MIME: &str = "application/octet-stream";

/// Lower-cased extension without the dot, if any.
fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| !e.is_empty())
}

/// Extension-based classifier built from [`MediaConfig`].
#[derive(Debug, Clone)]
pub struct Classifier {
    images: Vec<String>,
    videos: Vec<String>,
}

impl Classifier {
    pub fn new(config: &MediaConfig) -> Self {
        let normalize = |exts: &[String]| -> Vec<String> {
            exts.iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect()
        };
        Self {
            images: normalize(&config.image_extensions),
            videos: normalize(&config.video_extensions),
        }
    }

    pub fn classify(&self, path: &Path) -> MediaKind {
        let Some(ext) = extension(path) else {
            return MediaKind::File;
        };
        if self.images.contains(&ext) {
            MediaKind::Image
        } else if self.videos.contains(&ext) {
            MediaKind::Video
        } else {
            MediaKind::File
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&MediaConfig::default())
    }
}

/// MIME type from the static extension table.
pub fn mime_type(path: &Path) -> &'static str {
    extension(path)
        .and_then(|ext| {
            MIME_TYPES
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, mime)| *mime)
        })
        .unwrap_or(DEFAULT_MIME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        let c = Classifier::default();
        assert_eq!(c.classify(Path::new("a/photo.jpg")), MediaKind::Image);
        assert_eq!(c.classify(Path::new("clip.webm")), MediaKind::Video);
        assert_eq!(c.classify(Path::new("notes.pdf")), MediaKind::File);
    }

    #[test]
    fn classification_is_case_insensitive() {
        let c = Classifier::default();
        assert_eq!(c.classify(Path::new("PHOTO.JPG")), MediaKind::Image);
        assert_eq!(c.classify(Path::new("Clip.Mp4")), MediaKind::Video);
    }

    #[test]
    fn no_extension_is_file() {
        let c = Classifier::default();
        assert_eq!(c.classify(Path::new("README")), MediaKind::File);
        assert_eq!(c.classify(Path::new("trailing.")), MediaKind::File);
    }

    #[test]
    fn configured_extensions_are_normalized() {
        let c = Classifier::new(&MediaConfig {
            image_extensions: vec![".TIFF".into()],
            video_extensions: vec![],
        });
        assert_eq!(c.classify(Path::new("scan.tiff")), MediaKind::Image);
        assert_eq!(c.classify(Path::new("photo.jpg")), MediaKind::File);
    }

    #[test]
    fn mime_known_and_unknown() {
        assert_eq!(mime_type(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(mime_type(Path::new("a.OGV")), "video/ogg");
        assert_eq!(mime_type(Path::new("a.tar.gz")), DEFAULT_MIME);
        assert_eq!(mime_type(Path::new("Makefile")), DEFAULT_MIME);
    }

    #[test]
    fn search_labels() {
        assert_eq!(MediaKind::Image.search_label(), "Image");
        assert_eq!(MediaKind::File.search_label(), "Other Media");
    }
}
