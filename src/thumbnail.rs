//! Thumbnail resolution and generation.
//!
//! ## Resolution
//!
//! The first rule that finds an existing file wins:
//!
//! 1. **Explicit**: the sidecar's `thumbnail` field. Relative values resolve
//!    against the album directory (albums) or the containing directory
//!    (media); values starting with `/` resolve against the source root.
//!    A value pointing at a missing file falls through to the next rules.
//! 2. **Album**: `<album>/thumbnails/thumb.jpg`, else the placeholder.
//! 3. **Image**: `thumbnails/<name>`, then `thumbnails/<stem>.jpg`, else the
//!    image itself.
//! 4. **Video / other**: `thumbnails/<stem>.jpg`, else the placeholder.
//!
//! Resolution never fails; the worst case is [`PLACEHOLDER_URL`].
//!
//! ## Generation
//!
//! The editor produces thumbnails with the `image` crate, scaled to fit
//! within [`THUMBNAIL_SIZE`] pixels square and written into the same
//! conventional locations the resolver looks in.

use crate::metadata::MetadataRecord;
use crate::paths;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Reserved directory holding thumbnails next to the media they belong to.
pub const THUMBNAILS_DIR: &str = "thumbnails";

/// Album thumbnail filename inside [`THUMBNAILS_DIR`].
pub const ALBUM_THUMBNAIL: &str = "thumb.jpg";

/// Static asset shown when nothing else resolves.
pub const PLACEHOLDER_URL: &str = "/static/echo/blank.gif";

/// Bounding box for generated thumbnails.
pub const THUMBNAIL_SIZE: u32 = 150;

/// What a thumbnail is being resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Album,
    Image,
    /// Videos and generic files.
    Other,
}

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Resolve the thumbnail URL for an album directory or media file.
pub fn resolve(root: &Path, path: &Path, subject: Subject, meta: &MetadataRecord) -> String {
    explicit(root, path, subject, meta)
        .or_else(|| conventional(root, path, subject))
        .unwrap_or_else(|| fallback(root, path, subject))
}

/// Rule 1: the sidecar's `thumbnail` field, if it names an existing file.
fn explicit(root: &Path, path: &Path, subject: Subject, meta: &MetadataRecord) -> Option<String> {
    let value = meta.text("thumbnail");
    if value.is_empty() {
        return None;
    }
    let candidate = explicit_path(root, path, subject, &value)?;
    if candidate.is_file() {
        paths::source_url(root, &candidate)
    } else {
        tracing::debug!(
            "explicit thumbnail {value:?} for {} not found, falling back",
            path.display()
        );
        None
    }
}

/// Filesystem location named by a sidecar `thumbnail` value.
///
/// A leading `/` is relative to the source root, anything else to the
/// album directory (albums) or the containing directory (media).
pub fn explicit_path(root: &Path, path: &Path, subject: Subject, value: &str) -> Option<PathBuf> {
    if let Some(absolute) = value.strip_prefix('/') {
        paths::safe_join(root, absolute)
    } else {
        let base = match subject {
            Subject::Album => path,
            Subject::Image | Subject::Other => path.parent()?,
        };
        paths::safe_join(base, value)
    }
}

/// Rules 2-4: the conventional `thumbnails/` locations.
fn conventional(root: &Path, path: &Path, subject: Subject) -> Option<String> {
    let candidates: Vec<PathBuf> = match subject {
        Subject::Album => vec![path.join(THUMBNAILS_DIR).join(ALBUM_THUMBNAIL)],
        Subject::Image => {
            let same_name = thumbnails_dir_for(path)?.join(path.file_name()?);
            let as_jpg = same_name.with_extension("jpg");
            vec![same_name, as_jpg]
        }
        Subject::Other => {
            vec![thumbnails_dir_for(path)?.join(path.file_name()?).with_extension("jpg")]
        }
    };
    candidates
        .into_iter()
        .find(|c| c.is_file())
        .and_then(|c| paths::source_url(root, &c))
}

/// Degraded forms: images show themselves, everything else the placeholder.
fn fallback(root: &Path, path: &Path, subject: Subject) -> String {
    let degraded = match subject {
        Subject::Image => paths::source_url(root, path),
        Subject::Album | Subject::Other => None,
    };
    degraded.unwrap_or_else(|| PLACEHOLDER_URL.to_string())
}

/// The `thumbnails/` directory beside a media file.
fn thumbnails_dir_for(path: &Path) -> Option<PathBuf> {
    path.parent().map(|p| p.join(THUMBNAILS_DIR))
}

/// Where the editor writes a generated thumbnail.
///
/// Albums get `thumbnails/thumb.jpg`; media get `thumbnails/<name>` beside
/// the file. Callers swap the extension to match an uploaded image.
pub fn generated_path(path: &Path, is_album: bool) -> Option<PathBuf> {
    if is_album {
        Some(path.join(THUMBNAILS_DIR).join(ALBUM_THUMBNAIL))
    } else {
        Some(thumbnails_dir_for(path)?.join(path.file_name()?))
    }
}

/// Scale `source` to fit within [`THUMBNAIL_SIZE`] and write it to `dest`.
///
/// `source` and `dest` may be the same file.
pub fn generate(source: &Path, dest: &Path) -> Result<(), ThumbnailError> {
    let img = image::open(source)?;
    let thumb = img.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE);

    let is_jpeg = dest
        .extension()
        .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false);
    // JPEG has no alpha channel
    let thumb = if is_jpeg {
        DynamicImage::ImageRgb8(thumb.to_rgb8())
    } else {
        thumb
    };

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    thumb.save(dest)?;
    Ok(())
}
