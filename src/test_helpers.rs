//! Shared test utilities for the gallery test suite.
//!
//! Provides a fixture source tree, filesystem builders, and lookup helpers
//! that work with resolved views (`Album`, `AlbumSummary`, `MediaItem`).
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let gallery = gallery_for(tmp.path());
//! let album = gallery.resolve_album(&tmp.path().join("trip"), LinkContext::Gallery).unwrap();
//!
//! let image = find_image(&album, "photo2.jpg");
//! assert_eq!(image.title, "Second");
//! assert_eq!(image_names(&album), vec!["photo1.jpg", "photo2.jpg", "photo10.jpg"]);
//! ```

use image::{Rgb, RgbImage};
use std::path::Path;
use tempfile::TempDir;

use crate::album::{Album, AlbumSummary, Gallery, MediaItem};
use crate::media::Classifier;
use crate::metadata::{self, MetadataRecord};

// =========================================================================
// Fixture setup
// =========================================================================

/// Build a small source tree in a temp directory and return it.
///
/// ```text
/// trip/                 title "Summer Trip", sorted by filename
/// ├── photo1.jpg        real image, title "First"
/// ├── photo2.jpg        real image, title "Second", keywords "beach"
/// ├── photo10.jpg       real image
/// ├── clip.mp4
/// ├── notes.pdf
/// └── beach/            empty album
/// empty/                empty album
/// ```
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let trip = tmp.path().join("trip");

    for name in ["photo1.jpg", "photo2.jpg", "photo10.jpg"] {
        tiny_png(&trip.join(name), 8, 6);
    }
    touch(&trip.join("clip.mp4"));
    touch(&trip.join("notes.pdf"));
    std::fs::create_dir_all(trip.join("beach")).unwrap();
    std::fs::create_dir_all(tmp.path().join("empty")).unwrap();

    write_meta(&trip, &[("title", "Summer Trip"), ("sort", "filename")]);
    write_meta(&trip.join("photo1.jpg"), &[("title", "First")]);
    write_meta(
        &trip.join("photo2.jpg"),
        &[("title", "Second"), ("keywords", "beach")],
    );
    tmp
}

/// Resolver over `root` with the default classifier.
pub fn gallery_for(root: &Path) -> Gallery {
    Gallery::new(root, Classifier::default())
}

// =========================================================================
// Filesystem builders
// =========================================================================

/// Create an empty file, creating parent directories as needed.
pub fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"").unwrap();
}

/// Write a real decodable image of the given size.
///
/// The encoding follows the extension, so `.jpg` paths get JPEG data.
pub fn tiny_png(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_pixel(width, height, Rgb([200, 120, 40]));
    img.save(path).unwrap();
}

/// Replace the sidecar for `path` with the given string fields.
pub fn write_meta(path: &Path, fields: &[(&str, &str)]) {
    let mut record = MetadataRecord::default();
    for (key, value) in fields {
        record.set(*key, *value);
    }
    metadata::write(path, &record).unwrap();
}

// =========================================================================
// Album lookups (panic with the available names on a miss)
// =========================================================================

/// Find an image by file name. Panics if not found.
pub fn find_image<'a>(album: &'a Album, name: &str) -> &'a MediaItem {
    album
        .images
        .iter()
        .find(|i| i.name == name)
        .unwrap_or_else(|| {
            let names = image_names(album);
            panic!("image '{name}' not found in album '{}'. Available: {names:?}", album.title)
        })
}

/// Find a child album by directory name. Panics if not found.
pub fn find_album<'a>(album: &'a Album, name: &str) -> &'a AlbumSummary {
    album
        .albums
        .iter()
        .find(|a| a.name == name)
        .unwrap_or_else(|| {
            let names: Vec<&str> = album.albums.iter().map(|a| a.name.as_str()).collect();
            panic!("album '{name}' not found in '{}'. Available: {names:?}", album.title)
        })
}

// =========================================================================
// Bulk extractors
// =========================================================================

/// Image file names in listing order.
pub fn image_names(album: &Album) -> Vec<&str> {
    album.images.iter().map(|i| i.name.as_str()).collect()
}

/// Every child name across all four lists, albums first.
pub fn all_names(album: &Album) -> Vec<&str> {
    album
        .albums
        .iter()
        .map(|a| a.name.as_str())
        .chain(album.images.iter().map(|i| i.name.as_str()))
        .chain(album.videos.iter().map(|i| i.name.as_str()))
        .chain(album.files.iter().map(|i| i.name.as_str()))
        .collect()
}
