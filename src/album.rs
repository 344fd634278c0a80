//! Album and media resolution.
//!
//! Turns a directory or file under the source root into a view model:
//!
//! ```text
//! albums/trip/                    Album
//! ├── index.meta.json             ├── meta (sort spec, title, thumbnail, ...)
//! ├── thumbnails/                 │   (skipped)
//! ├── beach/                      ├── albums: [AlbumSummary]
//! ├── photo1.jpg + .meta.json     ├── images: [MediaItem]
//! ├── clip.mp4                    ├── videos: [MediaItem]
//! └── notes.pdf                   └── files:  [MediaItem]
//! ```
//!
//! Every view is rebuilt from the filesystem on each call and never mutated
//! afterwards. The same resolution serves the public gallery and the editor;
//! only the URL prefix changes, selected by [`LinkContext`].
//!
//! ## Titles
//!
//! An empty sidecar `title` displays as the directory or file name.
//!
//! ## Ordering
//!
//! The album's own `sort` field (see [`crate::sort`]) orders all four child
//! lists with the same comparator and direction.

use crate::config::GalleryConfig;
use crate::media::{Classifier, MediaKind, mime_type};
use crate::metadata::{self, MetadataRecord};
use crate::paths::{self, SOURCE_PREFIX};
use crate::sort::SortSpec;
use crate::thumbnail::{self, Subject, THUMBNAILS_DIR};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Dimensions reported for images that cannot be probed.
pub const FALLBACK_DIMENSIONS: Dimensions = Dimensions {
    width: 150,
    height: 150,
};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Path does not exist: {0}")]
    NotFound(PathBuf),
    #[error("Path is outside the source root: {0}")]
    OutsideRoot(PathBuf),
    #[error("Not an album directory: {0}")]
    NotAnAlbum(PathBuf),
}

/// Which visual context outbound links are built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkContext {
    /// Public gallery: albums under `/`, media straight to the raw source.
    Gallery,
    /// Editor: albums and media under `/edit`.
    Editor,
}

impl LinkContext {
    /// Prefix for album (and breadcrumb) links.
    pub fn prefix(self) -> &'static str {
        match self {
            LinkContext::Gallery => "/",
            LinkContext::Editor => "/edit",
        }
    }

    /// Prefix for media links.
    pub fn media_prefix(self) -> &'static str {
        match self {
            LinkContext::Gallery => SOURCE_PREFIX,
            LinkContext::Editor => "/edit",
        }
    }
}

/// What kind of entry a view represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Album,
    Image,
    Video,
    File,
}

impl From<MediaKind> for EntryKind {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Image => EntryKind::Image,
            MediaKind::Video => EntryKind::Video,
            MediaKind::File => EntryKind::File,
        }
    }
}

/// Capabilities shared by everything that can appear in an album listing.
pub trait Entry {
    /// Filesystem name (directory or file name).
    fn name(&self) -> &str;
    fn meta(&self) -> &MetadataRecord;
    /// Display title, already defaulted to the name.
    fn title(&self) -> &str;
    fn url(&self) -> &str;
    fn thumbnail(&self) -> &str;
    fn kind(&self) -> EntryKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// A child album as shown inside its parent.
#[derive(Debug, Clone, Serialize)]
pub struct AlbumSummary {
    pub name: String,
    /// Path relative to the source root.
    pub path: String,
    pub url: String,
    /// Parent album URL with a fragment pointing at this entry.
    pub album_url: String,
    pub src: String,
    pub title: String,
    pub meta: MetadataRecord,
    pub thumbnail: String,
}

/// One media file.
#[derive(Debug, Clone, Serialize)]
pub struct MediaItem {
    pub name: String,
    pub path: String,
    pub url: String,
    pub album_url: String,
    /// Raw source URL.
    pub src: String,
    pub kind: MediaKind,
    pub mime: String,
    pub title: String,
    pub meta: MetadataRecord,
    pub thumbnail: String,
    /// Pixel size, images only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

/// A fully resolved album directory.
#[derive(Debug, Clone, Serialize)]
pub struct Album {
    pub name: String,
    pub path: String,
    pub url: String,
    pub title: String,
    pub meta: MetadataRecord,
    pub sort: SortSpec,
    pub thumbnail: String,
    pub albums: Vec<AlbumSummary>,
    pub images: Vec<MediaItem>,
    pub videos: Vec<MediaItem>,
    pub files: Vec<MediaItem>,
}

impl Album {
    /// True when the album has no children besides thumbnails and sidecars.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.albums.len() + self.images.len() + self.videos.len() + self.files.len()
    }
}

/// Either kind of listing entry, for mixed lists such as search results.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Item {
    Album(AlbumSummary),
    Media(MediaItem),
}

/// Result of resolving an arbitrary path.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Resolved {
    Album(Album),
    Media(MediaItem),
}

/// One breadcrumb link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Crumb {
    pub url: String,
    pub title: String,
}

impl Entry for AlbumSummary {
    fn name(&self) -> &str {
        &self.name
    }
    fn meta(&self) -> &MetadataRecord {
        &self.meta
    }
    fn title(&self) -> &str {
        &self.title
    }
    fn url(&self) -> &str {
        &self.url
    }
    fn thumbnail(&self) -> &str {
        &self.thumbnail
    }
    fn kind(&self) -> EntryKind {
        EntryKind::Album
    }
}

impl Entry for MediaItem {
    fn name(&self) -> &str {
        &self.name
    }
    fn meta(&self) -> &MetadataRecord {
        &self.meta
    }
    fn title(&self) -> &str {
        &self.title
    }
    fn url(&self) -> &str {
        &self.url
    }
    fn thumbnail(&self) -> &str {
        &self.thumbnail
    }
    fn kind(&self) -> EntryKind {
        self.kind.into()
    }
}

impl Entry for Item {
    fn name(&self) -> &str {
        match self {
            Item::Album(a) => a.name(),
            Item::Media(m) => m.name(),
        }
    }
    fn meta(&self) -> &MetadataRecord {
        match self {
            Item::Album(a) => a.meta(),
            Item::Media(m) => m.meta(),
        }
    }
    fn title(&self) -> &str {
        match self {
            Item::Album(a) => a.title(),
            Item::Media(m) => m.title(),
        }
    }
    fn url(&self) -> &str {
        match self {
            Item::Album(a) => a.url(),
            Item::Media(m) => m.url(),
        }
    }
    fn thumbnail(&self) -> &str {
        match self {
            Item::Album(a) => a.thumbnail(),
            Item::Media(m) => m.thumbnail(),
        }
    }
    fn kind(&self) -> EntryKind {
        match self {
            Item::Album(a) => a.kind(),
            Item::Media(m) => m.kind(),
        }
    }
}

/// Is this directory entry excluded from album listings?
pub fn is_reserved(name: &str) -> bool {
    name == THUMBNAILS_DIR || metadata::is_sidecar(name)
}

/// Display title: the sidecar title, or the filesystem name when empty.
fn display_title(meta: &MetadataRecord, name: &str) -> String {
    let title = meta.title();
    if title.trim().is_empty() {
        name.to_string()
    } else {
        title
    }
}

/// Pixel size of an image, or [`FALLBACK_DIMENSIONS`] if it can't be decoded.
pub fn probe_dimensions(path: &Path) -> Dimensions {
    match image::image_dimensions(path) {
        Ok((width, height)) => Dimensions { width, height },
        Err(e) => {
            tracing::info!("cannot get size of image at {}: {e}", path.display());
            FALLBACK_DIMENSIONS
        }
    }
}

/// Resolver bound to one source root and classifier.
#[derive(Debug, Clone)]
pub struct Gallery {
    root: PathBuf,
    classifier: Classifier,
}

impl Gallery {
    pub fn new(root: impl Into<PathBuf>, classifier: Classifier) -> Self {
        Self {
            root: root.into(),
            classifier,
        }
    }

    pub fn from_config(config: &GalleryConfig) -> Self {
        Self::new(&config.source, Classifier::new(&config.media))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Map a `/`-separated request path to a filesystem path under the root.
    pub fn locate(&self, rel: &str) -> Option<PathBuf> {
        paths::safe_join(&self.root, rel)
    }

    /// Path relative to the root, or [`ResolveError::OutsideRoot`].
    pub fn relative(&self, path: &Path) -> Result<String, ResolveError> {
        paths::relative(&self.root, path).ok_or_else(|| ResolveError::OutsideRoot(path.to_path_buf()))
    }

    /// Resolve a request path to an album or media item.
    pub fn resolve(&self, rel: &str, context: LinkContext) -> Result<Resolved, ResolveError> {
        let path = self
            .locate(rel)
            .ok_or_else(|| ResolveError::OutsideRoot(PathBuf::from(rel)))?;
        if path.is_dir() {
            Ok(Resolved::Album(self.resolve_album(&path, context)?))
        } else if path.exists() {
            Ok(Resolved::Media(self.resolve_media(&path, context)?))
        } else {
            Err(ResolveError::NotFound(path))
        }
    }

    /// Resolve an album directory with all of its children.
    pub fn resolve_album(&self, path: &Path, context: LinkContext) -> Result<Album, ResolveError> {
        tracing::info!("reading album {}", path.display());
        if !path.exists() {
            return Err(ResolveError::NotFound(path.to_path_buf()));
        }
        if !path.is_dir() {
            return Err(ResolveError::NotAnAlbum(path.to_path_buf()));
        }
        let rel = self.relative(path)?;
        let name = paths::file_name(path);
        let meta = metadata::read_or_default(path);

        let mut albums = Vec::new();
        let mut images = Vec::new();
        let mut videos = Vec::new();
        let mut files = Vec::new();

        // Children can vanish or dangle between listing and resolution;
        // those are skipped so the rest of the album still renders.
        for entry in fs::read_dir(path)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("skipping unreadable entry in {}: {e}", path.display());
                    continue;
                }
            };
            let child_name = entry.file_name().to_string_lossy().into_owned();
            if is_reserved(&child_name) {
                continue;
            }
            let child = entry.path();
            if child.is_dir() {
                match self.album_summary(&child, context) {
                    Ok(summary) => albums.push(summary),
                    Err(e) => tracing::warn!("skipping {}: {e}", child.display()),
                }
            } else {
                let media = match self.resolve_media(&child, context) {
                    Ok(media) => media,
                    Err(e) => {
                        tracing::warn!("skipping {}: {e}", child.display());
                        continue;
                    }
                };
                match media.kind {
                    MediaKind::Image => images.push(media),
                    MediaKind::Video => videos.push(media),
                    MediaKind::File => files.push(media),
                }
            }
        }

        let sort = SortSpec::from_meta(&meta.text("sort"));
        tracing::info!("sort {} by {sort}", path.display());
        sort.apply(&mut albums);
        sort.apply(&mut images);
        sort.apply(&mut videos);
        sort.apply(&mut files);

        let thumbnail = thumbnail::resolve(&self.root, path, Subject::Album, &meta);

        Ok(Album {
            title: display_title(&meta, &name),
            url: paths::join_url(context.prefix(), &rel),
            name,
            path: rel,
            meta,
            sort,
            thumbnail,
            albums,
            images,
            videos,
            files,
        })
    }

    /// Resolve a directory as it appears inside its parent's listing.
    pub fn album_summary(&self, path: &Path, context: LinkContext) -> Result<AlbumSummary, ResolveError> {
        let rel = self.relative(path)?;
        let name = paths::file_name(path);
        let meta = metadata::read_or_default(path);
        tracing::debug!("meta for {name} = {meta:?}");

        Ok(AlbumSummary {
            url: paths::join_url(context.prefix(), &rel),
            album_url: self.album_url(path, &name, context)?,
            src: paths::join_url(SOURCE_PREFIX, &rel),
            title: display_title(&meta, &name),
            thumbnail: thumbnail::resolve(&self.root, path, Subject::Album, &meta),
            name,
            path: rel,
            meta,
        })
    }

    /// Resolve a single media file.
    pub fn resolve_media(&self, path: &Path, context: LinkContext) -> Result<MediaItem, ResolveError> {
        tracing::debug!("reading media {}", path.display());
        if !path.exists() {
            return Err(ResolveError::NotFound(path.to_path_buf()));
        }
        let rel = self.relative(path)?;
        let name = paths::file_name(path);
        let meta = metadata::read_or_default(path);
        let kind = self.classifier.classify(path);

        let subject = match kind {
            MediaKind::Image => Subject::Image,
            MediaKind::Video | MediaKind::File => Subject::Other,
        };
        let dimensions = (kind == MediaKind::Image).then(|| probe_dimensions(path));

        Ok(MediaItem {
            url: paths::join_url(context.media_prefix(), &rel),
            album_url: self.album_url(path, &name, context)?,
            src: paths::join_url(SOURCE_PREFIX, &rel),
            mime: mime_type(path).to_string(),
            title: display_title(&meta, &name),
            thumbnail: thumbnail::resolve(&self.root, path, subject, &meta),
            kind,
            dimensions,
            name,
            path: rel,
            meta,
        })
    }

    /// Resolve any entry as a listing item.
    pub fn item(&self, path: &Path, context: LinkContext) -> Result<Item, ResolveError> {
        if path.is_dir() {
            Ok(Item::Album(self.album_summary(path, context)?))
        } else {
            Ok(Item::Media(self.resolve_media(path, context)?))
        }
    }

    fn album_url(&self, path: &Path, name: &str, context: LinkContext) -> Result<String, ResolveError> {
        let parent = path.parent().unwrap_or(&self.root);
        let parent_rel = paths::relative(&self.root, parent).unwrap_or_default();
        Ok(format!("{}#{name}", paths::join_url(context.prefix(), &parent_rel)))
    }

    /// Links from the top of the tree down to `path`, excluding the root.
    pub fn breadcrumbs(&self, path: &Path, context: LinkContext) -> Result<Vec<Crumb>, ResolveError> {
        let rel = self.relative(path)?;
        if rel.is_empty() {
            return Ok(Vec::new());
        }
        let mut crumbs = Vec::new();
        let mut current = self.root.clone();
        let mut current_rel = String::new();
        for segment in rel.split('/') {
            current.push(segment);
            if !current_rel.is_empty() {
                current_rel.push('/');
            }
            current_rel.push_str(segment);
            let meta = metadata::read_or_default(&current);
            crumbs.push(Crumb {
                url: paths::join_url(context.prefix(), &current_rel),
                title: display_title(&meta, segment),
            });
        }
        Ok(crumbs)
    }
}
