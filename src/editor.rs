//! Editing operations behind the `/edit` pages.
//!
//! Every operation follows the same shape:
//!
//! 1. change the filesystem (media file, sidecar, thumbnail)
//! 2. upsert or remove the search document for the changed entry
//! 3. delete the cached pages that show it
//!
//! Steps 2 and 3 are best effort: failures are logged and never fail the
//! edit, since the filesystem is the source of truth and the next rebuild
//! or render repairs them.
//!
//! ## Thumbnails
//!
//! An uploaded thumbnail is written beside the entry in `thumbnails/` (as
//! `thumb.<ext>` for albums, `<name>` with the upload's extension for media)
//! and scaled in place. Without an upload, an entry that has no thumbnail yet
//! gets one generated: media from the image itself, albums from their first
//! image in natural order. The sidecar's `thumbnail` field records the
//! result relative to the entry's directory, and a previous thumbnail file
//! with a different name is removed.

use crate::album::{Gallery, LinkContext, ResolveError};
use crate::cache::{self, PageCache};
use crate::media::MediaKind;
use crate::metadata::{self, MetadataError, MetadataRecord};
use crate::natsort::NaturalKey;
use crate::paths;
use crate::search::Indexer;
use crate::sort::{SortBasis, SortSpec};
use crate::thumbnail::{self, Subject, THUMBNAILS_DIR};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("Cannot delete non-empty album: {0}")]
    AlbumNotEmpty(PathBuf),
    #[error("Cannot delete the root album")]
    RootAlbum,
    #[error("Not an album directory: {0}")]
    NotAnAlbum(PathBuf),
    #[error("Not a media file: {0}")]
    NotAMedia(PathBuf),
    #[error("Invalid name: {0:?}")]
    InvalidName(String),
    #[error("Already exists: {0}")]
    AlreadyExists(PathBuf),
}

/// An uploaded file.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Form fields of the album edit page.
#[derive(Debug, Clone, Default)]
pub struct AlbumUpdate {
    pub title: String,
    pub summary: String,
    pub keywords: String,
    pub description: String,
    pub sort: String,
    pub sort_reverse: bool,
    pub thumbnail: Option<Upload>,
    /// `(child name, weight)` pairs, applied when sorting by `meta.orderweight`.
    pub orderweights: Vec<(String, String)>,
}

/// Form fields of the media edit page.
#[derive(Debug, Clone, Default)]
pub struct MediaUpdate {
    pub title: String,
    pub summary: String,
    pub keywords: String,
    pub description: String,
    pub thumbnail: Option<Upload>,
}

/// Make a user-supplied name safe for the filesystem: spaces become `-`,
/// and only alphanumerics and `-_.` are kept.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == ' ' { '-' } else { c })
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect()
}

fn valid_entry_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name != THUMBNAILS_DIR
        && !metadata::is_sidecar(name)
}

fn now_epoch() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

async fn generate_thumbnail(source: PathBuf, dest: PathBuf) -> bool {
    let label = dest.display().to_string();
    match tokio::task::spawn_blocking(move || thumbnail::generate(&source, &dest)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!("cannot make thumbnail {label}: {e}");
            false
        }
        Err(e) => {
            tracing::warn!("thumbnail task for {label} failed: {e}");
            false
        }
    }
}

/// Applies edits to the source tree and keeps search and cache in step.
#[derive(Clone)]
pub struct Editor {
    gallery: Gallery,
    cache: Arc<dyn PageCache>,
    indexer: Indexer,
}

impl Editor {
    pub fn new(gallery: Gallery, cache: Arc<dyn PageCache>, indexer: Indexer) -> Self {
        Self {
            gallery,
            cache,
            indexer,
        }
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    /// Replace an album's descriptive fields, sort order and thumbnail.
    pub async fn update_album(&self, path: &Path, update: AlbumUpdate) -> Result<MetadataRecord, EditorError> {
        if !path.is_dir() {
            return Err(EditorError::NotAnAlbum(path.to_path_buf()));
        }
        self.gallery.relative(path)?;

        let mut meta = metadata::read(path)?;
        meta.set("title", update.title);
        meta.set("summary", update.summary);
        meta.set("keywords", update.keywords);
        meta.set("description", update.description);
        let sort = if update.sort_reverse {
            format!("-{}", update.sort.trim_start_matches('-'))
        } else {
            update.sort
        };
        meta.set("sort", sort.as_str());

        let previous = non_empty_text(&meta, "thumbnail");
        if let Some(thumb) = self.handle_thumbnail(path, true, update.thumbnail.as_ref(), previous).await {
            tracing::info!("set thumbnail: {thumb}");
            meta.set("thumbnail", thumb);
        }
        metadata::write(path, &meta)?;

        if SortSpec::from_meta(&sort).basis == SortBasis::Meta("orderweight".into()) {
            for (name, weight) in &update.orderweights {
                let Some(child) = paths::safe_join(path, name).filter(|c| c.exists()) else {
                    tracing::warn!("ignoring orderweight for unknown entry {name:?}");
                    continue;
                };
                let mut child_meta = metadata::read_or_default(&child);
                child_meta.set("orderweight", weight.as_str());
                metadata::write(&child, &child_meta)?;
            }
        }

        self.reindex(path).await;
        self.invalidate(path).await;
        self.invalidate_parent(path).await;
        Ok(meta)
    }

    /// Replace a media file's descriptive fields and thumbnail.
    pub async fn update_media(&self, path: &Path, update: MediaUpdate) -> Result<MetadataRecord, EditorError> {
        if !path.is_file() {
            return Err(EditorError::NotAMedia(path.to_path_buf()));
        }
        self.gallery.relative(path)?;

        let mut meta = metadata::read(path)?;
        meta.set("title", update.title);
        meta.set("summary", update.summary);
        meta.set("keywords", update.keywords);
        meta.set("description", update.description);

        let previous = non_empty_text(&meta, "thumbnail");
        if let Some(thumb) = self.handle_thumbnail(path, false, update.thumbnail.as_ref(), previous).await {
            tracing::info!("set thumbnail: {thumb}");
            meta.set("thumbnail", thumb);
        }
        metadata::write(path, &meta)?;

        self.reindex(path).await;
        self.invalidate_parent(path).await;
        Ok(meta)
    }

    /// Delete an empty album. Returns the parent directory.
    pub async fn delete_album(&self, path: &Path) -> Result<PathBuf, EditorError> {
        if self.gallery.relative(path)?.is_empty() {
            return Err(EditorError::RootAlbum);
        }
        let album = self.gallery.resolve_album(path, LinkContext::Editor)?;
        if !album.is_empty() {
            return Err(EditorError::AlbumNotEmpty(path.to_path_buf()));
        }
        tracing::info!("deleting {}", path.display());
        std::fs::remove_dir_all(path)?;

        self.unindex(path).await;
        self.invalidate(path).await;
        self.invalidate_parent(path).await;
        Ok(path.parent().unwrap_or(self.gallery.root()).to_path_buf())
    }

    /// Delete a media file with its sidecar and explicit thumbnail. Returns
    /// the containing directory.
    pub async fn delete_media(&self, path: &Path) -> Result<PathBuf, EditorError> {
        if !path.is_file() {
            return Err(EditorError::NotAMedia(path.to_path_buf()));
        }
        self.gallery.relative(path)?;
        let meta = metadata::read_or_default(path);
        let sidecar = metadata::sidecar_path(path);
        let parent = path.parent().unwrap_or(self.gallery.root()).to_path_buf();

        tracing::info!("deleting {}", path.display());
        std::fs::remove_file(path)?;
        if sidecar.is_file() {
            std::fs::remove_file(&sidecar)?;
        }
        let subject = match self.gallery.classifier().classify(path) {
            MediaKind::Image => Subject::Image,
            MediaKind::Video | MediaKind::File => Subject::Other,
        };
        if let Some(thumb) = non_empty_text(&meta, "thumbnail")
            && let Some(thumb_path) = thumbnail::explicit_path(self.gallery.root(), path, subject, &thumb)
            && thumb_path.is_file()
        {
            std::fs::remove_file(&thumb_path)?;
        }

        self.unindex(path).await;
        self.invalidate_parent(path).await;
        Ok(parent)
    }

    /// Create a sub-album named after `name`. Returns its path.
    pub async fn create_album(
        &self,
        parent: &Path,
        name: &str,
        user: Option<&str>,
        thumbnail: Option<Upload>,
    ) -> Result<PathBuf, EditorError> {
        if !parent.is_dir() {
            return Err(EditorError::NotAnAlbum(parent.to_path_buf()));
        }
        self.gallery.relative(parent)?;
        let dir_name = sanitize_name(name);
        if !valid_entry_name(&dir_name) {
            return Err(EditorError::InvalidName(name.to_string()));
        }
        let path = parent.join(&dir_name);
        if path.exists() {
            return Err(EditorError::AlreadyExists(path));
        }
        tracing::info!("new sub-album {}", path.display());
        std::fs::create_dir(&path)?;

        let mut meta = MetadataRecord::default();
        meta.set("title", name);
        if let Some(user) = user {
            meta.set("user", user);
        }
        meta.set("createdate", now_epoch());
        if let Some(thumb) = self.handle_thumbnail(&path, true, thumbnail.as_ref(), None).await {
            meta.set("thumbnail", thumb);
        }
        metadata::write(&path, &meta)?;

        self.reindex(&path).await;
        self.invalidate(parent).await;
        Ok(path)
    }

    /// Store an uploaded file in `album`. An existing file of the same name
    /// is replaced. Returns the stored path.
    pub async fn upload_media(
        &self,
        album: &Path,
        upload: Upload,
        user: Option<&str>,
    ) -> Result<PathBuf, EditorError> {
        if !album.is_dir() {
            return Err(EditorError::NotAnAlbum(album.to_path_buf()));
        }
        self.gallery.relative(album)?;
        let file_name = sanitize_name(&upload.filename);
        if !valid_entry_name(&file_name) {
            return Err(EditorError::InvalidName(upload.filename));
        }
        let path = album.join(&file_name);
        tracing::info!("upload {} ({} bytes)", path.display(), upload.bytes.len());
        tokio::fs::write(&path, &upload.bytes).await?;

        let mut meta = metadata::read_or_default(&path);
        meta.set("title", upload.filename.as_str());
        if let Some(user) = user {
            meta.set("user", user);
        }
        meta.set("createdate", now_epoch());
        if let Some(thumb) = self.handle_thumbnail(&path, false, None, None).await {
            meta.set("thumbnail", thumb);
        }
        metadata::write(&path, &meta)?;

        self.reindex(&path).await;
        self.invalidate(album).await;
        Ok(path)
    }

    /// Store or generate a thumbnail. Returns the new sidecar value, or
    /// `None` to leave the sidecar unchanged.
    async fn handle_thumbnail(
        &self,
        path: &Path,
        is_album: bool,
        upload: Option<&Upload>,
        previous: Option<String>,
    ) -> Option<String> {
        let mut dest = thumbnail::generated_path(path, is_album)?;
        let base = dest.parent()?.parent()?.to_path_buf();

        if let Some(upload) = upload {
            tracing::info!("thumbnail upload: {:?}", upload.filename);
            if let Some(ext) = Path::new(&upload.filename).extension() {
                dest.set_extension(ext);
            }
            if let Err(e) = write_thumbnail_upload(&dest, &upload.bytes).await {
                tracing::warn!("cannot store thumbnail {}: {e}", dest.display());
                return None;
            }
            if !generate_thumbnail(dest.clone(), dest.clone()).await {
                return None;
            }
        } else {
            if previous.is_some() {
                return None;
            }
            let source = if is_album {
                tracing::info!("auto thumbnail for dir");
                self.first_image(path)?
            } else if self.gallery.classifier().classify(path) == MediaKind::Image {
                tracing::info!("auto thumbnail for media");
                path.to_path_buf()
            } else {
                return None;
            };
            if !generate_thumbnail(source, dest.clone()).await {
                return None;
            }
        }

        let value = format!("{THUMBNAILS_DIR}/{}", paths::file_name(&dest));
        if let Some(previous) = previous
            && previous != value
            && let Some(old) = paths::safe_join(&base, &previous)
            && old.is_file()
        {
            if let Err(e) = std::fs::remove_file(&old) {
                tracing::warn!("cannot remove old thumbnail {}: {e}", old.display());
            }
        }
        Some(value)
    }

    /// The album's first image in natural order.
    fn first_image(&self, album: &Path) -> Option<PathBuf> {
        std::fs::read_dir(album)
            .ok()?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && !crate::album::is_reserved(&paths::file_name(p))
                    && self.gallery.classifier().classify(p) == MediaKind::Image
            })
            .min_by_key(|p| NaturalKey::new(&paths::file_name(p)))
    }

    async fn reindex(&self, path: &Path) {
        tracing::info!("adding to index: {}", path.display());
        if let Err(e) = self.indexer.add_one(path).await {
            tracing::warn!("failed to add to index: {e}");
        }
    }

    async fn unindex(&self, path: &Path) {
        tracing::info!("deleting from index: {}", path.display());
        if let Err(e) = self.indexer.remove_one(path).await {
            tracing::warn!("failed to delete from index: {e}");
        }
    }

    /// Drop the cached page of the album at `path`.
    async fn invalidate(&self, path: &Path) {
        if let Some(rel) = paths::relative(self.gallery.root(), path) {
            cache::invalidate(self.cache.as_ref(), &cache::page_key(&rel)).await;
        }
    }

    async fn invalidate_parent(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            self.invalidate(parent).await;
        }
    }
}

fn non_empty_text(meta: &MetadataRecord, key: &str) -> Option<String> {
    let value = meta.text(key);
    (!value.is_empty()).then_some(value)
}

async fn write_thumbnail_upload(dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(dest, bytes).await
}
