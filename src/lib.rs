//! # Gallery
//!
//! A photo and video gallery served straight from a directory tree.
//! Directories are albums, files are media, and optional JSON sidecars carry
//! titles, keywords, thumbnails and sort order. The filesystem is the source
//! of truth; the search index and page cache are derived from it and can be
//! rebuilt or dropped at any time.
//!
//! # Request Flow
//!
//! ```text
//! GET /trip        page cache ── hit ──▶ cached HTML
//!                      │
//!                     miss
//!                      ▼
//!                  album resolver ──▶ sidecars, classifier, sort, thumbnails
//!                      │
//!                      ▼
//!                  maud render ──▶ cache ──▶ HTML
//!
//! POST /edit/trip  editor ──▶ sidecar/thumbnail/file change
//!                      ├──▶ search document upsert or delete
//!                      └──▶ page cache invalidation
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | Layered `gallery.toml` + `GALLERY_*` environment loading and validation |
//! | [`metadata`] | JSON sidecar read/write with required-key defaults |
//! | [`media`] | Extension-based image/video/other classification |
//! | [`natsort`] | Natural ("human") string ordering |
//! | [`sort`] | Album `sort` specifications applied to child lists |
//! | [`thumbnail`] | Thumbnail precedence and generation |
//! | [`paths`] | Root-relative paths, URLs and traversal-safe joins |
//! | [`album`] | Album and media view models |
//! | [`search`] | Search documents, engine backends and the rebuild lifecycle |
//! | [`cache`] | Rendered page cache backends |
//! | [`editor`] | Metadata edits, uploads, deletion |
//! | [`render`] | HTML pages |
//! | [`server`] | axum routes |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Alias Swap Rebuilds
//!
//! A rebuild writes into a new `<alias>-<timestamp>` index and only moves the
//! alias once every document is in. Readers never see a half-built index,
//! and a failed rebuild leaves the previous one serving.
//!
//! ## Explicit Cache Invalidation
//!
//! Cached pages never expire on their own. Every edit deletes the pages that
//! show the edited entry, and entries written by another crate version are
//! treated as misses.
//!
//! ## Maud Over Template Engines
//!
//! HTML is generated with [Maud](https://maud.lambda.xyz/): malformed markup
//! is a build error and all interpolation is escaped.

pub mod album;
pub mod cache;
pub mod config;
pub mod editor;
pub mod media;
pub mod metadata;
pub mod natsort;
pub mod output;
pub mod paths;
pub mod render;
pub mod search;
pub mod server;
pub mod sort;
pub mod thumbnail;

#[cfg(test)]
pub(crate) mod test_helpers;
