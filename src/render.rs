//! HTML pages.
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating,
//! so every interpolated value is escaped.
//!
//! ## Pages
//!
//! - **Album** (`/<path>`): sub-album cards, image grid, inline videos and a
//!   plain list of other files
//! - **Search** (`/search`): mixed album and media results
//! - **Editor album** (`/edit/<path>`): metadata form, child order weights,
//!   sub-album creation and upload
//! - **Editor media** (`/edit/<path>`): preview and metadata form
//! - **Error**: status and reason
//!
//! The stylesheet is embedded at compile time from `static/style.css`.

use crate::album::{Album, Crumb, Entry, EntryKind, Item, MediaItem};
use crate::sort::SortBasis;
use maud::{DOCTYPE, Markup, html};

const CSS: &str = include_str!("../static/style.css");

/// Sort bases offered by the album editor.
const SORT_CHOICES: &[(&str, &str)] = &[
    ("filename", "File name"),
    ("meta.title", "Title"),
    ("meta.createdate", "Date created"),
    ("meta.orderweight", "Order weight"),
];

// ============================================================================
// HTML Components
// ============================================================================

fn base_document(title: &str, body_class: Option<&str>, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (CSS) }
            }
            body class=[body_class] {
                (content)
            }
        }
    }
}

/// Breadcrumb trail starting at `home`, plus the search box.
fn site_header(home: &str, crumbs: &[Crumb]) -> Markup {
    html! {
        header.site-header {
            nav.breadcrumb {
                a href=(home) { "Gallery" }
                @for crumb in crumbs {
                    a href=(crumb.url) { (crumb.title) }
                }
            }
            form.search-form action="/search" method="get" {
                input type="search" name="query" placeholder="Search";
            }
        }
    }
}

fn card(entry: &dyn Entry) -> Markup {
    html! {
        a.card id=(entry.name()) href=(entry.url()) {
            img src=(entry.thumbnail()) alt=(entry.title()) loading="lazy";
            span.card-title { (entry.title()) }
        }
    }
}

fn album_text(album: &Album) -> Markup {
    let summary = album.meta.text("summary");
    let description = album.meta.text("description");
    html! {
        h1 { (album.title) }
        @if !summary.is_empty() {
            p.album-summary { (summary) }
        }
        @if !description.is_empty() {
            p.album-description { (description) }
        }
    }
}

fn video(item: &MediaItem) -> Markup {
    html! {
        figure id=(item.name) {
            video controls preload="metadata" poster=(item.thumbnail) {
                source src=(item.src) type=(item.mime);
            }
            figcaption { a href=(item.url) { (item.title) } }
        }
    }
}

// ============================================================================
// Page Renderers
// ============================================================================

/// Public album view.
pub fn album_page(album: &Album, crumbs: &[Crumb]) -> Markup {
    let content = html! {
        (site_header("/", crumbs))
        main.album-page {
            (album_text(album))
            @if !album.albums.is_empty() {
                section.grid.albums {
                    @for sub in &album.albums { (card(sub)) }
                }
            }
            @if !album.images.is_empty() {
                section.grid.images {
                    @for image in &album.images { (card(image)) }
                }
            }
            @for item in &album.videos { (video(item)) }
            @if !album.files.is_empty() {
                ul.file-list {
                    @for file in &album.files {
                        li id=(file.name) { a href=(file.url) { (file.title) } }
                    }
                }
            }
        }
    };
    base_document(&album.title, None, content)
}

/// Search form and results.
pub fn search_page(query: &str, limit: usize, total: u64, results: &[Item]) -> Markup {
    let content = html! {
        (site_header("/", &[]))
        main.search-page {
            form action="/search" method="get" {
                input type="search" name="query" value=(query) autofocus;
                input type="number" name="limit" value=(limit) min="1";
                button type="submit" { "Search" }
            }
            @if !query.is_empty() {
                p.search-total { (total) " results" }
            }
            section.grid {
                @for item in results {
                    @match item {
                        Item::Album(a) => (card(a)),
                        Item::Media(m) => (card(m)),
                    }
                }
            }
        }
    };
    base_document("Gallery - Search", Some("search"), content)
}

pub fn error_page(status: u16, reason: &str) -> Markup {
    let content = html! {
        main.error-page {
            h1 { (status) }
            p { (reason) }
            a href="/" { "Back to the gallery" }
        }
    };
    base_document(&format!("Gallery - {status}"), Some("error"), content)
}

// ============================================================================
// Editor
// ============================================================================

fn text_fields(meta: &crate::metadata::MetadataRecord) -> Markup {
    html! {
        label { "Title" input type="text" name="title" value=(meta.title()); }
        label { "Summary" input type="text" name="summary" value=(meta.text("summary")); }
        label { "Keywords" input type="text" name="keywords" value=(meta.text("keywords")); }
        label { "Description" textarea name="description" rows="4" { (meta.text("description")) } }
        label { "Thumbnail" input type="file" name="thumbnail" accept="image/*"; }
    }
}

fn orderweight_row(entry: &dyn Entry) -> Markup {
    html! {
        li {
            input.orderweight type="text" name={ "orderweight-" (entry.name()) }
                value=(entry.meta().text("orderweight"));
            " "
            a href=(entry.url()) { (entry.title()) }
        }
    }
}

/// Editor view of an album.
pub fn editor_album_page(album: &Album, crumbs: &[Crumb]) -> Markup {
    let by_weight = album.sort.basis == SortBasis::Meta("orderweight".into());
    let current_sort = match &album.sort.basis {
        SortBasis::Filename => "filename".to_string(),
        SortBasis::Meta(key) => format!("meta.{key}"),
    };

    let content = html! {
        (site_header("/edit", crumbs))
        main.editor.album-editor {
            h1 { "Editing " (album.title) }
            form method="post" enctype="multipart/form-data" {
                (text_fields(&album.meta))
                label {
                    "Sort by "
                    select name="sort" {
                        @for (value, label) in SORT_CHOICES {
                            option value=(value) selected[*value == current_sort] { (label) }
                        }
                    }
                }
                label {
                    input type="checkbox" name="sort_reverse" value="true" checked[album.sort.descending];
                    " Reverse"
                }
                @if by_weight && !album.is_empty() {
                    fieldset {
                        legend { "Order weights" }
                        ul {
                            @for sub in &album.albums { (orderweight_row(sub)) }
                            @for item in album.images.iter().chain(&album.videos).chain(&album.files) {
                                (orderweight_row(item))
                            }
                        }
                    }
                }
                button type="submit" { "Save" }
            }
            @if album.is_empty() && !album.path.is_empty() {
                form method="post" enctype="multipart/form-data" {
                    button.danger type="submit" name="delete" value="delete" { "Delete album" }
                }
            }

            h2 { "New sub-album" }
            form action="/edit/_upload" method="post" enctype="multipart/form-data" {
                input type="hidden" name="album" value=(album.url);
                label { "Name" input type="text" name="newdir" required; }
                label { "Thumbnail" input type="file" name="thumbnail" accept="image/*"; }
                button type="submit" { "Create" }
            }

            h2 { "Upload" }
            form action="/edit/_upload" method="post" enctype="multipart/form-data" {
                input type="hidden" name="album" value=(album.url);
                input type="file" name="files" multiple;
                button type="submit" { "Upload" }
            }

            @if !album.albums.is_empty() {
                section.grid.albums {
                    @for sub in &album.albums { (card(sub)) }
                }
            }
            @let media: Vec<&MediaItem> = album.images.iter().chain(&album.videos).chain(&album.files).collect();
            @if !media.is_empty() {
                section.grid.media {
                    @for item in media { (card(item)) }
                }
            }
        }
    };
    base_document(&format!("Editor - {}", album.name), Some("editor"), content)
}

/// Editor view of one media file.
pub fn editor_media_page(media: &MediaItem, crumbs: &[Crumb]) -> Markup {
    let preview = match EntryKind::from(media.kind) {
        EntryKind::Image => html! { img.preview src=(media.src) alt=(media.title); },
        EntryKind::Video => html! {
            video controls preload="metadata" { source src=(media.src) type=(media.mime); }
        },
        _ => html! { a href=(media.src) { (media.name) } },
    };

    let content = html! {
        (site_header("/edit", crumbs))
        main.editor.media-editor {
            h1 { "Editing " (media.title) }
            div.preview { (preview) }
            form method="post" enctype="multipart/form-data" {
                (text_fields(&media.meta))
                button type="submit" { "Save" }
            }
            form method="post" enctype="multipart/form-data" {
                button.danger type="submit" name="delete" value="delete" { "Delete" }
            }
        }
    };
    base_document(&format!("Editor - {}", media.name), Some("editor"), content)
}
