//! HTTP surface.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `GET /healthz` | `{now, search}` JSON, 500 when the search engine fails |
//! | `GET /search?query=&limit=` | result page |
//! | `GET /_src/*` | raw source files |
//! | `GET /static/*` | theme assets |
//! | `GET /edit[/*path]` | editor pages (when enabled) |
//! | `POST /edit/*path` | album/media update or delete (multipart form) |
//! | `POST /edit/_upload` | new sub-album or media upload |
//! | `GET /*path` | album page, from the page cache when fresh; files redirect to `/_src` |
//!
//! Every response carries `Server: Gallery/<version>`. There is no
//! authentication; the editing user comes from the `X-Forwarded-User` header
//! a fronting proxy may set.

use crate::album::{Gallery, LinkContext, ResolveError};
use crate::cache::{self, PageCache};
use crate::config::GalleryConfig;
use crate::editor::{AlbumUpdate, Editor, EditorError, MediaUpdate, Upload};
use crate::paths::{self, SOURCE_PREFIX};
use crate::render;
use crate::search::{self, BulkSettings, DEFAULT_LIMIT, Indexer, SearchError};
use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path as UrlPath, Query, State, multipart::MultipartError},
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode, Uri, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tower_http::services::ServeDir;

pub const SERVER_HEADER: &str = concat!("Gallery/", env!("CARGO_PKG_VERSION"));

/// Header carrying the authenticated user name from a fronting proxy.
pub const USER_HEADER: &str = "x-forwarded-user";

/// Largest accepted editor request body.
const UPLOAD_LIMIT: usize = 512 * 1024 * 1024;

/// Editor path segment that receives uploads.
const UPLOAD_SEGMENT: &str = "_upload";

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error("Album source does not exist: {0}")]
    MissingSource(PathBuf),
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    gallery: Gallery,
    cache: Arc<dyn PageCache>,
    indexer: Indexer,
    editor: Editor,
}

impl AppState {
    pub fn new(gallery: Gallery, cache: Arc<dyn PageCache>, indexer: Indexer) -> Self {
        let editor = Editor::new(gallery.clone(), cache.clone(), indexer.clone());
        Self {
            gallery,
            cache,
            indexer,
            editor,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// A request failure rendered as the error page.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    reason: String,
}

impl AppError {
    fn new(status: StatusCode, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }

    fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "album path does not exist")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{}: {}", self.status, self.reason);
        }
        let page = render::error_page(self.status.as_u16(), &self.reason);
        (self.status, Html(page.into_string())).into_response()
    }
}

impl From<ResolveError> for AppError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::NotFound(_) | ResolveError::OutsideRoot(_) | ResolveError::NotAnAlbum(_) => {
                Self::not_found()
            }
            ResolveError::Io(e) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}

impl From<EditorError> for AppError {
    fn from(e: EditorError) -> Self {
        match e {
            EditorError::Resolve(inner) => inner.into(),
            EditorError::AlbumNotEmpty(_) => Self::new(StatusCode::BAD_REQUEST, "Cannot delete non-empty album"),
            other => {
                let status = match &other {
                    EditorError::RootAlbum | EditorError::InvalidName(_) => StatusCode::BAD_REQUEST,
                    EditorError::AlreadyExists(_) => StatusCode::CONFLICT,
                    EditorError::NotAnAlbum(_) | EditorError::NotAMedia(_) => StatusCode::NOT_FOUND,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                Self::new(status, other.to_string())
            }
        }
    }
}

impl From<SearchError> for AppError {
    fn from(e: SearchError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("search failed: {e}"))
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, e.body_text())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

// ============================================================================
// Router
// ============================================================================

async fn server_header(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::SERVER, HeaderValue::from_static(SERVER_HEADER));
    response
}

/// Build the application router.
pub fn router(state: AppState, static_dir: &Path, editor: bool) -> Router {
    let mut app = Router::new()
        .route("/healthz", get(health))
        .route("/search", get(search))
        .nest_service(SOURCE_PREFIX, ServeDir::new(state.gallery.root()))
        .nest_service("/static", ServeDir::new(static_dir));

    if editor {
        app = app
            .route("/edit", get(edit_root).post(edit_root_post))
            .route("/edit/*path", get(edit_get).post(edit_post))
            .layer(DefaultBodyLimit::max(UPLOAD_LIMIT));
    }

    app.fallback(page)
        .layer(middleware::from_fn(server_header))
        .with_state(state)
}

/// Run the server until Ctrl-C.
pub async fn serve(config: &GalleryConfig) -> Result<(), ServerError> {
    if !config.source.is_dir() {
        return Err(ServerError::MissingSource(config.source.clone()));
    }
    let gallery = Gallery::from_config(config);
    let backend = search::backend_from_config(&config.search)?;
    let indexer = Indexer::new(backend, &config.search.index, gallery.clone())
        .with_settings(BulkSettings::from_config(&config.search));
    let cache = cache::from_config(&config.cache);
    let state = AppState::new(gallery, cache.clone(), indexer);
    let app = router(state, &config.static_dir(), config.server.editor);

    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("cannot listen for shutdown signal: {e}");
            }
            tracing::info!("shutting down");
        })
        .await?;

    if let Err(e) = cache.close().await {
        tracing::warn!("cache close failed: {e}");
    }
    Ok(())
}

// ============================================================================
// Public handlers
// ============================================================================

async fn health(State(state): State<AppState>) -> Response {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
    match state.indexer.health().await {
        Ok(status) => Json(json!({"now": now, "search": status})).into_response(),
        Err(e) => {
            tracing::info!("error from search engine: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"now": now, "search": "fail"})),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    query: String,
    limit: Option<String>,
}

async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Response, AppError> {
    let limit = params
        .limit
        .and_then(|l| l.trim().parse::<usize>().ok())
        .filter(|&l| l > 0)
        .unwrap_or(DEFAULT_LIMIT);
    tracing::info!("limit: {limit}, query: {}", params.query);

    if params.query.trim().is_empty() {
        return Ok(Html(render::search_page(&params.query, limit, 0, &[]).into_string()).into_response());
    }
    let results = state.indexer.search(&params.query, limit).await?;
    let total = results.total;
    let gallery = state.gallery.clone();
    let items = tokio::task::spawn_blocking(move || {
        results
            .hits
            .iter()
            .filter_map(|hit| {
                let path = gallery.locate(&hit.document.path)?;
                tracing::debug!("processing search result {}", path.display());
                gallery
                    .item(&path, LinkContext::Gallery)
                    .map_err(|e| tracing::warn!("stale search result {}: {e}", hit.document.path))
                    .ok()
            })
            .collect::<Vec<_>>()
    })
    .await?;

    let page = render::search_page(&params.query, limit, total, &items);
    Ok(Html(page.into_string()).into_response())
}

/// Album pages. Anything else under the root redirects to its raw source.
async fn page(State(state): State<AppState>, method: Method, uri: Uri) -> Result<Response, AppError> {
    if method != Method::GET && method != Method::HEAD {
        return Err(AppError::new(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"));
    }
    let rel = urlencoding::decode(uri.path())
        .map_err(|_| AppError::not_found())?
        .trim_matches('/')
        .to_string();
    let path = state.gallery.locate(&rel).ok_or_else(AppError::not_found)?;
    if !path.exists() {
        tracing::warn!("album path {} does not exist", path.display());
        return Err(AppError::not_found());
    }
    if !path.is_dir() {
        return Ok(Redirect::to(&paths::join_url(SOURCE_PREFIX, &rel)).into_response());
    }

    let key = cache::page_key(&rel);
    if let Some(body) = cache::get_page(state.cache.as_ref(), &key).await {
        tracing::debug!("cache hit for {key}");
        return Ok(Html(body).into_response());
    }

    let gallery = state.gallery.clone();
    let body = tokio::task::spawn_blocking(move || -> Result<String, ResolveError> {
        let album = gallery.resolve_album(&path, LinkContext::Gallery)?;
        let crumbs = gallery.breadcrumbs(&path, LinkContext::Gallery)?;
        Ok(render::album_page(&album, &crumbs).into_string())
    })
    .await??;
    cache::put_page(state.cache.as_ref(), &key, &body).await;
    Ok(Html(body).into_response())
}

// ============================================================================
// Editor handlers
// ============================================================================

/// Multipart form with plain fields and uploaded files separated.
#[derive(Debug, Default)]
struct Form {
    fields: Vec<(String, String)>,
    files: Vec<Upload>,
}

impl Form {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Form::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part for an untouched file input
                    if !filename.is_empty() && !bytes.is_empty() {
                        form.files.push(Upload {
                            filename,
                            bytes: bytes.to_vec(),
                        });
                    }
                }
                None => {
                    let value = field.text().await?;
                    form.fields.push((name, value));
                }
            }
        }
        Ok(form)
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    fn text(&self, name: &str) -> String {
        self.get(name).unwrap_or_default().to_string()
    }

    /// The last uploaded file, used as a thumbnail.
    fn last_file(&mut self) -> Option<Upload> {
        self.files.pop()
    }

    fn album_update(mut self) -> AlbumUpdate {
        let orderweights = self
            .fields
            .iter()
            .filter_map(|(k, v)| Some((k.strip_prefix("orderweight-")?.to_string(), v.clone())))
            .collect();
        AlbumUpdate {
            title: self.text("title"),
            summary: self.text("summary"),
            keywords: self.text("keywords"),
            description: self.text("description"),
            sort: self.text("sort"),
            sort_reverse: self.get("sort_reverse") == Some("true"),
            thumbnail: self.last_file(),
            orderweights,
        }
    }

    fn media_update(mut self) -> MediaUpdate {
        MediaUpdate {
            title: self.text("title"),
            summary: self.text("summary"),
            keywords: self.text("keywords"),
            description: self.text("description"),
            thumbnail: self.last_file(),
        }
    }

    fn wants_delete(&self) -> bool {
        self.get("delete") == Some("delete")
    }
}

fn current_user(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
}

fn edit_url(state: &AppState, path: &Path) -> String {
    let rel = paths::relative(state.gallery.root(), path).unwrap_or_default();
    paths::join_url(LinkContext::Editor.prefix(), &rel)
}

fn locate_existing(state: &AppState, rel: &str) -> Result<PathBuf, AppError> {
    let path = state.gallery.locate(rel).ok_or_else(AppError::not_found)?;
    if path.exists() {
        Ok(path)
    } else {
        tracing::warn!("album path {} does not exist", path.display());
        Err(AppError::not_found())
    }
}

async fn edit_root(state: State<AppState>) -> Result<Response, AppError> {
    edit_get(state, UrlPath(String::new())).await
}

async fn edit_root_post(
    state: State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, AppError> {
    edit_post(state, UrlPath(String::new()), headers, multipart).await
}

async fn edit_get(State(state): State<AppState>, UrlPath(rel): UrlPath<String>) -> Result<Response, AppError> {
    let path = locate_existing(&state, &rel)?;
    let gallery = state.gallery.clone();
    let body = tokio::task::spawn_blocking(move || -> Result<String, ResolveError> {
        let crumbs = gallery.breadcrumbs(&path, LinkContext::Editor)?;
        if path.is_dir() {
            let album = gallery.resolve_album(&path, LinkContext::Editor)?;
            Ok(render::editor_album_page(&album, &crumbs).into_string())
        } else {
            let media = gallery.resolve_media(&path, LinkContext::Editor)?;
            Ok(render::editor_media_page(&media, &crumbs).into_string())
        }
    })
    .await??;
    Ok(Html(body).into_response())
}

async fn edit_post(
    State(state): State<AppState>,
    UrlPath(rel): UrlPath<String>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = Form::read(multipart).await?;
    if rel.trim_matches('/') == UPLOAD_SEGMENT {
        return upload(&state, current_user(&headers), form).await;
    }
    let path = locate_existing(&state, &rel)?;

    if form.wants_delete() {
        let parent = if path.is_dir() {
            state.editor.delete_album(&path).await?
        } else {
            state.editor.delete_media(&path).await?
        };
        return Ok(Redirect::to(&edit_url(&state, &parent)).into_response());
    }

    if path.is_dir() {
        state.editor.update_album(&path, form.album_update()).await?;
    } else {
        state.editor.update_media(&path, form.media_update()).await?;
    }
    Ok(Redirect::to(&edit_url(&state, &path)).into_response())
}

/// The root-relative part of an editor URL: `/edit` itself or `/edit/<rel>`.
fn editor_relative(url: &str) -> Option<&str> {
    let rest = url.strip_prefix(LinkContext::Editor.prefix())?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix('/')
    }
}

/// New sub-album (`newdir` field) or media upload into the `album` field's
/// editor path.
async fn upload(state: &AppState, user: Option<String>, mut form: Form) -> Result<Response, AppError> {
    let target = form.get("album").unwrap_or(LinkContext::Editor.prefix()).to_string();
    let rel = editor_relative(&target)
        .ok_or_else(|| AppError::new(StatusCode::BAD_REQUEST, "album must be an editor path"))?;
    let rel = urlencoding::decode(rel).map_err(|_| AppError::not_found())?;
    let album = locate_existing(state, &rel)?;
    tracing::info!("album_path: {}", album.display());

    let newdir = form.text("newdir");
    if !newdir.trim().is_empty() {
        tracing::info!("new sub-album: {newdir}");
        let thumbnail = form.last_file();
        state
            .editor
            .create_album(&album, &newdir, user.as_deref(), thumbnail)
            .await?;
    } else {
        let names: Vec<String> = form.files.iter().map(|f| f.filename.clone()).collect();
        for file in std::mem::take(&mut form.files) {
            state.editor.upload_media(&album, file, user.as_deref()).await?;
        }
        tracing::info!("files: {} {names:?}", names.len());
    }
    Ok(Redirect::to(&edit_url(state, &album)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, get_page, page_key};
    use crate::metadata;
    use crate::search::SearchBackend;
    use crate::search::memory::MemoryBackend;
    use crate::test_helpers::{gallery_for, setup_fixtures};
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "XBOUNDARYX";

    struct Fixture {
        tmp: TempDir,
        app: Router,
        cache: Arc<MemoryCache>,
    }

    async fn fixture(editor: bool) -> Fixture {
        let tmp = setup_fixtures();
        let gallery = gallery_for(tmp.path());
        let backend: Arc<dyn SearchBackend> = Arc::new(MemoryBackend::new());
        let indexer = Indexer::new(backend, "gallery", gallery.clone()).with_settings(BulkSettings {
            chunk_size: 100,
            max_retries: 0,
            initial_backoff: Duration::ZERO,
        });
        indexer.rebuild().await.unwrap();
        let cache = Arc::new(MemoryCache::new());
        let state = AppState::new(gallery, cache.clone(), indexer);
        let app = router(state, &tmp.path().join("static"), editor);
        Fixture { tmp, app, cache }
    }

    async fn get(app: &Router, uri: &str) -> Response {
        app.clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    /// Multipart body from plain fields and `(field, filename, bytes)` files.
    fn multipart(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
            );
        }
        for (name, filename, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn post(app: &Router, uri: &str, body: Vec<u8>, user: Option<&str>) -> Response {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"));
        if let Some(user) = user {
            request = request.header(USER_HEADER, user);
        }
        app.clone().oneshot(request.body(Body::from(body)).unwrap()).await.unwrap()
    }

    // =========================================================================
    // Public routes
    // =========================================================================

    #[tokio::test]
    async fn health_reports_search_status() {
        let f = fixture(false).await;
        let response = get(&f.app, "/healthz").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::SERVER], SERVER_HEADER);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["search"], "green");
        assert!(body["now"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn album_page_is_rendered_and_cached() {
        let f = fixture(false).await;
        let response = get(&f.app, "/trip").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Summer Trip"));

        let cached = get_page(f.cache.as_ref(), &page_key("trip")).await.unwrap();
        assert!(cached.contains("Summer Trip"));

        // Served from the cache even after the sidecar changes
        metadata::write(&f.tmp.path().join("trip"), &metadata::MetadataRecord::default()).unwrap();
        assert!(body_text(get(&f.app, "/trip/").await).await.contains("Summer Trip"));
    }

    #[tokio::test]
    async fn stale_cache_entries_are_rerendered() {
        let f = fixture(false).await;
        f.cache
            .set(&page_key("trip"), &json!({"version": "0.0.0-old", "body": "stale"}))
            .await
            .unwrap();
        let body = body_text(get(&f.app, "/trip").await).await;
        assert!(body.contains("Summer Trip"));
    }

    #[tokio::test]
    async fn root_page_lists_albums() {
        let f = fixture(false).await;
        let body = body_text(get(&f.app, "/").await).await;
        assert!(body.contains(r#"href="/trip""#));
        assert!(body.contains(r#"href="/empty""#));
    }

    #[tokio::test]
    async fn file_paths_redirect_to_source() {
        let f = fixture(false).await;
        let response = get(&f.app, "/trip/photo1.jpg").await;
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/_src/trip/photo1.jpg");

        let raw = get(&f.app, "/_src/trip/photo1.jpg").await;
        assert_eq!(raw.status(), StatusCode::OK);
        assert_eq!(raw.headers()[header::SERVER], SERVER_HEADER);
    }

    #[tokio::test]
    async fn missing_paths_are_not_found() {
        let f = fixture(false).await;
        let response = get(&f.app, "/nowhere").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("404"));
        assert_eq!(get(&f.app, "/trip/../../etc").await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn search_resolves_hits_to_entries() {
        let f = fixture(false).await;
        let body = body_text(get(&f.app, "/search?query=beach&limit=abc").await).await;
        assert!(body.contains(r#"href="/_src/trip/photo2.jpg""#));
        assert!(body.contains(r#"href="/trip/beach""#));
        assert!(body.contains("2 results"));

        let empty = body_text(get(&f.app, "/search").await).await;
        assert!(!empty.contains("results"));
    }

    #[tokio::test]
    async fn editor_routes_absent_when_disabled() {
        let f = fixture(false).await;
        assert_eq!(get(&f.app, "/edit/trip").await.status(), StatusCode::NOT_FOUND);
    }

    // =========================================================================
    // Editor routes
    // =========================================================================

    #[tokio::test]
    async fn editor_pages_render() {
        let f = fixture(true).await;
        let album = body_text(get(&f.app, "/edit/trip").await).await;
        assert!(album.contains("Editing Summer Trip"));
        let root = get(&f.app, "/edit").await;
        assert_eq!(root.status(), StatusCode::OK);
        let media = body_text(get(&f.app, "/edit/trip/photo1.jpg").await).await;
        assert!(media.contains("Editing First"));
    }

    #[tokio::test]
    async fn album_form_updates_sidecar_and_cache() {
        let f = fixture(true).await;
        assert_eq!(get(&f.app, "/trip").await.status(), StatusCode::OK);

        let body = multipart(
            &[
                ("title", "Autumn"),
                ("summary", ""),
                ("keywords", "leaves"),
                ("description", ""),
                ("sort", "filename"),
                ("sort_reverse", "true"),
            ],
            &[("thumbnail", "", b"")],
        );
        let response = post(&f.app, "/edit/trip", body, None).await;
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/edit/trip");

        let meta = metadata::read(&f.tmp.path().join("trip")).unwrap();
        assert_eq!(meta.title(), "Autumn");
        assert_eq!(meta.text("sort"), "-filename");
        assert!(body_text(get(&f.app, "/trip").await).await.contains("Autumn"));
    }

    #[tokio::test]
    async fn deleting_non_empty_album_is_bad_request() {
        let f = fixture(true).await;
        let response = post(&f.app, "/edit/trip", multipart(&[("delete", "delete")], &[]), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("Cannot delete non-empty album"));
        assert!(f.tmp.path().join("trip").is_dir());
    }

    #[tokio::test]
    async fn deleting_media_redirects_to_album() {
        let f = fixture(true).await;
        let response = post(
            &f.app,
            "/edit/trip/notes.pdf",
            multipart(&[("delete", "delete")], &[]),
            None,
        )
        .await;
        assert_eq!(location(&response), "/edit/trip");
        assert!(!f.tmp.path().join("trip/notes.pdf").exists());
    }

    #[tokio::test]
    async fn upload_route_creates_album_with_user() {
        let f = fixture(true).await;
        let body = multipart(&[("album", "/edit/trip"), ("newdir", "Day Two")], &[]);
        let response = post(&f.app, "/edit/_upload", body, Some("ada")).await;
        assert_eq!(location(&response), "/edit/trip");

        let meta = metadata::read(&f.tmp.path().join("trip/Day-Two")).unwrap();
        assert_eq!(meta.title(), "Day Two");
        assert_eq!(meta.text("user"), "ada");
    }

    #[test]
    fn editor_relative_requires_a_path_boundary() {
        assert_eq!(editor_relative("/edit"), Some(""));
        assert_eq!(editor_relative("/edit/trip/beach"), Some("trip/beach"));
        assert_eq!(editor_relative("/editfoo/trip"), None);
        assert_eq!(editor_relative("/trip"), None);
    }

    #[tokio::test]
    async fn upload_rejects_non_editor_album() {
        let f = fixture(true).await;
        let body = multipart(&[("album", "/editrip"), ("newdir", "x")], &[]);
        let response = post(&f.app, "/edit/_upload", body, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!f.tmp.path().join("rip/x").exists());
    }

    #[tokio::test]
    async fn upload_route_stores_files() {
        let f = fixture(true).await;
        let body = multipart(
            &[("album", "/edit/empty")],
            &[("files", "a.txt", b"one"), ("files", "b b.txt", b"two")],
        );
        let response = post(&f.app, "/edit/_upload", body, None).await;
        assert_eq!(location(&response), "/edit/empty");
        assert_eq!(std::fs::read(f.tmp.path().join("empty/a.txt")).unwrap(), b"one");
        assert_eq!(std::fs::read(f.tmp.path().join("empty/b-b.txt")).unwrap(), b"two");
    }
}
