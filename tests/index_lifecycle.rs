//! Search index rebuilds against the in-memory backend.
//!
//! A rebuild that fails part way must leave the alias on the previous index
//! and remove its own partial index, so searches keep answering exactly as
//! before.

use chrono::{TimeZone, Utc};
use gallery::album::Gallery;
use gallery::media::Classifier;
use gallery::metadata::{self, MetadataRecord};
use gallery::search::memory::MemoryBackend;
use gallery::search::{BulkSettings, Indexer, SearchBackend, SearchError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn write_file(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"").unwrap();
}

fn set_meta(path: &Path, fields: &[(&str, &str)]) {
    let mut record = MetadataRecord::default();
    for (key, value) in fields {
        record.set(*key, *value);
    }
    metadata::write(path, &record).unwrap();
}

/// albums/
/// ├── trip/        "Summer Trip"
/// │   ├── a.jpg    keywords "lighthouse"
/// │   ├── b.jpg
/// │   └── c.mp4
/// └── notes.pdf
fn album_tree() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let trip = tmp.path().join("trip");
    for name in ["a.jpg", "b.jpg", "c.mp4"] {
        write_file(&trip.join(name));
    }
    write_file(&tmp.path().join("notes.pdf"));
    set_meta(&trip, &[("title", "Summer Trip")]);
    set_meta(&trip.join("a.jpg"), &[("title", "Harbour"), ("keywords", "lighthouse")]);
    tmp
}

fn indexer(backend: Arc<MemoryBackend>, root: &Path) -> Indexer {
    Indexer::new(backend, "gallery", Gallery::new(root, Classifier::default())).with_settings(BulkSettings {
        chunk_size: 2,
        max_retries: 0,
        initial_backoff: Duration::ZERO,
    })
}

async fn paths_for(indexer: &Indexer, query: &str) -> Vec<String> {
    indexer
        .search(query, 10)
        .await
        .unwrap()
        .hits
        .into_iter()
        .map(|h| h.document.path)
        .collect()
}

#[tokio::test]
async fn failed_rebuild_leaves_previous_index_serving() {
    let tmp = album_tree();
    let backend = Arc::new(MemoryBackend::new());
    let indexer = indexer(backend.clone(), tmp.path());

    let first_name = {
        let mut build = indexer
            .begin_build_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            .await
            .unwrap();
        build.stream_tree(tmp.path()).await.unwrap();
        build.commit().await.unwrap().index
    };
    let before = paths_for(&indexer, "lighthouse").await;
    assert_eq!(before, vec!["trip/a.jpg"]);

    // Content changes, then the next rebuild's first batch fails
    set_meta(&tmp.path().join("trip/b.jpg"), &[("keywords", "lighthouse")]);
    backend.fail_next_requests(1);
    let err = indexer.rebuild().await.unwrap_err();
    assert!(matches!(err, SearchError::PartialFailure { failed: 2, .. }));

    assert_eq!(backend.alias_targets("gallery").await.unwrap(), vec![first_name.clone()]);
    assert_eq!(backend.list_indices("gallery-").await.unwrap(), vec![first_name]);
    assert_eq!(paths_for(&indexer, "lighthouse").await, before);
}

#[tokio::test]
async fn successful_rebuild_swaps_alias_and_cleans_up() {
    let tmp = album_tree();
    let backend = Arc::new(MemoryBackend::new());
    let indexer = indexer(backend.clone(), tmp.path());

    let mut build = indexer
        .begin_build_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        .await
        .unwrap();
    build.stream_tree(tmp.path()).await.unwrap();
    let old = build.commit().await.unwrap().index;

    set_meta(&tmp.path().join("trip/b.jpg"), &[("keywords", "lighthouse")]);
    let report = indexer.rebuild().await.unwrap();
    assert_eq!(report.indexed, 5);
    assert_eq!(report.batches, 3);
    assert_eq!(report.removed, vec![old]);

    assert_eq!(backend.alias_targets("gallery").await.unwrap(), vec![report.index.clone()]);
    assert_eq!(paths_for(&indexer, "lighthouse").await, vec!["trip/a.jpg", "trip/b.jpg"]);
}

#[tokio::test]
async fn single_document_updates_follow_the_alias() {
    let tmp = album_tree();
    let backend = Arc::new(MemoryBackend::new());
    let indexer = indexer(backend, tmp.path());
    indexer.rebuild().await.unwrap();

    let notes = tmp.path().join("notes.pdf");
    set_meta(&notes, &[("summary", "meeting minutes")]);
    indexer.add_one(&notes).await.unwrap();
    assert_eq!(paths_for(&indexer, "minutes").await, vec!["notes.pdf"]);

    std::fs::remove_file(&notes).unwrap();
    indexer.remove_one(&notes).await.unwrap();
    assert!(paths_for(&indexer, "minutes").await.is_empty());
    // Removing again is not an error
    indexer.remove_one(&notes).await.unwrap();
}
