use serde_json::json;
use silov0_core::{
    load_posts, normalize_value, save_posts, ContentConfig, ContentErrorKind, ContentService,
    ContentServiceError, JsonPostStore, Post, PostFilter, PostStore, RawPost, StoreError,
    StoreResult,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn seed_posts(path: &Path) {
    let posts = [
        json!({
            "id": "alpha",
            "title": "Alpha release",
            "date": "2024-01-02",
            "tags": ["release", "alpha"],
            "summary": "Alpha ready",
        }),
        json!({
            "id": "beta",
            "title": "Beta release",
            "date": "2024-02-15",
            "tags": ["release", "beta"],
            "summary": "Beta ready",
        }),
    ]
    .iter()
    .map(|value| normalize_value(value).unwrap())
    .collect::<Vec<Post>>();
    save_posts(&posts, path).unwrap();
}

fn seeded_service() -> (tempfile::TempDir, PathBuf, ContentService<JsonPostStore>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("posts.json");
    seed_posts(&path);
    let service = ContentService::open(&ContentConfig::new(&path));
    (dir, path, service)
}

/// JSON store wrapper that counts loads and can be told to fail saves.
struct InstrumentedStore {
    inner: JsonPostStore,
    loads: AtomicUsize,
    fail_saves: AtomicBool,
    load_delay: Duration,
}

impl InstrumentedStore {
    fn new(path: &Path, load_delay: Duration) -> Self {
        Self {
            inner: JsonPostStore::new(path),
            loads: AtomicUsize::new(0),
            fail_saves: AtomicBool::new(false),
            load_delay,
        }
    }
}

impl PostStore for InstrumentedStore {
    fn load(&self) -> StoreResult<Vec<Post>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.load_delay);
        self.inner.load()
    }

    fn save(&self, posts: &[Post]) -> StoreResult<Vec<Post>> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: self.inner.path().to_path_buf(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.inner.save(posts)
    }
}

#[test]
fn adding_gamma_puts_it_first() {
    let (_dir, path, service) = seeded_service();

    let updated = service
        .add(
            &RawPost::new()
                .with_title("Gamma")
                .with_date("2024-03-01")
                .with_tags(["release"])
                .with_summary("Gamma ready"),
        )
        .unwrap();

    assert_eq!(updated.len(), 3);
    assert_eq!(updated[0].id, "2024-03-01-gamma");
    assert_eq!(load_posts(&path).unwrap(), *updated);
}

#[test]
fn cache_serves_views_after_add() {
    let (_dir, _path, service) = seeded_service();

    assert_eq!(service.all().unwrap().len(), 2);
    service
        .add_value(&json!({ "title": "Delta", "date": "2024-04-04", "tags": ["release"] }))
        .unwrap();

    assert_eq!(service.all().unwrap().len(), 3);
    assert_eq!(service.tag_index()["release"], 3);
    let labels = service
        .archive_buckets()
        .into_iter()
        .map(|bucket| bucket.label)
        .collect::<Vec<_>>();
    assert_eq!(labels, vec!["2024-04", "2024-02", "2024-01"]);

    let filtered = service.filter(&PostFilter::new().with_query("beta"));
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].id, "beta");
}

#[test]
fn duplicate_id_is_rejected_and_storage_untouched() {
    let (_dir, path, service) = seeded_service();
    let before = fs::read_to_string(&path).unwrap();

    let err = service
        .add(
            &RawPost::new()
                .with_id("alpha")
                .with_title("Dup")
                .with_date("2024-04-01"),
        )
        .unwrap_err();

    assert_eq!(err.kind(), ContentErrorKind::DuplicateId);
    assert!(matches!(err, ContentServiceError::DuplicateId(ref id) if id == "alpha"));
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
    assert_eq!(service.all().unwrap().len(), 2);
}

#[test]
fn derived_id_collision_is_a_duplicate() {
    let (_dir, _path, service) = seeded_service();
    let raw = RawPost::new().with_title("Same").with_date("2024-05-05");
    service.add(&raw).unwrap();

    let err = service.add(&raw).unwrap_err();
    assert!(matches!(err, ContentServiceError::DuplicateId(ref id) if id == "2024-05-05-same"));
}

#[test]
fn failed_save_leaves_cache_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("posts.json");
    seed_posts(&path);
    let service = ContentService::new(InstrumentedStore::new(&path, Duration::ZERO));
    let before = service.all().unwrap();

    service.store().fail_saves.store(true, Ordering::SeqCst);
    let err = service
        .add(&RawPost::new().with_title("Lost").with_date("2024-06-01"))
        .unwrap_err();

    assert_eq!(err.kind(), ContentErrorKind::Storage);
    assert_eq!(service.all().unwrap(), before);
    assert_eq!(load_posts(&path).unwrap().len(), 2);
}

#[test]
fn refresh_picks_up_out_of_band_edits() {
    let (_dir, path, service) = seeded_service();
    assert_eq!(service.all().unwrap().len(), 2);

    fs::write(&path, "[]\n").unwrap();
    assert_eq!(service.all().unwrap().len(), 2);
    assert!(service.refresh().unwrap().is_empty());
    assert!(service.all().unwrap().is_empty());
}

#[test]
fn failed_refresh_keeps_previous_cache() {
    let (_dir, path, service) = seeded_service();
    let before = service.all().unwrap();

    fs::write(&path, "{ broken").unwrap();
    let err = service.refresh().unwrap_err();

    assert_eq!(err.kind(), ContentErrorKind::Storage);
    assert!(matches!(
        err,
        ContentServiceError::Storage(StoreError::Parse { .. })
    ));
    assert_eq!(service.all().unwrap(), before);
}

#[test]
fn load_failure_leaves_cache_unloaded() {
    let dir = tempfile::tempdir().unwrap();
    let service = ContentService::open(&ContentConfig::new(dir.path().join("missing.json")));

    assert!(service.all().is_err());
    assert!(!service.is_loaded());
}

#[test]
fn concurrent_first_reads_load_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("posts.json");
    seed_posts(&path);
    let service = Arc::new(ContentService::new(InstrumentedStore::new(
        &path,
        Duration::from_millis(50),
    )));
    let barrier = Arc::new(Barrier::new(8));

    let handles = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                service.all().unwrap()
            })
        })
        .collect::<Vec<_>>();
    let snapshots = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect::<Vec<_>>();

    assert_eq!(service.store().loads.load(Ordering::SeqCst), 1);
    assert!(snapshots
        .iter()
        .all(|snapshot| Arc::ptr_eq(snapshot, &snapshots[0])));
}

#[test]
fn concurrent_adds_are_serialized() {
    let (_dir, path, service) = seeded_service();
    let service = Arc::new(service);

    let handles = (0..6)
        .map(|idx| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                service
                    .add(
                        &RawPost::new()
                            .with_title(format!("Post {idx}"))
                            .with_date(format!("2024-07-0{}", idx + 1)),
                    )
                    .unwrap()
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }

    let stored = load_posts(&path).unwrap();
    assert_eq!(stored.len(), 8);
    assert_eq!(stored[0].id, "2024-07-06-post-5");
    assert_eq!(*service.all().unwrap(), stored);
}

#[test]
fn validation_errors_expose_kind_and_message() {
    let (_dir, _path, service) = seeded_service();

    let err = service.add_value(&json!(["not", "an", "object"])).unwrap_err();
    assert_eq!(err.kind(), ContentErrorKind::Validation);
    assert_eq!(err.to_string(), "post must be an object");
}
