//! Content use-case service.
//!
//! # Responsibility
//! - Own the cached post collection (`Unloaded` vs `Loaded`).
//! - Serialize add-then-persist mutations against the store.
//! - Expose filter/tag/archive views over the current snapshot.
//!
//! # Invariants
//! - The first load runs once even under concurrent `all()` callers.
//! - `add` never interleaves with another `add`, `all` or `refresh`.
//! - The cache only changes after the store call it depends on succeeds.
//! - Read-only views never trigger a load.

use crate::config::ContentConfig;
use crate::model::post::{
    normalize_post, normalize_value, Post, PostId, PostValidationError, RawPost,
};
use crate::repo::post_store::{sort_posts, JsonPostStore, PostStore, StoreError};
use crate::search::query::{
    archive_buckets, build_tag_index, filter_posts, ArchiveBucket, PostFilter, TagIndex,
};
use log::{error, info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared, immutable view of the collection at one point in time.
pub type PostSnapshot = Arc<Vec<Post>>;

pub type ServiceResult<T> = Result<T, ContentServiceError>;

/// Coarse error classification for collaborators (HTTP status, exit code).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorKind {
    /// Caller input was rejected.
    Validation,
    /// Caller input collides with an existing post id.
    DuplicateId,
    /// The durable resource could not be read or written.
    Storage,
}

/// Service error for content use-cases.
#[derive(Debug)]
pub enum ContentServiceError {
    /// Raw post failed normalization.
    Validation(PostValidationError),
    /// A post with this id already exists.
    DuplicateId(PostId),
    /// Persistence-layer failure.
    Storage(StoreError),
}

impl ContentServiceError {
    pub fn kind(&self) -> ContentErrorKind {
        match self {
            Self::Validation(_) => ContentErrorKind::Validation,
            Self::DuplicateId(_) => ContentErrorKind::DuplicateId,
            Self::Storage(_) => ContentErrorKind::Storage,
        }
    }
}

impl Display for ContentServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::DuplicateId(id) => write!(f, "post with id {id} already exists"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ContentServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::DuplicateId(_) => None,
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<PostValidationError> for ContentServiceError {
    fn from(value: PostValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for ContentServiceError {
    fn from(value: StoreError) -> Self {
        Self::Storage(value)
    }
}

#[derive(Debug)]
enum CacheState {
    Unloaded,
    Loaded(PostSnapshot),
}

impl CacheState {
    fn snapshot(&self) -> Option<PostSnapshot> {
        match self {
            Self::Unloaded => None,
            Self::Loaded(posts) => Some(Arc::clone(posts)),
        }
    }
}

/// Content service facade over a post store.
///
/// Construct once per process and share by reference (or `Arc`).
pub struct ContentService<S: PostStore> {
    store: S,
    cache: Mutex<CacheState>,
}

impl ContentService<JsonPostStore> {
    /// Creates a service over the JSON file named by `config`.
    pub fn open(config: &ContentConfig) -> Self {
        info!(
            "event=content_service_open module=service status=ok path={}",
            config.storage_path.display()
        );
        Self::new(JsonPostStore::new(config.storage_path.clone()))
    }
}

impl<S: PostStore> ContentService<S> {
    /// Creates a service with an unloaded cache.
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: Mutex::new(CacheState::Unloaded),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns whether the cache has been populated.
    pub fn is_loaded(&self) -> bool {
        matches!(*self.lock_cache(), CacheState::Loaded(_))
    }

    /// Returns the cached collection, loading it on first use.
    ///
    /// Concurrent first callers wait on the same guard, so the store is read
    /// once and every caller observes the same snapshot.
    pub fn all(&self) -> ServiceResult<PostSnapshot> {
        let mut cache = self.lock_cache();
        self.ensure_loaded(&mut cache)
    }

    /// Reloads from the store and replaces the cache.
    ///
    /// On failure the previous cache is kept and the error is returned.
    pub fn refresh(&self) -> ServiceResult<PostSnapshot> {
        let mut cache = self.lock_cache();
        let snapshot = Arc::new(self.store.load()?);
        info!(
            "event=posts_refresh module=service status=ok count={}",
            snapshot.len()
        );
        *cache = CacheState::Loaded(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Adds one post, persists the whole collection and returns it.
    ///
    /// # Errors
    /// - `Validation` when `raw` cannot be normalized.
    /// - `DuplicateId` when the resulting id is already cached.
    /// - `Storage` when loading or saving fails.
    ///
    /// The cache is untouched unless the save succeeds.
    pub fn add(&self, raw: &RawPost) -> ServiceResult<PostSnapshot> {
        self.add_with_id(raw).map(|(_, snapshot)| snapshot)
    }

    /// Same as [`ContentService::add`], also returning the stored post's id.
    pub fn add_with_id(&self, raw: &RawPost) -> ServiceResult<(PostId, PostSnapshot)> {
        self.add_with(|| normalize_post(raw))
    }

    /// Same as [`ContentService::add`] for an untyped JSON body.
    pub fn add_value(&self, raw: &Value) -> ServiceResult<PostSnapshot> {
        self.add_with(|| normalize_value(raw)).map(|(_, snapshot)| snapshot)
    }

    /// Filters the current snapshot; empty when unloaded.
    pub fn filter(&self, filter: &PostFilter) -> Vec<Post> {
        self.current()
            .map(|posts| filter_posts(&posts, filter))
            .unwrap_or_default()
    }

    /// Tag counts over the current snapshot; empty when unloaded.
    pub fn tag_index(&self) -> TagIndex {
        self.current()
            .map(|posts| build_tag_index(&posts))
            .unwrap_or_default()
    }

    /// Month archives over the current snapshot; empty when unloaded.
    pub fn archive_buckets(&self) -> Vec<ArchiveBucket> {
        self.current()
            .map(|posts| archive_buckets(&posts))
            .unwrap_or_default()
    }

    fn add_with(
        &self,
        normalize: impl FnOnce() -> Result<Post, PostValidationError>,
    ) -> ServiceResult<(PostId, PostSnapshot)> {
        let mut cache = self.lock_cache();
        let current = self.ensure_loaded(&mut cache)?;

        let post = normalize().map_err(|err| {
            warn!("event=post_add module=service status=rejected reason=validation error={err}");
            err
        })?;
        if current.iter().any(|existing| existing.id == post.id) {
            warn!(
                "event=post_add module=service status=rejected reason=duplicate_id id={}",
                post.id
            );
            return Err(ContentServiceError::DuplicateId(post.id));
        }

        let id = post.id.clone();
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(post);
        sort_posts(&mut next);

        let saved = match self.store.save(&next) {
            Ok(saved) => saved,
            Err(err) => {
                error!("event=post_add module=service status=error id={id} error={err}");
                return Err(err.into());
            }
        };

        let snapshot = Arc::new(saved);
        *cache = CacheState::Loaded(Arc::clone(&snapshot));
        info!(
            "event=post_add module=service status=ok id={id} count={}",
            snapshot.len()
        );
        Ok((id, snapshot))
    }

    fn ensure_loaded(&self, cache: &mut CacheState) -> ServiceResult<PostSnapshot> {
        if let Some(snapshot) = cache.snapshot() {
            return Ok(snapshot);
        }

        let snapshot = Arc::new(self.store.load()?);
        info!(
            "event=cache_fill module=service status=ok count={}",
            snapshot.len()
        );
        *cache = CacheState::Loaded(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    fn current(&self) -> Option<PostSnapshot> {
        self.lock_cache().snapshot()
    }

    // Cache writes happen only after successful store calls, so a poisoned
    // guard still holds a consistent state.
    fn lock_cache(&self) -> MutexGuard<'_, CacheState> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{ContentErrorKind, ContentService, ContentServiceError};
    use crate::model::post::{Post, PostValidationError, RawPost};
    use crate::repo::post_store::{PostStore, StoreResult};
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct MemoryStore {
        posts: RefCell<Vec<Post>>,
        loads: Cell<usize>,
    }

    impl PostStore for MemoryStore {
        fn load(&self) -> StoreResult<Vec<Post>> {
            self.loads.set(self.loads.get() + 1);
            Ok(self.posts.borrow().clone())
        }

        fn save(&self, posts: &[Post]) -> StoreResult<Vec<Post>> {
            *self.posts.borrow_mut() = posts.to_vec();
            Ok(posts.to_vec())
        }
    }

    #[test]
    fn views_are_empty_and_lazy_before_first_load() {
        let service = ContentService::new(MemoryStore::default());
        assert!(!service.is_loaded());
        assert!(service.tag_index().is_empty());
        assert!(service.archive_buckets().is_empty());
        assert!(service.filter(&Default::default()).is_empty());
        assert_eq!(service.store().loads.get(), 0);
    }

    #[test]
    fn all_loads_once_and_caches() {
        let service = ContentService::new(MemoryStore::default());
        service.all().unwrap();
        service.all().unwrap();
        assert!(service.is_loaded());
        assert_eq!(service.store().loads.get(), 1);

        service.refresh().unwrap();
        assert_eq!(service.store().loads.get(), 2);
    }

    #[test]
    fn add_validation_error_keeps_cache() {
        let service = ContentService::new(MemoryStore::default());
        let err = service
            .add(&RawPost::new().with_title("No date"))
            .unwrap_err();
        assert_eq!(err.kind(), ContentErrorKind::Validation);
        assert!(matches!(
            err,
            ContentServiceError::Validation(PostValidationError::MissingDate)
        ));
        assert!(service.all().unwrap().is_empty());
    }

    #[test]
    fn add_with_id_reports_derived_id() {
        let service = ContentService::new(MemoryStore::default());
        let (id, posts) = service
            .add_with_id(&RawPost::new().with_title("Gamma").with_date("2024-03-01"))
            .unwrap();
        assert_eq!(id, "2024-03-01-gamma");
        assert_eq!(posts[0].id, id);
    }
}
