//! Post store contract and JSON file implementation.
//!
//! # Responsibility
//! - Read the full post collection from a JSON array file.
//! - Replace the whole file with a normalized, sorted collection on save.
//!
//! # Invariants
//! - `load` is all-or-nothing: one invalid record fails the whole load.
//! - `save` writes a sibling temp file and renames it over the target.
//! - Output is pretty-printed with a trailing newline and fixed key order.
//! - Collections are ordered by date DESC, then id ASC.

use crate::model::post::{normalize_value, Post, PostId, PostValidationError};
use log::{error, info, warn};
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::error::Error;
use std::ffi::OsString;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage error for post collection persistence.
#[derive(Debug)]
pub enum StoreError {
    /// Reading, writing or renaming the resource failed.
    Io { path: PathBuf, source: io::Error },
    /// Resource content is not valid JSON.
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// One persisted record failed normalization.
    InvalidRecord {
        path: PathBuf,
        index: usize,
        source: PostValidationError,
    },
    /// Two records share the same id.
    DuplicateId { path: PathBuf, id: PostId },
    /// Collection could not be encoded as JSON.
    Serialize(serde_json::Error),
}

impl StoreError {
    /// Returns the record-level validation failure, if that is the cause.
    pub fn validation(&self) -> Option<&PostValidationError> {
        match self {
            Self::InvalidRecord { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "posts file `{}`: {source}", path.display()),
            Self::Parse { path, source } => {
                write!(f, "posts file `{}` is not valid JSON: {source}", path.display())
            }
            Self::InvalidRecord {
                path,
                index,
                source,
            } => write!(
                f,
                "posts file `{}` record #{index} is invalid: {source}",
                path.display()
            ),
            Self::DuplicateId { path, id } => write!(
                f,
                "posts file `{}` contains duplicate id `{id}`",
                path.display()
            ),
            Self::Serialize(err) => write!(f, "failed to encode posts: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::InvalidRecord { source, .. } => Some(source),
            Self::DuplicateId { .. } => None,
            Self::Serialize(err) => Some(err),
        }
    }
}

/// Storage contract consumed by the content service.
pub trait PostStore {
    /// Reads, normalizes and sorts the whole collection.
    fn load(&self) -> StoreResult<Vec<Post>>;
    /// Normalizes, sorts and persists the whole collection.
    ///
    /// Returns the collection exactly as written.
    fn save(&self, posts: &[Post]) -> StoreResult<Vec<Post>>;
}

/// JSON-file-backed post store bound to one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPostStore {
    path: PathBuf,
}

impl JsonPostStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PostStore for JsonPostStore {
    fn load(&self) -> StoreResult<Vec<Post>> {
        load_posts(&self.path)
    }

    fn save(&self, posts: &[Post]) -> StoreResult<Vec<Post>> {
        save_posts(posts, &self.path)
    }
}

/// Loads the post collection stored at `path`.
///
/// A top-level value that is not an array yields an empty collection
/// (logged at warn level) instead of an error.
///
/// # Errors
/// - `Io` / `Parse` when the file cannot be read or decoded.
/// - `InvalidRecord` for the first record that fails normalization.
/// - `DuplicateId` when two records resolve to the same id.
pub fn load_posts(path: &Path) -> StoreResult<Vec<Post>> {
    let started_at = Instant::now();
    info!("event=posts_load module=repo status=start");

    match read_posts(path) {
        Ok(posts) => {
            info!(
                "event=posts_load module=repo status=ok count={} duration_ms={}",
                posts.len(),
                started_at.elapsed().as_millis()
            );
            Ok(posts)
        }
        Err(err) => {
            error!(
                "event=posts_load module=repo status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Replaces the file at `path` with the normalized, sorted `posts`.
///
/// # Errors
/// - `InvalidRecord` / `DuplicateId` when `posts` breaks the model invariants;
///   nothing is written in that case.
/// - `Io` when the temp write or the rename fails.
pub fn save_posts(posts: &[Post], path: &Path) -> StoreResult<Vec<Post>> {
    let started_at = Instant::now();
    info!(
        "event=posts_save module=repo status=start count={}",
        posts.len()
    );

    match write_posts(posts, path) {
        Ok(saved) => {
            info!(
                "event=posts_save module=repo status=ok count={} duration_ms={}",
                saved.len(),
                started_at.elapsed().as_millis()
            );
            Ok(saved)
        }
        Err(err) => {
            error!(
                "event=posts_save module=repo status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Sorts posts by date DESC, then id ASC.
///
/// Posts whose date cannot be interpreted sort after all dated posts.
pub fn sort_posts(posts: &mut [Post]) {
    posts.sort_by_cached_key(|post| (Reverse(post.published_at()), post.id.clone()));
}

fn read_posts(path: &Path) -> StoreResult<Vec<Post>> {
    let raw = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: Value = serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let Value::Array(records) = parsed else {
        warn!(
            "event=posts_load module=repo status=degraded reason=top_level_not_array path={}",
            path.display()
        );
        return Ok(Vec::new());
    };

    let mut posts = records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            normalize_value(record).map_err(|source| StoreError::InvalidRecord {
                path: path.to_path_buf(),
                index,
                source,
            })
        })
        .collect::<StoreResult<Vec<_>>>()?;

    ensure_unique_ids(&posts, path)?;
    sort_posts(&mut posts);
    Ok(posts)
}

fn write_posts(posts: &[Post], path: &Path) -> StoreResult<Vec<Post>> {
    let mut normalized = posts
        .iter()
        .enumerate()
        .map(|(index, post)| {
            post.renormalize()
                .map_err(|source| StoreError::InvalidRecord {
                    path: path.to_path_buf(),
                    index,
                    source,
                })
        })
        .collect::<StoreResult<Vec<_>>>()?;

    ensure_unique_ids(&normalized, path)?;
    sort_posts(&mut normalized);

    let mut payload = serde_json::to_string_pretty(&normalized).map_err(StoreError::Serialize)?;
    payload.push('\n');
    replace_file(path, &payload)?;
    Ok(normalized)
}

fn ensure_unique_ids(posts: &[Post], path: &Path) -> StoreResult<()> {
    let mut seen = HashSet::with_capacity(posts.len());
    for post in posts {
        if !seen.insert(post.id.as_str()) {
            return Err(StoreError::DuplicateId {
                path: path.to_path_buf(),
                id: post.id.clone(),
            });
        }
    }
    Ok(())
}

fn replace_file(path: &Path, content: &str) -> StoreResult<()> {
    let temp_path = temp_path_for(path);
    let io_error = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    fs::write(&temp_path, content).map_err(io_error)?;
    if let Err(source) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(io_error(source));
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("posts"));
    name.push(".tmp");
    path.with_file_name(name)
}
