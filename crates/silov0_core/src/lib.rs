//! Core content logic for silov0.
//! This crate is the single source of truth for post-collection invariants.

pub mod config;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use config::{ContentConfig, DEFAULT_POSTS_PATH, POSTS_PATH_ENV};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::post::{
    create_slug, normalize_post, normalize_value, Post, PostId, PostValidationError, RawPost,
    UNTITLED,
};
pub use repo::post_store::{
    load_posts, save_posts, sort_posts, JsonPostStore, PostStore, StoreError, StoreResult,
};
pub use search::query::{
    archive_buckets, build_tag_index, filter_posts, tag_counts, ArchiveBucket, PostFilter,
    TagIndex,
};
pub use service::content_service::{
    ContentErrorKind, ContentService, ContentServiceError, PostSnapshot, ServiceResult,
};
