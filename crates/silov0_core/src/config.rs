//! Core configuration surface.
//!
//! # Responsibility
//! - Resolve the location of the durable posts file.
//!
//! # Invariants
//! - `SILOV0_POSTS_PATH` is the only environment variable read by core.

use std::path::PathBuf;

/// Environment variable overriding the posts file location.
pub const POSTS_PATH_ENV: &str = "SILOV0_POSTS_PATH";
/// Default posts file location, relative to the working directory.
pub const DEFAULT_POSTS_PATH: &str = "posts/posts.json";

/// Explicit configuration for one content service instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentConfig {
    pub storage_path: PathBuf,
}

impl ContentConfig {
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: storage_path.into(),
        }
    }

    /// Builds config from `SILOV0_POSTS_PATH`, falling back to the default.
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(POSTS_PATH_ENV).ok())
    }

    fn from_env_value(value: Option<String>) -> Self {
        match value.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => Self::new(path),
            _ => Self::default(),
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POSTS_PATH)
    }
}
