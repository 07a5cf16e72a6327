//! Tag/text filtering and aggregate views.
//!
//! # Responsibility
//! - Select posts matching an optional tag and an optional text query.
//! - Count tag occurrences and group posts into `YYYY-MM` archive buckets.
//!
//! # Invariants
//! - Filtering preserves the input order.
//! - Tag matching is exact and case-sensitive; text matching is case-insensitive.
//! - Archive months are computed in UTC.

use crate::model::post::Post;
use chrono::Datelike;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag -> occurrence count across a collection.
pub type TagIndex = BTreeMap<String, usize>;

/// Optional filter parameters. Blank values mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    /// Exact tag to require.
    pub tag: Option<String>,
    /// Case-insensitive substring over title, summary and tags.
    pub query: Option<String>,
}

impl PostFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Returns whether at least one constraint survives trimming.
    pub fn is_active(&self) -> bool {
        non_blank(self.tag.as_deref()).is_some() || non_blank(self.query.as_deref()).is_some()
    }
}

/// Posts per calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveBucket {
    /// `YYYY-MM`, fixed width.
    pub label: String,
    pub count: usize,
}

/// Returns the posts matching `filter`, in input order.
pub fn filter_posts(posts: &[Post], filter: &PostFilter) -> Vec<Post> {
    let tag = non_blank(filter.tag.as_deref());
    let query = non_blank(filter.query.as_deref()).map(str::to_lowercase);

    posts
        .iter()
        .filter(|post| tag.map_or(true, |tag| post.tags.iter().any(|t| t == tag)))
        .filter(|post| {
            query
                .as_deref()
                .map_or(true, |query| search_haystack(post).contains(query))
        })
        .cloned()
        .collect()
}

/// Counts every tag occurrence across `posts`.
pub fn build_tag_index(posts: &[Post]) -> TagIndex {
    let mut index = TagIndex::new();
    for tag in posts.iter().flat_map(|post| post.tags.iter()) {
        *index.entry(tag.clone()).or_insert(0) += 1;
    }
    index
}

/// Returns `(tag, count)` pairs sorted by tag name.
pub fn tag_counts(posts: &[Post]) -> Vec<(String, usize)> {
    build_tag_index(posts).into_iter().collect()
}

/// Groups posts by UTC `YYYY-MM`, newest month first.
///
/// Posts whose date cannot be interpreted are skipped.
pub fn archive_buckets(posts: &[Post]) -> Vec<ArchiveBucket> {
    let mut months: BTreeMap<String, usize> = BTreeMap::new();
    for post in posts {
        let Some(published_at) = post.published_at() else {
            debug!(
                "event=archive_skip module=search reason=unparseable_date id={}",
                post.id
            );
            continue;
        };
        let label = format!("{:04}-{:02}", published_at.year(), published_at.month());
        *months.entry(label).or_insert(0) += 1;
    }

    months
        .into_iter()
        .rev()
        .map(|(label, count)| ArchiveBucket { label, count })
        .collect()
}

fn search_haystack(post: &Post) -> String {
    format!("{} {} {}", post.title, post.summary, post.tags.join(" ")).to_lowercase()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
