//! Plain-text renderers for CLI output.
//!
//! # Responsibility
//! - Format posts, tag counts and archive buckets as console text.
//! - Stay free of I/O so output can be asserted in tests.

use silov0_core::{ArchiveBucket, Post};
use std::fmt::Write;

/// Renders the markdown-ish digest of `posts`.
///
/// `total` is the unfiltered collection size; a `Showing N of M posts`
/// line is emitted when it differs from `posts.len()` or `filtered` is set.
pub fn render_digest(posts: &[Post], total: usize, filtered: bool) -> String {
    let mut out = String::from("# silov0 digest\n\n");
    if filtered || posts.len() != total {
        let _ = writeln!(out, "Showing {} of {} posts\n", posts.len(), total);
    }

    for post in posts {
        let _ = writeln!(out, "## {}", post.title);
        let _ = writeln!(out, "{}", post.date);
        if !post.tags.is_empty() {
            let _ = writeln!(out, "_tags: {}_", post.tags.join(", "));
        }
        out.push('\n');
        let _ = writeln!(out, "{}", post.summary);
        out.push('\n');
    }
    out
}

/// One `tag (count)` line per tag, in the given order.
pub fn render_tag_counts(counts: &[(String, usize)]) -> String {
    counts
        .iter()
        .map(|(tag, count)| format!("{tag} ({count})\n"))
        .collect()
}

/// One `YYYY-MM (count)` line per bucket.
pub fn render_archives(buckets: &[ArchiveBucket]) -> String {
    buckets
        .iter()
        .map(|bucket| format!("{} ({})\n", bucket.label, bucket.count))
        .collect()
}
