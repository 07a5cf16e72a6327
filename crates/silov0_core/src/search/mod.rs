//! Read-only query views over a post collection.
//!
//! # Responsibility
//! - Filter posts by tag and free-text query.
//! - Aggregate tag frequencies and month archives.
//!
//! # Invariants
//! - Every function is pure: same input snapshot, same output.

pub mod query;
