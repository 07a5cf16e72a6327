//! Persistence layer for the post collection.
//!
//! # Responsibility
//! - Define the storage contract used by the content service.
//! - Keep file-format and I/O details inside the persistence boundary.
//!
//! # Invariants
//! - Stores only return and persist normalized, sorted collections.
//! - Stores never hand out a collection with duplicate ids.

pub mod post_store;
