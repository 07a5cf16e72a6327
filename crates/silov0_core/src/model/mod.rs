//! Canonical blog-post domain model.
//!
//! # Responsibility
//! - Define the canonical `Post` record shared by store, query and service.
//! - Own input normalization and identifier (slug) derivation.
//!
//! # Invariants
//! - Every canonical post has a non-empty `id` and `date`.
//! - A post is never mutated in place; changes produce a new normalized record.

pub mod post;
