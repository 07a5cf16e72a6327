//! Core use-case services.
//!
//! # Responsibility
//! - Own the in-memory working copy of the post collection.
//! - Keep CLI/HTTP collaborators decoupled from storage details.

pub mod content_service;
