//! Metadata persistence.
//!
//! This module provides:
//! - Atomic YAML/text file operations
//! - The per-reference metadata store (records, provenance, modelcards)

mod atomic;
mod store;

pub use atomic::{atomic_read_yaml, atomic_write_text, atomic_write_yaml, read_text};
pub use store::{sanitize_reference, MetadataStore};
