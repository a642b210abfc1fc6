//! Container registry access.
//!
//! The extraction pipeline needs exactly two things from a registry: the
//! raw bytes of the single modelcard markdown file embedded in an
//! artifact, and the artifact records tied to a reference. Both sit
//! behind [`ModelcardSource`] so tests and alternative registries can
//! swap in.

mod oci;

pub use oci::OciRegistryClient;

use crate::models::Artifact;
use crate::Result;
use async_trait::async_trait;

/// Outcome of looking for a modelcard in one artifact.
///
/// More than one markdown candidate is reported distinctly: the caller
/// must not guess which file is canonical.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelcardLookup {
    /// Exactly one qualifying markdown file.
    Found(Vec<u8>),
    /// No qualifying markdown file.
    NotFound,
    /// More than one qualifying markdown file; count attached.
    Ambiguous(usize),
}

/// Read access to modelcard content and artifact records.
#[async_trait]
pub trait ModelcardSource: Send + Sync {
    /// Fetch the modelcard markdown bytes for a reference.
    async fn fetch_modelcard(&self, reference: &str) -> Result<ModelcardLookup>;

    /// Registry-derived artifact records for a reference.
    ///
    /// Never fails hard: on any internal error this still returns at
    /// least the reference's own URI.
    async fn fetch_artifacts(&self, reference: &str) -> Vec<Artifact>;
}
