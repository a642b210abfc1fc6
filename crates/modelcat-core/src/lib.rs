//! modelcat core - headless library for building model metadata catalogs.
//!
//! This crate turns a list of OCI artifact references into a consolidated
//! model catalog. It runs three sequential stages over an explicit output
//! root:
//!
//! 1. **Extraction** - a bounded worker pool pulls the embedded modelcard
//!    out of each artifact (or writes a skeleton record when none exists)
//! 2. **Enrichment** - each record is matched against a hub index and
//!    rewritten with merged, provenance-tagged fields
//! 3. **Consolidation** - records that resolve to the same logical model
//!    collapse into one catalog entry, static records are appended, and
//!    the final document is written
//!
//! # Example
//!
//! ```rust,ignore
//! use modelcat_core::{CatalogPipeline, HuggingFaceHub, OciRegistryClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> modelcat_core::Result<()> {
//!     let registry = Arc::new(OciRegistryClient::new()?);
//!     let hub = Arc::new(
//!         HuggingFaceHub::new("./out/cache")?
//!             .with_authors(vec!["ibm-granite".to_string()]),
//!     );
//!
//!     let pipeline = CatalogPipeline::new(registry, hub, "./out", 4)?;
//!     let refs = vec!["registry.example.com/org/modelcar-granite-8b:1.5".to_string()];
//!     let summary = pipeline.run(&refs, Vec::new()).await?;
//!     println!("catalog has {} models", summary.catalog_models);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod hub;
pub mod matching;
pub mod metadata;
pub mod modelcard;
pub mod models;
pub mod provenance;
pub mod registry;

// Re-export commonly used types
pub use catalog::{consolidate, to_catalog_metadata};
pub use enrich::{Enricher, EnrichmentOutcome, EnrichmentStatus};
pub use error::{CatalogError, Result};
pub use extract::{ExtractionPipeline, ExtractionStatus, ExtractionSummary};
pub use hub::{HubCandidate, HubModelDetails, HuggingFaceHub, ModelHub, StaticHubIndex};
pub use matching::{find_best_match, normalize_identifier, similarity, Confidence, MatchResult};
pub use metadata::MetadataStore;
pub use models::{Artifact, CatalogDocument, CatalogMetadata, CustomValue, ExtractedMetadata};
pub use provenance::{ProvenanceRecord, Source, Sourced};
pub use registry::{ModelcardLookup, ModelcardSource, OciRegistryClient};

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Counts reported after a full batch run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub references: usize,
    pub extracted: usize,
    pub skeletons: usize,
    pub enriched: usize,
    pub no_match: usize,
    pub catalog_models: usize,
}

/// End-to-end batch driver: extraction, enrichment, consolidation.
pub struct CatalogPipeline {
    registry: Arc<dyn ModelcardSource>,
    hub: Arc<dyn ModelHub>,
    store: MetadataStore,
    concurrency: usize,
}

impl CatalogPipeline {
    /// Create a pipeline rooted at `output_root`.
    ///
    /// The output tree is created here; failure to do so is the one
    /// setup-fatal condition and aborts before any worker starts.
    pub fn new(
        registry: Arc<dyn ModelcardSource>,
        hub: Arc<dyn ModelHub>,
        output_root: impl Into<PathBuf>,
        concurrency: usize,
    ) -> Result<Self> {
        let store = MetadataStore::new(output_root)?;
        Ok(Self {
            registry,
            hub,
            store,
            concurrency: concurrency.max(1),
        })
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// Run the whole batch.
    ///
    /// Per-model failures degrade that model's contribution and never
    /// abort the run; the returned error cases are all setup-fatal.
    pub async fn run(
        &self,
        references: &[String],
        static_records: Vec<CatalogMetadata>,
    ) -> Result<RunSummary> {
        // The candidate index is fetched once and shared by the
        // extraction fallback and the enrichment matcher.
        let candidates = match self.hub.list_candidates().await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Hub candidate index unavailable: {}", e);
                Vec::new()
            }
        };
        info!(
            "Processing {} references against {} hub candidates",
            references.len(),
            candidates.len()
        );

        let extraction = ExtractionPipeline::new(
            self.registry.clone(),
            self.hub.clone(),
            self.store.clone(),
            self.concurrency,
        );
        let extraction_summary = extraction.run(references, &candidates).await?;

        // Enrichment runs as a sequential stage after the extraction
        // barrier.
        let enricher = Enricher::new(&self.store, &*self.hub);
        let mut enriched = 0usize;
        let mut no_match = 0usize;
        for reference in references {
            match enricher.enrich(reference, &candidates).await {
                Ok(outcome) => match outcome.status {
                    EnrichmentStatus::Enriched => enriched += 1,
                    EnrichmentStatus::NoMatch => no_match += 1,
                },
                Err(e) => {
                    warn!("Enrichment failed for {}: {}", reference, e);
                }
            }
        }

        let records = self.store.load_all_metadata()?;
        let document = consolidate(records, static_records);
        let catalog_models = document.models.len();
        self.store.write_catalog(&document)?;

        Ok(RunSummary {
            references: references.len(),
            extracted: extraction_summary.extracted(),
            skeletons: extraction_summary.skeletons(),
            enriched,
            no_match,
            catalog_models,
        })
    }
}
