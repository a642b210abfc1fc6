//! Extraction pipeline.
//!
//! Turns a list of artifact references into per-model extracted metadata
//! under the output root. A counting semaphore bounds how many workers
//! run at once; results flow through a channel sized to the input count
//! and are drained only after every worker has finished. Workers share no
//! mutable state: each one reads and writes only its own per-model
//! directory, and every outbound call carries its own timeout, so one
//! slow reference never blocks the batch.

use crate::config::MatchConfig;
use crate::hub::{HubCandidate, ModelHub};
use crate::matching::find_best_match;
use crate::metadata::MetadataStore;
use crate::modelcard::{self, ParsedModelcard};
use crate::models::ExtractedMetadata;
use crate::registry::{ModelcardLookup, ModelcardSource};
use crate::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// How one reference was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStatus {
    /// A modelcard was found and parsed.
    Extracted,
    /// No usable modelcard; a skeleton record was written.
    Skeleton,
    /// Skeleton plus a stored hub README as substitute modelcard.
    SkeletonWithFallback,
}

/// Per-reference result of the extraction stage.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub reference: String,
    pub status: ExtractionStatus,
    /// Degradation note when something went wrong along the way.
    pub error: Option<String>,
}

/// All outcomes of one batch, in no particular order.
#[derive(Debug, Default)]
pub struct ExtractionSummary {
    pub outcomes: Vec<ExtractionOutcome>,
}

impl ExtractionSummary {
    pub fn extracted(&self) -> usize {
        self.count(ExtractionStatus::Extracted)
    }

    pub fn skeletons(&self) -> usize {
        self.outcomes.len() - self.extracted()
    }

    pub fn degraded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error.is_some()).count()
    }

    fn count(&self, status: ExtractionStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

/// Bounded-concurrency extraction over artifact references.
pub struct ExtractionPipeline {
    registry: Arc<dyn ModelcardSource>,
    hub: Arc<dyn ModelHub>,
    store: MetadataStore,
    concurrency: usize,
}

impl ExtractionPipeline {
    pub fn new(
        registry: Arc<dyn ModelcardSource>,
        hub: Arc<dyn ModelHub>,
        store: MetadataStore,
        concurrency: usize,
    ) -> Self {
        Self {
            registry,
            hub,
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Process every reference and return all outcomes.
    ///
    /// The candidate index backs the skeleton fallback path; pass an
    /// empty slice to disable it. Per-reference failures are folded into
    /// their outcome; the only errors that propagate from here are
    /// setup-fatal ones.
    pub async fn run(
        &self,
        references: &[String],
        candidates: &[HubCandidate],
    ) -> Result<ExtractionSummary> {
        if references.is_empty() {
            return Ok(ExtractionSummary::default());
        }

        let candidates: Arc<Vec<HubCandidate>> = Arc::new(candidates.to_vec());

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let (tx, mut rx) = mpsc::channel::<ExtractionOutcome>(references.len());
        let mut workers = JoinSet::new();

        for reference in references {
            let reference = reference.clone();
            let registry = self.registry.clone();
            let hub = self.hub.clone();
            let store = self.store.clone();
            let candidates = candidates.clone();
            let semaphore = semaphore.clone();
            let tx = tx.clone();

            workers.spawn(async move {
                // Closed semaphore cannot happen; holding the permit for
                // the worker's whole lifetime is the concurrency bound.
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let outcome =
                    extract_one(&*registry, &*hub, &store, &candidates, &reference).await;
                let _ = tx.send(outcome).await;
            });
        }
        drop(tx);

        // Wait-barrier: every worker finishes before results are drained.
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!("Extraction worker panicked: {}", e);
            }
        }

        let mut summary = ExtractionSummary::default();
        while let Some(outcome) = rx.recv().await {
            summary.outcomes.push(outcome);
        }

        info!(
            "Extraction complete: {} extracted, {} skeleton, {} degraded",
            summary.extracted(),
            summary.skeletons(),
            summary.degraded()
        );

        Ok(summary)
    }
}

/// Build an extracted record from modelcard text: front-matter first,
/// regex extraction for whatever remains.
pub fn metadata_from_modelcard(text: &str) -> ExtractedMetadata {
    let ParsedModelcard { front_matter, body } = modelcard::parse_modelcard(text);
    let fm = front_matter.unwrap_or_default();

    let body_trimmed = body.trim();
    let mut metadata = ExtractedMetadata {
        name: fm.name.clone().or_else(|| modelcard::extract_title(&body)),
        provider: fm
            .provider
            .clone()
            .or_else(|| modelcard::extract_provider(&body)),
        description: fm
            .description
            .clone()
            .or_else(|| modelcard::extract_description(&body)),
        readme: (!body_trimmed.is_empty()).then(|| body_trimmed.to_string()),
        license: fm.license.clone(),
        license_link: fm.license_link.clone(),
        library_name: fm.library_name.clone(),
        language: fm.languages(),
        tags: fm.tags.clone().unwrap_or_default(),
        tasks: fm.all_tasks(),
        validated_on: fm.validated_on.clone().unwrap_or_default(),
        create_time_since_epoch: fm
            .release_date
            .clone()
            .or_else(|| modelcard::extract_release_date(&body))
            .as_deref()
            .and_then(crate::enrich::parse_date_to_epoch_ms),
        last_update_time_since_epoch: None,
        artifacts: Vec::new(),
    };
    metadata.normalize_timestamps();
    metadata
}

/// Handle one reference end to end.
async fn extract_one(
    registry: &dyn ModelcardSource,
    hub: &dyn ModelHub,
    store: &MetadataStore,
    candidates: &[HubCandidate],
    reference: &str,
) -> ExtractionOutcome {
    let artifacts = registry.fetch_artifacts(reference).await;

    let (lookup, lookup_error) = match registry.fetch_modelcard(reference).await {
        Ok(lookup) => (lookup, None),
        Err(e) => {
            warn!("Modelcard fetch failed for {}: {}", reference, e);
            (ModelcardLookup::NotFound, Some(e.to_string()))
        }
    };

    match lookup {
        ModelcardLookup::Found(bytes) => {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            if let Err(e) = store.save_modelcard(reference, &text) {
                warn!("Failed to store modelcard for {}: {}", reference, e);
            }

            let mut metadata = metadata_from_modelcard(&text);
            metadata.artifacts = artifacts;

            match store.save_metadata(reference, &metadata) {
                Ok(()) => ExtractionOutcome {
                    reference: reference.to_string(),
                    status: ExtractionStatus::Extracted,
                    error: None,
                },
                Err(e) => ExtractionOutcome {
                    reference: reference.to_string(),
                    status: ExtractionStatus::Extracted,
                    error: Some(e.to_string()),
                },
            }
        }
        other => {
            if let ModelcardLookup::Ambiguous(count) = other {
                // More than one candidate file: do not guess which is
                // canonical, fall back to the skeleton path.
                warn!(
                    "{} markdown candidates in {}, treating as not found",
                    count, reference
                );
            }

            let mut skeleton = ExtractedMetadata::skeleton();
            skeleton.artifacts = artifacts;
            let mut error = lookup_error;
            if let Err(e) = store.save_metadata(reference, &skeleton) {
                warn!("Failed to store skeleton for {}: {}", reference, e);
                error.get_or_insert_with(|| e.to_string());
            }

            // One-shot fallback: a matching hub README becomes the
            // substitute modelcard for later enrichment passes.
            let status = match fallback_readme(hub, candidates, reference).await {
                Some(readme) => match store.save_modelcard(reference, &readme) {
                    Ok(()) => ExtractionStatus::SkeletonWithFallback,
                    Err(e) => {
                        warn!("Failed to store fallback README for {}: {}", reference, e);
                        ExtractionStatus::Skeleton
                    }
                },
                None => ExtractionStatus::Skeleton,
            };

            ExtractionOutcome {
                reference: reference.to_string(),
                status,
                error,
            }
        }
    }
}

/// Fetch the best-matching hub README with its front-matter stripped.
async fn fallback_readme(
    hub: &dyn ModelHub,
    candidates: &[HubCandidate],
    reference: &str,
) -> Option<String> {
    let best = find_best_match(reference, candidates.iter().map(|c| c.id.as_str()))?;
    if best.score < MatchConfig::MATCH_THRESHOLD {
        return None;
    }

    match hub.fetch_readme(&best.candidate).await {
        Ok(readme) => {
            debug!(
                "Stored hub README of {} as substitute modelcard for {}",
                best.candidate, reference
            );
            Some(modelcard::strip_front_matter(&readme))
        }
        Err(e) => {
            warn!("Fallback README fetch failed for {}: {}", best.candidate, e);
            None
        }
    }
}
