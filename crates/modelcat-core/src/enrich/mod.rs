//! Enrichment of extracted metadata with hub data.
//!
//! For each artifact reference the orchestrator loads the prior
//! extraction, resolves the best hub match, layers every available hub
//! source through the field merge engine, and persists the rewritten
//! metadata together with a sibling provenance record.
//!
//! Terminal states are [`EnrichmentStatus::Enriched`] and
//! [`EnrichmentStatus::NoMatch`]. Every hub call in between is optional:
//! a failure degrades that source's contribution to "no new data".

mod generate;
mod merge;

pub use generate::{derive_logo, generate_description, license_url};
pub use merge::{
    merge_license, merge_list, merge_scalar, merge_timestamp, parse_date_to_epoch_ms,
};

use crate::config::MatchConfig;
use crate::hub::{HubCandidate, ModelHub};
use crate::matching::{find_best_match, Confidence};
use crate::metadata::MetadataStore;
use crate::modelcard::{self, ModelcardFrontMatter};
use crate::models::ExtractedMetadata;
use crate::provenance::{HubMatchInfo, ProvenanceRecord, Source, Sourced};
use crate::Result;
use tracing::{debug, info, warn};

/// Terminal state of one enrichment pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentStatus {
    Enriched,
    NoMatch,
}

/// Result of enriching one reference.
#[derive(Debug, Clone)]
pub struct EnrichmentOutcome {
    pub reference: String,
    pub status: EnrichmentStatus,
    pub matched_id: Option<String>,
    pub confidence: Confidence,
}

/// Working state of every tracked field during one pass.
#[derive(Debug, Default)]
struct FieldSet {
    name: Sourced<String>,
    provider: Sourced<String>,
    description: Sourced<String>,
    readme: Sourced<String>,
    license: Sourced<String>,
    license_link: Sourced<String>,
    library_name: Sourced<String>,
    language: Sourced<Vec<String>>,
    tags: Sourced<Vec<String>>,
    tasks: Sourced<Vec<String>>,
    validated_on: Sourced<Vec<String>>,
    create_time: Sourced<i64>,
    last_update: Sourced<i64>,
}

impl FieldSet {
    /// Seed fields from the prior extraction.
    ///
    /// A field present in the stored modelcard's structured front-matter
    /// is tagged `modelcard.yaml`; anything else the extraction produced
    /// came from regex text extraction.
    fn seed(prior: &ExtractedMetadata, front_matter: Option<&ModelcardFrontMatter>) -> Self {
        let fm_has = |check: fn(&ModelcardFrontMatter) -> bool| {
            front_matter.map(check).unwrap_or(false)
        };
        let scalar_seed = |value: &Option<String>, confirmed: bool| {
            let source = if confirmed {
                Source::ModelcardFrontmatter
            } else {
                Source::ModelcardRegex
            };
            match value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                Some(v) => Sourced::new(v.to_string(), source),
                None => Sourced::absent(),
            }
        };
        let list_seed = |value: &[String], confirmed: bool| {
            let source = if confirmed {
                Source::ModelcardFrontmatter
            } else {
                Source::ModelcardRegex
            };
            if value.is_empty() {
                Sourced::absent()
            } else {
                Sourced::new(value.to_vec(), source)
            }
        };
        let time_seed = |value: Option<i64>, confirmed: bool| {
            let source = if confirmed {
                Source::ModelcardFrontmatter
            } else {
                Source::ModelcardRegex
            };
            match value {
                Some(v) => Sourced::new(v, source),
                None => Sourced::absent(),
            }
        };

        Self {
            name: scalar_seed(&prior.name, fm_has(|fm| fm.name.is_some())),
            provider: scalar_seed(&prior.provider, fm_has(|fm| fm.provider.is_some())),
            description: scalar_seed(&prior.description, fm_has(|fm| fm.description.is_some())),
            readme: scalar_seed(&prior.readme, false),
            license: scalar_seed(&prior.license, fm_has(|fm| fm.license.is_some())),
            license_link: scalar_seed(&prior.license_link, fm_has(|fm| fm.license_link.is_some())),
            library_name: scalar_seed(&prior.library_name, fm_has(|fm| fm.library_name.is_some())),
            language: list_seed(&prior.language, fm_has(|fm| fm.language.is_some())),
            tags: list_seed(&prior.tags, fm_has(|fm| fm.tags.is_some())),
            tasks: list_seed(
                &prior.tasks,
                fm_has(|fm| fm.tasks.is_some() || fm.pipeline_tag.is_some()),
            ),
            validated_on: list_seed(&prior.validated_on, fm_has(|fm| fm.validated_on.is_some())),
            create_time: time_seed(
                prior.create_time_since_epoch,
                fm_has(|fm| fm.release_date.is_some()),
            ),
            last_update: time_seed(prior.last_update_time_since_epoch, false),
        }
    }

    /// Write the resolved values back into the metadata record.
    fn apply_to(&self, metadata: &mut ExtractedMetadata) {
        metadata.name = self.name.value.clone();
        metadata.provider = self.provider.value.clone();
        metadata.description = self.description.value.clone();
        metadata.readme = self.readme.value.clone();
        metadata.license = self.license.value.clone();
        metadata.license_link = self.license_link.value.clone();
        metadata.library_name = self.library_name.value.clone();
        metadata.language = self.language.value.clone().unwrap_or_default();
        metadata.tags = self.tags.value.clone().unwrap_or_default();
        metadata.tasks = self.tasks.value.clone().unwrap_or_default();
        metadata.validated_on = self.validated_on.value.clone().unwrap_or_default();
        metadata.create_time_since_epoch = self.create_time.value;
        metadata.last_update_time_since_epoch = self.last_update.value;
        metadata.normalize_timestamps();
    }

    fn record_provenance(&self, record: &mut ProvenanceRecord) {
        record.record("name", self.name.source);
        record.record("provider", self.provider.source);
        record.record("description", self.description.source);
        record.record("readme", self.readme.source);
        record.record("license", self.license.source);
        record.record("license_link", self.license_link.source);
        record.record("library_name", self.library_name.source);
        record.record("language", self.language.source);
        record.record("tags", self.tags.source);
        record.record("tasks", self.tasks.source);
        record.record("validated_on", self.validated_on.source);
        record.record("create_time_since_epoch", self.create_time.source);
        record.record("last_update_time_since_epoch", self.last_update.source);
    }

    /// Rules that fire once all sources have been consulted.
    fn finalize(&mut self) {
        // Derived license link, tagged as generated.
        if self.license_link.value.is_none() {
            if let Some(url) = self.license.as_ref().and_then(|l| license_url(l)) {
                self.license_link = Sourced::new(url.to_string(), Source::Generated);
            }
        }

        // update defaults to create; create is never invented.
        if !self.last_update.is_set() && self.create_time.is_set() {
            self.last_update = Sourced::new(
                self.create_time.value.unwrap_or_default(),
                self.create_time.source,
            );
        }
    }
}

/// Seeded names that are really document titles, not model names.
///
/// A medium-confidence hub match may replace such a name; this phrase
/// list is a tunable heuristic, not a contract.
pub fn looks_like_document_title(name: &str) -> bool {
    let lowered = name.to_lowercase();
    ["model card", "model-card", "modelcard", "readme"]
        .iter()
        .any(|phrase| lowered.contains(phrase))
}

/// Known hub pipeline task identifiers.
const KNOWN_TASKS: &[&str] = &[
    "text-generation",
    "text2text-generation",
    "text-classification",
    "token-classification",
    "question-answering",
    "summarization",
    "translation",
    "fill-mask",
    "feature-extraction",
    "sentence-similarity",
    "image-classification",
    "image-segmentation",
    "image-to-text",
    "object-detection",
    "text-to-image",
    "automatic-speech-recognition",
    "audio-classification",
    "text-to-speech",
    "zero-shot-classification",
    "zero-shot-image-classification",
];

fn is_language_tag(tag: &str) -> bool {
    tag.len() == 2 && tag.chars().all(|c| c.is_ascii_lowercase())
}

fn is_task_tag(tag: &str) -> bool {
    KNOWN_TASKS.contains(&tag)
}

/// The filtered view of raw hub tags used as a tag fallback: language
/// codes, task identifiers, and namespaced bookkeeping tags are removed.
fn filtered_hub_tags(tags: &[String]) -> Vec<String> {
    const STRIPPED_PREFIXES: &[&str] =
        &["arxiv:", "base_model:", "license:", "region:", "dataset:", "doi:"];

    tags.iter()
        .filter(|tag| !is_language_tag(tag))
        .filter(|tag| !is_task_tag(tag))
        .filter(|tag| !STRIPPED_PREFIXES.iter().any(|p| tag.starts_with(p)))
        .cloned()
        .collect()
}

/// Per-reference enrichment driver.
pub struct Enricher<'a> {
    store: &'a MetadataStore,
    hub: &'a dyn ModelHub,
}

impl<'a> Enricher<'a> {
    pub fn new(store: &'a MetadataStore, hub: &'a dyn ModelHub) -> Self {
        Self { store, hub }
    }

    /// Enrich one reference against the given candidate index.
    pub async fn enrich(
        &self,
        reference: &str,
        candidates: &[HubCandidate],
    ) -> Result<EnrichmentOutcome> {
        // 1-3: load prior state and seed the field set.
        let prior = self.store.load_metadata(reference)?.unwrap_or_default();
        let stored_card = self.store.load_modelcard(reference)?;
        let card_front_matter = stored_card
            .as_deref()
            .map(modelcard::parse_modelcard)
            .and_then(|parsed| parsed.front_matter);

        let mut fields = FieldSet::seed(&prior, card_front_matter.as_ref());

        // 4: resolve the best hub match.
        let best = find_best_match(reference, candidates.iter().map(|c| c.id.as_str()));
        let matched = match best {
            Some(result) if result.score >= MatchConfig::MATCH_THRESHOLD => result,
            other => {
                debug!(
                    "No hub match for {} (best score {:?})",
                    reference,
                    other.map(|m| m.score)
                );
                fields.finalize();
                self.persist(reference, prior, &fields, None);
                return Ok(EnrichmentOutcome {
                    reference: reference.to_string(),
                    status: EnrichmentStatus::NoMatch,
                    matched_id: None,
                    confidence: Confidence::None,
                });
            }
        };
        let candidate = candidates
            .iter()
            .find(|c| c.id == matched.candidate)
            .cloned();
        info!(
            "Matched {} -> {} (score {:.3}, {})",
            reference, matched.candidate, matched.score, matched.confidence
        );

        // 5: hub API details, then parsed hub tags.
        let details = match self.hub.fetch_details(&matched.candidate).await {
            Ok(details) => Some(details),
            Err(e) => {
                warn!("Hub details unavailable for {}: {}", matched.candidate, e);
                None
            }
        };

        // Authority ordering alone cannot express the confidence rule for
        // the matched name, so this assignment is explicit: a
        // high-confidence match, or a medium match whose seeded name reads
        // like a document title, replaces a regex-derived name. A name
        // declared in modelcard front-matter always stays.
        let hub_name = matched
            .candidate
            .split('/')
            .next_back()
            .unwrap_or(&matched.candidate)
            .to_string();
        if !fields.name.is_set() {
            merge_scalar(&mut fields.name, Some(&hub_name), Source::HubApi);
        } else if fields.name.source < Source::ModelcardFrontmatter
            && (matched.confidence == Confidence::High
                || fields
                    .name
                    .as_ref()
                    .is_some_and(|n| looks_like_document_title(n)))
        {
            fields.name = Sourced::new(hub_name.clone(), Source::HubApi);
        }

        let mut raw_hub_tags: Vec<String> = Vec::new();
        if let Some(details) = &details {
            merge_scalar(
                &mut fields.provider,
                details.author.as_deref(),
                Source::HubApi,
            );
            merge_scalar(
                &mut fields.library_name,
                details.library_name.as_deref(),
                Source::HubApi,
            );
            merge_license(&mut fields.license, details.license.as_deref(), Source::HubApi);
            if let Some(task) = &details.pipeline_tag {
                merge_list(&mut fields.tasks, &[task.clone()], Source::HubApi);
            }
            merge_timestamp(
                &mut fields.create_time,
                details.created_at.as_deref().and_then(parse_date_to_epoch_ms),
                Source::HubApi,
            );
            merge_timestamp(
                &mut fields.last_update,
                details
                    .last_modified
                    .as_deref()
                    .and_then(parse_date_to_epoch_ms),
                Source::HubApi,
            );

            raw_hub_tags = details.tags.clone();
            let languages: Vec<String> = raw_hub_tags
                .iter()
                .filter(|t| is_language_tag(t))
                .cloned()
                .collect();
            merge_list(&mut fields.language, &languages, Source::HubTags);

            let tasks: Vec<String> = raw_hub_tags
                .iter()
                .filter(|t| is_task_tag(t))
                .cloned()
                .collect();
            merge_list(&mut fields.tasks, &tasks, Source::HubTags);

            if let Some(license) = raw_hub_tags
                .iter()
                .find_map(|t| t.strip_prefix("license:"))
            {
                merge_license(&mut fields.license, Some(license), Source::HubTags);
            }
        }

        // 6: hub README, front-matter first, then regex fallbacks.
        let mut hub_front_matter_tags = false;
        match self.hub.fetch_readme(&matched.candidate).await {
            Ok(readme) => {
                let parsed = modelcard::parse_modelcard(&readme);
                if let Some(fm) = &parsed.front_matter {
                    merge_scalar(&mut fields.name, fm.name.as_deref(), Source::HubFrontmatter);
                    merge_scalar(
                        &mut fields.provider,
                        fm.provider.as_deref(),
                        Source::HubFrontmatter,
                    );
                    merge_scalar(
                        &mut fields.description,
                        fm.description.as_deref(),
                        Source::HubFrontmatter,
                    );
                    merge_license(
                        &mut fields.license,
                        fm.license.as_deref(),
                        Source::HubFrontmatter,
                    );
                    merge_scalar(
                        &mut fields.license_link,
                        fm.license_link.as_deref(),
                        Source::HubFrontmatter,
                    );
                    merge_scalar(
                        &mut fields.library_name,
                        fm.library_name.as_deref(),
                        Source::HubFrontmatter,
                    );
                    merge_list(&mut fields.language, &fm.languages(), Source::HubFrontmatter);
                    merge_list(&mut fields.tasks, &fm.all_tasks(), Source::HubFrontmatter);
                    if let Some(tags) = &fm.tags {
                        hub_front_matter_tags = !tags.is_empty();
                        merge_list(&mut fields.tags, tags, Source::HubFrontmatter);
                    }
                    if let Some(validated) = &fm.validated_on {
                        merge_list(&mut fields.validated_on, validated, Source::HubFrontmatter);
                    }
                    merge_timestamp(
                        &mut fields.create_time,
                        fm.release_date.as_deref().and_then(parse_date_to_epoch_ms),
                        Source::HubFrontmatter,
                    );
                }

                merge_scalar(
                    &mut fields.readme,
                    Some(parsed.body.trim()),
                    Source::HubRegex,
                );
                merge_scalar(
                    &mut fields.provider,
                    modelcard::extract_provider(&parsed.body).as_deref(),
                    Source::HubRegex,
                );
                merge_scalar(
                    &mut fields.description,
                    modelcard::extract_description(&parsed.body).as_deref(),
                    Source::HubRegex,
                );
                merge_timestamp(
                    &mut fields.create_time,
                    modelcard::extract_release_date(&parsed.body)
                        .as_deref()
                        .and_then(parse_date_to_epoch_ms),
                    Source::HubRegex,
                );
            }
            Err(e) => {
                warn!("Hub README unavailable for {}: {}", matched.candidate, e);
            }
        }

        // 7: tag fallback. Hub front-matter tags already replaced lower
        // tiers; otherwise the filtered raw tag view unions in.
        if !hub_front_matter_tags && !raw_hub_tags.is_empty() {
            merge_list(&mut fields.tags, &filtered_hub_tags(&raw_hub_tags), Source::HubTags);
        }

        // Last-resort description, from the resolved name.
        if !fields.description.is_set() {
            let basis = fields
                .name
                .as_ref()
                .cloned()
                .unwrap_or_else(|| crate::matching::normalize_identifier(reference));
            fields.description = Sourced::new(generate_description(&basis), Source::Generated);
        }

        fields.finalize();

        // 8: persist metadata and the provenance sidecar.
        let hub_match = Some(HubMatchInfo {
            model_id: matched.candidate.clone(),
            url: candidate.and_then(|c| c.url),
            confidence: matched.confidence.as_str().to_string(),
            score: matched.score,
        });
        self.persist(reference, prior, &fields, hub_match);

        Ok(EnrichmentOutcome {
            reference: reference.to_string(),
            status: EnrichmentStatus::Enriched,
            matched_id: Some(matched.candidate),
            confidence: matched.confidence,
        })
    }

    /// Write back metadata and provenance; failures are logged, never fatal.
    fn persist(
        &self,
        reference: &str,
        mut metadata: ExtractedMetadata,
        fields: &FieldSet,
        hub_match: Option<HubMatchInfo>,
    ) {
        fields.apply_to(&mut metadata);
        if let Err(e) = self.store.save_metadata(reference, &metadata) {
            warn!("Failed to persist metadata for {}: {}", reference, e);
        }

        let mut provenance = ProvenanceRecord {
            hub_match,
            ..Default::default()
        };
        fields.record_provenance(&mut provenance);
        if let Err(e) = self.store.save_provenance(reference, &provenance) {
            warn!("Failed to persist provenance for {}: {}", reference, e);
        }
    }
}
