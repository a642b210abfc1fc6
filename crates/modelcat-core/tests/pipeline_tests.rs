//! Integration tests for the full catalog pipeline.
//!
//! These drive extraction, enrichment, and consolidation end to end
//! against in-memory registry and hub collaborators.

use async_trait::async_trait;
use modelcat_core::{
    Artifact, CatalogDocument, CatalogMetadata, CatalogPipeline, ExtractedMetadata,
    HubCandidate, HubModelDetails, ModelHub, ModelcardLookup, ModelcardSource,
};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

struct FakeRegistry {
    cards: HashMap<String, ModelcardLookup>,
}

#[async_trait]
impl ModelcardSource for FakeRegistry {
    async fn fetch_modelcard(&self, reference: &str) -> modelcat_core::Result<ModelcardLookup> {
        Ok(self
            .cards
            .get(reference)
            .cloned()
            .unwrap_or(ModelcardLookup::NotFound))
    }

    async fn fetch_artifacts(&self, reference: &str) -> Vec<Artifact> {
        let mut artifact = Artifact::new(reference);
        artifact.create_time_since_epoch = Some(1_700_000_000_000);
        vec![artifact]
    }
}

struct FakeHub {
    candidates: Vec<HubCandidate>,
    details: HashMap<String, HubModelDetails>,
    readmes: HashMap<String, String>,
}

#[async_trait]
impl ModelHub for FakeHub {
    async fn list_candidates(&self) -> modelcat_core::Result<Vec<HubCandidate>> {
        Ok(self.candidates.clone())
    }

    async fn fetch_details(&self, model_id: &str) -> modelcat_core::Result<HubModelDetails> {
        self.details.get(model_id).cloned().ok_or_else(|| {
            modelcat_core::CatalogError::HubModelNotFound {
                model_id: model_id.to_string(),
            }
        })
    }

    async fn fetch_readme(&self, model_id: &str) -> modelcat_core::Result<String> {
        self.readmes.get(model_id).cloned().ok_or_else(|| {
            modelcat_core::CatalogError::HubModelNotFound {
                model_id: model_id.to_string(),
            }
        })
    }
}

const GRANITE_CARD: &str = "---\n\
license: apache-2.0\n\
language:\n\
  - en\n\
tags:\n\
  - granite\n\
---\n\
\n\
# Granite 8B Code Instruct\n\
\n\
Granite is a family of decoder-only code models.\n";

fn granite_hub() -> FakeHub {
    let id = "ibm-granite/granite-8b-code-instruct";
    FakeHub {
        candidates: vec![HubCandidate {
            id: id.to_string(),
            url: Some(format!("https://huggingface.co/{}", id)),
            readme_path: None,
        }],
        details: HashMap::from([(
            id.to_string(),
            HubModelDetails {
                id: id.to_string(),
                author: Some("ibm-granite".to_string()),
                pipeline_tag: Some("text-generation".to_string()),
                library_name: Some("transformers".to_string()),
                license: Some("apache-2.0".to_string()),
                tags: vec!["en".to_string(), "granite".to_string()],
                created_at: Some("2024-04-18T00:00:00Z".to_string()),
                last_modified: Some("2024-06-01T00:00:00Z".to_string()),
                downloads: Some(12_000),
            },
        )]),
        readmes: HashMap::from([(
            id.to_string(),
            "---\nlicense: apache-2.0\n---\n\n# Granite\n\nHub readme text.\n".to_string(),
        )]),
    }
}

fn read_catalog(temp: &TempDir) -> CatalogDocument {
    let raw = std::fs::read_to_string(temp.path().join("models-catalog.yaml")).unwrap();
    serde_yaml::from_str(&raw).unwrap()
}

#[tokio::test]
async fn test_full_run_produces_catalog() {
    let temp = TempDir::new().unwrap();

    let reference = "registry.example.com/org/modelcar-granite-8b-code-instruct:1.5".to_string();
    let registry = FakeRegistry {
        cards: HashMap::from([(
            reference.clone(),
            ModelcardLookup::Found(GRANITE_CARD.as_bytes().to_vec()),
        )]),
    };

    let pipeline = CatalogPipeline::new(
        Arc::new(registry),
        Arc::new(granite_hub()),
        temp.path(),
        2,
    )
    .unwrap();

    let summary = pipeline.run(&[reference.clone()], Vec::new()).await.unwrap();
    assert_eq!(summary.references, 1);
    assert_eq!(summary.extracted, 1);
    assert_eq!(summary.enriched, 1);
    assert_eq!(summary.no_match, 0);
    assert_eq!(summary.catalog_models, 1);

    // The per-model record was enriched in place.
    let metadata = pipeline.store().load_metadata(&reference).unwrap().unwrap();
    assert_eq!(metadata.provider.as_deref(), Some("ibm-granite"));
    assert_eq!(metadata.license.as_deref(), Some("apache-2.0"));
    assert_eq!(
        metadata.license_link.as_deref(),
        Some("https://www.apache.org/licenses/LICENSE-2.0.txt")
    );
    assert_eq!(metadata.artifacts.len(), 1);

    // The provenance sidecar exists and tags the generated link.
    let provenance = pipeline.store().load_provenance(&reference).unwrap().unwrap();
    assert_eq!(provenance.source_of("license"), Some("modelcard.yaml"));
    assert_eq!(provenance.source_of("license_link"), Some("generated"));

    // The consolidated document is on disk and parseable.
    let document = read_catalog(&temp);
    assert_eq!(document.models.len(), 1);
    let model = &document.models[0];
    // A high-confidence hub match canonicalizes the regex-derived title.
    assert_eq!(model.name.as_deref(), Some("granite-8b-code-instruct"));
    assert!(model.custom_properties.contains_key("granite"));
    assert_eq!(model.artifacts[0].uri, reference);
}

#[tokio::test]
async fn test_missing_modelcard_still_lands_in_catalog() {
    let temp = TempDir::new().unwrap();

    let reference = "registry.example.com/org/modelcar-granite-8b-code-instruct:1.5".to_string();
    let registry = FakeRegistry {
        cards: HashMap::new(),
    };

    let pipeline = CatalogPipeline::new(
        Arc::new(registry),
        Arc::new(granite_hub()),
        temp.path(),
        2,
    )
    .unwrap();

    let summary = pipeline.run(&[reference.clone()], Vec::new()).await.unwrap();
    assert_eq!(summary.skeletons, 1);
    assert_eq!(summary.enriched, 1);

    // The skeleton fallback stored the hub README, front-matter stripped.
    let substitute = pipeline.store().load_modelcard(&reference).unwrap().unwrap();
    assert!(substitute.starts_with("# Granite"));
    assert!(!substitute.contains("license:"));

    // Enrichment still filled fields from the hub.
    let metadata = pipeline.store().load_metadata(&reference).unwrap().unwrap();
    assert_eq!(metadata.name.as_deref(), Some("granite-8b-code-instruct"));
    assert_eq!(metadata.provider.as_deref(), Some("ibm-granite"));
}

#[tokio::test]
async fn test_threshold_is_inclusive_at_exactly_half() {
    let temp = TempDir::new().unwrap();

    // "alpha-beta" vs "alpha-gamma": one of two tokens, no substring
    // containment: exactly 0.5.
    let reference = "registry.example.com/org/alpha-beta:1".to_string();
    let hub = FakeHub {
        candidates: vec![HubCandidate {
            id: "org/alpha-gamma".to_string(),
            url: None,
            readme_path: None,
        }],
        details: HashMap::new(),
        readmes: HashMap::new(),
    };
    let registry = FakeRegistry {
        cards: HashMap::new(),
    };

    let pipeline =
        CatalogPipeline::new(Arc::new(registry), Arc::new(hub), temp.path(), 1).unwrap();
    let summary = pipeline.run(&[reference], Vec::new()).await.unwrap();

    // score == 0.5 counts as matched.
    assert_eq!(summary.enriched, 1);
    assert_eq!(summary.no_match, 0);
}

#[tokio::test]
async fn test_below_threshold_is_no_match() {
    let temp = TempDir::new().unwrap();

    let reference = "registry.example.com/org/alpha-beta-gamma:1".to_string();
    let hub = FakeHub {
        candidates: vec![HubCandidate {
            id: "org/alpha-delta".to_string(),
            url: None,
            readme_path: None,
        }],
        details: HashMap::new(),
        readmes: HashMap::new(),
    };
    let registry = FakeRegistry {
        cards: HashMap::new(),
    };

    let pipeline =
        CatalogPipeline::new(Arc::new(registry), Arc::new(hub), temp.path(), 1).unwrap();
    let summary = pipeline.run(&[reference], Vec::new()).await.unwrap();

    assert_eq!(summary.enriched, 0);
    assert_eq!(summary.no_match, 1);
}

#[tokio::test]
async fn test_duplicate_references_merge_and_statics_append() {
    let temp = TempDir::new().unwrap();

    // Two tags of the same model: both extract to the same name.
    let ref_a = "registry.example.com/org/modelcar-granite-8b-code-instruct:1.4".to_string();
    let ref_b = "registry.example.com/org/modelcar-granite-8b-code-instruct:1.5".to_string();
    let registry = FakeRegistry {
        cards: HashMap::from([
            (
                ref_a.clone(),
                ModelcardLookup::Found(GRANITE_CARD.as_bytes().to_vec()),
            ),
            (
                ref_b.clone(),
                ModelcardLookup::Found(GRANITE_CARD.as_bytes().to_vec()),
            ),
        ]),
    };

    let static_records = vec![CatalogMetadata {
        name: Some("Hand Authored".to_string()),
        provider: Some("Catalog Team".to_string()),
        ..Default::default()
    }];

    let pipeline = CatalogPipeline::new(
        Arc::new(registry),
        Arc::new(granite_hub()),
        temp.path(),
        2,
    )
    .unwrap();
    let summary = pipeline
        .run(&[ref_a.clone(), ref_b.clone()], static_records)
        .await
        .unwrap();

    // Two references, one consolidated model plus the static record.
    assert_eq!(summary.references, 2);
    assert_eq!(summary.catalog_models, 2);

    let document = read_catalog(&temp);
    let merged = &document.models[0];
    assert_eq!(merged.name.as_deref(), Some("granite-8b-code-instruct"));
    let mut uris: Vec<&str> = merged.artifacts.iter().map(|a| a.uri.as_str()).collect();
    uris.sort();
    assert_eq!(uris, vec![ref_a.as_str(), ref_b.as_str()]);

    assert_eq!(document.models[1].name.as_deref(), Some("Hand Authored"));
}

#[tokio::test]
async fn test_setup_fatal_on_unwritable_output_root() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not-a-dir");
    std::fs::write(&file_path, "occupied").unwrap();

    let registry = FakeRegistry {
        cards: HashMap::new(),
    };
    let hub = FakeHub {
        candidates: vec![],
        details: HashMap::new(),
        readmes: HashMap::new(),
    };

    // The output root path is an existing file: the one setup-fatal case.
    let result = CatalogPipeline::new(Arc::new(registry), Arc::new(hub), &file_path, 1);
    assert!(result.is_err());
    assert!(result.err().unwrap().is_setup_fatal());
}

#[tokio::test]
async fn test_rerun_is_stable() {
    let temp = TempDir::new().unwrap();

    let reference = "registry.example.com/org/modelcar-granite-8b-code-instruct:1.5".to_string();
    let registry = Arc::new(FakeRegistry {
        cards: HashMap::from([(
            reference.clone(),
            ModelcardLookup::Found(GRANITE_CARD.as_bytes().to_vec()),
        )]),
    });
    let hub = Arc::new(granite_hub());

    let pipeline =
        CatalogPipeline::new(registry.clone(), hub.clone(), temp.path(), 2).unwrap();

    let first = pipeline.run(&[reference.clone()], Vec::new()).await.unwrap();
    let first_doc = read_catalog(&temp);

    let second = pipeline.run(&[reference.clone()], Vec::new()).await.unwrap();
    let second_doc = read_catalog(&temp);

    assert_eq!(first.catalog_models, second.catalog_models);
    assert_eq!(first_doc.models, second_doc.models);
}

#[test]
fn test_extracted_metadata_is_consumable_by_consolidate() {
    // The catalog stage accepts records straight from storage types.
    let record = ExtractedMetadata {
        name: Some("standalone".to_string()),
        ..Default::default()
    };
    let document = modelcat_core::consolidate(vec![record], Vec::new());
    assert_eq!(document.models.len(), 1);
}
