//! Per-reference metadata storage under the output root.
//!
//! Each processed artifact reference owns one directory at
//! `<output-root>/models/<sanitized-ref>/` holding the metadata record, the
//! sibling provenance record, and (when available) the modelcard text.
//! Workers write only into their own directory, so the store needs no
//! locking.

use crate::metadata::atomic::{
    atomic_read_yaml, atomic_write_text, atomic_write_yaml, read_text,
};
use crate::models::{CatalogDocument, ExtractedMetadata};
use crate::provenance::ProvenanceRecord;
use crate::{config::PathsConfig, CatalogError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::warn;
use walkdir::WalkDir;

/// Runs of characters that are not safe in a single path segment.
static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

/// Sanitize an artifact reference for use as a directory name.
///
/// Path-unsafe characters are collapsed to single underscores;
/// `registry.example.com/org/model:1.0` becomes
/// `registry.example.com_org_model_1.0`.
pub fn sanitize_reference(reference: &str) -> String {
    let sanitized = UNSAFE_CHARS.replace_all(reference.trim(), "_");
    let sanitized = sanitized.trim_matches('_');
    if sanitized.is_empty() {
        "unnamed_reference".to_string()
    } else {
        sanitized.to_string()
    }
}

/// File-system backed store for per-model records.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    output_root: PathBuf,
}

impl MetadataStore {
    /// Open the store, creating the models directory.
    ///
    /// Failure here is setup-fatal: no worker can make progress without
    /// the output tree.
    pub fn new(output_root: impl Into<PathBuf>) -> Result<Self> {
        let output_root = output_root.into();
        let models_dir = output_root.join(PathsConfig::MODELS_DIR_NAME);
        std::fs::create_dir_all(&models_dir).map_err(|e| CatalogError::Setup {
            message: format!(
                "Cannot create output directory {}: {}",
                models_dir.display(),
                e
            ),
        })?;
        Ok(Self { output_root })
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn models_dir(&self) -> PathBuf {
        self.output_root.join(PathsConfig::MODELS_DIR_NAME)
    }

    /// Directory owned by one artifact reference.
    pub fn model_dir(&self, reference: &str) -> PathBuf {
        self.models_dir().join(sanitize_reference(reference))
    }

    pub fn load_metadata(&self, reference: &str) -> Result<Option<ExtractedMetadata>> {
        atomic_read_yaml(&self.model_dir(reference).join(PathsConfig::METADATA_FILENAME))
    }

    pub fn save_metadata(&self, reference: &str, metadata: &ExtractedMetadata) -> Result<()> {
        atomic_write_yaml(
            &self.model_dir(reference).join(PathsConfig::METADATA_FILENAME),
            metadata,
            false,
        )
    }

    pub fn load_provenance(&self, reference: &str) -> Result<Option<ProvenanceRecord>> {
        atomic_read_yaml(
            &self
                .model_dir(reference)
                .join(PathsConfig::PROVENANCE_FILENAME),
        )
    }

    pub fn save_provenance(&self, reference: &str, provenance: &ProvenanceRecord) -> Result<()> {
        atomic_write_yaml(
            &self
                .model_dir(reference)
                .join(PathsConfig::PROVENANCE_FILENAME),
            provenance,
            false,
        )
    }

    pub fn load_modelcard(&self, reference: &str) -> Result<Option<String>> {
        read_text(&self.model_dir(reference).join(PathsConfig::MODELCARD_FILENAME))
    }

    pub fn save_modelcard(&self, reference: &str, text: &str) -> Result<()> {
        atomic_write_text(
            &self.model_dir(reference).join(PathsConfig::MODELCARD_FILENAME),
            text,
            false,
        )
    }

    /// Load every stored metadata record, in directory-name order.
    ///
    /// Unparseable records are logged and skipped, never fatal.
    pub fn load_all_metadata(&self) -> Result<Vec<ExtractedMetadata>> {
        let mut records = Vec::new();

        let mut entries: Vec<PathBuf> = WalkDir::new(self.models_dir())
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .map(|e| e.into_path())
            .collect();
        entries.sort();

        for dir in entries {
            let metadata_path = dir.join(PathsConfig::METADATA_FILENAME);
            match atomic_read_yaml::<ExtractedMetadata>(&metadata_path) {
                Ok(Some(metadata)) => records.push(metadata),
                Ok(None) => {}
                Err(e) => {
                    warn!("Skipping unreadable record {}: {}", metadata_path.display(), e);
                }
            }
        }

        Ok(records)
    }

    /// Write the consolidated catalog document at the output root.
    pub fn write_catalog(&self, document: &CatalogDocument) -> Result<()> {
        atomic_write_yaml(
            &self.output_root.join(PathsConfig::CATALOG_FILENAME),
            document,
            true,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_reference() {
        assert_eq!(
            sanitize_reference("registry.example.com/org/model:1.0"),
            "registry.example.com_org_model_1.0"
        );
        assert_eq!(sanitize_reference("a//b::c"), "a_b_c");
        assert_eq!(sanitize_reference("  "), "unnamed_reference");
        assert_eq!(sanitize_reference("plain-name"), "plain-name");
    }

    #[test]
    fn test_store_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = MetadataStore::new(temp.path()).unwrap();
        let reference = "registry.example.com/org/granite-8b:1.0";

        assert!(store.load_metadata(reference).unwrap().is_none());

        let metadata = ExtractedMetadata {
            name: Some("granite-8b".into()),
            ..Default::default()
        };
        store.save_metadata(reference, &metadata).unwrap();
        assert_eq!(store.load_metadata(reference).unwrap(), Some(metadata));

        let mut provenance = ProvenanceRecord::default();
        provenance.record("name", crate::provenance::Source::ModelcardFrontmatter);
        store.save_provenance(reference, &provenance).unwrap();
        let loaded = store.load_provenance(reference).unwrap().unwrap();
        assert_eq!(loaded.source_of("name"), Some("modelcard.yaml"));
    }

    #[test]
    fn test_modelcard_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = MetadataStore::new(temp.path()).unwrap();

        store
            .save_modelcard("org/model:1", "# Granite\n\nA model.\n")
            .unwrap();
        assert_eq!(
            store.load_modelcard("org/model:1").unwrap(),
            Some("# Granite\n\nA model.\n".to_string())
        );
    }

    #[test]
    fn test_load_all_metadata_skips_empty_dirs() {
        let temp = TempDir::new().unwrap();
        let store = MetadataStore::new(temp.path()).unwrap();

        store
            .save_metadata(
                "org/model-a:1",
                &ExtractedMetadata {
                    name: Some("model-a".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .save_metadata(
                "org/model-b:1",
                &ExtractedMetadata {
                    name: Some("model-b".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        // A directory without a metadata file (modelcard only).
        store.save_modelcard("org/model-c:1", "card").unwrap();

        let all = store.load_all_metadata().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name.as_deref(), Some("model-a"));
        assert_eq!(all[1].name.as_deref(), Some("model-b"));
    }
}
