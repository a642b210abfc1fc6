//! Per-field provenance tracking.
//!
//! Every metadata field resolved during enrichment carries a [`Source`] tag
//! recording which data source and extraction method produced it. Sources
//! form a total order: a field may only move to a higher-authority source
//! over the course of one enrichment pass, never regress.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Data source that produced a field value, ordered by authority.
///
/// The derived `Ord` is the precedence relation: later variants override
/// earlier ones. `Null` is the canonical "no value" sentinel, distinct
/// from a present-but-empty value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Source {
    /// No source; the field has never been set.
    #[default]
    #[serde(rename = "null")]
    Null,
    /// Synthesized by modelcat itself (derived license link, generated description).
    #[serde(rename = "generated")]
    Generated,
    /// Regex extraction from hub README free text.
    #[serde(rename = "huggingface.regex")]
    HubRegex,
    /// Scalar field from the hub details API.
    #[serde(rename = "huggingface.api")]
    HubApi,
    /// Parsed from the hub tag list.
    #[serde(rename = "huggingface.tags")]
    HubTags,
    /// Regex extraction from modelcard markdown text.
    #[serde(rename = "modelcard.regex")]
    ModelcardRegex,
    /// Structured front-matter of the hub README.
    #[serde(rename = "huggingface.yaml")]
    HubFrontmatter,
    /// Structured front-matter embedded in the modelcard layer.
    #[serde(rename = "modelcard.yaml")]
    ModelcardFrontmatter,
}

impl Source {
    /// The stable string tag written to provenance records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Null => "null",
            Source::Generated => "generated",
            Source::HubRegex => "huggingface.regex",
            Source::HubApi => "huggingface.api",
            Source::HubTags => "huggingface.tags",
            Source::ModelcardRegex => "modelcard.regex",
            Source::HubFrontmatter => "huggingface.yaml",
            Source::ModelcardFrontmatter => "modelcard.yaml",
        }
    }

    /// Front-matter sources carry complete field sets: for list fields
    /// they replace lower-authority values instead of unioning.
    pub fn is_frontmatter(&self) -> bool {
        matches!(self, Source::HubFrontmatter | Source::ModelcardFrontmatter)
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A value paired with the source that produced it.
///
/// `value == None` with `source == Source::Null` is the initial state of
/// every tracked field. Used transiently during enrichment; only the
/// source tags are persisted, in the sibling provenance record.
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub value: Option<T>,
    pub source: Source,
}

impl<T> Sourced<T> {
    /// The canonical "no value" state.
    pub fn absent() -> Self {
        Self {
            value: None,
            source: Source::Null,
        }
    }

    pub fn new(value: T, source: Source) -> Self {
        Self {
            value: Some(value),
            source,
        }
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    pub fn as_ref(&self) -> Option<&T> {
        self.value.as_ref()
    }
}

impl<T> Default for Sourced<T> {
    fn default() -> Self {
        Self::absent()
    }
}

/// Bookkeeping for the hub match resolved during one enrichment pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubMatchInfo {
    pub model_id: String,
    #[serde(default)]
    pub url: Option<String>,
    pub confidence: String,
    pub score: f64,
}

/// Field-name → source-tag map persisted next to each metadata record.
///
/// Never inlined into the metadata document itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hub_match: Option<HubMatchInfo>,
}

impl ProvenanceRecord {
    /// Record the winning source for a field, skipping never-set fields.
    pub fn record(&mut self, field: &str, source: Source) {
        if source != Source::Null {
            self.fields.insert(field.to_string(), source.as_str().to_string());
        }
    }

    pub fn source_of(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_ordering_is_total_authority_order() {
        assert!(Source::Null < Source::Generated);
        assert!(Source::Generated < Source::HubRegex);
        assert!(Source::HubRegex < Source::HubApi);
        assert!(Source::HubApi < Source::HubTags);
        assert!(Source::HubTags < Source::ModelcardRegex);
        assert!(Source::ModelcardRegex < Source::HubFrontmatter);
        assert!(Source::HubFrontmatter < Source::ModelcardFrontmatter);
    }

    #[test]
    fn test_source_tag_roundtrip() {
        // Null stays out: bare `null` is a YAML null scalar, and the
        // sentinel is never serialized anyway (records skip it).
        for source in [
            Source::Generated,
            Source::HubRegex,
            Source::HubApi,
            Source::HubTags,
            Source::ModelcardRegex,
            Source::HubFrontmatter,
            Source::ModelcardFrontmatter,
        ] {
            let yaml = serde_yaml::to_string(&source).unwrap();
            let parsed: Source = serde_yaml::from_str(&yaml).unwrap();
            assert_eq!(source, parsed);
            assert_eq!(yaml.trim(), source.as_str());
        }
        assert_eq!(Source::Null.as_str(), "null");
    }

    #[test]
    fn test_sourced_absent() {
        let field: Sourced<String> = Sourced::absent();
        assert!(!field.is_set());
        assert_eq!(field.source, Source::Null);
    }

    #[test]
    fn test_provenance_record_skips_null() {
        let mut record = ProvenanceRecord::default();
        record.record("name", Source::ModelcardFrontmatter);
        record.record("description", Source::Null);

        assert_eq!(record.source_of("name"), Some("modelcard.yaml"));
        assert_eq!(record.source_of("description"), None);
    }
}
