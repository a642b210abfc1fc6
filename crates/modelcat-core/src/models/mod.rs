//! Metadata types for extracted and catalog records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Typed custom-property value.
///
/// Internal logic works with the variants directly; the tagged form is the
/// canonical serialization at the document boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "metadata_type", content = "value", rename_all = "snake_case")]
pub enum CustomValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl CustomValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CustomValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// One OCI-addressable image reference belonging to a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time_since_epoch: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time_since_epoch: Option<i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_properties: BTreeMap<String, CustomValue>,
}

impl Artifact {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }
}

/// Per-model record produced by extraction and rewritten by enrichment.
///
/// Array fields are always present (possibly empty) so that later passes
/// have somewhere to write. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,
    #[serde(default)]
    pub language: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default)]
    pub validated_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time_since_epoch: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time_since_epoch: Option<i64>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

impl ExtractedMetadata {
    /// Skeleton record for a reference with no modelcard content.
    ///
    /// Arrays are present-but-empty, never absent, so enrichment has a
    /// target to write into.
    pub fn skeleton() -> Self {
        Self::default()
    }

    /// Enforce the timestamp invariant: an absent last-update defaults to
    /// the create time. The reverse never happens.
    pub fn normalize_timestamps(&mut self) {
        if self.last_update_time_since_epoch.is_none() {
            self.last_update_time_since_epoch = self.create_time_since_epoch;
        }
    }
}

/// Catalog output shape for one consolidated model.
///
/// Timestamps are decimal strings and tags live in the custom-properties
/// map; built once by the deduplicator and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CatalogMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default)]
    pub language: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default)]
    pub validated_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time_since_epoch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time_since_epoch: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_properties: BTreeMap<String, CustomValue>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

/// The consolidated catalog document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub models: Vec<CatalogMetadata>,
}
