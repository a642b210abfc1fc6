//! Shared types for the model hub clients.
//!
//! Contains the API response deserialization types and the internal
//! records handed to the enrichment stage.

use serde::{Deserialize, Serialize};

/// One entry of the hub match index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubCandidate {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Where the README lives: a hub-relative path for remote indexes, a
    /// local file path for static ones.
    #[serde(default)]
    pub readme_path: Option<String>,
}

/// Scalar fields and tags for one hub model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubModelDetails {
    pub id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub pipeline_tag: Option<String>,
    #[serde(default)]
    pub library_name: Option<String>,
    /// The hub's dedicated license field. May be the literal `"other"`,
    /// which the merge engine treats as absent.
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub downloads: Option<u64>,
}

/// HuggingFace model object from the API.
#[derive(Debug, Deserialize)]
pub(crate) struct HfModelResponse {
    #[serde(rename = "modelId", alias = "id")]
    pub model_id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Note: the HuggingFace API returns this as snake_case "pipeline_tag"
    #[serde(default)]
    pub pipeline_tag: Option<String>,
    #[serde(default)]
    pub library_name: Option<String>,
    #[serde(default, rename = "createdAt")]
    pub created_at: Option<String>,
    /// Requires full=true in API requests to be populated
    #[serde(default, rename = "lastModified")]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub downloads: Option<u64>,
    #[serde(default, rename = "cardData")]
    pub card_data: Option<HfCardData>,
}

/// Subset of the card data block relevant here.
#[derive(Debug, Deserialize)]
pub(crate) struct HfCardData {
    #[serde(default)]
    pub license: Option<serde_json::Value>,
}

impl HfModelResponse {
    /// Flatten into the internal details record.
    pub(crate) fn into_details(self) -> HubModelDetails {
        // License may come from cardData (string or list) or a license: tag.
        let card_license = self.card_data.as_ref().and_then(|c| match &c.license {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Array(items)) => items
                .first()
                .and_then(|v| v.as_str())
                .map(String::from),
            _ => None,
        });
        let tag_license = self
            .tags
            .iter()
            .find_map(|t| t.strip_prefix("license:"))
            .map(String::from);

        let author = self.author.clone().or_else(|| {
            self.model_id
                .split_once('/')
                .map(|(owner, _)| owner.to_string())
        });

        HubModelDetails {
            author,
            pipeline_tag: self.pipeline_tag,
            library_name: self.library_name,
            license: card_license.or(tag_license),
            tags: self.tags,
            created_at: self.created_at,
            last_modified: self.last_modified,
            downloads: self.downloads,
            id: self.model_id,
        }
    }
}
