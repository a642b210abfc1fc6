//! Model hub clients.
//!
//! The enrichment pipeline talks to a [`ModelHub`]: an index of match
//! candidates plus per-model details and README fetches. Two
//! implementations ship here:
//!
//! - [`HuggingFaceHub`] - the HuggingFace Hub API, with a best-effort
//!   disk cache so repeated runs stay cheap
//! - [`StaticHubIndex`] - a candidate index loaded from a YAML file, for
//!   offline runs and tests

mod types;

pub use types::{HubCandidate, HubModelDetails};
use types::HfModelResponse;

use crate::config::NetworkConfig;
use crate::error::{CatalogError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Read access to a model hub.
///
/// Every method is best-effort from the caller's point of view: an `Err`
/// degrades that source's contribution, it never aborts a batch.
#[async_trait]
pub trait ModelHub: Send + Sync {
    /// The candidate index used for fuzzy matching.
    async fn list_candidates(&self) -> Result<Vec<HubCandidate>>;

    /// Scalar fields and tags for one model.
    async fn fetch_details(&self, model_id: &str) -> Result<HubModelDetails>;

    /// Raw README text including any front-matter.
    async fn fetch_readme(&self, model_id: &str) -> Result<String>;
}

/// Client for the HuggingFace Hub API.
pub struct HuggingFaceHub {
    client: Client,
    cache_dir: PathBuf,
    /// Organizations/authors whose models form the candidate index.
    authors: Vec<String>,
}

impl std::fmt::Debug for HuggingFaceHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuggingFaceHub")
            .field("cache_dir", &self.cache_dir)
            .field("authors", &self.authors)
            .finish()
    }
}

impl HuggingFaceHub {
    /// Create a new hub client.
    ///
    /// # Arguments
    ///
    /// * `cache_dir` - Directory for caching API responses
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.into();
        std::fs::create_dir_all(&cache_dir)?;

        let client = Client::builder()
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| CatalogError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            cache_dir,
            authors: Vec::new(),
        })
    }

    /// Restrict the candidate index to these authors/organizations.
    pub fn with_authors(mut self, authors: Vec<String>) -> Self {
        self.authors = authors;
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CatalogError::Network {
                message: format!("Hub API request failed: {}", e),
                cause: Some(e.to_string()),
            })?;

        if !response.status().is_success() {
            return Err(CatalogError::HubApi {
                message: format!("Hub API returned {} for {}", response.status(), url),
                status_code: Some(response.status().as_u16()),
            });
        }

        response.json().await.map_err(|e| CatalogError::Json {
            message: format!("Failed to parse hub response: {}", e),
            source: None,
        })
    }

    fn cache_path(&self, key: &str) -> PathBuf {
        let safe = crate::metadata::sanitize_reference(key);
        self.cache_dir.join(format!("{}.json", safe))
    }

    /// Read a cached response if it exists and is fresh.
    fn read_cache<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.cache_path(key);
        if !Self::is_fresh(&path) {
            return None;
        }
        let contents = std::fs::read_to_string(&path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    /// Best-effort cache write; failures are logged, never propagated.
    fn write_cache<T: Serialize>(&self, key: &str, data: &T) {
        let path = self.cache_path(key);
        match serde_json::to_string(data) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    warn!("Failed to write hub cache {}: {}", path.display(), e);
                }
            }
            Err(e) => warn!("Failed to serialize hub cache entry: {}", e),
        }
    }

    fn is_fresh(path: &Path) -> bool {
        let Ok(meta) = std::fs::metadata(path) else {
            return false;
        };
        let Ok(modified) = meta.modified() else {
            return false;
        };
        modified
            .elapsed()
            .map(|elapsed| elapsed < NetworkConfig::HUB_CACHE_TTL)
            .unwrap_or(false)
    }
}

#[async_trait]
impl ModelHub for HuggingFaceHub {
    async fn list_candidates(&self) -> Result<Vec<HubCandidate>> {
        let mut candidates = Vec::new();

        for author in &self.authors {
            let cache_key = format!("candidates-{}", author);
            let models: Vec<HfModelResponse> = match self.read_cache::<serde_json::Value>(&cache_key) {
                Some(cached) => {
                    debug!("Hub cache hit for author {}", author);
                    serde_json::from_value(cached).unwrap_or_default()
                }
                None => {
                    let url = format!(
                        "{}/models?author={}&limit=500&full=true",
                        NetworkConfig::HF_API_BASE,
                        urlencoding::encode(author)
                    );
                    let raw: serde_json::Value = self.get_json(&url).await?;
                    self.write_cache(&cache_key, &raw);
                    serde_json::from_value(raw).map_err(|e| CatalogError::Json {
                        message: format!("Failed to parse candidate list: {}", e),
                        source: Some(e),
                    })?
                }
            };

            for model in models {
                let id = model.model_id;
                candidates.push(HubCandidate {
                    url: Some(format!("{}/{}", NetworkConfig::HF_HUB_BASE, id)),
                    readme_path: Some(format!("{}/resolve/main/README.md", id)),
                    id,
                });
            }
        }

        Ok(candidates)
    }

    async fn fetch_details(&self, model_id: &str) -> Result<HubModelDetails> {
        let cache_key = format!("details-{}", model_id);
        if let Some(cached) = self.read_cache::<HubModelDetails>(&cache_key) {
            return Ok(cached);
        }

        // model_id is "owner/model" -- the slash is part of the URL path,
        // so we must not encode the whole string (that would turn / into %2F).
        let url = format!("{}/models/{}", NetworkConfig::HF_API_BASE, model_id);
        let response: HfModelResponse = self.get_json(&url).await?;
        let details = response.into_details();

        self.write_cache(&cache_key, &details);
        Ok(details)
    }

    async fn fetch_readme(&self, model_id: &str) -> Result<String> {
        let url = format!(
            "{}/{}/resolve/main/README.md",
            NetworkConfig::HF_HUB_BASE,
            model_id
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CatalogError::Network {
                message: format!("README fetch failed: {}", e),
                cause: Some(e.to_string()),
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::HubModelNotFound {
                model_id: model_id.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(CatalogError::HubApi {
                message: format!("README fetch returned {}", response.status()),
                status_code: Some(response.status().as_u16()),
            });
        }

        response.text().await.map_err(|e| CatalogError::Network {
            message: format!("Failed to read README body: {}", e),
            cause: Some(e.to_string()),
        })
    }
}

/// Candidate index loaded from a YAML file.
///
/// Entries may point their `readme_path` at local files; details are not
/// available, which the enrichment pipeline handles as a degraded source.
#[derive(Debug, Clone)]
pub struct StaticHubIndex {
    entries: Vec<HubCandidate>,
}

impl StaticHubIndex {
    pub fn new(entries: Vec<HubCandidate>) -> Self {
        Self { entries }
    }

    /// Load the index from a YAML list of candidates.
    pub fn load(path: &Path) -> Result<Self> {
        let entries = crate::metadata::atomic_read_yaml(path)?.ok_or_else(|| {
            CatalogError::Config {
                message: format!("Hub index file not found: {}", path.display()),
            }
        })?;
        Ok(Self { entries })
    }
}

#[async_trait]
impl ModelHub for StaticHubIndex {
    async fn list_candidates(&self) -> Result<Vec<HubCandidate>> {
        Ok(self.entries.clone())
    }

    async fn fetch_details(&self, model_id: &str) -> Result<HubModelDetails> {
        Err(CatalogError::HubModelNotFound {
            model_id: model_id.to_string(),
        })
    }

    async fn fetch_readme(&self, model_id: &str) -> Result<String> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.id == model_id)
            .ok_or_else(|| CatalogError::HubModelNotFound {
                model_id: model_id.to_string(),
            })?;

        let path = entry
            .readme_path
            .as_ref()
            .ok_or_else(|| CatalogError::HubModelNotFound {
                model_id: model_id.to_string(),
            })?;

        crate::metadata::read_text(Path::new(path))?.ok_or_else(|| {
            CatalogError::HubModelNotFound {
                model_id: model_id.to_string(),
            }
        })
    }
}
