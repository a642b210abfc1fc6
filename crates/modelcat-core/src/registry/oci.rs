//! OCI distribution client for modelcar artifacts.
//!
//! Speaks the distribution v2 API directly: anonymous bearer-token auth,
//! manifest retrieval (following one level of image index indirection),
//! and blob fetch with sha256 digest verification. Modelcar images carry
//! each packaged file as its own layer with an
//! `org.opencontainers.image.title` annotation, so the modelcard is
//! located by its annotated `.md` title; layer blobs are gzip and/or tar
//! wrapped.

use super::{ModelcardLookup, ModelcardSource};
use crate::config::NetworkConfig;
use crate::error::{CatalogError, Result};
use crate::models::{Artifact, CustomValue};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Read;
use tracing::{debug, warn};

const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.manifest.v1+json, \
     application/vnd.oci.image.index.v1+json, \
     application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.docker.distribution.manifest.list.v2+json";

const TITLE_ANNOTATION: &str = "org.opencontainers.image.title";

/// Layers larger than this are never scanned for markdown content;
/// modelcards are small, weight layers run to gigabytes.
const MAX_SCAN_LAYER_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default, rename = "mediaType")]
    media_type: Option<String>,
    #[serde(default)]
    manifests: Vec<ManifestDescriptor>,
    #[serde(default)]
    layers: Vec<LayerDescriptor>,
    #[serde(default)]
    config: Option<LayerDescriptor>,
}

#[derive(Debug, Deserialize)]
struct ManifestDescriptor {
    digest: String,
}

#[derive(Debug, Clone, Deserialize)]
struct LayerDescriptor {
    digest: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default, rename = "mediaType")]
    media_type: Option<String>,
    #[serde(default)]
    annotations: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ImageConfig {
    #[serde(default)]
    created: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default, alias = "access_token")]
    token: String,
}

/// A parsed `registry/repository:tag` reference.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OciReference {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

pub(crate) fn parse_reference(reference: &str) -> Result<OciReference> {
    let reference = reference.trim().trim_start_matches("oci://");
    let (registry, rest) = reference
        .split_once('/')
        .ok_or_else(|| CatalogError::InvalidReference(reference.to_string()))?;

    // A tag colon must come after the last path separator; earlier colons
    // belong to a registry port.
    let (repository, tag) = match rest.rsplit_once(':') {
        Some((repo, tag)) if !repo.is_empty() && !tag.contains('/') => {
            (repo.to_string(), tag.to_string())
        }
        _ => (rest.to_string(), "latest".to_string()),
    };

    if repository.is_empty() {
        return Err(CatalogError::InvalidReference(reference.to_string()));
    }

    Ok(OciReference {
        registry: registry.to_string(),
        repository,
        tag,
    })
}

/// OCI distribution v2 client.
pub struct OciRegistryClient {
    client: Client,
}

impl OciRegistryClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| CatalogError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;
        Ok(Self { client })
    }

    /// Request an anonymous pull token from the auth service advertised in
    /// a `WWW-Authenticate: Bearer …` challenge.
    async fn fetch_token(&self, challenge: &str, repository: &str) -> Result<String> {
        let mut realm = None;
        let mut service = None;
        for part in challenge.trim_start_matches("Bearer ").split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            let value = value.trim_matches('"');
            match key {
                "realm" => realm = Some(value.to_string()),
                "service" => service = Some(value.to_string()),
                _ => {}
            }
        }

        let realm = realm.ok_or_else(|| CatalogError::Network {
            message: "Auth challenge without realm".to_string(),
            cause: None,
        })?;

        let mut url = format!(
            "{}?scope={}",
            realm,
            urlencoding::encode(&format!("repository:{}:pull", repository))
        );
        if let Some(service) = service {
            url.push_str(&format!("&service={}", urlencoding::encode(&service)));
        }

        let response: TokenResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()
            .map_err(CatalogError::from)?
            .json()
            .await?;

        Ok(response.token)
    }

    /// GET a registry URL, solving the bearer challenge once if needed.
    async fn get_with_auth(
        &self,
        url: &str,
        accept: &str,
        repository: &str,
    ) -> Result<reqwest::Response> {
        let response = self.client.get(url).header("Accept", accept).send().await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            let challenge = response
                .headers()
                .get("WWW-Authenticate")
                .and_then(|v| v.to_str().ok())
                .map(String::from);

            if let Some(challenge) = challenge {
                let token = self.fetch_token(&challenge, repository).await?;
                let retried = self
                    .client
                    .get(url)
                    .header("Accept", accept)
                    .bearer_auth(token)
                    .send()
                    .await?;
                return Ok(retried);
            }
        }

        Ok(response)
    }

    /// Fetch the image manifest, resolving an index to its first entry.
    async fn fetch_manifest(&self, reference: &OciReference) -> Result<Manifest> {
        let url = format!(
            "https://{}/v2/{}/manifests/{}",
            reference.registry, reference.repository, reference.tag
        );
        let response = self
            .get_with_auth(&url, MANIFEST_ACCEPT, &reference.repository)
            .await?;

        if !response.status().is_success() {
            return Err(CatalogError::Registry {
                reference: format!("{}/{}", reference.registry, reference.repository),
                message: format!("manifest fetch returned {}", response.status()),
            });
        }

        let manifest: Manifest = response.json().await?;

        let is_index = manifest
            .media_type
            .as_deref()
            .map(|m| m.contains("index") || m.contains("manifest.list"))
            .unwrap_or(false)
            || !manifest.manifests.is_empty();

        if is_index {
            let descriptor = manifest.manifests.first().ok_or_else(|| {
                CatalogError::Registry {
                    reference: reference.repository.clone(),
                    message: "empty image index".to_string(),
                }
            })?;
            let url = format!(
                "https://{}/v2/{}/manifests/{}",
                reference.registry, reference.repository, descriptor.digest
            );
            let response = self
                .get_with_auth(&url, MANIFEST_ACCEPT, &reference.repository)
                .await?;
            if !response.status().is_success() {
                return Err(CatalogError::Registry {
                    reference: reference.repository.clone(),
                    message: format!("platform manifest fetch returned {}", response.status()),
                });
            }
            return Ok(response.json().await?);
        }

        Ok(manifest)
    }

    /// Fetch a blob and verify its sha256 digest.
    async fn fetch_blob(&self, reference: &OciReference, digest: &str) -> Result<Vec<u8>> {
        let url = format!(
            "https://{}/v2/{}/blobs/{}",
            reference.registry, reference.repository, digest
        );
        let response = self
            .get_with_auth(&url, "application/octet-stream", &reference.repository)
            .await?;

        if !response.status().is_success() {
            return Err(CatalogError::Registry {
                reference: reference.repository.clone(),
                message: format!("blob fetch returned {}", response.status()),
            });
        }

        let bytes = response.bytes().await?.to_vec();

        if let Some(expected) = digest.strip_prefix("sha256:") {
            let actual = hex::encode(Sha256::digest(&bytes));
            if actual != expected {
                return Err(CatalogError::DigestMismatch {
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        Ok(bytes)
    }
}

/// Decode a layer blob down to the bytes of the named markdown file.
///
/// Handles the layouts modelcar builders produce: gzip-wrapped tar,
/// plain tar, and bare file content.
fn decode_layer(blob: &[u8], wanted_suffix: &str) -> Option<Vec<u8>> {
    let decompressed = if blob.starts_with(&[0x1f, 0x8b]) {
        let mut out = Vec::new();
        GzDecoder::new(blob).read_to_end(&mut out).ok()?;
        out
    } else {
        blob.to_vec()
    };

    // Try the tar layout first.
    let mut archive = tar::Archive::new(&decompressed[..]);
    if let Ok(entries) = archive.entries() {
        for entry in entries.flatten() {
            let is_match = entry
                .path()
                .ok()
                .and_then(|p| p.to_str().map(|s| s.ends_with(wanted_suffix)))
                .unwrap_or(false);
            if is_match {
                let mut contents = Vec::new();
                let mut entry = entry;
                entry.read_to_end(&mut contents).ok()?;
                return Some(contents);
            }
        }
    }

    // Bare content: the blob itself is the file.
    if std::str::from_utf8(&decompressed).is_ok() {
        return Some(decompressed);
    }
    None
}

/// Count tar entries ending with a suffix; 0 for non-tar blobs.
fn count_tar_entries(blob: &[u8], wanted_suffix: &str) -> usize {
    let decompressed = if blob.starts_with(&[0x1f, 0x8b]) {
        let mut out = Vec::new();
        if GzDecoder::new(blob).read_to_end(&mut out).is_err() {
            return 0;
        }
        out
    } else {
        blob.to_vec()
    };

    let mut archive = tar::Archive::new(&decompressed[..]);
    match archive.entries() {
        Ok(entries) => entries
            .flatten()
            .filter(|entry| {
                entry
                    .path()
                    .ok()
                    .and_then(|p| p.to_str().map(|s| s.ends_with(wanted_suffix)))
                    .unwrap_or(false)
            })
            .count(),
        Err(_) => 0,
    }
}

#[async_trait]
impl ModelcardSource for OciRegistryClient {
    async fn fetch_modelcard(&self, reference: &str) -> Result<ModelcardLookup> {
        let parsed = parse_reference(reference)?;
        let manifest = self.fetch_manifest(&parsed).await?;

        // Annotated layers first: each modelcar file carries its name in
        // the title annotation.
        let annotated: Vec<&LayerDescriptor> = manifest
            .layers
            .iter()
            .filter(|l| {
                l.annotations
                    .get(TITLE_ANNOTATION)
                    .map(|t| t.ends_with(".md"))
                    .unwrap_or(false)
            })
            .collect();

        match annotated.len() {
            1 => {
                let layer = annotated[0];
                let blob = self.fetch_blob(&parsed, &layer.digest).await?;
                match decode_layer(&blob, ".md") {
                    Some(bytes) => return Ok(ModelcardLookup::Found(bytes)),
                    None => {
                        warn!("Could not decode annotated modelcard layer for {}", reference);
                        return Ok(ModelcardLookup::NotFound);
                    }
                }
            }
            n if n > 1 => return Ok(ModelcardLookup::Ambiguous(n)),
            _ => {}
        }

        // No annotations: scan small layers for markdown tar entries.
        let mut found: Option<Vec<u8>> = None;
        let mut candidates = 0usize;
        for layer in &manifest.layers {
            if layer.size.unwrap_or(u64::MAX) > MAX_SCAN_LAYER_BYTES {
                continue;
            }
            if layer
                .media_type
                .as_deref()
                .map(|m| m.contains("image.config"))
                .unwrap_or(false)
            {
                continue;
            }
            let blob = match self.fetch_blob(&parsed, &layer.digest).await {
                Ok(blob) => blob,
                Err(e) => {
                    debug!("Skipping unreadable layer {}: {}", layer.digest, e);
                    continue;
                }
            };
            let count = count_tar_entries(&blob, ".md");
            candidates += count;
            if count == 1 && found.is_none() {
                found = decode_layer(&blob, ".md");
            }
        }

        match candidates {
            0 => Ok(ModelcardLookup::NotFound),
            1 => Ok(found
                .map(ModelcardLookup::Found)
                .unwrap_or(ModelcardLookup::NotFound)),
            n => Ok(ModelcardLookup::Ambiguous(n)),
        }
    }

    async fn fetch_artifacts(&self, reference: &str) -> Vec<Artifact> {
        let mut artifact = Artifact::new(reference);

        match parse_reference(reference) {
            Ok(parsed) => {
                artifact.custom_properties.insert(
                    "source_registry".to_string(),
                    CustomValue::String(parsed.registry.clone()),
                );
                artifact.custom_properties.insert(
                    "artifact_type".to_string(),
                    CustomValue::String("modelcar".to_string()),
                );

                // Best-effort creation timestamp from the image config.
                match self.fetch_manifest(&parsed).await {
                    Ok(manifest) => {
                        if let Some(config) = manifest.config {
                            if let Ok(blob) = self.fetch_blob(&parsed, &config.digest).await {
                                if let Ok(parsed_config) =
                                    serde_json::from_slice::<ImageConfig>(&blob)
                                {
                                    let created = parsed_config.created.and_then(|c| {
                                        chrono::DateTime::parse_from_rfc3339(&c).ok()
                                    });
                                    if let Some(created) = created {
                                        artifact.create_time_since_epoch =
                                            Some(created.timestamp_millis());
                                    }
                                }
                            }
                        }
                    }
                    Err(e) => {
                        debug!("Artifact timestamp lookup failed for {}: {}", reference, e);
                        artifact.custom_properties.insert(
                            "extraction_error".to_string(),
                            CustomValue::String(e.to_string()),
                        );
                    }
                }
            }
            Err(e) => {
                warn!("Unparseable reference {}: {}", reference, e);
            }
        }

        vec![artifact]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference() {
        let parsed = parse_reference("registry.example.com/org/granite-8b:1.5").unwrap();
        assert_eq!(parsed.registry, "registry.example.com");
        assert_eq!(parsed.repository, "org/granite-8b");
        assert_eq!(parsed.tag, "1.5");
    }

    #[test]
    fn test_parse_reference_defaults_tag() {
        let parsed = parse_reference("quay.io/org/model").unwrap();
        assert_eq!(parsed.tag, "latest");
    }

    #[test]
    fn test_parse_reference_with_port() {
        let parsed = parse_reference("localhost:5000/org/model:2").unwrap();
        assert_eq!(parsed.registry, "localhost:5000");
        assert_eq!(parsed.repository, "org/model");
        assert_eq!(parsed.tag, "2");
    }

    #[test]
    fn test_parse_reference_rejects_bare_name() {
        assert!(parse_reference("just-a-name").is_err());
    }

    #[test]
    fn test_decode_layer_bare_markdown() {
        let bytes = decode_layer(b"# A modelcard\n", ".md").unwrap();
        assert_eq!(bytes, b"# A modelcard\n");
    }

    #[test]
    fn test_decode_layer_tar() {
        let mut builder = tar::Builder::new(Vec::new());
        let content = b"# Card in tar\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_cksum();
        builder
            .append_data(&mut header, "models/modelcard.md", &content[..])
            .unwrap();
        let archive = builder.into_inner().unwrap();

        let bytes = decode_layer(&archive, ".md").unwrap();
        assert_eq!(bytes, content);
        assert_eq!(count_tar_entries(&archive, ".md"), 1);
    }

    #[test]
    fn test_count_tar_entries_multiple() {
        let mut builder = tar::Builder::new(Vec::new());
        for name in ["a.md", "b.md", "weights.bin"] {
            let content = b"x";
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_cksum();
            builder.append_data(&mut header, name, &content[..]).unwrap();
        }
        let archive = builder.into_inner().unwrap();
        assert_eq!(count_tar_entries(&archive, ".md"), 2);
    }
}
