//! Centralized configuration for modelcat.
//!
//! Configuration constants for network operations, storage layout, and
//! matching thresholds. The output root itself is never implicit: every
//! component takes it as an explicit parameter.

use std::time::Duration;

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    /// Total timeout for one outbound call (registry or hub).
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const USER_AGENT: &'static str = "modelcat/0.3";
    pub const HF_API_BASE: &'static str = "https://huggingface.co/api";
    pub const HF_HUB_BASE: &'static str = "https://huggingface.co";
    /// TTL for cached hub responses on disk.
    pub const HUB_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
}

/// Storage layout under the output root.
pub struct PathsConfig;

impl PathsConfig {
    pub const MODELS_DIR_NAME: &'static str = "models";
    pub const CACHE_DIR_NAME: &'static str = "cache";
    pub const METADATA_FILENAME: &'static str = "metadata.yaml";
    pub const PROVENANCE_FILENAME: &'static str = "provenance.yaml";
    pub const MODELCARD_FILENAME: &'static str = "modelcard.md";
    pub const CATALOG_FILENAME: &'static str = "models-catalog.yaml";
}

/// Similarity matching thresholds.
pub struct MatchConfig;

impl MatchConfig {
    /// Minimum score for a hub candidate to count as a match (inclusive).
    pub const MATCH_THRESHOLD: f64 = 0.5;
    /// Score at or above which a match is high confidence.
    pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.8;
    /// Convex boost weight applied when one normalized identifier
    /// contains the other.
    pub const SUBSTRING_BOOST: f64 = 0.1;
}

/// Batch execution defaults.
pub struct BatchConfig;

impl BatchConfig {
    pub const DEFAULT_CONCURRENCY: usize = 4;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_are_ordered() {
        assert!(MatchConfig::MATCH_THRESHOLD < MatchConfig::HIGH_CONFIDENCE_THRESHOLD);
        assert!(MatchConfig::HIGH_CONFIDENCE_THRESHOLD < 1.0);
    }

    #[test]
    fn test_timeouts_are_reasonable() {
        assert!(NetworkConfig::REQUEST_TIMEOUT > Duration::ZERO);
        assert!(NetworkConfig::HUB_CACHE_TTL > NetworkConfig::REQUEST_TIMEOUT);
    }
}
