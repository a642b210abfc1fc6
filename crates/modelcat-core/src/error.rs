//! Error types for the modelcat library.
//!
//! One error enum covers the whole pipeline. The important distinction is
//! between setup-fatal errors (the run cannot proceed at all) and per-model
//! errors (one reference degrades, the batch continues).

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for modelcat operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    // Registry errors
    #[error("Registry error for {reference}: {message}")]
    Registry { reference: String, message: String },

    #[error("Invalid artifact reference: {0}")]
    InvalidReference(String),

    #[error("Layer digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    // Hub errors
    #[error("Hub API error: {message}")]
    HubApi {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Hub model not found: {model_id}")]
    HubModelNotFound { model_id: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("YAML error: {message}")]
    Yaml {
        message: String,
        #[source]
        source: Option<serde_yaml::Error>,
    },

    #[error("Modelcard parse error: {message}")]
    ModelcardParse { message: String },

    // Setup errors
    #[error("Setup error: {message}")]
    Setup { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for modelcat operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

// Conversion implementations for common error types

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_yaml::Error> for CatalogError {
    fn from(err: serde_yaml::Error) -> Self {
        CatalogError::Yaml {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CatalogError::Timeout(std::time::Duration::from_secs(0))
        } else {
            CatalogError::Network {
                message: err.to_string(),
                cause: Some(err.to_string()),
            }
        }
    }
}

impl CatalogError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        CatalogError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CatalogError::Network { .. } | CatalogError::Timeout(_)
        )
    }

    /// Check if this error invalidates the whole run.
    ///
    /// Only errors that prevent every worker from making progress qualify;
    /// everything else degrades a single model's contribution.
    pub fn is_setup_fatal(&self) -> bool {
        matches!(
            self,
            CatalogError::Setup { .. } | CatalogError::Config { .. }
        )
    }
}
