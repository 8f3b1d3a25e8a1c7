//! Error types for Stowaway
//!
//! All modules use `StowawayResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Stowaway operations
pub type StowawayResult<T> = Result<T, StowawayError>;

/// All errors that can occur in Stowaway
#[derive(Error, Debug)]
pub enum StowawayError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Lifecycle errors
    #[error("Install of {version} failed at {resource}: {reason}")]
    Install {
        version: String,
        resource: String,
        reason: String,
    },

    #[error("Invalid worker state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    // Network errors
    #[error("Network request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("Response from {url} exceeds the {limit} byte body limit")]
    ResponseTooLarge { url: String, limit: u64 },

    #[error("Offline ({reason}) and fallback page {page} is not cached")]
    OfflineFallbackMissing { page: String, reason: String },

    // Cache store errors
    #[error("Cache store error in namespace {namespace}: {reason}")]
    Store { namespace: String, reason: String },

    #[error("Invalid cache namespace '{0}': use letters, digits, '.', '_' or '-'")]
    InvalidNamespace(String),

    // Request errors
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    // Server errors
    #[error("Proxy server error: {0}")]
    Server(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StowawayError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network failure for a URL
    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a cache store error for a namespace
    pub fn store(namespace: impl Into<String>, reason: impl ToString) -> Self {
        Self::Store {
            namespace: namespace.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the failure came from the network boundary (no response at all)
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Install { .. } => {
                Some("The previous version keeps serving. Check the upstream and run: stowaway install")
            }
            Self::OfflineFallbackMissing { .. } => {
                Some("Add the offline page to [precache] manifest and run: stowaway install")
            }
            Self::ConfigNotFound(_) => Some("Run: stowaway config init"),
            Self::InvalidNamespace(_) => Some("Set [worker] version to a simple tag such as v2"),
            Self::ResponseTooLarge { .. } => Some("Raise [network] max_body_bytes"),
            _ => None,
        }
    }
}
