//! Error types for relaycache
//!
//! All modules use `RelayResult<T>` as their return type. Strategy executors
//! convert most of these into fallback responses; only the CLI ever shows
//! them to a person.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for relaycache operations
pub type RelayResult<T> = Result<T, RelayError>;

/// All errors that can occur in relaycache
#[derive(Error, Debug)]
pub enum RelayError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid origin URL '{url}': {reason}")]
    OriginInvalid { url: String, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Store errors
    #[error("Invalid store name '{0}'. Store names may only contain letters, digits, '.', '_' and '-'")]
    StoreNameInvalid(String),

    #[error("Store not found: {0}")]
    StoreNotFound(String),

    #[error("Store {store} unavailable: {reason}")]
    Storage { store: String, reason: String },

    // Network errors
    #[error("Network request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("Network request to {url} timed out after {millis} ms")]
    Timeout { url: String, millis: u64 },

    #[error("Invalid URL '{url}': {reason}")]
    UrlInvalid { url: String, reason: String },

    #[error("Cannot construct request: {0}")]
    RequestConstruction(String),

    // Lifecycle errors
    #[error("Invalid control message: {0}")]
    InvalidMessage(String),

    #[error("Cannot {action} while worker is {state}")]
    InvalidTransition { action: String, state: String },

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

    #[error("{0}")]
    User(String),
}

impl RelayError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a storage error for a named store
    pub fn storage(store: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Storage {
            store: store.into(),
            reason: reason.into(),
        }
    }

    /// Create a network error for a URL
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Whether the dispatcher should retry with a plain, uncached fetch.
    ///
    /// Network and storage faults are worth one more direct attempt; logic
    /// errors are not.
    pub fn falls_through(&self) -> bool {
        matches!(
            self,
            Self::Network { .. }
                | Self::Timeout { .. }
                | Self::Storage { .. }
                | Self::StoreNotFound(_)
                | Self::Io { .. }
                | Self::Json(_)
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ConfigInvalid { .. } => Some("Run: relaycache config init --force"),
            Self::OriginInvalid { .. } => {
                Some("Set origin.url to an absolute http(s) URL in config.toml")
            }
            Self::StoreNotFound(_) => Some("Run: relaycache stores list"),
            Self::InvalidMessage(_) => Some(
                "Messages look like: {\"type\":\"CACHE_FONT\",\"url\":\"https://example.org/f.woff2\"}",
            ),
            _ => None,
        }
    }
}
