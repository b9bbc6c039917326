//! Error types for bridge-spec

use std::path::PathBuf;

/// Result type for bridge-spec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or loading a [`crate::Spec`]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Advice could not be registered for the given group
    #[error("Invalid advice for group '{group}': {reason}")]
    InvalidAdvice { group: String, reason: String },

    /// A key holds (or would receive) a value of the wrong kind
    #[error("Spec key '{key}' expected {expected}, found {found}")]
    KeyType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Spec file extension is not one we can load
    #[error("Unsupported spec file format: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// Spec file document is not a table/object at the top level
    #[error("Spec file {path} must contain a table of keys at the top level")]
    NotATable { path: PathBuf },

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Create an [`Error::InvalidAdvice`]
    pub fn invalid_advice(group: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAdvice {
            group: group.into(),
            reason: reason.into(),
        }
    }
}
