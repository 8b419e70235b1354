//! Error types for definition loading and configuration.

use recordstore_core::ValidationError;
use thiserror::Error;

/// Errors raised while loading table definitions or manager configuration.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A definition file parsed but does not describe a usable table set.
    #[error("invalid definition in {path}: {message}")]
    InvalidDefinition {
        /// File the definition came from.
        path: String,
        /// What is wrong with it.
        message: String,
    },

    /// A table declaration failed validation.
    #[error("invalid table definition: {0}")]
    Validation(#[from] ValidationError),

    /// Manager configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// All configured definition sources failed.
    #[error("no definition sources available")]
    NoSourcesAvailable,
}

/// Convenience alias for results with [`DefinitionError`].
pub type Result<T> = std::result::Result<T, DefinitionError>;
