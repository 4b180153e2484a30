//! Error types for configuration access.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or reading properties.
#[derive(Error, Debug)]
pub enum PropsError {
    /// A required key is absent from the whole parent chain.
    #[error("Missing required property: {0}")]
    Missing(String),

    /// A key is present but its value cannot be read as the requested type.
    #[error("Property '{key}' is not a valid {expected}: {value}")]
    WrongType {
        key: String,
        expected: &'static str,
        value: String,
    },

    /// A properties file could not be read.
    #[error("Failed to read properties file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A properties file is not valid TOML.
    #[error("Failed to parse properties file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Inline TOML content is not valid.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for property operations.
pub type PropsResult<T> = std::result::Result<T, PropsError>;
