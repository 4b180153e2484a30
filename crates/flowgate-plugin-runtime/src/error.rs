//! Error types for plugin loading.

use flowgate_plugin_api::ExtensionError;
use flowgate_props::PropsError;
use std::path::PathBuf;
use thiserror::Error;

/// Reasons a single bundle fails to load. None of them are fatal to the host.
#[derive(Error, Debug)]
pub enum PluginLoadError {
    /// The candidate is not a directory.
    #[error("Plugin path {0} is not a directory")]
    NotADirectory(PathBuf),

    /// The base settings file is absent.
    #[error("Plugin conf file {0} not found")]
    MissingConfig(PathBuf),

    /// Settings could not be read or a required key is missing.
    #[error("Invalid plugin configuration in {bundle}: {source}")]
    InvalidConfig {
        bundle: PathBuf,
        #[source]
        source: PropsError,
    },

    /// The bundle has no library directory.
    #[error("Library path {0} not found")]
    MissingLibDir(PathBuf),

    /// The handler class is not visible from the bundle's scope.
    #[error("Class {class} not found for plugin {bundle}")]
    ClassNotFound { class: String, bundle: PathBuf },

    /// The class has no constructor taking the bundle configuration.
    #[error("Constructor not found in {0}")]
    ConstructorNotFound(String),

    /// The constructor returned an error.
    #[error("Failed to construct {class}: {source}")]
    ConstructionFailed {
        class: String,
        #[source]
        source: ExtensionError,
    },

    /// The constructed object is not a request handler.
    #[error("{class} produced {produced}, which is not a request handler")]
    NotAHandler { class: String, produced: String },

    /// Another plugin already owns the mount path.
    #[error("Mount path /{path} is already used by plugin '{existing}'")]
    DuplicateMount { path: String, existing: String },

    /// The mount path belongs to a page served by the host.
    #[error("Mount path /{0} is reserved by the server")]
    ReservedMount(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for plugin loading.
pub type PluginResult<T> = std::result::Result<T, PluginLoadError>;
