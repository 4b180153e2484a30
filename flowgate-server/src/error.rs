//! Error types for server composition and lifecycle.

use crate::lifecycle::LifecycleState;
use crate::subsystems::SubsystemError;
use flowgate_props::PropsError;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration problems. Any of these stops startup before the
/// listener is activated.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// No usable configuration directory or file.
    #[error("Configuration not loaded: {0}")]
    NotLoaded(String),

    /// A required setting is missing or malformed.
    #[error("Invalid configuration: {0}")]
    Props(#[from] PropsError),

    /// A setting has a value the server cannot use.
    #[error("Invalid setting {key}: {message}")]
    InvalidSetting { key: String, message: String },

    /// The implementation tag selected for a subsystem is not registered.
    #[error("Unknown {subsystem} implementation '{tag}' (set by {key}); known: {known}")]
    UnknownImplementation {
        subsystem: String,
        key: String,
        tag: String,
        known: String,
    },

    /// The selected implementation failed to construct.
    #[error("Could not instantiate {subsystem} implementation '{tag}': {source}")]
    Construction {
        subsystem: String,
        tag: String,
        #[source]
        source: SubsystemError,
    },

    /// A directory the server needs could not be prepared.
    #[error("Failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from driving the lifecycle state machine.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The requested transition is not allowed from the current state.
    #[error("Cannot {action} while {state:?}")]
    InvalidTransition {
        state: LifecycleState,
        action: &'static str,
    },

    /// Startup failed on a configuration error.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}
