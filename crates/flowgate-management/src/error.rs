//! Error types for management registration and queries.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManagementError {
    /// No component is registered under the identifier.
    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    /// The component does not expose the attribute.
    #[error("Component {component} has no attribute '{attribute}'")]
    UnknownAttribute { component: String, attribute: String },

    /// An identifier is already taken.
    #[error("Component {0} is already registered")]
    AlreadyRegistered(String),

    /// The component name cannot form an identifier.
    #[error("Invalid component name: '{0}'")]
    InvalidName(String),

    /// The component reported an error while being released.
    #[error("Failed to release component {component}: {message}")]
    ReleaseFailed { component: String, message: String },
}

/// Result type for management operations.
pub type ManagementResult<T> = std::result::Result<T, ManagementError>;
