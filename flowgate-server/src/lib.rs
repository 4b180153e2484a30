//! flowgate server library
//!
//! The composition root of the flowgate web server: configuration-driven
//! subsystem construction, viewer plugin mounting, the management bridge and
//! the lifecycle that ties them together. Exported for the binary and for
//! integration tests.

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod extensions;
pub mod factory;
pub mod lifecycle;
pub mod routes;
pub mod session;
pub mod subsystems;

pub use context::{AppContext, RenderingConfig};
pub use error::{ConfigurationError, LifecycleError};
pub use factory::{SubsystemCatalog, SubsystemFactory};
pub use lifecycle::{LifecycleCoordinator, LifecycleState, ShutdownReport};
pub use session::{Session, SessionCache};
