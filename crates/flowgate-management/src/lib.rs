//! # flowgate-management
//!
//! Uniform runtime introspection for the subsystems composed by the server.
//!
//! Each subsystem is adapted to [`Managed`], which exposes a fixed set of
//! named attributes through typed accessors. The [`ManagementBridge`] keeps
//! the registered components under stable identifiers and answers queries
//! from operational tooling.
//!
//! Registration problems never propagate: a component that cannot be
//! registered is logged and left out, and startup continues.

pub mod bridge;
pub mod error;
pub mod value;

pub use bridge::{ComponentId, Managed, ManagementBridge};
pub use error::{ManagementError, ManagementResult};
pub use value::AttributeValue;
