//! # flowgate-plugin-api
//!
//! The contract shared by the flowgate host and its viewer plugins.
//!
//! This crate provides:
//! - The [`RequestHandler`] capability every mounted viewer must satisfy
//! - The request/response values exchanged with the routing host
//! - The extension catalog: statically linked libraries of handler classes
//!   that bundles on disk select by name
//!
//! ## Writing a viewer
//!
//! A viewer library exposes an [`ExtensionLibrary`] whose classes build a
//! handler from the bundle's merged configuration:
//!
//! ```rust,ignore
//! pub fn library() -> ExtensionLibrary {
//!     ExtensionLibrary::new("viewer-hello")
//!         .with_class(HandlerClass::handler("hello.HelloViewer", HelloViewer::from_props))
//! }
//! ```
//!
//! The host registers the library in its [`ExtensionCatalog`]; a bundle whose
//! `lib/` directory contains `viewer-hello.lib` can then name
//! `hello.HelloViewer` as its handler class.

pub mod catalog;
pub mod handler;

pub use catalog::{
    Constructor, ExtensionCatalog, ExtensionError, ExtensionLibrary, HandlerClass, Instance,
    HOST_LIBRARY,
};
pub use handler::{HandlerRequest, HandlerResponse, RequestHandler};
