//! # flowgate-plugin-runtime
//!
//! Discovers viewer plugin bundles on disk and mounts them into the host.
//!
//! This crate provides:
//! - Bundle parsing and validation (`conf/plugin.toml` + `conf/override.toml`)
//! - Per-bundle isolated loading scopes over the extension catalog
//! - Handler resolution and construction, one bundle at a time
//! - The registry of loaded plugins and the mount table handed to the host
//!
//! ## Bundle Structure
//!
//! ```text
//! <plugin dir>/
//!   conf/plugin.toml      required: viewer.name, viewer.path, viewer.handler.class
//!   conf/override.toml    optional, layered above plugin.toml
//!   lib/                  required; each entry joins the bundle's loading scope
//! ```
//!
//! ## Failure Model
//!
//! Every stage of loading a bundle can fail independently. A failing bundle
//! is logged and skipped; it never affects other bundles or aborts startup.

pub mod bundle;
pub mod discovery;
pub mod error;
pub mod plugin;
pub mod registry;
pub mod scope;

pub use bundle::PluginBundle;
pub use discovery::{BundleFailure, DiscoveryReport, PluginDiscovery};
pub use error::{PluginLoadError, PluginResult};
pub use plugin::LoadedPlugin;
pub use registry::{Mount, PluginRegistry};
pub use scope::{LoadingScope, ResolvedClass, ScopeEntry};
