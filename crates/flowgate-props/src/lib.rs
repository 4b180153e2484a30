//! # flowgate-props
//!
//! Layered configuration for the flowgate server and its plugins.
//!
//! A [`Props`] is a flat mapping from dotted keys to TOML values with an
//! optional parent. Lookups that miss locally fall back to the parent chain,
//! so an override file can be layered on top of a base file without copying
//! it:
//!
//! ```text
//! override.toml  ──parent──▶  plugin.toml  ──parent──▶  (none)
//! ```
//!
//! Nested TOML tables are flattened, so `[viewer]\nname = "x"` and
//! `"viewer.name" = "x"` describe the same key.

pub mod error;
mod props;

pub use error::{PropsError, PropsResult};
pub use props::Props;
