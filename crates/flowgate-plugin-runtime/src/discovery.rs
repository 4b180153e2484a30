//! Viewer plugin discovery.
//!
//! Every immediate subdirectory of the plugin root is a candidate bundle.
//! Candidates are visited in file-name order so discovery order, and with it
//! the tie-break for equal `viewer.order` values, is stable across runs.
//!
//! Loading a bundle runs these stages, stopping at the first failure:
//!
//! 1. read `conf/plugin.toml`, layering `conf/override.toml` above it
//! 2. read the required and optional `viewer.*` keys
//! 3. build the isolated loading scope from `lib/` and the external classpaths
//! 4. resolve the handler class inside the scope
//! 5. find the configuration constructor
//! 6. construct, and check the product is a request handler
//! 7. mount and register
//!
//! A failure is logged and the bundle is skipped. It is not retried.

use crate::bundle::PluginBundle;
use crate::error::{PluginLoadError, PluginResult};
use crate::plugin::LoadedPlugin;
use crate::registry::PluginRegistry;
use crate::scope::LoadingScope;
use flowgate_plugin_api::ExtensionCatalog;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A bundle that failed to load, and why.
#[derive(Debug)]
pub struct BundleFailure {
    pub dir: PathBuf,
    pub error: PluginLoadError,
}

/// Outcome of one discovery run.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Mount paths of the plugins loaded in this run, in discovery order.
    pub loaded: Vec<String>,

    /// Bundles skipped in this run.
    pub failures: Vec<BundleFailure>,
}

impl DiscoveryReport {
    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }
}

/// Discovers bundles and loads them against an extension catalog.
#[derive(Debug, Clone)]
pub struct PluginDiscovery {
    catalog: Arc<ExtensionCatalog>,
}

impl PluginDiscovery {
    pub fn new(catalog: Arc<ExtensionCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &ExtensionCatalog {
        &self.catalog
    }

    /// Load every bundle under `root` into `registry`.
    ///
    /// A missing or unreadable root yields an empty report.
    pub fn discover(&self, root: &Path, registry: &mut PluginRegistry) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();

        if !root.exists() {
            info!("Viewer plugin directory {:?} does not exist, no plugins loaded", root);
            return report;
        }

        let candidates = match candidate_dirs(root) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Failed to read viewer plugin directory {:?}: {}", root, e);
                return report;
            }
        };

        debug!("Scanning {} viewer plugin candidates in {:?}", candidates.len(), root);

        for (index, dir) in candidates.into_iter().enumerate() {
            let outcome = self
                .load_bundle(&dir, index)
                .and_then(|plugin| registry.register(plugin));

            match outcome {
                Ok(plugin) => report.loaded.push(plugin.mount_path().to_string()),
                Err(error) => {
                    warn!(bundle = %dir.display(), "Skipping viewer plugin: {}", error);
                    report.failures.push(BundleFailure { dir, error });
                }
            }
        }

        info!(
            "Loaded {} viewer plugin(s), skipped {}",
            report.loaded_count(),
            report.failed_count()
        );
        report
    }

    /// Run stages 1-6 for a single bundle.
    pub fn load_bundle(&self, dir: &Path, discovery_index: usize) -> PluginResult<LoadedPlugin> {
        let bundle = PluginBundle::load(dir)?;
        debug!(
            "Plugin '{}' wants handler class {}",
            bundle.name, bundle.handler_class
        );

        let scope = Arc::new(LoadingScope::new(&self.catalog, bundle.classpath()?));

        let resolved = scope.resolve(&bundle.handler_class).ok_or_else(|| {
            PluginLoadError::ClassNotFound {
                class: bundle.handler_class.clone(),
                bundle: dir.to_path_buf(),
            }
        })?;

        match &resolved.origin {
            Some(origin) => info!("Source archive {}", origin.display()),
            None => debug!("Class {} supplied by the host", bundle.handler_class),
        }

        let constructor = resolved
            .class
            .constructor()
            .ok_or_else(|| PluginLoadError::ConstructorNotFound(bundle.handler_class.clone()))?;

        let instance = constructor(&bundle.props).map_err(|source| {
            PluginLoadError::ConstructionFailed {
                class: bundle.handler_class.clone(),
                source,
            }
        })?;

        let handler = instance
            .into_handler()
            .map_err(|produced| PluginLoadError::NotAHandler {
                class: bundle.handler_class.clone(),
                produced,
            })?;

        Ok(LoadedPlugin {
            bundle,
            handler,
            scope,
            origin: resolved.origin,
            discovery_index,
        })
    }
}

fn candidate_dirs(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root)?.flatten() {
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        } else {
            warn!("The plugin path {:?} is not a directory", path);
        }
    }
    dirs.sort();
    Ok(dirs)
}
