//! Registry of loaded viewer plugins.
//!
//! The registry is both the navigation listing and the mount table: a plugin
//! is added to both in one step or to neither.

use crate::bundle::normalize_mount_path;
use crate::error::{PluginLoadError, PluginResult};
use crate::plugin::LoadedPlugin;
use flowgate_plugin_api::RequestHandler;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// A route and the handler mounted on it.
#[derive(Clone)]
pub struct Mount {
    pub route: String,
    pub handler: Arc<dyn RequestHandler>,
}

impl std::fmt::Debug for Mount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mount")
            .field("route", &self.route)
            .field("handler", &self.handler.name())
            .finish()
    }
}

/// Registry for loaded viewer plugins.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    /// Plugins in registration order.
    plugins: Vec<Arc<LoadedPlugin>>,

    /// Mount path to index in `plugins`.
    by_mount: HashMap<String, usize>,

    /// Paths owned by the host; no plugin may mount on them.
    reserved: HashSet<String>,

    /// Host paths ending in `/*`; nothing may mount on or below them.
    reserved_trees: Vec<String>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that refuses plugins on any of the host's own routes.
    ///
    /// A route ending in `/*` also reserves everything below it.
    pub fn with_reserved<I, S>(routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::default();
        for route in routes {
            let route = route.as_ref();
            match route.strip_suffix("/*") {
                Some(tree) => registry.reserved_trees.push(normalize_mount_path(tree)),
                None => {
                    let path = normalize_mount_path(route);
                    if !path.is_empty() {
                        registry.reserved.insert(path);
                    }
                }
            }
        }
        registry
    }

    /// Whether `mount_path` belongs to the host.
    pub fn is_reserved(&self, mount_path: &str) -> bool {
        let path = normalize_mount_path(mount_path);
        self.reserved.contains(&path)
            || self.reserved_trees.iter().any(|tree| {
                path == *tree
                    || path
                        .strip_prefix(tree.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
    }

    /// Register a plugin.
    ///
    /// The first plugin registered on a mount path keeps it; later ones are
    /// rejected with [`PluginLoadError::DuplicateMount`]. Reserved paths are
    /// refused with [`PluginLoadError::ReservedMount`].
    pub fn register(&mut self, plugin: LoadedPlugin) -> PluginResult<Arc<LoadedPlugin>> {
        let path = plugin.mount_path().to_string();
        if self.is_reserved(&path) {
            return Err(PluginLoadError::ReservedMount(path));
        }
        if let Some(&existing) = self.by_mount.get(&path) {
            return Err(PluginLoadError::DuplicateMount {
                path,
                existing: self.plugins[existing].name().to_string(),
            });
        }

        info!(
            "Mounted viewer plugin '{}' at {} (order {}{})",
            plugin.name(),
            plugin.route(),
            plugin.order(),
            if plugin.is_hidden() { ", hidden" } else { "" }
        );

        let plugin = Arc::new(plugin);
        self.by_mount.insert(path, self.plugins.len());
        self.plugins.push(Arc::clone(&plugin));
        Ok(plugin)
    }

    /// Plugins for navigation: hidden ones excluded, sorted by order with
    /// ties kept in discovery order.
    pub fn list(&self) -> Vec<Arc<LoadedPlugin>> {
        self.all().into_iter().filter(|p| !p.is_hidden()).collect()
    }

    /// Every plugin, hidden included, in presentation order.
    pub fn all(&self) -> Vec<Arc<LoadedPlugin>> {
        let mut plugins = self.plugins.clone();
        plugins.sort_by_key(|p| (p.order(), p.discovery_index));
        plugins
    }

    /// Find a plugin by mount path. Hidden plugins are reachable here.
    pub fn lookup(&self, mount_path: &str) -> Option<Arc<LoadedPlugin>> {
        let key = normalize_mount_path(mount_path);
        self.by_mount
            .get(&key)
            .map(|&index| Arc::clone(&self.plugins[index]))
    }

    /// Find the plugin owning a request path such as `/logs/job/12`.
    ///
    /// Returns the plugin and the remainder below its mount point. The
    /// longest matching mount path wins.
    pub fn route(&self, request_path: &str) -> Option<(Arc<LoadedPlugin>, String)> {
        let path = normalize_mount_path(request_path);
        let mut best: Option<(&str, usize)> = None;

        for (mount, &index) in &self.by_mount {
            let matches = path == *mount
                || path
                    .strip_prefix(mount.as_str())
                    .map_or(false, |rest| rest.starts_with('/'));
            if matches && best.map_or(true, |(m, _)| mount.len() > m.len()) {
                best = Some((mount.as_str(), index));
            }
        }

        best.map(|(mount, index)| {
            let rest = path[mount.len()..].trim_start_matches('/').to_string();
            (Arc::clone(&self.plugins[index]), rest)
        })
    }

    /// Routes for the host, in presentation order (hidden included).
    pub fn mounts(&self) -> Vec<Mount> {
        self.all()
            .iter()
            .map(|p| Mount {
                route: p.route(),
                handler: Arc::clone(&p.handler),
            })
            .collect()
    }

    /// Archive locations of loaded plugins, for template lookup by the
    /// rendering collaborator.
    pub fn template_paths(&self) -> Vec<PathBuf> {
        self.plugins
            .iter()
            .filter_map(|p| p.origin.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
