//! A plugin that made it through every loading stage.

use crate::bundle::PluginBundle;
use crate::scope::LoadingScope;
use flowgate_plugin_api::RequestHandler;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A bundle with its constructed handler and isolated scope.
///
/// Once registered it is never mutated or removed before shutdown.
pub struct LoadedPlugin {
    pub bundle: PluginBundle,
    pub handler: Arc<dyn RequestHandler>,
    pub scope: Arc<LoadingScope>,

    /// Archive that supplied the handler class; `None` for host classes.
    pub origin: Option<PathBuf>,

    /// Position of the bundle in discovery order.
    pub discovery_index: usize,
}

impl LoadedPlugin {
    pub fn name(&self) -> &str {
        &self.bundle.name
    }

    pub fn mount_path(&self) -> &str {
        &self.bundle.mount_path
    }

    pub fn order(&self) -> i64 {
        self.bundle.order
    }

    pub fn is_hidden(&self) -> bool {
        self.bundle.hidden
    }

    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// Route pattern installed in the host for this plugin.
    pub fn route(&self) -> String {
        format!("/{}/*", self.bundle.mount_path)
    }
}

impl fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("name", &self.bundle.name)
            .field("mount_path", &self.bundle.mount_path)
            .field("order", &self.bundle.order)
            .field("hidden", &self.bundle.hidden)
            .field("handler", &self.handler.name())
            .field("origin", &self.origin)
            .field("discovery_index", &self.discovery_index)
            .finish()
    }
}
