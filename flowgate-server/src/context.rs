//! The application context handed to everything that needs the composed
//! server.

use crate::config::ServerSettings;
use crate::session::SessionCache;
use crate::subsystems::Subsystems;
use flowgate_management::ManagementBridge;
use flowgate_plugin_runtime::PluginRegistry;
use flowgate_props::Props;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What the rendering collaborator needs to find templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderingConfig {
    /// Reload templates on every request.
    pub dev_mode: bool,

    /// Archive locations of loaded plugins, searched for bundled templates.
    pub template_paths: Vec<PathBuf>,
}

/// The composed server. Built once by the lifecycle coordinator.
pub struct AppContext {
    pub props: Arc<Props>,
    pub settings: ServerSettings,
    pub subsystems: Subsystems,
    pub management: Arc<ManagementBridge>,
    pub plugins: Arc<PluginRegistry>,
    pub sessions: Arc<SessionCache>,
    pub rendering: RenderingConfig,
}

impl AppContext {
    pub fn temp_dir(&self) -> &Path {
        &self.settings.temp_dir
    }

    pub fn plugin_dir(&self) -> &Path {
        &self.settings.plugin_dir
    }

    pub fn web_resource_dir(&self) -> &Path {
        &self.settings.web_resource_dir
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("settings", &self.settings)
            .field("management", &self.management.len())
            .field("plugins", &self.plugins.len())
            .field("sessions", &self.sessions)
            .field("rendering", &self.rendering)
            .finish()
    }
}
