//! Startup and shutdown sequencing.
//!
//! ```text
//! Unstarted -> Configuring -> BuildingSubsystems -> RegisteringManagement
//!           -> LoadingPlugins -> Running -> ShuttingDown -> Stopped
//! ```
//!
//! A configuration error while configuring or building subsystems moves the
//! coordinator straight to `Stopped`; `Running` is never reached and the
//! listener is never activated. Plugin failures are logged and startup goes
//! on. Shutdown only acts from `Running` and is a no-op everywhere else.

use crate::config::{ListenerManagement, ServerSettings};
use crate::context::{AppContext, RenderingConfig};
use crate::error::{ConfigurationError, LifecycleError};
use crate::extensions;
use crate::factory::SubsystemFactory;
use crate::routes;
use crate::session::SessionCache;
use crate::subsystems::{ExecutorManagement, ScheduleManagement, SlaManagement, Subsystems};
use flowgate_management::{ManagementBridge, ManagementError};
use flowgate_plugin_runtime::{DiscoveryReport, PluginDiscovery, PluginRegistry};
use flowgate_props::Props;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Coordinator states, in the order startup passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Unstarted,
    Configuring,
    BuildingSubsystems,
    RegisteringManagement,
    LoadingPlugins,
    Running,
    ShuttingDown,
    Stopped,
}

/// What a shutdown call did.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// False when the call was a no-op.
    pub performed: bool,
    pub management_failures: Vec<ManagementError>,
    /// `(subsystem, reason)` for each subsystem that failed to shut down.
    pub subsystem_failures: Vec<(&'static str, String)>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.management_failures.is_empty() && self.subsystem_failures.is_empty()
    }
}

struct Inner {
    state: LifecycleState,
    transitions: Vec<LifecycleState>,
    context: Option<Arc<AppContext>>,
    discovery_report: Option<DiscoveryReport>,
}

impl Inner {
    fn enter(&mut self, state: LifecycleState) {
        info!("Lifecycle: {:?} -> {:?}", self.state, state);
        self.state = state;
        self.transitions.push(state);
    }
}

/// Drives the server through startup and shutdown.
pub struct LifecycleCoordinator {
    props: Arc<Props>,
    factory: SubsystemFactory,
    discovery: PluginDiscovery,
    inner: Mutex<Inner>,
}

impl LifecycleCoordinator {
    pub fn new(props: Props, factory: SubsystemFactory, discovery: PluginDiscovery) -> Self {
        Self {
            props: Arc::new(props),
            factory,
            discovery,
            inner: Mutex::new(Inner {
                state: LifecycleState::Unstarted,
                transitions: vec![LifecycleState::Unstarted],
                context: None,
                discovery_report: None,
            }),
        }
    }

    /// A coordinator using the built-in subsystems and linked viewer libraries.
    pub fn with_defaults(props: Props) -> Self {
        Self::new(
            props,
            SubsystemFactory::default(),
            PluginDiscovery::new(Arc::new(extensions::default_catalog())),
        )
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    /// Every state entered so far, starting with `Unstarted`.
    pub fn transitions(&self) -> Vec<LifecycleState> {
        self.inner.lock().transitions.clone()
    }

    /// The composed server, once running.
    pub fn context(&self) -> Option<Arc<AppContext>> {
        self.inner.lock().context.clone()
    }

    /// Result of the plugin discovery run, once startup got that far.
    pub fn with_discovery_report<R>(&self, f: impl FnOnce(Option<&DiscoveryReport>) -> R) -> R {
        f(self.inner.lock().discovery_report.as_ref())
    }

    fn enter(&self, state: LifecycleState) {
        self.inner.lock().enter(state);
    }

    /// Start the server.
    ///
    /// On a configuration error the coordinator is left `Stopped` and the
    /// error is returned; the caller must not activate the listener.
    pub fn start(&self) -> Result<Arc<AppContext>, LifecycleError> {
        {
            let mut inner = self.inner.lock();
            if inner.state != LifecycleState::Unstarted {
                return Err(LifecycleError::InvalidTransition {
                    state: inner.state,
                    action: "start",
                });
            }
            inner.enter(LifecycleState::Configuring);
        }

        match self.compose() {
            Ok(context) => {
                let mut inner = self.inner.lock();
                inner.context = Some(Arc::clone(&context));
                inner.enter(LifecycleState::Running);
                info!("Server composed and running");
                Ok(context)
            }
            Err(e) => {
                error!("Startup failed: {}", e);
                self.enter(LifecycleState::Stopped);
                Err(e.into())
            }
        }
    }

    fn compose(&self) -> Result<Arc<AppContext>, ConfigurationError> {
        let settings = ServerSettings::from_props(&self.props)?;
        normalize_environment(&settings)?;
        let sessions = Arc::new(SessionCache::from_props(&self.props)?);

        self.enter(LifecycleState::BuildingSubsystems);
        let subsystems = self.factory.build(&self.props)?;

        self.enter(LifecycleState::RegisteringManagement);
        let management = Arc::new(ManagementBridge::new());
        register_management(&management, &subsystems, &settings);

        self.enter(LifecycleState::LoadingPlugins);
        let mut registry = PluginRegistry::with_reserved(routes::reserved_routes());
        let report = self.discovery.discover(&settings.plugin_dir, &mut registry);
        self.inner.lock().discovery_report = Some(report);

        let rendering = RenderingConfig {
            dev_mode: settings.dev_mode,
            template_paths: registry.template_paths(),
        };
        for path in &rendering.template_paths {
            info!("Template path {}", path.display());
        }

        Ok(Arc::new(AppContext {
            props: Arc::clone(&self.props),
            settings,
            subsystems,
            management,
            plugins: Arc::new(registry),
            sessions,
            rendering,
        }))
    }

    /// Shut the server down.
    ///
    /// Unregisters every management component, then shuts the subsystems
    /// down in reverse dependency order. Each step is attempted whatever
    /// happened to the previous ones. Outside `Running` this only logs.
    pub fn shutdown(&self) -> ShutdownReport {
        let context = {
            let mut inner = self.inner.lock();
            if inner.state != LifecycleState::Running {
                info!("Shutdown requested while {:?}, nothing to do", inner.state);
                return ShutdownReport::default();
            }
            inner.enter(LifecycleState::ShuttingDown);
            inner.context.clone()
        };

        let mut report = ShutdownReport {
            performed: true,
            ..Default::default()
        };

        if let Some(context) = context {
            report.management_failures = context.management.unregister_all();
            report.subsystem_failures = context.subsystems.shutdown_all();
        }

        if !report.is_clean() {
            warn!(
                "Shutdown finished with {} management and {} subsystem failure(s)",
                report.management_failures.len(),
                report.subsystem_failures.len()
            );
        }

        self.enter(LifecycleState::Stopped);
        report
    }
}

/// Prepare the directories the server writes to.
fn normalize_environment(settings: &ServerSettings) -> Result<(), ConfigurationError> {
    std::fs::create_dir_all(&settings.temp_dir).map_err(|source| ConfigurationError::Io {
        path: settings.temp_dir.clone(),
        source,
    })?;
    info!("Temp directory {}", settings.temp_dir.display());

    if let Some(tz) = &settings.timezone {
        info!("Default timezone {}", tz);
    }

    info!("Viewer plugin directory {}", settings.plugin_dir.display());
    Ok(())
}

fn register_management(
    bridge: &ManagementBridge,
    subsystems: &Subsystems,
    settings: &ServerSettings,
) {
    bridge.register(
        "listener",
        Arc::new(ListenerManagement(settings.listener.clone())),
    );
    bridge.register(
        "executorManager",
        Arc::new(ExecutorManagement(Arc::clone(&subsystems.executor))),
    );
    bridge.register(
        "slaManager",
        Arc::new(SlaManagement(Arc::clone(&subsystems.sla))),
    );
    bridge.register(
        "scheduler",
        Arc::new(ScheduleManagement(Arc::clone(&subsystems.scheduler))),
    );
}
