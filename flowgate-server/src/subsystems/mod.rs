//! # Subsystems
//!
//! Contracts for the pluggable subsystems composed by the server, and the
//! built-in implementations used when configuration selects none.
//!
//! The server only constructs these and shuts them down; what they do
//! internally belongs to their own teams. Each contract exposes a typed
//! stats snapshot that the management bridge publishes.

mod executor;
mod managed;
mod projects;
mod scheduler;
mod sla;
mod users;

pub use executor::{ExecutorManager, ExecutorStats, LocalExecutorManager};
pub use managed::{ExecutorManagement, ScheduleManagement, SlaManagement};
pub use projects::{InMemoryProjectManager, ProjectManager};
pub use scheduler::{BasicScheduleManager, Schedule, ScheduleDeps, ScheduleManager, ScheduleStats};
pub use sla::{BasicSlaManager, SlaManager, SlaStats};
pub use users::{InMemoryUserManager, User, UserManager};

use flowgate_props::PropsError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// Errors raised by subsystem implementations.
#[derive(Error, Debug)]
pub enum SubsystemError {
    #[error(transparent)]
    Props(#[from] PropsError),

    #[error("{0}")]
    Invalid(String),

    #[error("{0} has been shut down")]
    ShutDown(&'static str),
}

/// Static description of one pluggable subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsystemDescriptor {
    pub name: &'static str,
    pub depends_on: &'static [&'static str],
    /// Key naming the implementation to construct.
    pub config_key: &'static str,
    /// Implementation used when the key is absent.
    pub default_impl: &'static str,
}

pub const USER_MANAGER: SubsystemDescriptor = SubsystemDescriptor {
    name: "user_manager",
    depends_on: &[],
    config_key: "user.manager.class",
    default_impl: "memory",
};

pub const PROJECT_MANAGER: SubsystemDescriptor = SubsystemDescriptor {
    name: "project_manager",
    depends_on: &[],
    config_key: "project.manager.class",
    default_impl: "memory",
};

pub const EXECUTOR_MANAGER: SubsystemDescriptor = SubsystemDescriptor {
    name: "executor_manager",
    depends_on: &[],
    config_key: "executor.manager.class",
    default_impl: "local",
};

pub const SLA_MANAGER: SubsystemDescriptor = SubsystemDescriptor {
    name: "sla_manager",
    depends_on: &["executor_manager"],
    config_key: "sla.manager.class",
    default_impl: "basic",
};

pub const SCHEDULE_MANAGER: SubsystemDescriptor = SubsystemDescriptor {
    name: "schedule_manager",
    depends_on: &["executor_manager", "project_manager", "sla_manager"],
    config_key: "schedule.manager.class",
    default_impl: "basic",
};

/// Construction order. Every dependency precedes its dependents.
pub const BUILD_ORDER: [SubsystemDescriptor; 5] = [
    USER_MANAGER,
    PROJECT_MANAGER,
    EXECUTOR_MANAGER,
    SLA_MANAGER,
    SCHEDULE_MANAGER,
];

/// The composed subsystems.
#[derive(Clone)]
pub struct Subsystems {
    pub users: Arc<dyn UserManager>,
    pub projects: Arc<dyn ProjectManager>,
    pub executor: Arc<dyn ExecutorManager>,
    pub sla: Arc<dyn SlaManager>,
    pub scheduler: Arc<dyn ScheduleManager>,
}

impl Subsystems {
    /// Shut every subsystem down in reverse build order.
    ///
    /// Each call is guarded on its own; a failure or panic in one does not
    /// prevent the rest. Returns `(subsystem, reason)` for each failure.
    pub fn shutdown_all(&self) -> Vec<(&'static str, String)> {
        let steps: [(&'static str, &dyn Fn() -> Result<(), SubsystemError>); 5] = [
            (SCHEDULE_MANAGER.name, &|| self.scheduler.shutdown()),
            (SLA_MANAGER.name, &|| self.sla.shutdown()),
            (EXECUTOR_MANAGER.name, &|| self.executor.shutdown()),
            (PROJECT_MANAGER.name, &|| self.projects.shutdown()),
            (USER_MANAGER.name, &|| self.users.shutdown()),
        ];

        steps
            .into_iter()
            .filter_map(|(name, step)| guarded_shutdown(name, step).map(|reason| (name, reason)))
            .collect()
    }
}

/// Run one shutdown step, turning errors and panics into a logged reason.
pub fn guarded_shutdown<F>(name: &str, step: F) -> Option<String>
where
    F: FnOnce() -> Result<(), SubsystemError>,
{
    match catch_unwind(AssertUnwindSafe(step)) {
        Ok(Ok(())) => {
            info!("Subsystem {} shut down", name);
            None
        }
        Ok(Err(e)) => {
            error!("Error shutting down {}: {}", name, e);
            Some(e.to_string())
        }
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            error!("Panic while shutting down {}: {}", name, reason);
            Some(reason)
        }
    }
}
