//! Configuration-driven construction of the subsystems.
//!
//! Each subsystem kind has a catalog of implementations keyed by a short tag.
//! The descriptor's configuration key picks the tag; an absent key picks the
//! built-in default. Registering a tag on [`SubsystemCatalog`] is the one way
//! to plug in another implementation.

use crate::error::ConfigurationError;
use crate::subsystems::{
    guarded_shutdown, BasicScheduleManager, BasicSlaManager, ExecutorManager,
    InMemoryProjectManager, InMemoryUserManager, LocalExecutorManager, ProjectManager,
    ScheduleDeps, ScheduleManager, SlaManager, SubsystemDescriptor, SubsystemError, Subsystems,
    UserManager, EXECUTOR_MANAGER, PROJECT_MANAGER, SCHEDULE_MANAGER, SLA_MANAGER, USER_MANAGER,
};
use flowgate_props::Props;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

type Build<T> = Arc<dyn Fn(&Props) -> Result<Arc<T>, SubsystemError> + Send + Sync>;
type BuildWith<D, T> = Arc<dyn Fn(&Props, D) -> Result<Arc<T>, SubsystemError> + Send + Sync>;

/// Known implementations of every subsystem kind, by tag.
#[derive(Clone, Default)]
pub struct SubsystemCatalog {
    users: BTreeMap<String, Build<dyn UserManager>>,
    projects: BTreeMap<String, Build<dyn ProjectManager>>,
    executors: BTreeMap<String, Build<dyn ExecutorManager>>,
    slas: BTreeMap<String, BuildWith<Arc<dyn ExecutorManager>, dyn SlaManager>>,
    schedulers: BTreeMap<String, BuildWith<ScheduleDeps, dyn ScheduleManager>>,
}

impl SubsystemCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding the built-in implementations under their default tags.
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        catalog.register_user_manager(USER_MANAGER.default_impl, |props| {
            Ok(Arc::new(InMemoryUserManager::from_props(props)?))
        });
        catalog.register_project_manager(PROJECT_MANAGER.default_impl, |props| {
            Ok(Arc::new(InMemoryProjectManager::from_props(props)?))
        });
        catalog.register_executor_manager(EXECUTOR_MANAGER.default_impl, |props| {
            Ok(Arc::new(LocalExecutorManager::from_props(props)?))
        });
        catalog.register_sla_manager(SLA_MANAGER.default_impl, |props, executor| {
            Ok(Arc::new(BasicSlaManager::from_props(props, executor)?))
        });
        catalog.register_schedule_manager(SCHEDULE_MANAGER.default_impl, |props, deps| {
            Ok(Arc::new(BasicScheduleManager::from_props(props, deps)?))
        });
        catalog
    }

    pub fn register_user_manager<F>(&mut self, tag: &str, build: F)
    where
        F: Fn(&Props) -> Result<Arc<dyn UserManager>, SubsystemError> + Send + Sync + 'static,
    {
        self.users.insert(tag.to_string(), Arc::new(build));
    }

    pub fn register_project_manager<F>(&mut self, tag: &str, build: F)
    where
        F: Fn(&Props) -> Result<Arc<dyn ProjectManager>, SubsystemError> + Send + Sync + 'static,
    {
        self.projects.insert(tag.to_string(), Arc::new(build));
    }

    pub fn register_executor_manager<F>(&mut self, tag: &str, build: F)
    where
        F: Fn(&Props) -> Result<Arc<dyn ExecutorManager>, SubsystemError> + Send + Sync + 'static,
    {
        self.executors.insert(tag.to_string(), Arc::new(build));
    }

    pub fn register_sla_manager<F>(&mut self, tag: &str, build: F)
    where
        F: Fn(&Props, Arc<dyn ExecutorManager>) -> Result<Arc<dyn SlaManager>, SubsystemError>
            + Send
            + Sync
            + 'static,
    {
        self.slas.insert(tag.to_string(), Arc::new(build));
    }

    pub fn register_schedule_manager<F>(&mut self, tag: &str, build: F)
    where
        F: Fn(&Props, ScheduleDeps) -> Result<Arc<dyn ScheduleManager>, SubsystemError>
            + Send
            + Sync
            + 'static,
    {
        self.schedulers.insert(tag.to_string(), Arc::new(build));
    }

    /// Registered tags for the subsystem named by `descriptor`.
    pub fn tags(&self, descriptor: &SubsystemDescriptor) -> Vec<String> {
        let keys: Vec<&String> = match descriptor.name {
            n if n == USER_MANAGER.name => self.users.keys().collect(),
            n if n == PROJECT_MANAGER.name => self.projects.keys().collect(),
            n if n == EXECUTOR_MANAGER.name => self.executors.keys().collect(),
            n if n == SLA_MANAGER.name => self.slas.keys().collect(),
            n if n == SCHEDULE_MANAGER.name => self.schedulers.keys().collect(),
            _ => Vec::new(),
        };
        keys.into_iter().cloned().collect()
    }
}

/// Builds [`Subsystems`] from configuration.
#[derive(Clone)]
pub struct SubsystemFactory {
    catalog: SubsystemCatalog,
}

impl Default for SubsystemFactory {
    fn default() -> Self {
        Self::new(SubsystemCatalog::with_defaults())
    }
}

/// Subsystems constructed so far, for cleanup when a later one fails.
#[derive(Default)]
struct Partial {
    users: Option<Arc<dyn UserManager>>,
    projects: Option<Arc<dyn ProjectManager>>,
    executor: Option<Arc<dyn ExecutorManager>>,
    sla: Option<Arc<dyn SlaManager>>,
}

impl Partial {
    fn shutdown(self) {
        if let Some(sla) = self.sla {
            guarded_shutdown(SLA_MANAGER.name, || sla.shutdown());
        }
        if let Some(executor) = self.executor {
            guarded_shutdown(EXECUTOR_MANAGER.name, || executor.shutdown());
        }
        if let Some(projects) = self.projects {
            guarded_shutdown(PROJECT_MANAGER.name, || projects.shutdown());
        }
        if let Some(users) = self.users {
            guarded_shutdown(USER_MANAGER.name, || users.shutdown());
        }
    }
}

impl SubsystemFactory {
    pub fn new(catalog: SubsystemCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &SubsystemCatalog {
        &self.catalog
    }

    /// Build every subsystem, dependencies first.
    ///
    /// If one fails, those already built are shut down before the error is
    /// returned.
    pub fn build(&self, props: &Props) -> Result<Subsystems, ConfigurationError> {
        let mut partial = Partial::default();
        match self.build_into(props, &mut partial) {
            Ok(subsystems) => Ok(subsystems),
            Err(e) => {
                warn!("Subsystem construction failed, releasing what was built");
                partial.shutdown();
                Err(e)
            }
        }
    }

    fn build_into(
        &self,
        props: &Props,
        partial: &mut Partial,
    ) -> Result<Subsystems, ConfigurationError> {
        let users = {
            let (tag, build) = select(props, &USER_MANAGER, &self.catalog.users)?;
            construct(&USER_MANAGER, tag, build(props))?
        };
        partial.users = Some(Arc::clone(&users));

        let projects = {
            let (tag, build) = select(props, &PROJECT_MANAGER, &self.catalog.projects)?;
            construct(&PROJECT_MANAGER, tag, build(props))?
        };
        partial.projects = Some(Arc::clone(&projects));

        let executor = {
            let (tag, build) = select(props, &EXECUTOR_MANAGER, &self.catalog.executors)?;
            construct(&EXECUTOR_MANAGER, tag, build(props))?
        };
        partial.executor = Some(Arc::clone(&executor));

        let sla = {
            let (tag, build) = select(props, &SLA_MANAGER, &self.catalog.slas)?;
            construct(&SLA_MANAGER, tag, build(props, Arc::clone(&executor)))?
        };
        partial.sla = Some(Arc::clone(&sla));

        let scheduler = {
            let (tag, build) = select(props, &SCHEDULE_MANAGER, &self.catalog.schedulers)?;
            let deps = ScheduleDeps {
                executor: Arc::clone(&executor),
                projects: Arc::clone(&projects),
                sla: Arc::clone(&sla),
            };
            construct(&SCHEDULE_MANAGER, tag, build(props, deps))?
        };

        Ok(Subsystems {
            users,
            projects,
            executor,
            sla,
            scheduler,
        })
    }
}

fn select<'a, B>(
    props: &Props,
    descriptor: &SubsystemDescriptor,
    builders: &'a BTreeMap<String, B>,
) -> Result<(String, &'a B), ConfigurationError> {
    let tag = props.get_string_or(descriptor.config_key, descriptor.default_impl)?;
    match builders.get(&tag) {
        Some(build) => Ok((tag, build)),
        None => Err(ConfigurationError::UnknownImplementation {
            subsystem: descriptor.name.to_string(),
            key: descriptor.config_key.to_string(),
            tag,
            known: builders.keys().cloned().collect::<Vec<_>>().join(", "),
        }),
    }
}

fn construct<T: ?Sized>(
    descriptor: &SubsystemDescriptor,
    tag: String,
    result: Result<Arc<T>, SubsystemError>,
) -> Result<Arc<T>, ConfigurationError> {
    match result {
        Ok(subsystem) => {
            info!("Built {} ({})", descriptor.name, tag);
            Ok(subsystem)
        }
        Err(source) => Err(ConfigurationError::Construction {
            subsystem: descriptor.name.to_string(),
            tag,
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn props(toml: &str) -> Props {
        Props::from_str(None, toml).unwrap()
    }

    #[test]
    fn test_defaults_when_keys_absent() {
        let factory = SubsystemFactory::default();
        let subsystems = factory.build(&props("")).unwrap();
        assert_eq!(subsystems.executor.stats().max_concurrent, 10);
        assert_eq!(subsystems.sla.stats().check_interval_ms, 60_000);
    }

    #[test]
    fn test_explicit_default_tag() {
        let factory = SubsystemFactory::default();
        assert!(factory
            .build(&props(r#"executor.manager.class = "local""#))
            .is_ok());
    }

    #[test]
    fn test_unknown_tag_is_configuration_error() {
        let factory = SubsystemFactory::default();
        let err = factory
            .build(&props(r#"sla.manager.class = "remote""#))
            .err()
            .unwrap();

        match err {
            ConfigurationError::UnknownImplementation {
                subsystem,
                key,
                tag,
                known,
            } => {
                assert_eq!(subsystem, "sla_manager");
                assert_eq!(key, "sla.manager.class");
                assert_eq!(tag, "remote");
                assert_eq!(known, "basic");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_construction_failure_releases_built_subsystems() {
        struct Tracked(Arc<AtomicBool>);

        impl ProjectManager for Tracked {
            fn project_names(&self) -> Vec<String> {
                Vec::new()
            }

            fn contains(&self, _name: &str) -> bool {
                false
            }

            fn shutdown(&self) -> Result<(), SubsystemError> {
                self.0.store(true, Ordering::SeqCst);
                Ok(())
            }
        }

        let released = Arc::new(AtomicBool::new(false));
        let mut catalog = SubsystemCatalog::with_defaults();
        let flag = Arc::clone(&released);
        catalog.register_project_manager("tracked", move |_| {
            Ok(Arc::new(Tracked(Arc::clone(&flag))))
        });

        let factory = SubsystemFactory::new(catalog);
        let err = factory
            .build(&props(
                r#"
project.manager.class = "tracked"
executor.max.concurrent = -1
"#,
            ))
            .err()
            .unwrap();

        assert!(matches!(
            err,
            ConfigurationError::Construction { ref subsystem, .. }
                if subsystem == "executor_manager"
        ));
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_registered_implementation_is_selected() {
        let mut catalog = SubsystemCatalog::with_defaults();
        catalog.register_executor_manager("small", |_| {
            let props = Props::from_str(None, "executor.max.concurrent = 1").unwrap();
            Ok(Arc::new(LocalExecutorManager::from_props(&props)?))
        });

        let factory = SubsystemFactory::new(catalog);
        assert_eq!(factory.catalog().tags(&EXECUTOR_MANAGER), vec!["local", "small"]);

        let subsystems = factory
            .build(&props(r#"executor.manager.class = "small""#))
            .unwrap();
        assert_eq!(subsystems.executor.stats().max_concurrent, 1);
    }
}
