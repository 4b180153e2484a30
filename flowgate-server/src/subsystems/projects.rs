use super::SubsystemError;
use flowgate_props::Props;
use std::sync::atomic::{AtomicBool, Ordering};

pub const PROJECT_NAMES_KEY: &str = "project.names";

/// Project registry subsystem.
pub trait ProjectManager: Send + Sync {
    fn project_names(&self) -> Vec<String>;

    fn contains(&self, name: &str) -> bool;

    fn shutdown(&self) -> Result<(), SubsystemError>;
}

/// Projects named in configuration.
pub struct InMemoryProjectManager {
    names: Vec<String>,
    shut_down: AtomicBool,
}

impl InMemoryProjectManager {
    pub fn from_props(props: &Props) -> Result<Self, SubsystemError> {
        let mut names = props.get_string_list(PROJECT_NAMES_KEY)?;
        names.sort();
        names.dedup();
        Ok(Self {
            names,
            shut_down: AtomicBool::new(false),
        })
    }
}

impl ProjectManager for InMemoryProjectManager {
    fn project_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn contains(&self, name: &str) -> bool {
        !self.shut_down.load(Ordering::SeqCst)
            && self
                .names
                .binary_search_by(|n| n.as_str().cmp(name))
                .is_ok()
    }

    fn shutdown(&self) -> Result<(), SubsystemError> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_sorted_and_deduplicated() {
        let props = Props::from_str(None, r#"project.names = "etl, reports, etl""#).unwrap();
        let projects = InMemoryProjectManager::from_props(&props).unwrap();

        assert_eq!(projects.project_names(), vec!["etl", "reports"]);
        assert!(projects.contains("reports"));
        assert!(!projects.contains("missing"));

        projects.shutdown().unwrap();
        assert!(!projects.contains("reports"));
    }
}
