//! The management bridge: named components answering attribute queries.

use crate::error::{ManagementError, ManagementResult};
use crate::value::AttributeValue;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// A component that exposes a fixed set of named attributes.
pub trait Managed: Send + Sync {
    /// Type of component, used as the identifier domain
    /// (e.g. `flowgate.executor`).
    fn kind(&self) -> &str;

    /// The attributes this component answers, in display order.
    fn attribute_names(&self) -> &'static [&'static str];

    /// Read one attribute. `None` means the attribute is not exposed.
    fn attribute(&self, name: &str) -> Option<AttributeValue>;

    /// Called when the component is unregistered.
    fn release(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Stable identifier of a registered component: `<kind>:name=<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    pub fn new(kind: &str, name: &str) -> Self {
        Self(format!("{kind}:name={name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `name=` part of the identifier.
    pub fn name(&self) -> &str {
        self.0
            .split_once(":name=")
            .map(|(_, name)| name)
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

struct Registration {
    id: ComponentId,
    component: Arc<dyn Managed>,
}

/// Registry of managed components.
///
/// Safe to share between the lifecycle and the listener; registrations made
/// at startup are read concurrently by queries.
#[derive(Default)]
pub struct ManagementBridge {
    registrations: RwLock<Vec<Registration>>,
}

impl ManagementBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `component` under `name`.
    ///
    /// Failures are logged and reported as `None`; they never abort the
    /// caller.
    pub fn register(&self, name: &str, component: Arc<dyn Managed>) -> Option<ComponentId> {
        match self.try_register(name, component) {
            Ok(id) => {
                info!("Management component {} registered", id);
                Some(id)
            }
            Err(e) => {
                error!("Error registering management component '{}': {}", name, e);
                None
            }
        }
    }

    /// Register `component`, returning the reason on failure.
    pub fn try_register(
        &self,
        name: &str,
        component: Arc<dyn Managed>,
    ) -> ManagementResult<ComponentId> {
        if name.is_empty() || name.contains([':', ',', '=']) {
            return Err(ManagementError::InvalidName(name.to_string()));
        }

        let id = ComponentId::new(component.kind(), name);
        let mut registrations = self.registrations.write();
        if registrations.iter().any(|r| r.id == id) {
            return Err(ManagementError::AlreadyRegistered(id.to_string()));
        }

        registrations.push(Registration {
            id: id.clone(),
            component,
        });
        Ok(id)
    }

    /// Remove one component. It is removed even if its release hook fails.
    pub fn unregister(&self, id: &ComponentId) -> ManagementResult<()> {
        let registration = {
            let mut registrations = self.registrations.write();
            let index = registrations
                .iter()
                .position(|r| &r.id == id)
                .ok_or_else(|| ManagementError::UnknownComponent(id.to_string()))?;
            registrations.remove(index)
        };

        registration
            .component
            .release()
            .map_err(|message| ManagementError::ReleaseFailed {
                component: id.to_string(),
                message,
            })?;

        info!("Management component {} unregistered", id);
        Ok(())
    }

    /// Remove every component, continuing past individual failures.
    ///
    /// Returns the failures. A second call finds nothing to do.
    pub fn unregister_all(&self) -> Vec<ManagementError> {
        let mut failures = Vec::new();
        for id in self.list() {
            if let Err(e) = self.unregister(&id) {
                warn!("Failed to clean up management component {}: {}", id, e);
                failures.push(e);
            }
        }
        failures
    }

    /// Registered identifiers, in registration order.
    pub fn list(&self) -> Vec<ComponentId> {
        self.registrations.read().iter().map(|r| r.id.clone()).collect()
    }

    /// Names of the attributes exposed by a component.
    pub fn info(&self, id: &ComponentId) -> ManagementResult<Vec<String>> {
        let component = self.component(id)?;
        Ok(component
            .attribute_names()
            .iter()
            .map(|name| name.to_string())
            .collect())
    }

    /// Read one attribute of a component.
    pub fn query(&self, id: &ComponentId, attribute: &str) -> ManagementResult<AttributeValue> {
        let component = self.component(id)?;
        if !component.attribute_names().iter().any(|n| *n == attribute) {
            return Err(ManagementError::UnknownAttribute {
                component: id.to_string(),
                attribute: attribute.to_string(),
            });
        }
        component
            .attribute(attribute)
            .ok_or_else(|| ManagementError::UnknownAttribute {
                component: id.to_string(),
                attribute: attribute.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.registrations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.read().is_empty()
    }

    fn component(&self, id: &ComponentId) -> ManagementResult<Arc<dyn Managed>> {
        self.registrations
            .read()
            .iter()
            .find(|r| &r.id == id)
            .map(|r| Arc::clone(&r.component))
            .ok_or_else(|| ManagementError::UnknownComponent(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        hits: AtomicUsize,
        fail_release: bool,
    }

    impl Counter {
        fn new(fail_release: bool) -> Arc<Self> {
            Arc::new(Self {
                hits: AtomicUsize::new(0),
                fail_release,
            })
        }
    }

    impl Managed for Counter {
        fn kind(&self) -> &str {
            "test.counter"
        }

        fn attribute_names(&self) -> &'static [&'static str] {
            &["hits", "label"]
        }

        fn attribute(&self, name: &str) -> Option<AttributeValue> {
            match name {
                "hits" => Some(AttributeValue::from(self.hits.load(Ordering::SeqCst))),
                "label" => Some("counter".into()),
                _ => None,
            }
        }

        fn release(&self) -> Result<(), String> {
            if self.fail_release {
                Err("still in use".to_string())
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_register_and_query() {
        let bridge = ManagementBridge::new();
        let counter = Counter::new(false);
        counter.hits.store(4, Ordering::SeqCst);

        let id = bridge.register("executor", counter).unwrap();
        assert_eq!(id.as_str(), "test.counter:name=executor");
        assert_eq!(id.name(), "executor");
        assert_eq!(bridge.query(&id, "hits").unwrap(), AttributeValue::Int(4));
        assert_eq!(bridge.info(&id).unwrap(), vec!["hits", "label"]);
    }

    #[test]
    fn test_query_errors_are_typed() {
        let bridge = ManagementBridge::new();
        let id = bridge.register("c", Counter::new(false)).unwrap();

        assert!(matches!(
            bridge.query(&id, "nope"),
            Err(ManagementError::UnknownAttribute { .. })
        ));
        assert!(matches!(
            bridge.query(&ComponentId::from("x:name=y"), "hits"),
            Err(ManagementError::UnknownComponent(_))
        ));
    }

    #[test]
    fn test_collision_is_not_propagated() {
        let bridge = ManagementBridge::new();
        assert!(bridge.register("dup", Counter::new(false)).is_some());
        assert!(bridge.register("dup", Counter::new(false)).is_none());
        assert!(bridge.register("", Counter::new(false)).is_none());
        assert!(bridge.register("a:b", Counter::new(false)).is_none());
        assert_eq!(bridge.len(), 1);
    }

    #[test]
    fn test_unregister_all_continues_after_failure() {
        let bridge = ManagementBridge::new();
        bridge.register("first", Counter::new(false)).unwrap();
        bridge.register("broken", Counter::new(true)).unwrap();
        bridge.register("last", Counter::new(false)).unwrap();

        let failures = bridge.unregister_all();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], ManagementError::ReleaseFailed { .. }));
        assert!(bridge.is_empty());

        assert!(bridge.unregister_all().is_empty());
    }

    #[test]
    fn test_list_in_registration_order() {
        let bridge = ManagementBridge::new();
        bridge.register("b", Counter::new(false)).unwrap();
        bridge.register("a", Counter::new(false)).unwrap();

        let names: Vec<String> = bridge.list().iter().map(|id| id.name().to_string()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
