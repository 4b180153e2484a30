//! Statically linked extension libraries.
//!
//! Viewer code is compiled into the host and enumerated here. A bundle on
//! disk selects which libraries it can see (through its `lib/` directory) and
//! which class in them builds its handler (through its configuration).

use crate::handler::RequestHandler;
use flowgate_props::{Props, PropsError};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by extension constructors.
#[derive(Error, Debug)]
pub enum ExtensionError {
    /// The bundle configuration is missing a value the extension needs.
    #[error("Configuration error: {0}")]
    Props(#[from] PropsError),

    /// Any other construction failure.
    #[error("{0}")]
    Construction(String),
}

/// The product of a class constructor.
///
/// Only [`Instance::Handler`] can be mounted; anything else is reported by
/// its type name and rejected by the host.
pub enum Instance {
    Handler(Arc<dyn RequestHandler>),
    Other(String),
}

impl Instance {
    pub fn into_handler(self) -> Result<Arc<dyn RequestHandler>, String> {
        match self {
            Instance::Handler(handler) => Ok(handler),
            Instance::Other(type_name) => Err(type_name),
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instance::Handler(handler) => write!(f, "Handler({})", handler.name()),
            Instance::Other(type_name) => write!(f, "Other({type_name})"),
        }
    }
}

/// A constructor taking exactly the bundle's merged configuration.
pub type Constructor =
    Arc<dyn Fn(&Arc<Props>) -> Result<Instance, ExtensionError> + Send + Sync>;

/// A named class inside an extension library.
#[derive(Clone)]
pub struct HandlerClass {
    name: String,
    constructor: Option<Constructor>,
}

impl HandlerClass {
    /// A class with no configuration constructor. Bundles naming it are
    /// rejected at the constructor stage.
    pub fn without_constructor(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constructor: None,
        }
    }

    /// A class with a raw configuration constructor.
    pub fn with_constructor<F>(name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&Arc<Props>) -> Result<Instance, ExtensionError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            constructor: Some(Arc::new(constructor)),
        }
    }

    /// A class whose constructor always produces a request handler.
    pub fn handler<H, F>(name: impl Into<String>, build: F) -> Self
    where
        H: RequestHandler + 'static,
        F: Fn(&Arc<Props>) -> Result<H, ExtensionError> + Send + Sync + 'static,
    {
        Self::with_constructor(name, move |props| {
            let handler = build(props)?;
            Ok(Instance::Handler(Arc::new(handler)))
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn constructor(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }
}

impl fmt::Debug for HandlerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerClass")
            .field("name", &self.name)
            .field("has_constructor", &self.constructor.is_some())
            .finish()
    }
}

/// A named set of classes, the unit a bundle links against.
#[derive(Debug, Clone, Default)]
pub struct ExtensionLibrary {
    name: String,
    classes: BTreeMap<String, HandlerClass>,
}

impl ExtensionLibrary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classes: BTreeMap::new(),
        }
    }

    pub fn with_class(mut self, class: HandlerClass) -> Self {
        self.add_class(class);
        self
    }

    pub fn add_class(&mut self, class: HandlerClass) {
        self.classes.insert(class.name().to_string(), class);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self, name: &str) -> Option<&HandlerClass> {
        self.classes.get(name)
    }

    pub fn class_names(&self) -> Vec<&str> {
        self.classes.keys().map(String::as_str).collect()
    }
}

/// Every extension library linked into the host, plus the host's own
/// classes which all bundles can see.
#[derive(Debug, Clone)]
pub struct ExtensionCatalog {
    host: Arc<ExtensionLibrary>,
    libraries: HashMap<String, Arc<ExtensionLibrary>>,
}

/// Name of the library holding host classes.
pub const HOST_LIBRARY: &str = "host";

impl ExtensionCatalog {
    pub fn new() -> Self {
        Self {
            host: Arc::new(ExtensionLibrary::new(HOST_LIBRARY)),
            libraries: HashMap::new(),
        }
    }

    /// Replace the host library.
    pub fn with_host(mut self, host: ExtensionLibrary) -> Self {
        self.host = Arc::new(host);
        self
    }

    /// Register a library. A library registered under an existing name
    /// replaces the earlier one.
    pub fn register(&mut self, library: ExtensionLibrary) {
        let name = library.name().to_string();
        self.libraries.insert(name, Arc::new(library));
    }

    pub fn with_library(mut self, library: ExtensionLibrary) -> Self {
        self.register(library);
        self
    }

    pub fn library(&self, name: &str) -> Option<Arc<ExtensionLibrary>> {
        self.libraries.get(name).cloned()
    }

    pub fn host(&self) -> Arc<ExtensionLibrary> {
        Arc::clone(&self.host)
    }

    pub fn library_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.libraries.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ExtensionCatalog {
    fn default() -> Self {
        Self::new()
    }
}
