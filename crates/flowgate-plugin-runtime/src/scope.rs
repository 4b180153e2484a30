//! Isolated loading scopes.
//!
//! Each bundle gets its own scope built from its classpath. A scope sees the
//! extension libraries bound to its own entries, then falls back to the host
//! library. It never sees libraries bound only by another bundle.

use flowgate_plugin_api::{ExtensionCatalog, ExtensionLibrary, HandlerClass};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// One classpath entry and the library it binds, if any.
#[derive(Debug, Clone)]
pub struct ScopeEntry {
    pub path: PathBuf,
    pub library: Option<Arc<ExtensionLibrary>>,
}

/// A class found through a scope, with the entry that supplied it.
#[derive(Debug, Clone)]
pub struct ResolvedClass {
    pub class: HandlerClass,

    /// The archive the class came from; `None` for host classes.
    pub origin: Option<PathBuf>,
}

/// A bundle's private view of the extension catalog.
#[derive(Debug, Clone)]
pub struct LoadingScope {
    entries: Vec<ScopeEntry>,
    parent: Arc<ExtensionLibrary>,
}

impl LoadingScope {
    /// Build a scope over `classpath`, binding each existing entry to the
    /// catalog library named by its file stem.
    pub fn new(catalog: &ExtensionCatalog, classpath: Vec<PathBuf>) -> Self {
        let entries = classpath
            .into_iter()
            .map(|path| {
                let library = bind_library(catalog, &path);
                match &library {
                    Some(lib) => debug!("Scope entry {:?} binds library {}", path, lib.name()),
                    None => debug!("Scope entry {:?} binds no known library", path),
                }
                ScopeEntry { path, library }
            })
            .collect();

        Self {
            entries,
            parent: catalog.host(),
        }
    }

    /// Resolve a class name: own entries first, in classpath order, then the
    /// host library.
    pub fn resolve(&self, class_name: &str) -> Option<ResolvedClass> {
        let own = self.entries.iter().find_map(|entry| {
            entry
                .library
                .as_ref()
                .and_then(|lib| lib.class(class_name))
                .map(|class| ResolvedClass {
                    class: class.clone(),
                    origin: Some(entry.path.clone()),
                })
        });

        own.or_else(|| {
            self.parent.class(class_name).map(|class| ResolvedClass {
                class: class.clone(),
                origin: None,
            })
        })
    }

    pub fn entries(&self) -> &[ScopeEntry] {
        &self.entries
    }

    /// Names of the libraries visible through this scope's own entries.
    pub fn library_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|entry| entry.library.as_ref().map(|lib| lib.name()))
            .collect()
    }
}

fn bind_library(catalog: &ExtensionCatalog, path: &Path) -> Option<Arc<ExtensionLibrary>> {
    if !path.exists() {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    catalog.library(stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgate_plugin_api::HandlerClass;
    use tempfile::TempDir;

    fn catalog() -> ExtensionCatalog {
        ExtensionCatalog::new()
            .with_host(
                ExtensionLibrary::new("host")
                    .with_class(HandlerClass::without_constructor("host.Shared")),
            )
            .with_library(
                ExtensionLibrary::new("viewer-a")
                    .with_class(HandlerClass::without_constructor("a.Viewer"))
                    .with_class(HandlerClass::without_constructor("host.Shared")),
            )
            .with_library(
                ExtensionLibrary::new("viewer-b")
                    .with_class(HandlerClass::without_constructor("b.Viewer")),
            )
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "").unwrap();
        path
    }

    #[test]
    fn test_scope_sees_own_library_and_host() {
        let temp = TempDir::new().unwrap();
        let lib = touch(temp.path(), "viewer-a.lib");
        let scope = LoadingScope::new(&catalog(), vec![lib.clone()]);

        let resolved = scope.resolve("a.Viewer").unwrap();
        assert_eq!(resolved.origin, Some(lib));
        assert_eq!(scope.library_names(), vec!["viewer-a"]);
    }

    #[test]
    fn test_scope_cannot_see_other_bundles() {
        let temp = TempDir::new().unwrap();
        let lib = touch(temp.path(), "viewer-a.lib");
        let scope = LoadingScope::new(&catalog(), vec![lib]);

        assert!(scope.resolve("b.Viewer").is_none());
    }

    #[test]
    fn test_own_library_shadows_host() {
        let temp = TempDir::new().unwrap();
        let lib = touch(temp.path(), "viewer-a.lib");
        let with_lib = LoadingScope::new(&catalog(), vec![lib.clone()]);
        let without_lib = LoadingScope::new(&catalog(), vec![]);

        assert_eq!(with_lib.resolve("host.Shared").unwrap().origin, Some(lib));
        assert_eq!(without_lib.resolve("host.Shared").unwrap().origin, None);
    }

    #[test]
    fn test_missing_and_unknown_entries_bind_nothing() {
        let temp = TempDir::new().unwrap();
        let unknown = touch(temp.path(), "commons-io.jar");
        let missing = temp.path().join("viewer-b.lib");
        let scope = LoadingScope::new(&catalog(), vec![unknown, missing]);

        assert_eq!(scope.entries().len(), 2);
        assert!(scope.library_names().is_empty());
        assert!(scope.resolve("b.Viewer").is_none());
    }
}
