//! Viewer extension libraries linked into the server.

use flowgate_plugin_api::ExtensionCatalog;

/// The catalog bundles are resolved against.
///
/// A bundle sees a library here only if its `lib/` directory holds a file
/// named after it (`viewer-static.lib` for `viewer-static`).
pub fn default_catalog() -> ExtensionCatalog {
    ExtensionCatalog::new().with_library(viewer_static::library())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_links_static_viewer() {
        let catalog = default_catalog();
        assert_eq!(catalog.library_names(), vec![viewer_static::LIBRARY_NAME]);
        assert!(catalog.host().class_names().is_empty());
    }
}
