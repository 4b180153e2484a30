//! # viewer-static
//!
//! A viewer extension library that serves files bundled with the plugin.
//!
//! A bundle selects it by placing `viewer-static.lib` in its `lib/` directory
//! and naming [`STATIC_VIEWER_CLASS`] as `viewer.handler.class`. Files are
//! served from `viewer.static.root` (default `web`), relative to the bundle
//! directory.

use async_trait::async_trait;
use flowgate_plugin_api::{
    ExtensionError, ExtensionLibrary, HandlerClass, HandlerRequest, HandlerResponse,
    RequestHandler,
};
use flowgate_props::Props;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

pub const LIBRARY_NAME: &str = "viewer-static";
pub const STATIC_VIEWER_CLASS: &str = "flowgate.viewer.StaticViewer";

pub const KEY_ROOT: &str = "viewer.static.root";
pub const KEY_INDEX: &str = "viewer.static.index";

/// The extension library exported to the host catalog.
pub fn library() -> ExtensionLibrary {
    ExtensionLibrary::new(LIBRARY_NAME)
        .with_class(HandlerClass::handler(STATIC_VIEWER_CLASS, StaticViewer::from_props))
}

/// Serves files below a root directory.
pub struct StaticViewer {
    name: String,
    root: PathBuf,
    index: String,
}

impl StaticViewer {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            index: "index.html".to_string(),
        }
    }

    /// Build from a bundle's merged configuration.
    pub fn from_props(props: &Arc<Props>) -> Result<Self, ExtensionError> {
        let name = props.get_string_or("viewer.name", LIBRARY_NAME)?;
        let root = props.get_path_or(KEY_ROOT, "web")?;
        let root = match bundle_dir(props) {
            Some(dir) if root.is_relative() => dir.join(root),
            _ => root,
        };
        if !root.is_dir() {
            return Err(ExtensionError::Construction(format!(
                "static root {} is not a directory",
                root.display()
            )));
        }

        let mut viewer = Self::new(name, root);
        viewer.index = props.get_string_or(KEY_INDEX, "index.html")?;
        Ok(viewer)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path below the root, refusing anything that escapes it.
    fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let relative = request_path.trim_matches('/');
        let relative = if relative.is_empty() {
            self.index.as_str()
        } else {
            relative
        };

        let mut path = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(path)
    }
}

#[async_trait]
impl RequestHandler for StaticViewer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, request: &HandlerRequest) -> HandlerResponse {
        let Some(path) = self.resolve(&request.path) else {
            return HandlerResponse::error(400, format!("Invalid path: {}", request.path));
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(body) => HandlerResponse {
                status: 200,
                content_type: content_type(&path).to_string(),
                body,
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                HandlerResponse::not_found(&request.path)
            }
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                HandlerResponse::error(500, "Failed to read file")
            }
        }
    }
}

/// The bundle directory, two levels above the settings file.
fn bundle_dir(props: &Props) -> Option<PathBuf> {
    let mut layer = props;
    loop {
        if let Some(source) = layer.source() {
            return source.parent()?.parent().map(Path::to_path_buf);
        }
        layer = &**layer.parent()?;
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("json") => "application/json",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        _ => "text/plain; charset=utf-8",
    }
}
