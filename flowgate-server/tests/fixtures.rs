//! Test fixtures for server integration tests.
//!
//! Builds a server home and viewer bundles on disk.

#![allow(dead_code)]

use flowgate_props::Props;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use viewer_static::STATIC_VIEWER_CLASS;

/// A server home with `conf/flowgate.toml` and an empty plugin directory.
pub struct ServerHome {
    pub dir: TempDir,
}

impl ServerHome {
    pub fn new(settings: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let conf = dir.path().join("conf");
        fs::create_dir_all(&conf).unwrap();
        fs::create_dir_all(dir.path().join("plugins/viewer")).unwrap();
        fs::write(
            conf.join("flowgate.toml"),
            format!("viewer.plugin.dir = \"plugins/viewer\"\n{}", settings),
        )
        .unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn conf_dir(&self) -> PathBuf {
        self.dir.path().join("conf")
    }

    pub fn plugin_dir(&self) -> PathBuf {
        self.dir.path().join("plugins/viewer")
    }

    /// Load the server configuration the way the binary does.
    pub fn props(&self) -> Props {
        flowgate_server::config::load_server_props(&self.conf_dir()).unwrap()
    }

    /// Write a bundle served by the static viewer.
    pub fn static_bundle(&self, dir_name: &str, name: &str, path: &str, extra: &str) -> PathBuf {
        let settings = format!(
            "[viewer]\nname = \"{}\"\npath = \"{}\"\nhandler.class = \"{}\"\n{}",
            name, path, STATIC_VIEWER_CLASS, extra
        );
        let bundle = self.bundle(dir_name, &settings, &["viewer-static.lib"]);
        fs::create_dir_all(bundle.join("web")).unwrap();
        fs::write(bundle.join("web/index.html"), format!("<h1>{}</h1>", name)).unwrap();
        bundle
    }

    /// Write a bundle with the given base settings and library files.
    pub fn bundle(&self, dir_name: &str, settings: &str, libs: &[&str]) -> PathBuf {
        let bundle = self.plugin_dir().join(dir_name);
        fs::create_dir_all(bundle.join("conf")).unwrap();
        fs::write(bundle.join("conf/plugin.toml"), settings).unwrap();
        if !libs.is_empty() {
            fs::create_dir_all(bundle.join("lib")).unwrap();
            for lib in libs {
                fs::write(bundle.join("lib").join(lib), "").unwrap();
            }
        }
        bundle
    }
}
