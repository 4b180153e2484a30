//! Plugin bundle parsing.
//!
//! A bundle is a directory with a `conf/` subdirectory holding its settings
//! and a `lib/` subdirectory holding its libraries.

use crate::error::{PluginLoadError, PluginResult};
use flowgate_props::{Props, PropsError};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const CONF_DIR: &str = "conf";
pub const LIB_DIR: &str = "lib";
pub const BASE_SETTINGS_FILE: &str = "plugin.toml";
pub const OVERRIDE_SETTINGS_FILE: &str = "override.toml";

pub const KEY_NAME: &str = "viewer.name";
pub const KEY_PATH: &str = "viewer.path";
pub const KEY_HANDLER_CLASS: &str = "viewer.handler.class";
pub const KEY_ORDER: &str = "viewer.order";
pub const KEY_HIDDEN: &str = "viewer.hidden";
pub const KEY_EXTERNAL_CLASSPATHS: &str = "viewer.external.classpaths";

/// A validated bundle, ready to have its handler resolved.
#[derive(Debug, Clone)]
pub struct PluginBundle {
    /// Bundle directory.
    pub dir: PathBuf,

    /// Base settings with the override file (if any) layered on top.
    pub props: Arc<Props>,

    /// Display name used in navigation.
    pub name: String,

    /// Mount path, without leading or trailing slashes.
    pub mount_path: String,

    /// Handler class resolved inside the bundle's scope.
    pub handler_class: String,

    /// Presentation order; lower first.
    pub order: i64,

    /// Hidden plugins are mounted but left out of navigation.
    pub hidden: bool,

    /// Extra classpath entries, relative to the bundle directory.
    pub external_classpaths: Vec<String>,

    /// The bundle's `lib/` directory.
    pub lib_dir: PathBuf,
}

impl PluginBundle {
    /// Read and validate the bundle at `dir`.
    ///
    /// Checks, in order: the directory itself, the base settings file, the
    /// required keys, and the library directory.
    pub fn load(dir: &Path) -> PluginResult<Self> {
        if !dir.is_dir() {
            return Err(PluginLoadError::NotADirectory(dir.to_path_buf()));
        }

        let props = Arc::new(Self::load_settings(dir)?);
        let invalid = |source: PropsError| PluginLoadError::InvalidConfig {
            bundle: dir.to_path_buf(),
            source,
        };

        let name = props.get_string(KEY_NAME).map_err(invalid)?;
        let raw_path = props.get_string(KEY_PATH).map_err(invalid)?;
        let mount_path = normalize_mount_path(&raw_path);
        if mount_path.is_empty() {
            return Err(invalid(PropsError::WrongType {
                key: KEY_PATH.to_string(),
                expected: "non-empty mount path",
                value: raw_path,
            }));
        }
        let handler_class = props.get_string(KEY_HANDLER_CLASS).map_err(invalid)?;
        let order = props.get_int_or(KEY_ORDER, 0).map_err(invalid)?;
        let hidden = props.get_bool_or(KEY_HIDDEN, false).map_err(invalid)?;
        let external_classpaths = props
            .get_string_list(KEY_EXTERNAL_CLASSPATHS)
            .map_err(invalid)?;

        let lib_dir = dir.join(LIB_DIR);
        if !lib_dir.is_dir() {
            return Err(PluginLoadError::MissingLibDir(lib_dir));
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            props,
            name,
            mount_path,
            handler_class,
            order,
            hidden,
            external_classpaths,
            lib_dir,
        })
    }

    fn load_settings(dir: &Path) -> PluginResult<Props> {
        let conf_dir = dir.join(CONF_DIR);
        let base = conf_dir.join(BASE_SETTINGS_FILE);
        if !base.is_file() {
            return Err(PluginLoadError::MissingConfig(base));
        }

        let mut files = vec![base];
        let override_file = conf_dir.join(OVERRIDE_SETTINGS_FILE);
        if override_file.is_file() {
            files.push(override_file);
        }

        Props::load_layered(None, &files).map_err(|source| PluginLoadError::InvalidConfig {
            bundle: dir.to_path_buf(),
            source,
        })
    }

    /// Every path that joins the bundle's loading scope: the `lib/` entries
    /// sorted by file name, then the external classpath entries in the
    /// configured order.
    pub fn classpath(&self) -> PluginResult<Vec<PathBuf>> {
        let mut libs: Vec<PathBuf> = std::fs::read_dir(&self.lib_dir)?
            .flatten()
            .map(|entry| entry.path())
            .collect();
        libs.sort();

        libs.extend(self.external_classpaths.iter().map(|ext| self.dir.join(ext)));
        Ok(libs)
    }
}

/// Strip surrounding slashes and whitespace from a configured mount path.
pub fn normalize_mount_path(path: &str) -> String {
    path.trim().trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn base_settings(name: &str, path: &str) -> String {
        format!(
            r#"
[viewer]
name = "{name}"
path = "{path}"
handler.class = "test.Viewer"
"#
        )
    }

    #[test]
    fn test_load_bundle_with_defaults() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("logs");
        write(&dir.join("conf/plugin.toml"), &base_settings("Logs", "/logs/"));
        std::fs::create_dir_all(dir.join("lib")).unwrap();

        let bundle = PluginBundle::load(&dir).unwrap();
        assert_eq!(bundle.name, "Logs");
        assert_eq!(bundle.mount_path, "logs");
        assert_eq!(bundle.handler_class, "test.Viewer");
        assert_eq!(bundle.order, 0);
        assert!(!bundle.hidden);
        assert!(bundle.external_classpaths.is_empty());
    }

    #[test]
    fn test_override_file_wins() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("logs");
        write(
            &dir.join("conf/plugin.toml"),
            &format!("{}order = 4\nhidden = true\n", base_settings("Logs", "logs")),
        );
        write(
            &dir.join("conf/override.toml"),
            "\"viewer.order\" = 9\n\"viewer.name\" = \"Job Logs\"\n",
        );
        std::fs::create_dir_all(dir.join("lib")).unwrap();

        let bundle = PluginBundle::load(&dir).unwrap();
        assert_eq!(bundle.order, 9);
        assert_eq!(bundle.name, "Job Logs");
        assert!(bundle.hidden);
    }

    #[test]
    fn test_missing_base_settings() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("broken");
        std::fs::create_dir_all(dir.join("conf")).unwrap();
        std::fs::create_dir_all(dir.join("lib")).unwrap();

        let result = PluginBundle::load(&dir);
        assert!(matches!(result, Err(PluginLoadError::MissingConfig(_))));
    }

    #[test]
    fn test_missing_required_key() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("broken");
        write(&dir.join("conf/plugin.toml"), "[viewer]\nname = \"No Path\"\n");
        std::fs::create_dir_all(dir.join("lib")).unwrap();

        let result = PluginBundle::load(&dir);
        assert!(matches!(result, Err(PluginLoadError::InvalidConfig { .. })));
    }

    #[test]
    fn test_missing_lib_dir() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nolib");
        write(&dir.join("conf/plugin.toml"), &base_settings("No Lib", "nolib"));

        let result = PluginBundle::load(&dir);
        assert!(matches!(result, Err(PluginLoadError::MissingLibDir(_))));
    }

    #[test]
    fn test_classpath_order() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("cp");
        write(
            &dir.join("conf/plugin.toml"),
            &format!(
                "{}external.classpaths = [\"extra/z.lib\", \"extra/a.lib\"]\n",
                base_settings("Cp", "cp")
            ),
        );
        write(&dir.join("lib/b.lib"), "");
        write(&dir.join("lib/a.lib"), "");

        let bundle = PluginBundle::load(&dir).unwrap();
        let classpath = bundle.classpath().unwrap();
        assert_eq!(
            classpath,
            vec![
                dir.join("lib/a.lib"),
                dir.join("lib/b.lib"),
                dir.join("extra/z.lib"),
                dir.join("extra/a.lib"),
            ]
        );
    }

    #[test]
    fn test_normalize_mount_path() {
        assert_eq!(normalize_mount_path(" /hdfs/ "), "hdfs");
        assert_eq!(normalize_mount_path("reports/daily"), "reports/daily");
        assert_eq!(normalize_mount_path("/"), "");
    }
}
