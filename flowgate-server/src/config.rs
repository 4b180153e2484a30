//! Server configuration loading.
//!
//! The server reads `<home>/conf/flowgate.toml`, layered over the optional
//! `<home>/conf/flowgate.private.toml` for secrets kept out of the shared
//! file. The home directory comes from `--home`, then `FLOWGATE_HOME`, then
//! the platform data directory. `--conf` names the configuration directory
//! directly.

use crate::error::ConfigurationError;
use directories::ProjectDirs;
use flowgate_management::{AttributeValue, Managed};
use flowgate_props::Props;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const HOME_ENV: &str = "FLOWGATE_HOME";
pub const CONF_DIR: &str = "conf";
pub const SERVER_FILE: &str = "flowgate.toml";
pub const PRIVATE_FILE: &str = "flowgate.private.toml";

pub const KEY_HOME: &str = "flowgate.home";
pub const KEY_TEMP_DIR: &str = "flowgate.temp.dir";
pub const KEY_TIMEZONE: &str = "default.timezone.id";
pub const KEY_PLUGIN_DIR: &str = "viewer.plugin.dir";
pub const KEY_WEB_RESOURCE_DIR: &str = "web.resource.dir";
pub const KEY_LOG_LEVEL: &str = "log.level";
pub const KEY_DEV_MODE: &str = "rendering.dev.mode";

pub const KEY_USE_SSL: &str = "server.use.ssl";
pub const KEY_SSL_PORT: &str = "server.ssl.port";
pub const KEY_PORT: &str = "server.port";
pub const KEY_HOSTNAME: &str = "server.hostname";
pub const KEY_MAX_THREADS: &str = "server.max.threads";

const SSL_REQUIRED_KEYS: [&str; 5] = [
    "server.ssl.keystore.path",
    "server.ssl.keystore.password",
    "server.ssl.key.password",
    "server.ssl.truststore.path",
    "server.ssl.truststore.password",
];

pub const DEFAULT_TEMP_DIR: &str = "temp";
pub const DEFAULT_PLUGIN_DIR: &str = "plugins/viewer";
pub const DEFAULT_WEB_RESOURCE_DIR: &str = "web";
pub const DEFAULT_PORT: i64 = 8081;
pub const DEFAULT_SSL_PORT: i64 = 8443;
pub const DEFAULT_HOSTNAME: &str = "localhost";
pub const DEFAULT_MAX_THREADS: i64 = 20;

/// Pick the configuration directory.
///
/// `conf` wins over `home`; `home` wins over `FLOWGATE_HOME`.
pub fn resolve_conf_dir(
    home: Option<&Path>,
    conf: Option<&Path>,
) -> Result<PathBuf, ConfigurationError> {
    if let Some(conf) = conf {
        return Ok(conf.to_path_buf());
    }
    if let Some(home) = home {
        return Ok(home.join(CONF_DIR));
    }
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|h| !h.is_empty()) {
        return Ok(PathBuf::from(home).join(CONF_DIR));
    }

    ProjectDirs::from("org", "flowgate", "flowgate")
        .map(|dirs| dirs.data_dir().join(CONF_DIR))
        .ok_or_else(|| {
            ConfigurationError::NotLoaded(format!(
                "no home directory: pass --home or set {}",
                HOME_ENV
            ))
        })
}

/// Load the server configuration from `conf_dir`.
///
/// `flowgate.toml` is required. Relative paths in the configuration are
/// resolved against the parent of `conf_dir`, recorded as `flowgate.home`.
pub fn load_server_props(conf_dir: &Path) -> Result<Props, ConfigurationError> {
    if !conf_dir.is_dir() {
        return Err(ConfigurationError::NotLoaded(format!(
            "configuration directory {} does not exist",
            conf_dir.display()
        )));
    }

    let server_file = conf_dir.join(SERVER_FILE);
    if !server_file.is_file() {
        return Err(ConfigurationError::NotLoaded(format!(
            "{} not found",
            server_file.display()
        )));
    }

    let mut files = Vec::new();
    let private_file = conf_dir.join(PRIVATE_FILE);
    if private_file.is_file() {
        debug!("Loading private settings from {}", private_file.display());
        files.push(private_file);
    }
    files.push(server_file);

    let mut props = Props::load_layered(None, &files)?;
    if !props.contains_key(KEY_HOME) {
        let home = conf_dir.parent().unwrap_or(conf_dir);
        props.put(KEY_HOME, home.display().to_string());
    }

    info!("Loaded server configuration from {}", conf_dir.display());
    Ok(props)
}

/// Resolve `path` against the server home unless it is absolute.
pub fn resolve_path(props: &Props, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match props.get_string(KEY_HOME) {
        Ok(home) => Path::new(&home).join(path),
        Err(_) => path,
    }
}

/// Listener settings read from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerSettings {
    pub use_ssl: bool,
    pub hostname: String,
    /// The SSL port when SSL is on, the plain port otherwise.
    pub port: u16,
    pub max_threads: u32,
}

impl ListenerSettings {
    pub fn from_props(props: &Props) -> Result<Self, ConfigurationError> {
        let use_ssl = props.get_bool_or(KEY_USE_SSL, false)?;
        let port = if use_ssl {
            for key in SSL_REQUIRED_KEYS {
                props.get_string(key)?;
            }
            port_setting(props, KEY_SSL_PORT, DEFAULT_SSL_PORT)?
        } else {
            port_setting(props, KEY_PORT, DEFAULT_PORT)?
        };

        let hostname = props.get_string_or(KEY_HOSTNAME, DEFAULT_HOSTNAME)?;
        if hostname.trim().is_empty() {
            return Err(ConfigurationError::InvalidSetting {
                key: KEY_HOSTNAME.to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let max_threads = props.get_int_or(KEY_MAX_THREADS, DEFAULT_MAX_THREADS)?;
        let max_threads = u32::try_from(max_threads)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ConfigurationError::InvalidSetting {
                key: KEY_MAX_THREADS.to_string(),
                message: format!("expected a positive thread count, got {}", max_threads),
            })?;

        Ok(Self {
            use_ssl,
            hostname,
            port,
            max_threads,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

fn port_setting(props: &Props, key: &str, default: i64) -> Result<u16, ConfigurationError> {
    let port = props.get_int_or(key, default)?;
    u16::try_from(port)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| ConfigurationError::InvalidSetting {
            key: key.to_string(),
            message: format!("{} is not a valid port", port),
        })
}

/// Everything the server reads from configuration outside the subsystems.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub listener: ListenerSettings,
    pub temp_dir: PathBuf,
    pub plugin_dir: PathBuf,
    /// Root of the static `/css`, `/js` and `/images` files.
    pub web_resource_dir: PathBuf,
    pub timezone: Option<String>,
    pub dev_mode: bool,
}

impl ServerSettings {
    pub fn from_props(props: &Props) -> Result<Self, ConfigurationError> {
        let timezone = timezone_setting(props)?;
        let temp_dir = props.get_path_or(KEY_TEMP_DIR, DEFAULT_TEMP_DIR)?;
        let plugin_dir = props.get_path_or(KEY_PLUGIN_DIR, DEFAULT_PLUGIN_DIR)?;
        let web_resource_dir = props.get_path_or(KEY_WEB_RESOURCE_DIR, DEFAULT_WEB_RESOURCE_DIR)?;

        Ok(Self {
            listener: ListenerSettings::from_props(props)?,
            temp_dir: resolve_path(props, temp_dir),
            plugin_dir: resolve_path(props, plugin_dir),
            web_resource_dir: resolve_path(props, web_resource_dir),
            timezone,
            dev_mode: props.get_bool_or(KEY_DEV_MODE, false)?,
        })
    }
}

/// The configured `default.timezone.id`, if any.
///
/// The server does not change its own environment; the binary exports this
/// as `TZ` before any other thread is running.
pub fn timezone_setting(props: &Props) -> Result<Option<String>, ConfigurationError> {
    if props.get(KEY_TIMEZONE).is_none() {
        return Ok(None);
    }
    let tz = props.get_string(KEY_TIMEZONE)?;
    if tz.trim().is_empty() {
        return Err(ConfigurationError::InvalidSetting {
            key: KEY_TIMEZONE.to_string(),
            message: "must not be empty".to_string(),
        });
    }
    Ok(Some(tz.trim().to_string()))
}

/// Listener settings published through the management bridge.
pub struct ListenerManagement(pub ListenerSettings);

impl Managed for ListenerManagement {
    fn kind(&self) -> &str {
        "flowgate.server"
    }

    fn attribute_names(&self) -> &'static [&'static str] {
        &["Hostname", "Port", "UseSsl", "MaxThreads"]
    }

    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        match name {
            "Hostname" => Some(self.0.hostname.as_str().into()),
            "Port" => Some(self.0.port.into()),
            "UseSsl" => Some(self.0.use_ssl.into()),
            "MaxThreads" => Some(AttributeValue::Int(i64::from(self.0.max_threads))),
            _ => None,
        }
    }
}
