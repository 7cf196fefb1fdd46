//! Persisted console configuration
//!
//! The file is TOML:
//!
//! ```toml
//! layout = "detailed"
//! captions = ["User", "Errors", "Request", "Session"]
//!
//! [server]
//! address = "127.0.0.1"
//! port = 1947
//!
//! [timeout]
//! enabled = false
//! seconds = 30
//!
//! [window]
//! x = 100
//! y = 100
//! width = 800
//! height = 600
//! maximized = false
//! show_controls = true
//! ```
//!
//! Loading never fails: every missing or malformed field falls back to its
//! default on its own, and unknown keys are ignored. Saving replaces the
//! whole file atomically.

use directories::ProjectDirs;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use toml::{Table, Value};

use crate::constants::{CONFIG_FILE_NAME, DEFAULT_CAPTIONS, MAX_CHANNELS};
use crate::error::ConfigError;
use crate::layout::LayoutMode;
use crate::network::ServerEndpoint;
use crate::timeout::TimeoutPolicy;

/// Main window placement, kept for the presentation shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowState {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub maximized: bool,
    /// Whether the server/timeout controls panel is shown
    pub show_controls: bool,
}

impl Default for WindowState {
    fn default() -> Self {
        Self {
            x: 100,
            y: 100,
            width: 800,
            height: 600,
            maximized: false,
            show_controls: true,
        }
    }
}

/// Everything persisted between runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppConfig {
    pub layout: LayoutMode,
    pub captions: Vec<String>,
    pub server: ServerEndpoint,
    pub timeout: TimeoutPolicy,
    pub window: WindowState,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            layout: LayoutMode::default(),
            captions: default_captions(),
            server: ServerEndpoint::default(),
            timeout: TimeoutPolicy::default(),
            window: WindowState::default(),
        }
    }
}

fn default_captions() -> Vec<String> {
    DEFAULT_CAPTIONS.iter().map(|c| c.to_string()).collect()
}

impl AppConfig {
    /// Build a configuration from a parsed document, field by field
    pub fn from_table(table: &Table) -> Self {
        let defaults = Self::default();

        let layout = field(table, "", "layout", defaults.layout, |v| {
            v.as_str().and_then(LayoutMode::parse)
        });

        let captions = field(table, "", "captions", defaults.captions, |v| {
            let items = v.as_array()?;
            let captions: Vec<String> = items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<_>>()?;
            (!captions.is_empty() && captions.len() <= MAX_CHANNELS).then_some(captions)
        });

        let server = section(table, "server");
        let server = ServerEndpoint {
            address: field(server, "server", "address", defaults.server.address, |v| {
                v.as_str()?.trim().parse::<IpAddr>().ok()
            }),
            port: field(server, "server", "port", defaults.server.port, |v| {
                u16::try_from(v.as_integer()?).ok()
            }),
        };

        let timeout = section(table, "timeout");
        let timeout = TimeoutPolicy {
            enabled: field(timeout, "timeout", "enabled", defaults.timeout.enabled, Value::as_bool),
            idle_seconds: field(
                timeout,
                "timeout",
                "seconds",
                defaults.timeout.idle_seconds,
                |v| u64::try_from(v.as_integer()?).ok().filter(|s| *s > 0),
            ),
        };

        let window = section(table, "window");
        let d = defaults.window;
        let window = WindowState {
            x: field(window, "window", "x", d.x, |v| i32::try_from(v.as_integer()?).ok()),
            y: field(window, "window", "y", d.y, |v| i32::try_from(v.as_integer()?).ok()),
            width: field(window, "window", "width", d.width, |v| {
                u32::try_from(v.as_integer()?).ok().filter(|w| *w > 0)
            }),
            height: field(window, "window", "height", d.height, |v| {
                u32::try_from(v.as_integer()?).ok().filter(|h| *h > 0)
            }),
            maximized: field(window, "window", "maximized", d.maximized, Value::as_bool),
            show_controls: field(window, "window", "show_controls", d.show_controls, Value::as_bool),
        };

        Self {
            layout,
            captions,
            server,
            timeout,
            window,
        }
    }

    /// Render the file contents
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&FileLayout::from(self))?)
    }
}

/// On-disk shape; plain values precede tables
#[derive(Serialize)]
struct FileLayout<'a> {
    layout: LayoutMode,
    captions: &'a [String],
    server: ServerSection,
    timeout: TimeoutSection,
    window: &'a WindowState,
}

#[derive(Serialize)]
struct ServerSection {
    address: String,
    port: u16,
}

#[derive(Serialize)]
struct TimeoutSection {
    enabled: bool,
    seconds: u64,
}

impl<'a> From<&'a AppConfig> for FileLayout<'a> {
    fn from(config: &'a AppConfig) -> Self {
        Self {
            layout: config.layout,
            captions: &config.captions,
            server: ServerSection {
                address: config.server.address.to_string(),
                port: config.server.port,
            },
            timeout: TimeoutSection {
                enabled: config.timeout.enabled,
                seconds: config.timeout.idle_seconds,
            },
            window: &config.window,
        }
    }
}

fn section<'a>(table: &'a Table, name: &str) -> Option<&'a Table> {
    match table.get(name) {
        Some(Value::Table(t)) => Some(t),
        Some(_) => {
            tracing::warn!("Config: [{}] is not a table, using defaults", name);
            None
        }
        None => None,
    }
}

fn field<'a, T, F>(table: impl Into<Option<&'a Table>>, section: &str, key: &str, default: T, extract: F) -> T
where
    F: FnOnce(&Value) -> Option<T>,
{
    let Some(value) = table.into().and_then(|t| t.get(key)) else {
        return default;
    };
    match extract(value) {
        Some(v) => v,
        None => {
            if section.is_empty() {
                tracing::warn!("Config: invalid value for '{}', using default", key);
            } else {
                tracing::warn!("Config: invalid value for '{}.{}', using default", section, key);
            }
            default
        }
    }
}

/// Default location of the configuration file for this user
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    ProjectDirs::from("org", "Maurina", "Maurina Console")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

/// Read the configuration at `path`, falling back to defaults
pub fn load(path: &Path) -> AppConfig {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!("No configuration at {}, using defaults", path.display());
            return AppConfig::default();
        }
        Err(e) => {
            tracing::warn!("Could not read {}: {}, using defaults", path.display(), e);
            return AppConfig::default();
        }
    };

    match toml::from_str::<Table>(&text) {
        Ok(table) => AppConfig::from_table(&table),
        Err(e) => {
            tracing::warn!("Could not parse {}: {}, using defaults", path.display(), e);
            AppConfig::default()
        }
    }
}

/// Write the whole configuration to `path`
///
/// The new contents go to a sibling temporary file that is synced and
/// then renamed over `path`, so a failed save leaves the old file intact.
pub fn save(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let text = config.to_toml()?;
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let tmp = temp_path(path);
    let written = File::create(&tmp).and_then(|mut file| {
        file.write_all(text.as_bytes())?;
        file.sync_all()
    });

    if let Err(e) = written.and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(e));
    }

    tracing::debug!("Configuration saved to {}", path.display());
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| CONFIG_FILE_NAME.into());
    name.push(".tmp");
    path.with_file_name(name)
}
