//! Bootstrap configuration and root folder resolution
//!
//! Two-tier configuration:
//! 1. **TOML bootstrap**: port, root folder, logging, controller timing
//! 2. **Database runtime**: backend connection settings in the `settings` table
//!    (see [`crate::db::settings`])
//!
//! A missing TOML file is not an error: defaults are used and a warning logged.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Environment variable overriding the root folder
pub const ROOT_ENV_VAR: &str = "STOCKTALLY_ROOT";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "stocktally.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// HTTP port for the presentation API
    #[serde(default = "default_port")]
    pub port: u16,

    /// Root folder holding the settings database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub timing: TimingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            root_folder: None,
            logging: LoggingConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error); `RUST_LOG` wins
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Scan controller timing
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    /// Delay from scan acceptance until the next scan is accepted
    #[serde(default = "default_rearm_delay_ms")]
    pub rearm_delay_ms: u64,

    /// How long a lookup result stays displayed before auto-dismissal
    #[serde(default = "default_result_display_ms")]
    pub result_display_ms: u64,

    /// Timeout for each request to the inventory backend
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,

    /// Vibration pulse length requested on every accepted scan
    #[serde(default = "default_vibration_ms")]
    pub vibration_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            rearm_delay_ms: default_rearm_delay_ms(),
            result_display_ms: default_result_display_ms(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
            vibration_ms: default_vibration_ms(),
        }
    }
}

impl TimingConfig {
    pub fn rearm_delay(&self) -> Duration {
        Duration::from_millis(self.rearm_delay_ms)
    }

    pub fn result_display(&self) -> Duration {
        Duration::from_millis(self.result_display_ms)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn vibration(&self) -> Duration {
        Duration::from_millis(self.vibration_ms)
    }
}

fn default_port() -> u16 {
    5780
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rearm_delay_ms() -> u64 {
    500
}

fn default_result_display_ms() -> u64 {
    3000
}

fn default_lookup_timeout_ms() -> u64 {
    10_000
}

fn default_vibration_ms() -> u64 {
    200
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load from an explicit path; the file must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Load from `explicit` if given, else from the platform config location
    ///
    /// Only an explicitly requested file is allowed to fail; a missing
    /// platform file falls back to defaults. The returned source is for the
    /// caller to log once its subscriber is installed.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, ConfigSource)> {
        if let Some(path) = explicit {
            let config = Self::load_from(path)?;
            return Ok((config, ConfigSource::Explicit(path.to_path_buf())));
        }

        match default_config_file() {
            Some(path) => {
                let config = Self::load_from(&path)?;
                Ok((config, ConfigSource::Platform(path)))
            }
            None => Ok((Self::default(), ConfigSource::Defaults)),
        }
    }
}

/// Origin of a loaded [`TomlConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `--config` path
    Explicit(PathBuf),
    /// Platform config location
    Platform(PathBuf),
    /// No file found
    Defaults,
}

/// First existing platform config file, if any
///
/// Linux checks `~/.config/stocktally/config.toml` then
/// `/etc/stocktally/config.toml`; other platforms only the user location.
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("stocktally").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/stocktally/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Platform defaults compiled into the binary
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = dirs::data_local_dir()
            .map(|d| d.join("stocktally"))
            .unwrap_or_else(|| PathBuf::from("./stocktally_data"));

        Self { root_folder }
    }
}

/// Root folder resolution in priority order:
/// 1. Command-line argument
/// 2. `STOCKTALLY_ROOT` environment variable
/// 3. TOML `root_folder`
/// 4. OS-dependent compiled default
#[derive(Debug, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml_value(mut self, path: Option<PathBuf>) -> Self {
        self.toml_value = path;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_ENV_VAR) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and locates the database inside it
#[derive(Debug)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            info!("Creating root folder: {}", self.root_folder.display());
            std::fs::create_dir_all(&self.root_folder)?;
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }
}
