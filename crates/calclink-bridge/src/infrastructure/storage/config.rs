//! TOML-based configuration for the calculator bridge.
//!
//! Reads and writes `AppConfig` at the platform-appropriate config file:
//! - Windows:  `%APPDATA%\CalcLink\config.toml`
//! - Linux:    `~/.config/calclink/config.toml`
//! - macOS:    `~/Library/Application Support/CalcLink/config.toml`
//!
//! Every field has a default, so an empty or missing file is valid.  Example:
//!
//! ```toml
//! [device]
//! read_timeout_ms = 2000
//!
//! [poller]
//! check_interval_secs = 30
//!
//! [logging]
//! level = "debug"
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent from the TOML file.  Whole
//! sections are `#[serde(default)]`, so a file may omit any of them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::usb::{TI84_PLUS_CE_PRODUCT_ID, TI_VENDOR_ID};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub poller: PollerSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

/// USB device selection and transfer timeouts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,
    #[serde(default = "default_product_id")]
    pub product_id: u16,
    /// Per-read timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Per-write timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub write_timeout_ms: u64,
}

/// Link poller timing and the sentinel program convention.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollerSettings {
    /// Seconds between poll ticks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    /// Seconds between question checks; a multiple of the tick interval.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Program whose content signals "question ready".
    #[serde(default = "default_ready_program")]
    pub ready_program: String,
    /// Program holding the question text.
    #[serde(default = "default_question_program")]
    pub question_program: String,
    /// Content of the ready program that means "send now".
    #[serde(default = "default_ready_sentinel")]
    pub ready_sentinel: String,
    /// Inbound text containing this token triggers an immediate check.
    #[serde(default = "default_confirmation_token")]
    pub confirmation_token: String,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` filter directive: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for log files, relative to the working directory.
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
    /// Number of log files kept.
    #[serde(default = "default_log_retain")]
    pub retain: usize,
}

/// Console relay behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelayConfig {
    /// Seconds to wait for the startup comms confirmation.
    #[serde(default = "default_comms_check_timeout_secs")]
    pub comms_check_timeout_secs: u64,
    /// Seconds between outbound slot checks.
    #[serde(default = "default_outbound_check_secs")]
    pub outbound_check_secs: u64,
    /// Inbound titles are truncated to this many characters.
    #[serde(default = "default_title_max_len")]
    pub title_max_len: usize,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_vendor_id() -> u16 {
    TI_VENDOR_ID
}
fn default_product_id() -> u16 {
    TI84_PLUS_CE_PRODUCT_ID
}
fn default_timeout_ms() -> u64 {
    1000
}
fn default_tick_interval_secs() -> u64 {
    5
}
fn default_check_interval_secs() -> u64 {
    60
}
fn default_ready_program() -> String {
    "SEND".to_string()
}
fn default_question_program() -> String {
    "QUESTION".to_string()
}
fn default_ready_sentinel() -> String {
    "SEND".to_string()
}
fn default_confirmation_token() -> String {
    "Comms confirmed".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_directory() -> PathBuf {
    PathBuf::from("logs")
}
fn default_log_retain() -> usize {
    5
}
fn default_comms_check_timeout_secs() -> u64 {
    30
}
fn default_outbound_check_secs() -> u64 {
    5
}
fn default_title_max_len() -> usize {
    8
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vendor_id: default_vendor_id(),
            product_id: default_product_id(),
            read_timeout_ms: default_timeout_ms(),
            write_timeout_ms: default_timeout_ms(),
        }
    }
}

impl DeviceConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            check_interval_secs: default_check_interval_secs(),
            ready_program: default_ready_program(),
            question_program: default_question_program(),
            ready_sentinel: default_ready_sentinel(),
            confirmation_token: default_confirmation_token(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_directory(),
            retain: default_log_retain(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            comms_check_timeout_secs: default_comms_check_timeout_secs(),
            outbound_check_secs: default_outbound_check_secs(),
            title_max_len: default_title_max_len(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from the platform path, returning defaults if the file
/// does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `AppConfig` from `path`, returning defaults if it does not exist.
///
/// # Errors
///
/// Same as [`load_config`].
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to the platform path.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &config_file_path()?)
}

/// Persists `config` to `path`, creating parent directories.
///
/// # Errors
///
/// Same as [`save_config`].
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Resolves the platform config base directory including the `CalcLink`
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("CalcLink"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("calclink"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(|h| PathBuf::from(h).join("Library").join("Application Support").join("CalcLink"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
