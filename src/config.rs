//! Layered configuration for Mission Control.
//!
//! Settings are read from `mission.toml`, then overridden by environment
//! variables (a `.env` file is honoured), then by CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [api]
//! base_url = "http://127.0.0.1:3142"
//!
//! [storage]
//! dir = "/home/me/.local/share/mission-control/preferences"
//!
//! [viewer]
//! font_size = 12
//! cols = 100
//! rows = 30
//!
//! [server]
//! host = "127.0.0.1"
//! port = 3142
//! request_timeout_secs = 30
//!
//! [logging]
//! level = "info"
//! json = false
//! file = "/tmp/mission-control.log"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::proxy::ServerConfig;
use crate::stream::terminal::{DEFAULT_FONT_SIZE, MAX_FONT_SIZE, MIN_FONT_SIZE};

pub const CONFIG_FILE_NAME: &str = "mission.toml";
pub const ENV_API_URL: &str = "MISSION_CONTROL_API_URL";
pub const ENV_STORAGE_DIR: &str = "MISSION_CONTROL_STORAGE_DIR";
pub const ENV_LOG: &str = "MISSION_CONTROL_LOG";

/// Where the log viewer finds the stream-logs proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "http://127.0.0.1:3142".to_string()
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSection {
    /// Preference directory (default: `<data_dir>/mission-control/preferences`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl StorageSection {
    pub fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(default_storage_dir)
    }
}

fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mission-control")
        .join("preferences")
}

/// Initial viewport geometry for the log viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerSection {
    #[serde(default = "default_font_size")]
    pub font_size: u8,
    #[serde(default = "default_cols")]
    pub cols: u16,
    #[serde(default = "default_rows")]
    pub rows: u16,
}

fn default_font_size() -> u8 {
    DEFAULT_FONT_SIZE
}

fn default_cols() -> u16 {
    100
}

fn default_rows() -> u16 {
    30
}

impl Default for ViewerSection {
    fn default() -> Self {
        Self {
            font_size: default_font_size(),
            cols: default_cols(),
            rows: default_rows(),
        }
    }
}

impl ViewerSection {
    /// Configured font size, clamped to the supported range.
    pub fn font_size(&self) -> u8 {
        self.font_size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upstream connect timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3142
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServerSection {
    pub fn to_server_config(&self, dev_mode: bool) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            dev_mode,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Also write logs to a daily-rolling file at this path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: None,
        }
    }
}

/// Contents of `mission.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissionConfig {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub viewer: ViewerSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub api_url: Option<String>,
    pub storage_dir: Option<PathBuf>,
    pub verbose: bool,
}

/// `<config_dir>/mission-control/mission.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mission-control").join(CONFIG_FILE_NAME))
}

impl MissionConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse mission.toml")
    }

    /// Returns default configuration if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize mission.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(ENV_API_URL) {
            self.api.base_url = url;
        }
        if let Some(dir) = non_empty(ENV_STORAGE_DIR) {
            self.storage.dir = Some(PathBuf::from(dir));
        }
        if let Some(level) = non_empty(ENV_LOG) {
            self.logging.level = level;
        }
    }

    pub fn apply_cli(&mut self, cli: &CliOverrides) {
        if let Some(url) = &cli.api_url {
            self.api.base_url = url.clone();
        }
        if let Some(dir) = &cli.storage_dir {
            self.storage.dir = Some(dir.clone());
        }
        if cli.verbose {
            self.logging.level = "debug".to_string();
        }
    }

    /// Resolve the effective configuration (file → env → CLI).
    ///
    /// An explicit `config_path` must exist; the default location is optional.
    pub fn resolve(config_path: Option<&Path>, cli: &CliOverrides) -> Result<Self> {
        // A missing .env is normal
        let _ = dotenvy::dotenv();

        let mut config = match config_path {
            Some(path) => Self::load(path)?,
            None => match default_config_path() {
                Some(path) => Self::load_or_default(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|name| std::env::var(name).ok());
        config.apply_cli(cli);
        Ok(config)
    }

    /// Check for values that parse but cannot work.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        match reqwest::Url::parse(&self.api.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => problems.push(format!(
                "api.base_url: unsupported scheme '{}'",
                url.scheme()
            )),
            Err(e) => problems.push(format!("api.base_url: {}", e)),
        }
        if self.viewer.cols == 0 || self.viewer.rows == 0 {
            problems.push("viewer: cols and rows must be at least 1".to_string());
        }
        if self.viewer.font_size != self.viewer.font_size() {
            problems.push(format!(
                "viewer.font_size: {} is outside {}..={}, using {}",
                self.viewer.font_size,
                MIN_FONT_SIZE,
                MAX_FONT_SIZE,
                self.viewer.font_size()
            ));
        }
        problems
    }
}
