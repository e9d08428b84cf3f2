//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/tablepick/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/tablepick/` (~/.config/tablepick/)
//! - Data: `$XDG_DATA_HOME/tablepick/` (~/.local/share/tablepick/)
//! - State/Logs: `$XDG_STATE_HOME/tablepick/` (~/.local/state/tablepick/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Local storage path overrides
    #[serde(default)]
    pub storage: StorageConfig,

    /// Remote event sink configuration
    #[serde(default)]
    pub sink: SinkConfig,

    /// Reporting defaults
    #[serde(default)]
    pub report: ReportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Local storage path overrides
///
/// Absent fields fall back to the XDG locations.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct StorageConfig {
    /// Override path of the durable analytics state file
    pub state_path: Option<PathBuf>,

    /// Override path of the SQLite event database
    pub database_path: Option<PathBuf>,
}

impl StorageConfig {
    /// The state-file path, override or XDG default
    pub fn resolved_state_path(&self) -> PathBuf {
        self.state_path.clone().unwrap_or_else(Config::state_path)
    }

    /// The database path, override or XDG default
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(Config::database_path)
    }
}

/// Remote event sink configuration
///
/// When enabled, tracked events are also pushed (fire-and-forget) to an
/// HTTP event store in addition to the local journal.
#[derive(Debug, Deserialize, Clone)]
pub struct SinkConfig {
    /// Enable/disable the remote sink
    #[serde(default)]
    pub enabled: bool,

    /// Event store base URL (e.g., `https://events.example.com`)
    pub server_url: Option<String>,

    /// API key sent as a bearer token
    pub api_key: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_sink_timeout")]
    pub timeout_secs: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server_url: None,
            api_key: None,
            timeout_secs: default_sink_timeout(),
        }
    }
}

impl SinkConfig {
    /// Check if the sink is properly configured and enabled
    pub fn is_ready(&self) -> bool {
        self.enabled && self.server_url.is_some() && self.api_key.is_some()
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.server_url.is_none() {
            return Err(Error::Config(
                "sink.server_url is required when the sink is enabled".to_string(),
            ));
        }
        if self.api_key.is_none() {
            return Err(Error::Config(
                "sink.api_key is required when the sink is enabled".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "sink.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_sink_timeout() -> u64 {
    10
}

/// Reporting defaults used by the analytics summary
#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// Days covered by the daily trend series
    #[serde(default = "default_trend_days")]
    pub trend_days: u32,

    /// Recent events shown in the summary
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,

    /// Entries in the draw-result leaderboard
    #[serde(default = "default_top_results")]
    pub top_results: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            trend_days: default_trend_days(),
            recent_limit: default_recent_limit(),
            top_results: default_top_results(),
        }
    }
}

fn default_trend_days() -> u32 {
    7
}

fn default_recent_limit() -> usize {
    50
}

fn default_top_results() -> usize {
    5
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.sink.validate()?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/tablepick/config.toml` (~/.config/tablepick/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("tablepick").join("config.toml")
    }

    /// Returns the data directory path (state file and SQLite database)
    ///
    /// `$XDG_DATA_HOME/tablepick/` (~/.local/share/tablepick/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("tablepick")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/tablepick/` (~/.local/state/tablepick/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("tablepick")
    }

    /// Returns the path of the durable analytics state file
    ///
    /// `$XDG_DATA_HOME/tablepick/state.json`
    pub fn state_path() -> PathBuf {
        Self::data_dir().join("state.json")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/tablepick/events.db`
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("events.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/tablepick/tablepick.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("tablepick.log")
    }
}
