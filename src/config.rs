//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::error::{TripError, TripResult};
use crate::export::DistanceUnit;
use crate::index::IndexKind;
use chrono::FixedOffset;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub calendar: CalendarConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Trip log storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_file")]
    pub data_file: String,

    /// Index implementation used in memory
    #[serde(default)]
    pub variant: IndexKind,
}

fn default_data_file() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("triplog").join("trips.json").to_string_lossy().to_string())
        .unwrap_or_else(|| "./triplog_data/trips.json".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            variant: IndexKind::default(),
        }
    }
}

/// Calendar configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalendarConfig {
    /// Offset from UTC, in minutes, that defines where one day ends and the next begins
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl CalendarConfig {
    pub fn offset(&self) -> TripResult<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                TripError::Config(format!(
                    "utc_offset_minutes out of range: {}",
                    self.utc_offset_minutes
                ))
            })
    }
}

/// Export configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub unit: DistanceUnit,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// First existing config file among the default locations
    pub fn default_path() -> Option<PathBuf> {
        let candidates = [
            dirs::config_dir().map(|p| p.join("triplog").join("config.toml")),
            Some(PathBuf::from("./triplog.toml")),
        ];
        first_existing(candidates.into_iter().flatten())
    }

    /// Load from the default location, or from the environment when there is no file
    ///
    /// A config file that exists but cannot be read or parsed is an error, not
    /// a silent fallback to defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_with_env(&path),
            None => Ok(Self::from_env()),
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(data_file) = var("TRIPLOG_DATA_FILE") {
            self.storage.data_file = data_file;
        }
        if let Some(variant) = var("TRIPLOG_VARIANT") {
            match variant.parse() {
                Ok(kind) => self.storage.variant = kind,
                Err(e) => tracing::warn!("Ignoring TRIPLOG_VARIANT: {}", e),
            }
        }

        if let Some(offset) = var("TRIPLOG_UTC_OFFSET") {
            match offset.trim().parse() {
                Ok(minutes) => self.calendar.utc_offset_minutes = minutes,
                Err(e) => tracing::warn!("Ignoring TRIPLOG_UTC_OFFSET {:?}: {}", offset, e),
            }
        }

        if let Some(level) = var("TRIPLOG_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("TRIPLOG_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Path of the trip log, with a leading `~/` resolved to the home directory
    pub fn data_file(&self) -> PathBuf {
        expand_home(&self.storage.data_file, dirs::home_dir())
    }
}

fn first_existing(candidates: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    candidates.into_iter().find(|path| path.exists())
}

fn expand_home(path: &str, home: Option<PathBuf>) -> PathBuf {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

impl From<ConfigError> for TripError {
    fn from(err: ConfigError) -> Self {
        TripError::Config(err.to_string())
    }
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    format!(
        r#"# Triplog Configuration
#
# Environment variables override these settings:
# - TRIPLOG_DATA_FILE
# - TRIPLOG_VARIANT
# - TRIPLOG_UTC_OFFSET
# - TRIPLOG_LOG_LEVEL
# - TRIPLOG_LOG_FORMAT

[storage]
# JSON file holding every recorded trip (a leading ~/ means the home directory)
data_file = '{data_file}'

# In-memory index: "flat" (binary-searched day list) or "calendar" (year/month/day tree)
variant = "flat"

[calendar]
# Offset from UTC in minutes that decides which day a trip belongs to
# (e.g. -420 for UTC-7)
utc_offset_minutes = 0

[export]
# Distance unit for CSV export: "miles" or "km"
unit = "miles"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#,
        data_file = default_data_file()
    )
}
