use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use dirs::{config_dir, data_dir};
use serde::{Deserialize, Serialize};

const CONFIG_DIR_NAME: &str = "shelter";
const CONFIG_FILE_NAME: &str = "config.toml";
const DATABASE_FILE_NAME: &str = "shelter.db";
const CURRENT_SCHEMA_VERSION: u32 = 1;
const MAX_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_EVENT_DURATION_MINUTES: u32 = 30;
pub const DEFAULT_CALENDAR_ID: &str = "primary";
pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
pub const DEFAULT_ACCESS_TOKEN_ENV: &str = "SHELTER_CALENDAR_TOKEN";

/// Result returned by [`load_config`], capturing the source and any non-fatal issues.
#[derive(Debug, Clone)]
pub struct ConfigLoadResult {
    pub config: FileConfig,
    pub warnings: Vec<String>,
    pub source: ConfigSource,
}

/// Indicates where the configuration was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// No persisted configuration was found or usable; defaults were synthesized.
    Default,
    /// Configuration was read from `config.toml`.
    File,
}

/// Errors that can occur when persisting configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Ser(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "IO error: {err}"),
            ConfigError::Ser(err) => write!(f, "TOML serialization error: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Ser(value)
    }
}

/// Disk-backed configuration schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default = "FileConfig::schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub calendar: CalendarSettings,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            database: DatabaseSettings::default(),
            calendar: CalendarSettings::default(),
        }
    }
}

impl FileConfig {
    const fn schema_version() -> u32 {
        CURRENT_SCHEMA_VERSION
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_path")]
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
        }
    }
}

impl DatabaseSettings {
    fn default_path() -> String {
        data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR_NAME)
            .join(DATABASE_FILE_NAME)
            .to_string_lossy()
            .into_owned()
    }

    /// Database path with `~` and environment variables expanded.
    pub fn resolved_path(&self) -> PathBuf {
        match shellexpand::full(&self.path) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(_) => PathBuf::from(shellexpand::tilde(&self.path).as_ref()),
        }
    }
}

/// Calendar reminder integration. The access token itself never lives in the file;
/// only the name of the environment variable holding it does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarSettings {
    #[serde(default = "CalendarSettings::default_enabled")]
    pub enabled: bool,
    #[serde(default = "CalendarSettings::default_calendar_id")]
    pub calendar_id: String,
    #[serde(default = "CalendarSettings::default_timezone")]
    pub timezone: String,
    #[serde(default = "CalendarSettings::default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "CalendarSettings::default_access_token_env")]
    pub access_token_env: String,
    #[serde(default = "CalendarSettings::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "CalendarSettings::default_event_duration_minutes")]
    pub event_duration_minutes: u32,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            calendar_id: Self::default_calendar_id(),
            timezone: Self::default_timezone(),
            api_base_url: Self::default_api_base_url(),
            access_token_env: Self::default_access_token_env(),
            timeout_secs: Self::default_timeout_secs(),
            event_duration_minutes: Self::default_event_duration_minutes(),
        }
    }
}

impl CalendarSettings {
    const fn default_enabled() -> bool {
        true
    }

    fn default_calendar_id() -> String {
        DEFAULT_CALENDAR_ID.to_string()
    }

    fn default_timezone() -> String {
        DEFAULT_TIMEZONE.to_string()
    }

    fn default_api_base_url() -> String {
        DEFAULT_API_BASE_URL.to_string()
    }

    fn default_access_token_env() -> String {
        DEFAULT_ACCESS_TOKEN_ENV.to_string()
    }

    const fn default_timeout_secs() -> u64 {
        DEFAULT_TIMEOUT_SECS
    }

    const fn default_event_duration_minutes() -> u32 {
        DEFAULT_EVENT_DURATION_MINUTES
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured zone, falling back to UTC for names chrono-tz does not know.
    pub fn zone(&self) -> Tz {
        self.timezone.parse().unwrap_or(Tz::UTC)
    }

    /// Read the access token from the configured environment variable.
    pub fn access_token(&self) -> Option<String> {
        std::env::var(&self.access_token_env)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

pub fn config_directory() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

pub fn config_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

pub fn load_config() -> ConfigLoadResult {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> ConfigLoadResult {
    let mut warnings = Vec::new();

    if path.exists() {
        match fs::read_to_string(path) {
            Ok(raw) => match toml::from_str::<FileConfig>(&raw) {
                Ok(cfg) => {
                    let (cfg, mut sanitize_warnings) = sanitize_config(cfg);
                    warnings.append(&mut sanitize_warnings);
                    return ConfigLoadResult {
                        config: cfg,
                        warnings,
                        source: ConfigSource::File,
                    };
                }
                Err(err) => {
                    warnings.push(format!(
                        "Failed to parse {} as TOML: {}. Falling back to defaults.",
                        path.display(),
                        err
                    ));
                }
            },
            Err(err) => {
                warnings.push(format!(
                    "Failed to read {}: {}. Falling back to defaults.",
                    path.display(),
                    err
                ));
            }
        }
    }

    // Default fallback
    ConfigLoadResult {
        config: FileConfig::default(),
        warnings,
        source: ConfigSource::Default,
    }
}

pub fn save_config(config: &FileConfig) -> Result<(), ConfigError> {
    save_config_to(&config_path(), config)
}

pub fn save_config_to(path: &Path, config: &FileConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let serialized = toml::to_string_pretty(config)?;
    fs::write(path, serialized)?;
    Ok(())
}

fn sanitize_config(mut config: FileConfig) -> (FileConfig, Vec<String>) {
    let mut warnings = Vec::new();

    if config.schema_version != CURRENT_SCHEMA_VERSION {
        warnings.push(format!(
            "Unsupported schema_version {}; treating as {}.",
            config.schema_version, CURRENT_SCHEMA_VERSION
        ));
        config.schema_version = CURRENT_SCHEMA_VERSION;
    }

    if config.database.path.trim().is_empty() {
        warnings.push("database.path is empty; using the default location.".to_string());
        config.database.path = DatabaseSettings::default_path();
    }

    let calendar = &mut config.calendar;
    if calendar.timezone.parse::<Tz>().is_err() {
        warnings.push(format!(
            "Unknown calendar.timezone '{}'; using {}.",
            calendar.timezone, DEFAULT_TIMEZONE
        ));
        calendar.timezone = DEFAULT_TIMEZONE.to_string();
    }

    if calendar.timeout_secs == 0 || calendar.timeout_secs > MAX_TIMEOUT_SECS {
        warnings.push(format!(
            "calendar.timeout_secs must be between 1 and {}; resetting to {}.",
            MAX_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS
        ));
        calendar.timeout_secs = DEFAULT_TIMEOUT_SECS;
    }

    if calendar.event_duration_minutes == 0 {
        warnings.push(format!(
            "calendar.event_duration_minutes must be positive; resetting to {}.",
            DEFAULT_EVENT_DURATION_MINUTES
        ));
        calendar.event_duration_minutes = DEFAULT_EVENT_DURATION_MINUTES;
    }

    if calendar.calendar_id.trim().is_empty() {
        warnings.push(format!(
            "calendar.calendar_id is empty; using '{}'.",
            DEFAULT_CALENDAR_ID
        ));
        calendar.calendar_id = DEFAULT_CALENDAR_ID.to_string();
    }

    if calendar.access_token_env.trim().is_empty() {
        calendar.access_token_env = DEFAULT_ACCESS_TOKEN_ENV.to_string();
    }

    (config, warnings)
}
