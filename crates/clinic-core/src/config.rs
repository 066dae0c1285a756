//! Clinic configuration.
//!
//! Values come from an optional TOML file, then from environment variables
//! prefixed with `CLINIC_`. Nested keys use `__` as separator, e.g.
//! `CLINIC_SCHEDULING__FALLBACK_TIMEZONE=Europe/Madrid`.

use std::path::Path;

use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

pub const ENV_PREFIX: &str = "CLINIC";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ClinicConfig {
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub patients: PatientConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Slot grid and time zone settings.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SchedulingConfig {
    /// IANA zone used when the acting user has none configured
    #[serde(default = "SchedulingConfig::default_fallback_timezone")]
    pub fallback_timezone: String,
    /// First legal slot value (fractional hour)
    #[serde(default = "SchedulingConfig::default_opening_hour")]
    pub opening_hour: f64,
    /// Last legal slot value (fractional hour)
    #[serde(default = "SchedulingConfig::default_closing_hour")]
    pub closing_hour: f64,
    /// Slot quantum in hours
    #[serde(default = "SchedulingConfig::default_slot_step")]
    pub slot_step: f64,
    #[serde(default = "SchedulingConfig::default_start_hour")]
    pub default_start_hour: f64,
    #[serde(default = "SchedulingConfig::default_duration")]
    pub default_duration: f64,
}

impl SchedulingConfig {
    pub fn default_fallback_timezone() -> String {
        "America/Mexico_City".to_string()
    }

    pub const fn default_opening_hour() -> f64 {
        7.0
    }

    pub const fn default_closing_hour() -> f64 {
        20.0
    }

    pub const fn default_slot_step() -> f64 {
        0.25
    }

    pub const fn default_start_hour() -> f64 {
        9.0
    }

    pub const fn default_duration() -> f64 {
        0.5
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            fallback_timezone: Self::default_fallback_timezone(),
            opening_hour: Self::default_opening_hour(),
            closing_hour: Self::default_closing_hour(),
            slot_step: Self::default_slot_step(),
            default_start_hour: Self::default_start_hour(),
            default_duration: Self::default_duration(),
        }
    }
}

/// Patient file number settings.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PatientConfig {
    #[serde(default = "PatientConfig::default_file_number_prefix")]
    pub file_number_prefix: String,
    #[serde(default = "PatientConfig::default_file_number_padding")]
    pub file_number_padding: usize,
}

impl PatientConfig {
    pub fn default_file_number_prefix() -> String {
        "FICHA-".to_string()
    }

    pub const fn default_file_number_padding() -> usize {
        5
    }

    /// Render a sequence value as a patient file number.
    pub fn format_file_number(&self, value: i64) -> String {
        format!(
            "{}{:0width$}",
            self.file_number_prefix,
            value,
            width = self.file_number_padding
        )
    }
}

impl Default for PatientConfig {
    fn default() -> Self {
        Self {
            file_number_prefix: Self::default_file_number_prefix(),
            file_number_padding: Self::default_file_number_padding(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "LogConfig::default_log_level")]
    pub level: LogLevel,
    #[serde(default = "LogConfig::default_log_format")]
    pub format: LogFormat,
}

impl LogConfig {
    pub const fn default_log_level() -> LogLevel {
        LogLevel::Info
    }

    pub const fn default_log_format() -> LogFormat {
        LogFormat::Text
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Self::default_log_level(),
            format: Self::default_log_format(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Pretty,
    Json,
}

impl ClinicConfig {
    /// Load configuration from an optional file plus `CLINIC_` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_source = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);

        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        let config: Self = builder
            .add_source(env_source)
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scheduling = &self.scheduling;

        if scheduling.fallback_timezone.parse::<Tz>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "unknown fallback time zone '{}'",
                scheduling.fallback_timezone
            )));
        }
        if scheduling.slot_step <= 0.0 {
            return Err(ConfigError::Invalid("slot_step must be positive".into()));
        }
        if scheduling.opening_hour >= scheduling.closing_hour {
            return Err(ConfigError::Invalid(format!(
                "opening hour {} must be before closing hour {}",
                scheduling.opening_hour, scheduling.closing_hour
            )));
        }
        // The last slot value is a start time, so it must precede midnight.
        if scheduling.opening_hour < 0.0 || scheduling.closing_hour >= 24.0 {
            return Err(ConfigError::Invalid(
                "slot hours must fall within a single day".into(),
            ));
        }
        Ok(())
    }
}
