//! Configuration loading and typed config structures for Sensogen.
//!
//! The canonical configuration lives in `sensogen-config.yaml` at the
//! working directory. This module defines strongly-typed structs that
//! mirror the YAML structure and provides a loader that reads, applies
//! environment overrides, and validates the file.
//!
//! Every field has a default, so a partial or missing file still yields a
//! complete configuration; validation runs before any generation begins
//! and rejects values the subsystems cannot work with.

use std::path::Path;
use std::time::Duration;

use sensogen_db::{JournalMode, RetryPolicy, StoreConfig};
use sensogen_gen::{AnomalyConfig, GenError, GeneratorConfig};
use sensogen_types::{DeviceInfo, DeviceProfile, LocationInfo};
use serde::Deserialize;

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A generation-layer section failed validation.
    #[error(transparent)]
    Gen {
        /// The underlying generation config error.
        #[from]
        source: GenError,
    },

    /// A value failed validation.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level Sensogen configuration.
///
/// Mirrors the structure of `sensogen-config.yaml`. All fields have
/// defaults, so an empty document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Seed for all stochastic state (reproducible runs).
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Baseline generator settings.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Anomaly engine settings.
    #[serde(default)]
    pub anomaly: AnomalyConfig,

    /// Simulated device identity.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Simulated site metadata.
    #[serde(default)]
    pub location: LocationConfig,

    /// Store and writer settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Run boundary settings.
    #[serde(default)]
    pub simulation: SimulationBoundsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            generator: GeneratorConfig::default(),
            anomaly: AnomalyConfig::default(),
            device: DeviceConfig::default(),
            location: LocationConfig::default(),
            database: DatabaseConfig::default(),
            simulation: SimulationBoundsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// The `SENSOGEN_DB_PATH` environment variable overrides
    /// `database.path`, so deployments can relocate the store without
    /// editing the file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.database.apply_env_overrides();
        Ok(config)
    }

    /// Fail fast on any value the subsystems cannot work with.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.generator.validate()?;
        self.anomaly.validate()?;
        self.database.validate()?;
        Ok(())
    }

    /// The device profile used for anomaly modifier lookup.
    pub fn device_profile(&self) -> DeviceProfile {
        DeviceProfile {
            manufacturer: self.device.manufacturer.clone(),
            firmware_version: self.device.firmware_version.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Device and location
// ---------------------------------------------------------------------------

/// Simulated device identity (shared by every sensor stream).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceConfig {
    /// Manufacturer name (matched against the modifier table).
    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,

    /// Model designation.
    #[serde(default = "default_model")]
    pub model: String,

    /// Firmware version string (matched against the modifier table).
    #[serde(default = "default_firmware_version")]
    pub firmware_version: String,

    /// Prefix for per-stream serial numbers (`{prefix}-{index:05}`).
    #[serde(default = "default_serial_prefix")]
    pub serial_number_prefix: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            manufacturer: default_manufacturer(),
            model: default_model(),
            firmware_version: default_firmware_version(),
            serial_number_prefix: default_serial_prefix(),
        }
    }
}

impl DeviceConfig {
    /// Full device metadata for the stream at `index`.
    pub fn device_info(&self, index: u32) -> DeviceInfo {
        DeviceInfo {
            manufacturer: self.manufacturer.clone(),
            model: self.model.clone(),
            firmware_version: self.firmware_version.clone(),
            serial_number: format!("{}-{index:05}", self.serial_number_prefix),
        }
    }
}

/// Simulated site metadata.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocationConfig {
    /// Human-readable site name.
    #[serde(default = "default_site")]
    pub site: String,

    /// Site latitude in decimal degrees.
    #[serde(default = "default_latitude")]
    pub latitude: f64,

    /// Site longitude in decimal degrees.
    #[serde(default = "default_longitude")]
    pub longitude: f64,

    /// IANA timezone name.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            site: default_site(),
            latitude: default_latitude(),
            longitude: default_longitude(),
            timezone: default_timezone(),
        }
    }
}

impl LocationConfig {
    /// Location metadata carried on every reading.
    pub fn location_info(&self) -> LocationInfo {
        LocationInfo {
            site: self.site.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            timezone: self.timezone.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// Retry/backoff tuning for the storage writer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetryConfig {
    /// Total flush attempts allowed (first try included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Multiplier applied to the delay after each retry.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound on any single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// The `database` configuration section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the primary store file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Use the write-ahead journal (true) or the rollback journal (false).
    #[serde(default = "default_true")]
    pub wal: bool,

    /// Keep an existing store instead of starting fresh.
    #[serde(default)]
    pub preserve_existing: bool,

    /// Record-count flush threshold.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Age flush threshold, in seconds.
    #[serde(default = "default_batch_timeout_seconds")]
    pub batch_timeout_seconds: f64,

    /// Seconds between WAL checkpoints.
    #[serde(default = "default_checkpoint_interval_seconds")]
    pub checkpoint_interval_seconds: f64,

    /// Issue a final checkpoint on clean shutdown.
    #[serde(default = "default_true")]
    pub checkpoint_on_close: bool,

    /// Retention bound for unflushed readings under sustained failure.
    #[serde(default = "default_max_buffered_readings")]
    pub max_buffered_readings: usize,

    /// SQLite busy timeout, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Retry/backoff tuning.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            wal: true,
            preserve_existing: false,
            batch_size: default_batch_size(),
            batch_timeout_seconds: default_batch_timeout_seconds(),
            checkpoint_interval_seconds: default_checkpoint_interval_seconds(),
            checkpoint_on_close: true,
            max_buffered_readings: default_max_buffered_readings(),
            busy_timeout_ms: default_busy_timeout_ms(),
            retry: RetryConfig::default(),
        }
    }
}

impl DatabaseConfig {
    /// Override the store path with `SENSOGEN_DB_PATH` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SENSOGEN_DB_PATH") {
            self.path = val;
        }
    }

    /// Fail fast on values the data layer cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.trim().is_empty() {
            return Err(invalid("database.path must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(invalid("database.batch_size must be at least 1"));
        }
        if !self.batch_timeout_seconds.is_finite() || self.batch_timeout_seconds <= 0.0 {
            return Err(invalid(format!(
                "database.batch_timeout_seconds must be positive (got {})",
                self.batch_timeout_seconds
            )));
        }
        if !self.checkpoint_interval_seconds.is_finite()
            || self.checkpoint_interval_seconds <= 0.0
        {
            return Err(invalid(format!(
                "database.checkpoint_interval_seconds must be positive (got {})",
                self.checkpoint_interval_seconds
            )));
        }
        if self.max_buffered_readings < self.batch_size {
            return Err(invalid(
                "database.max_buffered_readings must be at least database.batch_size",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("database.retry.max_attempts must be at least 1"));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(invalid(format!(
                "database.retry.backoff_multiplier must be at least 1.0 (got {})",
                self.retry.backoff_multiplier
            )));
        }
        if self.retry.initial_delay_ms == 0 {
            return Err(invalid("database.retry.initial_delay_ms must be positive"));
        }
        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            return Err(invalid(
                "database.retry.max_delay_ms must be at least initial_delay_ms",
            ));
        }
        Ok(())
    }

    /// The store configuration derived from this section.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.path)
            .with_journal_mode(JournalMode::from_wal_flag(self.wal))
            .with_preserve_existing(self.preserve_existing)
            .with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }

    /// The retry policy derived from this section.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            multiplier: self.retry.backoff_multiplier,
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    /// The age flush threshold as a [`Duration`]. Validated positive.
    pub fn batch_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.batch_timeout_seconds)
            .unwrap_or(Duration::from_secs(10))
    }

    /// The checkpoint interval as a [`Duration`]. Validated positive.
    pub fn checkpoint_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.checkpoint_interval_seconds)
            .unwrap_or(Duration::from_secs(300))
    }
}

// ---------------------------------------------------------------------------
// Bounds and logging
// ---------------------------------------------------------------------------

/// Run boundary configuration. Zero means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationBoundsConfig {
    /// Stop after this many readings have been generated (0 = unlimited).
    #[serde(default)]
    pub max_readings: u64,

    /// Stop after this many wall-clock seconds (0 = unlimited).
    #[serde(default)]
    pub max_runtime_seconds: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when
    /// set.
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

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_seed() -> u64 {
    42
}

fn default_manufacturer() -> String {
    String::from("SensorTech")
}

fn default_model() -> String {
    String::from("ST-2000")
}

fn default_firmware_version() -> String {
    String::from("2.1.0")
}

fn default_serial_prefix() -> String {
    String::from("SN")
}

fn default_site() -> String {
    String::from("Plant A")
}

const fn default_latitude() -> f64 {
    52.52
}

const fn default_longitude() -> f64 {
    13.405
}

fn default_timezone() -> String {
    String::from("Europe/Berlin")
}

fn default_db_path() -> String {
    String::from("data/sensor_data.db")
}

const fn default_true() -> bool {
    true
}

const fn default_batch_size() -> usize {
    50
}

const fn default_batch_timeout_seconds() -> f64 {
    10.0
}

const fn default_checkpoint_interval_seconds() -> f64 {
    300.0
}

const fn default_max_buffered_readings() -> usize {
    10_000
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

const fn default_max_attempts() -> u32 {
    5
}

const fn default_initial_delay_ms() -> u64 {
    100
}

const fn default_backoff_multiplier() -> f64 {
    2.0
}

const fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    String::from("info")
}
