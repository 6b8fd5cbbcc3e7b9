//! Configuration sections for the generation layer.
//!
//! These structs mirror the `generator` and `anomaly` sections of
//! `sensogen-config.yaml`. All fields have defaults so a partial (or empty)
//! YAML document yields a working configuration; [`GeneratorConfig::validate`]
//! and [`AnomalyConfig::validate`] fail fast on values that would otherwise
//! surface as nonsense at evaluation time.

use std::collections::BTreeMap;

use serde::Deserialize;
use sensogen_types::AnomalyKind;

use crate::error::GenError;

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Statistical profile of one metric channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricProfile {
    /// Long-run mean of the channel.
    pub mean: f64,

    /// Peak deviation of the smooth diurnal cycle around the mean.
    /// Zero disables the cycle for this channel.
    #[serde(default)]
    pub diurnal_amplitude: f64,

    /// Standard deviation of the per-reading Gaussian noise.
    pub noise_std: f64,

    /// Hour of day (0-24) at which the diurnal cycle peaks.
    #[serde(default = "default_peak_hour")]
    pub diurnal_peak_hour: f64,
}

impl MetricProfile {
    /// Construct a profile with the default afternoon peak.
    pub const fn new(mean: f64, diurnal_amplitude: f64, noise_std: f64) -> Self {
        Self {
            mean,
            diurnal_amplitude,
            noise_std,
            diurnal_peak_hour: default_peak_hour(),
        }
    }
}

/// Per-channel statistical profiles for the four metrics.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricsConfig {
    /// Temperature profile (degrees Celsius).
    #[serde(default = "default_temperature")]
    pub temperature: MetricProfile,

    /// Humidity profile (percent relative humidity).
    #[serde(default = "default_humidity")]
    pub humidity: MetricProfile,

    /// Pressure profile (hectopascals).
    #[serde(default = "default_pressure")]
    pub pressure: MetricProfile,

    /// Voltage profile (volts). No diurnal cycle by default.
    #[serde(default = "default_voltage")]
    pub voltage: MetricProfile,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            humidity: default_humidity(),
            pressure: default_pressure(),
            voltage: default_voltage(),
        }
    }
}

impl MetricsConfig {
    /// Look up the profile for a metric channel.
    pub const fn profile(&self, metric: sensogen_types::Metric) -> &MetricProfile {
        match metric {
            sensogen_types::Metric::Temperature => &self.temperature,
            sensogen_types::Metric::Humidity => &self.humidity,
            sensogen_types::Metric::Pressure => &self.pressure,
            sensogen_types::Metric::Voltage => &self.voltage,
        }
    }
}

/// The `generator` configuration section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratorConfig {
    /// Seconds between consecutive readings of one sensor stream.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: f64,

    /// Number of independent sensor streams to simulate.
    #[serde(default = "default_sensor_count")]
    pub sensor_count: u32,

    /// Prefix for generated sensor identifiers (`{prefix}_{index:03}`).
    #[serde(default = "default_sensor_id_prefix")]
    pub sensor_id_prefix: String,

    /// Per-channel statistical profiles.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            sensor_count: default_sensor_count(),
            sensor_id_prefix: default_sensor_id_prefix(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl GeneratorConfig {
    /// Fail fast on configuration values the generator cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidConfig`] if the interval is not a positive
    /// finite number, the stream count is zero, or any noise deviation is
    /// negative.
    pub fn validate(&self) -> Result<(), GenError> {
        if !self.interval_seconds.is_finite() || self.interval_seconds <= 0.0 {
            return Err(GenError::invalid(format!(
                "generator.interval_seconds must be positive (got {})",
                self.interval_seconds
            )));
        }
        if self.sensor_count == 0 {
            return Err(GenError::invalid("generator.sensor_count must be at least 1"));
        }
        for metric in sensogen_types::Metric::ALL {
            let profile = self.metrics.profile(metric);
            if !profile.noise_std.is_finite() || profile.noise_std < 0.0 {
                return Err(GenError::invalid(format!(
                    "generator.metrics.{metric}.noise_std must be non-negative (got {})",
                    profile.noise_std
                )));
            }
            if !profile.mean.is_finite() {
                return Err(GenError::invalid(format!(
                    "generator.metrics.{metric}.mean must be finite"
                )));
            }
        }
        Ok(())
    }

    /// The identifier of the sensor stream at `index`.
    pub fn sensor_id(&self, index: u32) -> String {
        format!("{}_{index:03}", self.sensor_id_prefix)
    }
}

// ---------------------------------------------------------------------------
// Anomaly
// ---------------------------------------------------------------------------

/// Per-type anomaly settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnomalyTypeConfig {
    /// Whether this type participates in weighted selection.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Selection weight among enabled types. Weights need not sum to 1;
    /// they are normalized over the enabled subset at selection time.
    pub weight: f64,

    /// Episode length in seconds for duration-bearing types. Converted to
    /// a reading count by dividing by the generator interval (rounded,
    /// minimum 1). Ignored for instantaneous types (spike).
    #[serde(default)]
    pub duration_seconds: f64,

    /// Lower bound of the episode magnitude, in noise standard deviations.
    #[serde(default = "default_min_magnitude")]
    pub min_magnitude: f64,

    /// Upper bound of the episode magnitude, in noise standard deviations.
    #[serde(default = "default_max_magnitude")]
    pub max_magnitude: f64,
}

impl AnomalyTypeConfig {
    const fn new(weight: f64, duration_seconds: f64, min_magnitude: f64, max_magnitude: f64) -> Self {
        Self {
            enabled: true,
            weight,
            duration_seconds,
            min_magnitude,
            max_magnitude,
        }
    }
}

/// The per-type anomaly table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnomalyTypesConfig {
    /// One-reading offset of large magnitude.
    #[serde(default = "default_spike")]
    pub spike: AnomalyTypeConfig,

    /// Linearly growing offset over an episode.
    #[serde(default = "default_trend")]
    pub trend: AnomalyTypeConfig,

    /// Diurnal-cycle amplitude distortion over an episode.
    #[serde(default = "default_pattern")]
    pub pattern: AnomalyTypeConfig,

    /// Nulled metric fields over an episode.
    #[serde(default = "default_missing_data")]
    pub missing_data: AnomalyTypeConfig,

    /// Inflated variance over an episode.
    #[serde(default = "default_noise")]
    pub noise: AnomalyTypeConfig,
}

impl Default for AnomalyTypesConfig {
    fn default() -> Self {
        Self {
            spike: default_spike(),
            trend: default_trend(),
            pattern: default_pattern(),
            missing_data: default_missing_data(),
            noise: default_noise(),
        }
    }
}

impl AnomalyTypesConfig {
    /// Look up the settings for an anomaly kind.
    pub const fn get(&self, kind: AnomalyKind) -> &AnomalyTypeConfig {
        match kind {
            AnomalyKind::Spike => &self.spike,
            AnomalyKind::Trend => &self.trend,
            AnomalyKind::Pattern => &self.pattern,
            AnomalyKind::MissingData => &self.missing_data,
            AnomalyKind::Noise => &self.noise,
        }
    }

    /// The enabled subset, in stable kind order.
    pub fn enabled(&self) -> Vec<AnomalyKind> {
        AnomalyKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind).enabled)
            .collect()
    }
}

/// The `anomaly` configuration section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnomalyConfig {
    /// Global switch. When false, readings pass through unmodified.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Probability per reading that an anomaly episode is triggered,
    /// before device modifiers are applied.
    #[serde(default = "default_base_probability")]
    pub base_probability: f64,

    /// Per-type enable flags, weights, durations, and magnitudes.
    #[serde(default)]
    pub types: AnomalyTypesConfig,

    /// Manufacturer name to probability multiplier. Missing key means 1.0.
    #[serde(default = "default_manufacturer_modifiers")]
    pub manufacturer_modifiers: BTreeMap<String, f64>,

    /// Firmware version string to probability multiplier. Missing key
    /// means 1.0.
    #[serde(default = "default_firmware_modifiers")]
    pub firmware_modifiers: BTreeMap<String, f64>,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_probability: default_base_probability(),
            types: AnomalyTypesConfig::default(),
            manufacturer_modifiers: default_manufacturer_modifiers(),
            firmware_modifiers: default_firmware_modifiers(),
        }
    }
}

impl AnomalyConfig {
    /// Fail fast on configuration the anomaly engine must reject.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidConfig`] if `base_probability` is outside
    /// `[0, 1]`, anomalies are enabled but no type is, an enabled type has
    /// a non-positive or non-finite weight, a duration is negative, a
    /// magnitude range is inverted, or a modifier is negative.
    pub fn validate(&self) -> Result<(), GenError> {
        if !self.base_probability.is_finite()
            || !(0.0..=1.0).contains(&self.base_probability)
        {
            return Err(GenError::invalid(format!(
                "anomaly.base_probability must be within [0, 1] (got {})",
                self.base_probability
            )));
        }

        if !self.enabled {
            return Ok(());
        }

        let enabled = self.types.enabled();
        if enabled.is_empty() {
            return Err(GenError::invalid(
                "anomaly.enabled is true but every anomaly type is disabled",
            ));
        }
        for kind in enabled {
            let cfg = self.types.get(kind);
            if !cfg.weight.is_finite() || cfg.weight <= 0.0 {
                return Err(GenError::invalid(format!(
                    "anomaly.types.{kind}.weight must be positive (got {})",
                    cfg.weight
                )));
            }
            if !cfg.duration_seconds.is_finite() || cfg.duration_seconds < 0.0 {
                return Err(GenError::invalid(format!(
                    "anomaly.types.{kind}.duration_seconds must be non-negative"
                )));
            }
            if cfg.min_magnitude > cfg.max_magnitude {
                return Err(GenError::invalid(format!(
                    "anomaly.types.{kind}: min_magnitude exceeds max_magnitude"
                )));
            }
        }
        for (name, modifier) in self
            .manufacturer_modifiers
            .iter()
            .chain(self.firmware_modifiers.iter())
        {
            if !modifier.is_finite() || *modifier < 0.0 {
                return Err(GenError::invalid(format!(
                    "anomaly modifier for {name:?} must be non-negative (got {modifier})"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_peak_hour() -> f64 {
    15.0
}

const fn default_temperature() -> MetricProfile {
    MetricProfile::new(22.0, 4.0, 0.4)
}

const fn default_humidity() -> MetricProfile {
    MetricProfile::new(55.0, 10.0, 1.5)
}

const fn default_pressure() -> MetricProfile {
    MetricProfile::new(1013.0, 2.5, 0.6)
}

const fn default_voltage() -> MetricProfile {
    MetricProfile::new(3.3, 0.0, 0.02)
}

const fn default_interval_seconds() -> f64 {
    5.0
}

const fn default_sensor_count() -> u32 {
    3
}

fn default_sensor_id_prefix() -> String {
    String::from("SENSOR")
}

const fn default_true() -> bool {
    true
}

const fn default_base_probability() -> f64 {
    0.05
}

const fn default_min_magnitude() -> f64 {
    2.0
}

const fn default_max_magnitude() -> f64 {
    4.0
}

const fn default_spike() -> AnomalyTypeConfig {
    AnomalyTypeConfig::new(0.4, 0.0, 3.0, 6.0)
}

const fn default_trend() -> AnomalyTypeConfig {
    AnomalyTypeConfig::new(0.2, 600.0, 2.0, 4.0)
}

const fn default_pattern() -> AnomalyTypeConfig {
    AnomalyTypeConfig::new(0.1, 900.0, 2.0, 3.0)
}

const fn default_missing_data() -> AnomalyTypeConfig {
    AnomalyTypeConfig::new(0.15, 60.0, 1.0, 1.0)
}

const fn default_noise() -> AnomalyTypeConfig {
    AnomalyTypeConfig::new(0.15, 300.0, 2.0, 4.0)
}

fn default_manufacturer_modifiers() -> BTreeMap<String, f64> {
    let mut m = BTreeMap::new();
    m.insert(String::from("SensorTech"), 1.0);
    m.insert(String::from("BudgetSense"), 1.2);
    m
}

fn default_firmware_modifiers() -> BTreeMap<String, f64> {
    let mut m = BTreeMap::new();
    m.insert(String::from("2.1.0"), 1.0);
    m.insert(String::from("2.2.0-beta"), 1.5);
    m
}
