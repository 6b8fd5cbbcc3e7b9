//! The anomaly engine: weighted selection and episode state.
//!
//! The engine decides per reading whether to corrupt an otherwise-normal
//! value. Two independent draws govern a trigger: first "does an anomaly
//! occur" against the device-adjusted probability, then "which one" via a
//! cumulative-weight table over the enabled types. Duration-bearing types
//! open an episode that persists across subsequent readings, tracked by a
//! remaining-count that strictly decreases by one per tick.
//!
//! Episode state is a single tagged variant per sensor stream: either
//! [`Episode::Inactive`] or [`Episode::Active`] with the kind, counts, and
//! magnitude drawn at trigger time. The transition applied by
//! [`AnomalyEngine::evaluate`] is a pure function of (state, random draw,
//! configuration).

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use sensogen_types::{AnomalyKind, DeviceProfile, Reading, status_codes};
use tracing::debug;

use crate::baseline::standard_normal;
use crate::config::{AnomalyConfig, AnomalyTypesConfig, MetricsConfig};
use crate::error::GenError;
use crate::profile::effective_probability;

// ---------------------------------------------------------------------------
// Episode state
// ---------------------------------------------------------------------------

/// Anomaly state of one sensor stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Episode {
    /// No anomaly in progress.
    Inactive,
    /// A multi-reading anomaly episode in progress.
    Active {
        /// The anomaly kind applied for the whole episode.
        kind: AnomalyKind,
        /// Readings left in the episode, this one included. Strictly
        /// decreases by one per evaluation; the episode clears at zero.
        remaining: u32,
        /// Total episode length in readings.
        total: u32,
        /// Episode magnitude in units of per-channel noise deviation.
        magnitude: f64,
        /// Offset direction for directional transformations (+1 or -1).
        direction: f64,
    },
}

impl Episode {
    /// Whether an episode is currently in progress.
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

// ---------------------------------------------------------------------------
// Weighted selection
// ---------------------------------------------------------------------------

/// Cumulative-weight table over the enabled anomaly types.
///
/// Weights need not sum to 1; a single uniform draw in `[0, total)` is
/// mapped through a linear cumulative scan.
#[derive(Debug, Clone)]
struct WeightTable {
    entries: Vec<(AnomalyKind, f64)>,
    total: f64,
}

impl WeightTable {
    /// Build the table from the enabled subset of the type config.
    ///
    /// Validation has already rejected non-positive enabled weights, so an
    /// empty or zero-total table here is a programming error surfaced as
    /// [`GenError::InvalidConfig`].
    fn build(types: &AnomalyTypesConfig) -> Result<Self, GenError> {
        let entries: Vec<(AnomalyKind, f64)> = types
            .enabled()
            .into_iter()
            .map(|kind| (kind, types.get(kind).weight))
            .collect();
        let total: f64 = entries.iter().map(|(_, w)| *w).sum();
        if entries.is_empty() || !(total > 0.0) {
            return Err(GenError::invalid(
                "anomaly type weights normalize to zero over the enabled subset",
            ));
        }
        Ok(Self { entries, total })
    }

    /// Map a roll in `[0, total)` to an anomaly kind.
    fn select(&self, roll: f64) -> AnomalyKind {
        let mut cumulative = 0.0;
        for (kind, weight) in &self.entries {
            cumulative += weight;
            if roll < cumulative {
                return *kind;
            }
        }
        // Floating-point edge: a roll landing exactly on the total falls
        // through to the last entry.
        self.entries
            .last()
            .map_or(AnomalyKind::Spike, |(kind, _)| *kind)
    }

    const fn total(&self) -> f64 {
        self.total
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Per-stream anomaly engine.
///
/// Construct one per sensor stream with a stream-unique seed; the device
/// profile and configuration are fixed for the process lifetime, so the
/// effective trigger probability is resolved once here.
#[derive(Debug, Clone)]
pub struct AnomalyEngine {
    enabled: bool,
    trigger_probability: f64,
    table: WeightTable,
    types: AnomalyTypesConfig,
    metrics: MetricsConfig,
    interval_seconds: f64,
    episode: Episode,
    rng: SmallRng,
}

impl AnomalyEngine {
    /// Create an engine from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidConfig`] for any configuration the engine
    /// cannot evaluate against: probability out of range, no enabled type,
    /// non-positive enabled weights, inverted magnitude ranges, or a
    /// non-positive reading interval.
    pub fn new(
        config: &AnomalyConfig,
        profile: &DeviceProfile,
        metrics: &MetricsConfig,
        interval_seconds: f64,
        seed: u64,
    ) -> Result<Self, GenError> {
        config.validate()?;
        if !interval_seconds.is_finite() || interval_seconds <= 0.0 {
            return Err(GenError::invalid(
                "reading interval must be positive to derive episode lengths",
            ));
        }
        let table = WeightTable::build(&config.types)?;
        let trigger_probability = effective_probability(config, profile);
        Ok(Self {
            enabled: config.enabled,
            trigger_probability,
            table,
            types: config.types.clone(),
            metrics: metrics.clone(),
            interval_seconds,
            episode: Episode::Inactive,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    /// The resolved per-reading trigger probability after device modifiers.
    pub const fn trigger_probability(&self) -> f64 {
        self.trigger_probability
    }

    /// The current episode state.
    pub const fn episode(&self) -> &Episode {
        &self.episode
    }

    /// Evaluate one baseline reading: continue an active episode, or roll
    /// for a new trigger, or pass the reading through untouched.
    pub fn evaluate(&mut self, reading: Reading) -> Reading {
        if !self.enabled {
            return reading;
        }
        if self.episode.is_active() {
            return self.apply_episode(reading);
        }

        let roll: f64 = self.rng.random();
        if roll >= self.trigger_probability {
            return reading;
        }

        let total_weight = self.table.total();
        let kind = self.table.select(self.rng.random_range(0.0..total_weight));
        let type_cfg = self.types.get(kind);
        let magnitude = self
            .rng
            .random_range(type_cfg.min_magnitude..=type_cfg.max_magnitude);
        let direction = if self.rng.random_bool(0.5) { 1.0 } else { -1.0 };

        if kind.has_duration() {
            let total = episode_length(type_cfg.duration_seconds, self.interval_seconds);
            debug!(
                sensor_id = reading.sensor_id,
                kind = %kind,
                readings = total,
                magnitude,
                "anomaly episode triggered"
            );
            self.episode = Episode::Active {
                kind,
                remaining: total,
                total,
                magnitude,
                direction,
            };
            self.apply_episode(reading)
        } else {
            debug!(
                sensor_id = reading.sensor_id,
                kind = %kind,
                magnitude,
                "instantaneous anomaly triggered"
            );
            self.apply_spike(reading, magnitude, direction)
        }
    }

    /// Apply the active episode's transformation and advance its counter.
    fn apply_episode(&mut self, mut reading: Reading) -> Reading {
        let Episode::Active {
            kind,
            remaining,
            total,
            magnitude,
            direction,
        } = self.episode
        else {
            return reading;
        };

        // Zero-based index of this reading within the episode.
        let elapsed = total.saturating_sub(remaining);

        match kind {
            AnomalyKind::Trend => {
                // Offset grows linearly, reaching full magnitude on the
                // episode's last reading.
                let progress = f64::from(elapsed.saturating_add(1)) / f64::from(total.max(1));
                let metrics = self.metrics.clone();
                reading.map_metrics(|metric, v| {
                    v + direction * magnitude * metrics.profile(metric).noise_std * progress
                });
            }
            AnomalyKind::Pattern => {
                // Amplitude distortion: scale the deviation from the
                // configured channel mean.
                let metrics = self.metrics.clone();
                reading.map_metrics(|metric, v| {
                    let mean = metrics.profile(metric).mean;
                    mean + (v - mean) * magnitude
                });
            }
            AnomalyKind::MissingData => {
                reading.clear_metrics();
                reading.status_code = status_codes::FAULT;
            }
            AnomalyKind::Noise => {
                let metrics = self.metrics.clone();
                let mut draws = [0.0_f64; 4];
                for slot in &mut draws {
                    *slot = standard_normal(&mut self.rng);
                }
                let mut index = 0_usize;
                reading.map_metrics(|metric, v| {
                    let draw = draws.get(index).copied().unwrap_or_default();
                    index = index.saturating_add(1);
                    v + draw * magnitude * metrics.profile(metric).noise_std
                });
            }
            // Spikes never open an episode.
            AnomalyKind::Spike => {}
        }

        let next_remaining = remaining.saturating_sub(1);
        if next_remaining == 0 {
            debug!(sensor_id = reading.sensor_id, kind = %kind, "anomaly episode ended");
            self.episode = Episode::Inactive;
        } else {
            self.episode = Episode::Active {
                kind,
                remaining: next_remaining,
                total,
                magnitude,
                direction,
            };
        }

        reading.anomaly_flag = true;
        reading.anomaly_type = Some(kind);
        reading
    }

    /// Apply a one-reading spike offset.
    fn apply_spike(&mut self, mut reading: Reading, magnitude: f64, direction: f64) -> Reading {
        let metrics = self.metrics.clone();
        reading.map_metrics(|metric, v| {
            v + direction * magnitude * metrics.profile(metric).noise_std
        });
        reading.anomaly_flag = true;
        reading.anomaly_type = Some(AnomalyKind::Spike);
        reading
    }
}

/// Episode length in readings for a configured duration.
///
/// Nearest integer of `duration / interval`, minimum 1. The cast is safe:
/// the value is clamped into `u32` range first.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn episode_length(duration_seconds: f64, interval_seconds: f64) -> u32 {
    let raw = (duration_seconds / interval_seconds).round();
    if raw >= f64::from(u32::MAX) {
        u32::MAX
    } else if raw < 1.0 {
        1
    } else {
        raw as u32
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::arithmetic_side_effects)]
mod tests {
    use chrono::{DateTime, Utc};
    use sensogen_types::{DeviceInfo, LocationInfo};

    use super::*;
    use crate::config::MetricProfile;

    fn test_profile() -> DeviceProfile {
        DeviceProfile {
            manufacturer: String::from("SensorTech"),
            firmware_version: String::from("2.1.0"),
        }
    }

    fn test_metrics() -> MetricsConfig {
        MetricsConfig {
            temperature: MetricProfile::new(20.0, 0.0, 1.0),
            humidity: MetricProfile::new(50.0, 0.0, 2.0),
            pressure: MetricProfile::new(1000.0, 0.0, 1.0),
            voltage: MetricProfile::new(3.3, 0.0, 0.1),
        }
    }

    fn baseline_reading() -> Reading {
        Reading {
            timestamp: DateTime::parse_from_rfc3339("2026-08-07T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            sensor_id: String::from("SENSOR_000"),
            temperature: Some(20.0),
            humidity: Some(50.0),
            pressure: Some(1000.0),
            voltage: Some(3.3),
            status_code: status_codes::OK,
            anomaly_flag: false,
            anomaly_type: None,
            device: DeviceInfo {
                manufacturer: String::from("SensorTech"),
                model: String::from("ST-2000"),
                firmware_version: String::from("2.1.0"),
                serial_number: String::from("SN-00001"),
            },
            location: LocationInfo {
                site: String::from("Plant A"),
                latitude: 52.52,
                longitude: 13.405,
                timezone: String::from("Europe/Berlin"),
            },
        }
    }

    /// Engine with a forced trigger probability and only `kind` enabled.
    fn engine_for(kind: AnomalyKind, probability: f64) -> AnomalyEngine {
        let mut config = AnomalyConfig {
            base_probability: probability,
            ..AnomalyConfig::default()
        };
        config.manufacturer_modifiers.clear();
        config.firmware_modifiers.clear();
        config.types.spike.enabled = kind == AnomalyKind::Spike;
        config.types.trend.enabled = kind == AnomalyKind::Trend;
        config.types.pattern.enabled = kind == AnomalyKind::Pattern;
        config.types.missing_data.enabled = kind == AnomalyKind::MissingData;
        config.types.noise.enabled = kind == AnomalyKind::Noise;
        AnomalyEngine::new(&config, &test_profile(), &test_metrics(), 5.0, 42).unwrap()
    }

    #[test]
    fn episode_length_rounds_to_nearest_with_minimum_one() {
        assert_eq!(episode_length(600.0, 5.0), 120);
        assert_eq!(episode_length(12.4, 5.0), 2);
        assert_eq!(episode_length(12.6, 5.0), 3);
        assert_eq!(episode_length(1.0, 5.0), 1);
        assert_eq!(episode_length(0.0, 5.0), 1);
    }

    #[test]
    fn disabled_engine_passes_readings_through() {
        let mut config = AnomalyConfig {
            enabled: false,
            base_probability: 1.0,
            ..AnomalyConfig::default()
        };
        config.manufacturer_modifiers.clear();
        config.firmware_modifiers.clear();
        let mut engine =
            AnomalyEngine::new(&config, &test_profile(), &test_metrics(), 5.0, 1).unwrap();
        let out = engine.evaluate(baseline_reading());
        assert!(!out.anomaly_flag);
        assert_eq!(out, baseline_reading());
    }

    #[test]
    fn certain_probability_triggers_immediately() {
        let mut engine = engine_for(AnomalyKind::Spike, 1.0);
        let out = engine.evaluate(baseline_reading());
        assert!(out.anomaly_flag);
        assert_eq!(out.anomaly_type, Some(AnomalyKind::Spike));
    }

    #[test]
    fn zero_probability_never_triggers() {
        let mut engine = engine_for(AnomalyKind::Spike, 0.0);
        for _ in 0..1000 {
            let out = engine.evaluate(baseline_reading());
            assert!(!out.anomaly_flag);
        }
    }

    #[test]
    fn spike_leaves_no_episode_behind() {
        let mut engine = engine_for(AnomalyKind::Spike, 1.0);
        let out = engine.evaluate(baseline_reading());
        assert!(out.anomaly_flag);
        assert!(!engine.episode().is_active());
    }

    #[test]
    fn spike_offsets_scale_with_channel_deviation() {
        let mut engine = engine_for(AnomalyKind::Spike, 1.0);
        let out = engine.evaluate(baseline_reading());
        let temp_offset = (out.temperature.unwrap() - 20.0).abs();
        let humidity_offset = (out.humidity.unwrap() - 50.0).abs();
        // Default spike magnitude is 3-6 channel deviations; humidity's
        // deviation is twice temperature's, so its offset doubles too.
        assert!(temp_offset >= 3.0 && temp_offset <= 6.0, "{temp_offset}");
        assert!((humidity_offset - 2.0 * temp_offset).abs() < 1e-9);
    }

    #[test]
    fn trend_episode_runs_exactly_its_length() {
        // 600 s at a 5 s interval: exactly 120 consecutive mutated readings.
        let mut engine = engine_for(AnomalyKind::Trend, 0.0);
        engine.episode = Episode::Active {
            kind: AnomalyKind::Trend,
            remaining: 120,
            total: 120,
            magnitude: 3.0,
            direction: 1.0,
        };
        for i in 0..120 {
            let out = engine.evaluate(baseline_reading());
            assert!(out.anomaly_flag, "reading {i} should be mutated");
            assert_eq!(out.anomaly_type, Some(AnomalyKind::Trend));
        }
        assert!(!engine.episode().is_active());
        // Probability is zero, so the stream reverts to baseline.
        for i in 0..50 {
            let out = engine.evaluate(baseline_reading());
            assert!(!out.anomaly_flag, "reading {i} after episode should be clean");
        }
    }

    #[test]
    fn trend_offset_grows_monotonically() {
        let mut engine = engine_for(AnomalyKind::Trend, 0.0);
        engine.episode = Episode::Active {
            kind: AnomalyKind::Trend,
            remaining: 10,
            total: 10,
            magnitude: 3.0,
            direction: 1.0,
        };
        let mut last_offset = 0.0;
        for _ in 0..10 {
            let out = engine.evaluate(baseline_reading());
            let offset = out.temperature.unwrap() - 20.0;
            assert!(offset > last_offset, "offset {offset} <= {last_offset}");
            last_offset = offset;
        }
        // Full magnitude (3.0 deviations of std 1.0) on the last reading.
        assert!((last_offset - 3.0).abs() < 1e-9);
    }

    #[test]
    fn remaining_decreases_by_one_per_reading() {
        let mut engine = engine_for(AnomalyKind::Noise, 0.0);
        engine.episode = Episode::Active {
            kind: AnomalyKind::Noise,
            remaining: 3,
            total: 3,
            magnitude: 2.0,
            direction: 1.0,
        };
        let _ = engine.evaluate(baseline_reading());
        assert!(matches!(
            engine.episode(),
            Episode::Active { remaining: 2, .. }
        ));
        let _ = engine.evaluate(baseline_reading());
        assert!(matches!(
            engine.episode(),
            Episode::Active { remaining: 1, .. }
        ));
        let _ = engine.evaluate(baseline_reading());
        assert!(!engine.episode().is_active());
    }

    #[test]
    fn missing_data_nulls_metrics_and_sets_fault() {
        let mut engine = engine_for(AnomalyKind::MissingData, 0.0);
        engine.episode = Episode::Active {
            kind: AnomalyKind::MissingData,
            remaining: 2,
            total: 2,
            magnitude: 1.0,
            direction: 1.0,
        };
        let out = engine.evaluate(baseline_reading());
        assert!(out.anomaly_flag);
        assert_eq!(out.anomaly_type, Some(AnomalyKind::MissingData));
        assert!(out.temperature.is_none());
        assert!(out.humidity.is_none());
        assert!(out.pressure.is_none());
        assert!(out.voltage.is_none());
        assert_eq!(out.status_code, status_codes::FAULT);
    }

    #[test]
    fn pattern_scales_deviation_from_mean() {
        let mut engine = engine_for(AnomalyKind::Pattern, 0.0);
        engine.episode = Episode::Active {
            kind: AnomalyKind::Pattern,
            remaining: 1,
            total: 1,
            magnitude: 2.5,
            direction: 1.0,
        };
        let mut reading = baseline_reading();
        reading.temperature = Some(21.0); // one degree above the mean
        let out = engine.evaluate(reading);
        assert!((out.temperature.unwrap() - 22.5).abs() < 1e-9);
    }

    #[test]
    fn noise_perturbs_without_shifting_mean() {
        let mut engine = engine_for(AnomalyKind::Noise, 0.0);
        engine.episode = Episode::Active {
            kind: AnomalyKind::Noise,
            remaining: u32::MAX,
            total: u32::MAX,
            magnitude: 3.0,
            direction: 1.0,
        };
        let n = 5000;
        let mut sum = 0.0;
        for _ in 0..n {
            let out = engine.evaluate(baseline_reading());
            sum += out.temperature.unwrap();
        }
        let mean = sum / f64::from(n);
        // Inflated variance (std 3.0) but the mean stays near baseline.
        assert!((mean - 20.0).abs() < 0.2, "mean was {mean}");
    }

    #[test]
    fn selection_honors_enabled_subset() {
        let mut engine = engine_for(AnomalyKind::Trend, 1.0);
        let out = engine.evaluate(baseline_reading());
        assert_eq!(out.anomaly_type, Some(AnomalyKind::Trend));
    }

    #[test]
    fn weight_table_selects_proportionally() {
        let mut types = AnomalyTypesConfig::default();
        types.pattern.enabled = false;
        types.missing_data.enabled = false;
        types.noise.enabled = false;
        types.spike.weight = 1.0;
        types.trend.weight = 3.0;
        let table = WeightTable::build(&types).unwrap();
        assert!((table.total() - 4.0).abs() < 1e-12);

        assert_eq!(table.select(0.5), AnomalyKind::Spike);
        assert_eq!(table.select(0.999), AnomalyKind::Spike);
        assert_eq!(table.select(1.0), AnomalyKind::Trend);
        assert_eq!(table.select(3.9), AnomalyKind::Trend);

        let mut rng = SmallRng::seed_from_u64(11);
        let mut spikes = 0_u32;
        let n = 10_000_u32;
        for _ in 0..n {
            if table.select(rng.random_range(0.0..table.total())) == AnomalyKind::Spike {
                spikes += 1;
            }
        }
        let fraction = f64::from(spikes) / f64::from(n);
        assert!((fraction - 0.25).abs() < 0.02, "spike fraction was {fraction}");
    }

    #[test]
    fn constructor_rejects_invalid_interval() {
        let config = AnomalyConfig::default();
        let result =
            AnomalyEngine::new(&config, &test_profile(), &test_metrics(), 0.0, 1);
        assert!(result.is_err());
    }

    #[test]
    fn trigger_rate_matches_probability() {
        // Spike-only engine at p = 0.3: the observed trigger rate over many
        // readings should match, since spikes carry no episode state.
        let mut engine = engine_for(AnomalyKind::Spike, 0.3);
        let n = 20_000_u32;
        let mut triggered = 0_u32;
        for _ in 0..n {
            if engine.evaluate(baseline_reading()).anomaly_flag {
                triggered += 1;
            }
        }
        let rate = f64::from(triggered) / f64::from(n);
        assert!((rate - 0.3).abs() < 0.02, "trigger rate was {rate}");
    }
}
