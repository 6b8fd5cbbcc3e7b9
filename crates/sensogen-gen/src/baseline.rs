//! Diurnal + Gaussian baseline signal model.
//!
//! Each metric channel follows `mean + amplitude * cos(2π * (h - peak) / 24)
//! + N(0, noise_std)`, where `h` is the timestamp's hour-of-day. The cosine
//! term gives a smooth daily cycle peaking at the configured hour; the
//! Gaussian term adds per-reading sensor noise.
//!
//! The model is a pure function of (timestamp, configuration, RNG state):
//! no state persists between readings beyond the seeded RNG, so two models
//! built from the same seed produce identical sequences.

use chrono::{DateTime, Timelike, Utc};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use sensogen_types::Metric;

use crate::config::MetricsConfig;

/// Seconds in one day, for the diurnal cycle period.
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Baseline values for all four metric channels at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineSample {
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
    /// Pressure in hectopascals.
    pub pressure: f64,
    /// Voltage in volts.
    pub voltage: f64,
}

/// Seeded baseline generator for one sensor stream.
#[derive(Debug, Clone)]
pub struct BaselineModel {
    metrics: MetricsConfig,
    rng: SmallRng,
}

impl BaselineModel {
    /// Create a baseline model from metric profiles and a stream seed.
    pub fn new(metrics: MetricsConfig, seed: u64) -> Self {
        Self {
            metrics,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Generate baseline values for the given timestamp.
    ///
    /// Advances the internal RNG by one draw per channel.
    pub fn sample(&mut self, timestamp: DateTime<Utc>) -> BaselineSample {
        let day_fraction = seconds_of_day(timestamp) / SECONDS_PER_DAY;
        BaselineSample {
            temperature: self.channel(Metric::Temperature, day_fraction),
            humidity: self.channel(Metric::Humidity, day_fraction),
            pressure: self.channel(Metric::Pressure, day_fraction),
            voltage: self.channel(Metric::Voltage, day_fraction),
        }
    }

    fn channel(&mut self, metric: Metric, day_fraction: f64) -> f64 {
        let profile = self.metrics.profile(metric);
        let phase = (day_fraction - profile.diurnal_peak_hour / 24.0) * std::f64::consts::TAU;
        let diurnal = profile.diurnal_amplitude * phase.cos();
        let noise = standard_normal(&mut self.rng) * profile.noise_std;
        profile.mean + diurnal + noise
    }
}

/// Fraction-of-day seconds (including sub-second part) for a timestamp.
fn seconds_of_day(timestamp: DateTime<Utc>) -> f64 {
    let whole = f64::from(timestamp.num_seconds_from_midnight());
    let nanos = f64::from(timestamp.nanosecond()) / 1_000_000_000.0;
    whole + nanos
}

/// Draw from the standard normal distribution via the Box-Muller transform.
///
/// Two uniform draws in (0, 1] produce one normal deviate. The first draw
/// is kept away from zero so the logarithm stays finite.
pub fn standard_normal(rng: &mut impl Rng) -> f64 {
    let u1: f64 = rng.random_range(f64::MIN_POSITIVE..=1.0);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::config::MetricProfile;

    fn noiseless_metrics() -> MetricsConfig {
        MetricsConfig {
            temperature: MetricProfile::new(20.0, 5.0, 0.0),
            humidity: MetricProfile::new(50.0, 0.0, 0.0),
            pressure: MetricProfile::new(1000.0, 0.0, 0.0),
            voltage: MetricProfile::new(3.3, 0.0, 0.0),
        }
    }

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = BaselineModel::new(MetricsConfig::default(), 42);
        let mut b = BaselineModel::new(MetricsConfig::default(), 42);
        let ts = at("2026-08-07T09:00:00Z");
        for _ in 0..100 {
            assert_eq!(a.sample(ts), b.sample(ts));
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = BaselineModel::new(MetricsConfig::default(), 42);
        let mut b = BaselineModel::new(MetricsConfig::default(), 43);
        let ts = at("2026-08-07T09:00:00Z");
        assert_ne!(a.sample(ts), b.sample(ts));
    }

    #[test]
    fn diurnal_peaks_at_configured_hour() {
        let mut model = BaselineModel::new(noiseless_metrics(), 1);
        // Default peak hour is 15:00: the cosine term is +amplitude there
        // and -amplitude twelve hours away.
        let peak = model.sample(at("2026-08-07T15:00:00Z")).temperature;
        let trough = model.sample(at("2026-08-07T03:00:00Z")).temperature;
        assert!((peak - 25.0).abs() < 1e-9, "peak was {peak}");
        assert!((trough - 15.0).abs() < 1e-9, "trough was {trough}");
    }

    #[test]
    fn zero_amplitude_channel_is_flat() {
        let mut model = BaselineModel::new(noiseless_metrics(), 1);
        let morning = model.sample(at("2026-08-07T06:00:00Z")).voltage;
        let evening = model.sample(at("2026-08-07T21:00:00Z")).voltage;
        assert_eq!(morning, 3.3);
        assert_eq!(evening, 3.3);
    }

    #[test]
    fn noise_stays_near_mean() {
        // With std 1.0 and no diurnal term, the sample mean over many
        // readings should land close to the configured mean.
        let metrics = MetricsConfig {
            humidity: MetricProfile::new(50.0, 0.0, 1.0),
            ..noiseless_metrics()
        };
        let mut model = BaselineModel::new(metrics, 7);
        let ts = at("2026-08-07T12:00:00Z");
        let n = 5000;
        let mut sum = 0.0;
        for _ in 0..n {
            sum += model.sample(ts).humidity;
        }
        let mean = sum / f64::from(n);
        assert!((mean - 50.0).abs() < 0.1, "sample mean was {mean}");
    }

    #[test]
    fn standard_normal_moments() {
        let mut rng = SmallRng::seed_from_u64(99);
        let n = 20_000;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for _ in 0..n {
            let x = standard_normal(&mut rng);
            sum += x;
            sum_sq += x * x;
        }
        let mean = sum / f64::from(n);
        let var = sum_sq / f64::from(n) - mean * mean;
        assert!(mean.abs() < 0.05, "mean was {mean}");
        assert!((var - 1.0).abs() < 0.1, "variance was {var}");
    }
}
