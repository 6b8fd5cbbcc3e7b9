//! Baseline signal model and anomaly-injection engine for Sensogen.
//!
//! This crate owns the stochastic half of the system: producing normal
//! sensor values from a smooth diurnal model plus Gaussian noise, and
//! deciding per reading whether (and how) to corrupt a value.
//!
//! # Determinism
//!
//! All randomness flows from [`rand::rngs::SmallRng`] instances seeded from
//! the configuration-level seed, so the same seed and configuration always
//! produce the same reading sequence. This enables reproducible runs and
//! deterministic tests.
//!
//! # Modules
//!
//! - [`config`] -- generator and anomaly configuration sections
//! - [`baseline`] -- diurnal + Gaussian baseline signal model
//! - [`profile`] -- device-characteristic probability modifiers
//! - [`anomaly`] -- the anomaly engine (weighted selection, episode state)
//! - [`error`] -- shared error type

pub mod anomaly;
pub mod baseline;
pub mod config;
pub mod error;
pub mod profile;

// Re-export primary types for convenience.
pub use anomaly::{AnomalyEngine, Episode};
pub use baseline::{BaselineModel, BaselineSample};
pub use config::{AnomalyConfig, AnomalyTypeConfig, GeneratorConfig, MetricProfile, MetricsConfig};
pub use error::GenError;
pub use profile::effective_probability;
