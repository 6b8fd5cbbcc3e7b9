//! Shared type definitions for the Sensogen telemetry generator.
//!
//! This crate is the single source of truth for the record types that flow
//! from the reading generator through the anomaly engine into the batch
//! buffer and, finally, into the SQLite store.
//!
//! # Modules
//!
//! - [`enums`] -- Enumeration types (anomaly kinds, metric channels)
//! - [`structs`] -- The reading record and its device/location metadata

pub mod enums;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{AnomalyKind, Metric};
pub use structs::{DeviceInfo, DeviceProfile, LocationInfo, Reading, status_codes};
