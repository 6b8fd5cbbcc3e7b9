//! The reading record and its device/location metadata.
//!
//! A [`Reading`] is immutable once constructed. The anomaly engine consumes
//! a baseline reading by value and returns a (possibly mutated) replacement;
//! after that the record is owned by the batch buffer until the storage
//! writer persists it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::AnomalyKind;

// ---------------------------------------------------------------------------
// Status codes
// ---------------------------------------------------------------------------

/// Well-known values for the `status_code` column.
pub mod status_codes {
    /// The sensor reported a normal reading.
    pub const OK: u16 = 0;
    /// The sensor failed to report (missing-data episodes).
    pub const FAULT: u16 = 1;
}

// ---------------------------------------------------------------------------
// Device metadata
// ---------------------------------------------------------------------------

/// Static device metadata carried on every reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device manufacturer name.
    pub manufacturer: String,
    /// Device model designation.
    pub model: String,
    /// Installed firmware version string.
    pub firmware_version: String,
    /// Unit serial number.
    pub serial_number: String,
}

/// The (manufacturer, firmware) pairing used to scale anomaly probability.
///
/// Immutable and supplied at startup; the anomaly engine looks up its
/// probability multipliers from configuration tables keyed by these two
/// strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Manufacturer name, matched against the manufacturer modifier table.
    pub manufacturer: String,
    /// Firmware version string, matched against the firmware modifier table.
    pub firmware_version: String,
}

impl DeviceProfile {
    /// Extract the profile from full device metadata.
    pub fn from_device(device: &DeviceInfo) -> Self {
        Self {
            manufacturer: device.manufacturer.clone(),
            firmware_version: device.firmware_version.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Location metadata
// ---------------------------------------------------------------------------

/// Static location metadata carried on every reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    /// Human-readable site name.
    pub site: String,
    /// Site latitude in decimal degrees.
    pub latitude: f64,
    /// Site longitude in decimal degrees.
    pub longitude: f64,
    /// IANA timezone name of the site.
    pub timezone: String,
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// One synthetic sensor reading.
///
/// Metric fields are `Option<f64>` so a missing-data episode can null them
/// while the record itself (timestamp, identity, metadata) is still
/// persisted. `anomaly_flag` and `anomaly_type` are set by the anomaly
/// engine; a baseline reading carries `false` / `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Generation timestamp (UTC). Persisted as RFC 3339 text.
    pub timestamp: DateTime<Utc>,
    /// Identifier of the sensor stream that produced this reading.
    pub sensor_id: String,
    /// Ambient temperature in degrees Celsius.
    pub temperature: Option<f64>,
    /// Relative humidity in percent.
    pub humidity: Option<f64>,
    /// Barometric pressure in hectopascals.
    pub pressure: Option<f64>,
    /// Supply voltage in volts.
    pub voltage: Option<f64>,
    /// Sensor status code (see [`status_codes`]).
    pub status_code: u16,
    /// Whether this reading was mutated by the anomaly engine.
    pub anomaly_flag: bool,
    /// The kind of mutation applied, when `anomaly_flag` is set.
    pub anomaly_type: Option<AnomalyKind>,
    /// Static device metadata.
    pub device: DeviceInfo,
    /// Static location metadata.
    pub location: LocationInfo,
}

impl Reading {
    /// Apply a closure to each present metric value in place.
    ///
    /// Used by the anomaly engine for transformations that act uniformly
    /// across channels (spike offsets, noise inflation). Metrics already
    /// `None` are left untouched.
    pub fn map_metrics(&mut self, mut f: impl FnMut(crate::enums::Metric, f64) -> f64) {
        if let Some(v) = self.temperature {
            self.temperature = Some(f(crate::enums::Metric::Temperature, v));
        }
        if let Some(v) = self.humidity {
            self.humidity = Some(f(crate::enums::Metric::Humidity, v));
        }
        if let Some(v) = self.pressure {
            self.pressure = Some(f(crate::enums::Metric::Pressure, v));
        }
        if let Some(v) = self.voltage {
            self.voltage = Some(f(crate::enums::Metric::Voltage, v));
        }
    }

    /// Null out every metric field (missing-data episodes).
    pub fn clear_metrics(&mut self) {
        self.temperature = None;
        self.humidity = None;
        self.pressure = None;
        self.voltage = None;
    }

    /// Read a metric channel by enum value.
    pub const fn metric(&self, metric: crate::enums::Metric) -> Option<f64> {
        match metric {
            crate::enums::Metric::Temperature => self.temperature,
            crate::enums::Metric::Humidity => self.humidity,
            crate::enums::Metric::Pressure => self.pressure,
            crate::enums::Metric::Voltage => self.voltage,
        }
    }
}
