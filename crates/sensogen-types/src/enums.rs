//! Enumeration types for the Sensogen telemetry generator.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Anomaly kinds
// ---------------------------------------------------------------------------

/// A kind of injected anomaly.
///
/// The wire name (snake_case) is what lands in the `anomaly_type` column of
/// the store, so external readers can filter on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Instantaneous one-reading offset of large magnitude.
    Spike,
    /// Linearly increasing or decreasing offset over a multi-reading episode.
    Trend,
    /// Distortion of the periodic diurnal cycle over an episode.
    Pattern,
    /// Metric fields nulled out for the episode.
    MissingData,
    /// Inflated variance (mean unchanged) over an episode.
    Noise,
}

impl AnomalyKind {
    /// All kinds, in a stable order (used to iterate config tables).
    pub const ALL: [Self; 5] = [
        Self::Spike,
        Self::Trend,
        Self::Pattern,
        Self::MissingData,
        Self::Noise,
    ];

    /// The stable wire name stored in the `anomaly_type` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spike => "spike",
            Self::Trend => "trend",
            Self::Pattern => "pattern",
            Self::MissingData => "missing_data",
            Self::Noise => "noise",
        }
    }

    /// Whether this kind carries multi-reading episode state.
    ///
    /// A spike mutates exactly one reading; the other four persist across
    /// an episode tracked by a remaining-count.
    pub const fn has_duration(self) -> bool {
        !matches!(self, Self::Spike)
    }
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Metric channels
// ---------------------------------------------------------------------------

/// One of the four metric channels carried by every reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Ambient temperature in degrees Celsius.
    Temperature,
    /// Relative humidity in percent.
    Humidity,
    /// Barometric pressure in hectopascals.
    Pressure,
    /// Supply voltage in volts.
    Voltage,
}

impl Metric {
    /// All metric channels, in column order.
    pub const ALL: [Self; 4] = [
        Self::Temperature,
        Self::Humidity,
        Self::Pressure,
        Self::Voltage,
    ];

    /// The column name of this metric in the store.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Pressure => "pressure",
            Self::Voltage => "voltage",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn anomaly_kind_wire_names_are_snake_case() {
        assert_eq!(AnomalyKind::MissingData.as_str(), "missing_data");
        assert_eq!(AnomalyKind::Spike.as_str(), "spike");
        assert_eq!(AnomalyKind::Noise.to_string(), "noise");
    }

    #[test]
    fn anomaly_kind_serde_round_trip() {
        for kind in AnomalyKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
            let back: AnomalyKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
        }
    }

    #[test]
    fn only_spike_is_instantaneous() {
        for kind in AnomalyKind::ALL {
            assert_eq!(kind.has_duration(), kind != AnomalyKind::Spike);
        }
    }

    #[test]
    fn metric_names_match_columns() {
        let names: Vec<&str> = Metric::ALL.iter().map(|m| m.as_str()).collect();
        assert_eq!(names, ["temperature", "humidity", "pressure", "voltage"]);
    }
}
