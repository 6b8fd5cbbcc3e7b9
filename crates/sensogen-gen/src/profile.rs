//! Device-characteristic probability modifiers.
//!
//! A device profile (manufacturer, firmware version) scales the base
//! anomaly probability through two static multiplier tables from
//! configuration. Modifiers compose multiplicatively, and the result is
//! clamped to `[0, 1]` -- the clamp is deliberate policy for aggressive
//! modifier combinations, not error recovery.

use sensogen_types::DeviceProfile;

use crate::config::AnomalyConfig;

/// Multiplier for an unknown manufacturer or firmware string.
const NEUTRAL_MODIFIER: f64 = 1.0;

/// Compute the effective per-reading trigger probability for a device.
///
/// `base × manufacturer_modifier × firmware_modifier`, clamped to `[0, 1]`.
/// A manufacturer or firmware string absent from its table contributes a
/// neutral 1.0.
pub fn effective_probability(config: &AnomalyConfig, profile: &DeviceProfile) -> f64 {
    let manufacturer = config
        .manufacturer_modifiers
        .get(&profile.manufacturer)
        .copied()
        .unwrap_or(NEUTRAL_MODIFIER);
    let firmware = config
        .firmware_modifiers
        .get(&profile.firmware_version)
        .copied()
        .unwrap_or(NEUTRAL_MODIFIER);
    (config.base_probability * manufacturer * firmware).clamp(0.0, 1.0)
}
