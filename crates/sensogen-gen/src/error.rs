//! Error types for the generation layer.

/// Errors that can occur while constructing or validating the generation
/// subsystems.
///
/// Everything here is a configuration problem: the generator and anomaly
/// engine validate their inputs at construction time and never fail during
/// evaluation.
#[derive(Debug, thiserror::Error)]
pub enum GenError {
    /// Invalid generator or anomaly configuration.
    #[error("invalid generation configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl GenError {
    /// Shorthand constructor used throughout validation code.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
