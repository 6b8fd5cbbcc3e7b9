//! Error types for the Sensogen engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup and the run itself, so `main` can
//! propagate everything with `?` and still report which subsystem failed.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: sensogen_core::ConfigError,
    },

    /// Simulation state assembly failed.
    #[error("state error: {source}")]
    State {
        /// The underlying state-build error.
        #[from]
        source: sensogen_core::StateBuildError,
    },

    /// Opening or operating the store failed.
    #[error("storage error: {source}")]
    Storage {
        /// The underlying data-layer error.
        #[from]
        source: sensogen_db::DbError,
    },

    /// The run loop failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: sensogen_core::RunnerError,
    },
}
