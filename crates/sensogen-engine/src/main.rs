//! Sensogen engine binary.
//!
//! The main entry point that wires together configuration, the reading
//! generator, the anomaly engine, and the resilient SQLite writer, then
//! runs the generation loop until a bound is hit or a shutdown signal
//! arrives.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `sensogen-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing, `RUST_LOG` over config level)
//! 3. Validate configuration (fail fast, before any generation)
//! 4. Open the store (fresh start or preserve; corruption quarantined)
//! 5. Assemble buffer, writer, checkpoint controller, simulation state
//! 6. Install the ctrl-c handler
//! 7. Run the loop
//! 8. Final checkpoint (when configured), close, log the run summary

mod error;

use std::path::Path;

use chrono::Utc;
use sensogen_core::config::SimulationConfig;
use sensogen_core::runner::{self, RunBounds};
use sensogen_core::tick::SimulationState;
use sensogen_db::{BatchBuffer, CheckpointController, SqliteStore, StorageWriter};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::error::EngineError;

/// Configuration file looked up in the working directory.
const CONFIG_FILE: &str = "sensogen-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns [`EngineError`] if any startup step or the run itself fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration (before logging init so the config can supply
    //    the default log level).
    let config = load_config()?;

    // 2. Initialize structured logging. RUST_LOG wins over the config level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("sensogen-engine starting");

    // 3. Validate before any generation begins.
    config.validate()?;

    let run_id = Uuid::new_v4();
    info!(
        run_id = %run_id,
        seed = config.seed,
        sensors = config.generator.sensor_count,
        interval_seconds = config.generator.interval_seconds,
        anomalies_enabled = config.anomaly.enabled,
        base_probability = config.anomaly.base_probability,
        db_path = config.database.path,
        wal = config.database.wal,
        batch_size = config.database.batch_size,
        "configuration loaded"
    );

    // 4. Open the store. Fresh-start removal, journal-mode selection, and
    //    startup corruption recovery all happen inside.
    let store = SqliteStore::open(&config.database.store_config()).await?;

    // 5. Assemble the moving parts.
    let checkpoint_interval = config.database.checkpoint_interval();
    let mut checkpoint = CheckpointController::new(checkpoint_interval, store.journal_mode());
    let mut writer = StorageWriter::new(store, config.database.retry_policy());
    let mut buffer = BatchBuffer::new(
        config.database.batch_size,
        config.database.batch_timeout(),
        config.database.max_buffered_readings,
    );
    let mut state = SimulationState::from_config(&config, Utc::now())?;
    info!(streams = state.stream_count(), "simulation state assembled");

    // 6. Shutdown signal: ctrl-c flips a watch channel the runner observes
    //    between ticks.
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, requesting shutdown");
            let _ = shutdown_tx.send(true);
        }
    });

    // 7. Run.
    let stats = runner::run_simulation(
        &mut state,
        &mut buffer,
        &mut writer,
        &mut checkpoint,
        RunBounds::from(config.simulation),
        &mut shutdown_rx,
    )
    .await?;

    // 8. Final checkpoint and close.
    if config.database.checkpoint_on_close {
        match writer.checkpoint().await {
            Ok(Some(cp)) => info!(
                checkpointed_pages = cp.checkpointed_pages,
                "final checkpoint complete"
            ),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "final checkpoint failed"),
        }
    }
    writer.close().await;

    runner::log_run_end(&stats);
    info!(run_id = %run_id, "sensogen-engine shutdown complete");
    Ok(())
}

/// Load the configuration file from the working directory, falling back to
/// defaults when it does not exist.
fn load_config() -> Result<SimulationConfig, EngineError> {
    let path = Path::new(CONFIG_FILE);
    if path.exists() {
        Ok(SimulationConfig::from_file(path)?)
    } else {
        Ok(SimulationConfig::default())
    }
}
