//! End-to-end tests of the run loop against real SQLite stores.
//!
//! These exercise the full pipeline -- clock, baseline, anomaly engine,
//! batch buffer, storage writer -- with short intervals and small budgets so
//! each test finishes in well under a second.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing
)]

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use sensogen_core::config::SimulationConfig;
use sensogen_core::runner::{self, EndReason, RunBounds};
use sensogen_core::tick::SimulationState;
use sensogen_db::{
    BatchBuffer, CheckpointController, ReadingStore, SqliteStore, StorageWriter,
};
use tokio::sync::watch;

/// A fast single-stream configuration writing into `dir`.
fn fast_config(dir: &Path) -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.generator.sensor_count = 1;
    config.generator.interval_seconds = 0.01;
    config.anomaly.base_probability = 0.2;
    config.database.path = dir
        .join("sensor_data.db")
        .to_string_lossy()
        .into_owned();
    config.database.batch_size = 10;
    config.database.batch_timeout_seconds = 60.0;
    config
}

struct Harness {
    state: SimulationState,
    buffer: BatchBuffer,
    writer: StorageWriter,
    checkpoint: CheckpointController,
}

async fn harness(config: &SimulationConfig) -> Harness {
    config.validate().expect("test config must validate");
    let store = SqliteStore::open(&config.database.store_config())
        .await
        .expect("failed to open store");
    let checkpoint = CheckpointController::new(
        config.database.checkpoint_interval(),
        store.journal_mode(),
    );
    Harness {
        state: SimulationState::from_config(config, Utc::now()).unwrap(),
        buffer: BatchBuffer::new(
            config.database.batch_size,
            config.database.batch_timeout(),
            config.database.max_buffered_readings,
        ),
        writer: StorageWriter::new(store, config.database.retry_policy()),
        checkpoint,
    }
}

#[tokio::test]
async fn reading_budget_run_persists_every_reading() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path());
    let mut h = harness(&config).await;
    let (_tx, mut shutdown) = watch::channel(false);

    let bounds = RunBounds {
        max_readings: 25,
        max_runtime_seconds: 0,
    };
    let stats = runner::run_simulation(
        &mut h.state,
        &mut h.buffer,
        &mut h.writer,
        &mut h.checkpoint,
        bounds,
        &mut shutdown,
    )
    .await
    .unwrap();

    assert_eq!(stats.end_reason, EndReason::MaxReadingsReached);
    assert_eq!(stats.readings_generated, 25);
    // Final drain: everything generated is persisted on a clean stop.
    assert_eq!(stats.rows_persisted, 25);
    assert_eq!(stats.readings_evicted, 0);

    let count = ReadingStore::new(h.writer.store().pool()).count().await.unwrap();
    assert_eq!(count, 25);
    // 25 readings at batch_size 10: two threshold flushes plus the drain.
    assert_eq!(stats.batches_persisted, 3);

    // The anomaly engine ran: flags made it to the store.
    let flagged = ReadingStore::new(h.writer.store().pool())
        .anomaly_count()
        .await
        .unwrap();
    assert_eq!(flagged, i64::try_from(stats.anomalies_injected).unwrap());

    h.writer.close().await;
}

#[tokio::test]
async fn shutdown_signal_drains_the_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fast_config(dir.path());
    // Large batch size: nothing flushes until shutdown.
    config.database.batch_size = 1_000;
    let mut h = harness(&config).await;
    let (tx, mut shutdown) = watch::channel(false);

    let run = runner::run_simulation(
        &mut h.state,
        &mut h.buffer,
        &mut h.writer,
        &mut h.checkpoint,
        RunBounds::default(),
        &mut shutdown,
    );
    let trigger = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(true).unwrap();
    };
    let (result, ()) = tokio::join!(run, trigger);
    let stats = result.unwrap();

    assert_eq!(stats.end_reason, EndReason::ShutdownSignal);
    assert!(stats.readings_generated > 0);
    assert_eq!(stats.rows_persisted, stats.readings_generated);

    let count = ReadingStore::new(h.writer.store().pool()).count().await.unwrap();
    assert_eq!(count, i64::try_from(stats.rows_persisted).unwrap());
    h.writer.close().await;
}

#[tokio::test]
async fn age_threshold_flushes_during_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fast_config(dir.path());
    // Count threshold unreachable; only the age threshold can flush
    // mid-run.
    config.database.batch_size = 1_000;
    config.database.batch_timeout_seconds = 0.1;
    config.generator.interval_seconds = 0.02;
    let mut h = harness(&config).await;
    let (tx, mut shutdown) = watch::channel(false);

    let run = runner::run_simulation(
        &mut h.state,
        &mut h.buffer,
        &mut h.writer,
        &mut h.checkpoint,
        RunBounds::default(),
        &mut shutdown,
    );
    let trigger = async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        tx.send(true).unwrap();
    };
    let (result, ()) = tokio::join!(run, trigger);
    let stats = result.unwrap();

    // ~25 readings, far below batch_size, yet multiple batches committed:
    // the age threshold drove them.
    assert!(
        stats.batches_persisted >= 2,
        "expected timeout-driven flushes, got {} batches for {} readings",
        stats.batches_persisted,
        stats.readings_generated
    );
    assert_eq!(stats.rows_persisted, stats.readings_generated);
    h.writer.close().await;
}

#[tokio::test]
async fn checkpoints_fire_on_their_own_interval() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fast_config(dir.path());
    config.database.checkpoint_interval_seconds = 0.05;
    let mut h = harness(&config).await;
    let (_tx, mut shutdown) = watch::channel(false);

    let bounds = RunBounds {
        max_readings: 30,
        max_runtime_seconds: 0,
    };
    runner::run_simulation(
        &mut h.state,
        &mut h.buffer,
        &mut h.writer,
        &mut h.checkpoint,
        bounds,
        &mut shutdown,
    )
    .await
    .unwrap();

    // After checkpoints the store still reads back completely.
    let count = ReadingStore::new(h.writer.store().pool()).count().await.unwrap();
    assert_eq!(count, 30);
    h.writer.close().await;
}
