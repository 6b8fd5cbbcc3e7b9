//! Batched insert and query operations on the `sensor_readings` table.
//!
//! The writer's hot path is [`ReadingStore::insert_batch`]: one transaction
//! per batch, multi-row `INSERT` statements built with
//! [`sqlx::QueryBuilder`], rows in original generation order. The batch is
//! all-or-nothing -- a failed commit leaves the store exactly as it was, so
//! the caller can retry the identical batch without creating duplicates
//! (row identity is assigned by the store, never by the client).

use sensogen_types::Reading;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbError;

/// Rows per `INSERT` statement. Seventeen bound parameters per row keeps
/// this comfortably under SQLite's conservative 999-variable limit.
const INSERT_CHUNK_ROWS: usize = 50;

/// Operations on the `sensor_readings` table.
pub struct ReadingStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ReadingStore<'a> {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a batch of readings in a single transaction.
    ///
    /// Rows are inserted in slice order. Either the whole batch commits or
    /// none of it does; partial persistence is impossible.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if any statement or the commit fails.
    pub async fn insert_batch(&self, readings: &[Reading]) -> Result<(), DbError> {
        if readings.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for chunk in readings.chunks(INSERT_CHUNK_ROWS) {
            let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
                "INSERT INTO sensor_readings (\
                 timestamp, sensor_id, temperature, humidity, pressure, voltage, \
                 status_code, anomaly_flag, anomaly_type, \
                 manufacturer, model, firmware_version, serial_number, \
                 location, latitude, longitude, original_timezone) ",
            );
            builder.push_values(chunk, |mut row, reading| {
                row.push_bind(reading.timestamp.to_rfc3339())
                    .push_bind(&reading.sensor_id)
                    .push_bind(reading.temperature)
                    .push_bind(reading.humidity)
                    .push_bind(reading.pressure)
                    .push_bind(reading.voltage)
                    .push_bind(i64::from(reading.status_code))
                    .push_bind(reading.anomaly_flag)
                    .push_bind(reading.anomaly_type.map(|kind| kind.as_str()))
                    .push_bind(&reading.device.manufacturer)
                    .push_bind(&reading.device.model)
                    .push_bind(&reading.device.firmware_version)
                    .push_bind(&reading.device.serial_number)
                    .push_bind(&reading.location.site)
                    .push_bind(reading.location.latitude)
                    .push_bind(reading.location.longitude)
                    .push_bind(&reading.location.timezone);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;

        debug!(rows = readings.len(), "inserted reading batch");
        Ok(())
    }

    /// Total number of persisted readings.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn count(&self) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sensor_readings")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Number of persisted readings flagged as anomalous.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn anomaly_count(&self) -> Result<i64, DbError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sensor_readings WHERE anomaly_flag = 1")
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }

    /// The most recent readings, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn recent(&self, limit: i64) -> Result<Vec<ReadingRow>, DbError> {
        let rows = sqlx::query_as::<_, ReadingRow>(
            "SELECT id, timestamp, sensor_id, temperature, humidity, pressure, voltage, \
             status_code, anomaly_flag, anomaly_type, \
             manufacturer, model, firmware_version, serial_number, \
             location, latitude, longitude, original_timezone, synced \
             FROM sensor_readings ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// All readings for one sensor stream, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn for_sensor(&self, sensor_id: &str) -> Result<Vec<ReadingRow>, DbError> {
        let rows = sqlx::query_as::<_, ReadingRow>(
            "SELECT id, timestamp, sensor_id, temperature, humidity, pressure, voltage, \
             status_code, anomaly_flag, anomaly_type, \
             manufacturer, model, firmware_version, serial_number, \
             location, latitude, longitude, original_timezone, synced \
             FROM sensor_readings WHERE sensor_id = ? ORDER BY id",
        )
        .bind(sensor_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

/// A row from the `sensor_readings` table.
///
/// Timestamps come back as the RFC 3339 text they were stored as; callers
/// that need a typed instant parse on their side.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ReadingRow {
    /// Store-assigned row identity.
    pub id: i64,
    /// RFC 3339 generation timestamp.
    pub timestamp: String,
    /// Sensor stream identifier.
    pub sensor_id: String,
    /// Temperature in degrees Celsius.
    pub temperature: Option<f64>,
    /// Relative humidity in percent.
    pub humidity: Option<f64>,
    /// Pressure in hectopascals.
    pub pressure: Option<f64>,
    /// Voltage in volts.
    pub voltage: Option<f64>,
    /// Sensor status code.
    pub status_code: Option<i64>,
    /// Whether the reading was mutated by the anomaly engine.
    pub anomaly_flag: bool,
    /// Wire name of the anomaly kind, when flagged.
    pub anomaly_type: Option<String>,
    /// Device manufacturer.
    pub manufacturer: Option<String>,
    /// Device model.
    pub model: Option<String>,
    /// Device firmware version.
    pub firmware_version: Option<String>,
    /// Device serial number.
    pub serial_number: Option<String>,
    /// Site name.
    pub location: Option<String>,
    /// Site latitude.
    pub latitude: Option<f64>,
    /// Site longitude.
    pub longitude: Option<f64>,
    /// Site timezone.
    pub original_timezone: Option<String>,
    /// Downstream sync flag, defaulted false at insert.
    pub synced: bool,
}
