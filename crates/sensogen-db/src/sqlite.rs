//! SQLite connection management: pragmas, journal mode, quarantine.
//!
//! The store is opened through a pool capped at a single connection -- the
//! one write connection the system is allowed. Journal mode is selected at
//! startup from configuration: WAL for lock-free concurrent readers, or the
//! rollback journal where WAL's companion files are unwanted (e.g. some
//! network filesystems). Performance pragmas match the access pattern of an
//! append-only writer with many external readers.
//!
//! Corruption handling lives here too: a store that fails its integrity
//! check (or is not a database at all) is renamed aside with a timestamp
//! suffix -- together with its `-wal`/`-shm`/`-journal` companions -- and a
//! fresh store is created in its place.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{error, info, warn};

use crate::error::{DbError, FailureKind};

/// Embedded schema migrations, applied on every open.
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Default busy timeout handed to SQLite.
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Companion file suffixes that must travel with the main store file.
const COMPANION_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];

// ---------------------------------------------------------------------------
// Journal mode
// ---------------------------------------------------------------------------

/// The durability mode the store runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    /// Write-ahead journal: readers never block against the writer.
    Wal,
    /// Rollback journal: exclusive access during a write transaction.
    Rollback,
}

impl JournalMode {
    /// Map the configuration boolean onto a mode.
    pub const fn from_wal_flag(wal: bool) -> Self {
        if wal { Self::Wal } else { Self::Rollback }
    }

    /// Whether this mode maintains a write-ahead journal to checkpoint.
    pub const fn is_wal(self) -> bool {
        matches!(self, Self::Wal)
    }

    const fn as_sqlite(self) -> SqliteJournalMode {
        match self {
            Self::Wal => SqliteJournalMode::Wal,
            Self::Rollback => SqliteJournalMode::Delete,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for opening the store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path of the primary store file.
    pub path: PathBuf,
    /// Durability mode to configure at open.
    pub journal_mode: JournalMode,
    /// Keep an existing store instead of starting fresh.
    pub preserve_existing: bool,
    /// How long SQLite itself waits on a locked database before
    /// surfacing `SQLITE_BUSY` (the writer's retry policy sits above this).
    pub busy_timeout: Duration,
}

impl StoreConfig {
    /// Create a configuration with default mode (WAL) and timeouts.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            journal_mode: JournalMode::Wal,
            preserve_existing: false,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Set the journal mode.
    #[must_use]
    pub const fn with_journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }

    /// Keep an existing store file instead of removing it at open.
    #[must_use]
    pub const fn with_preserve_existing(mut self, preserve: bool) -> Self {
        self.preserve_existing = preserve;
        self
    }

    /// Set the SQLite busy timeout.
    #[must_use]
    pub const fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

// ---------------------------------------------------------------------------
// Checkpoint stats
// ---------------------------------------------------------------------------

/// Result row of `PRAGMA wal_checkpoint(TRUNCATE)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointStats {
    /// Whether the checkpoint could not complete due to reader activity.
    pub busy: bool,
    /// Pages in the WAL before the checkpoint.
    pub log_pages: i64,
    /// Pages successfully moved into the main file.
    pub checkpointed_pages: i64,
}

// ---------------------------------------------------------------------------
// Store handle
// ---------------------------------------------------------------------------

/// Handle to the store: the single write connection plus the knowledge
/// needed to recreate it after quarantine.
pub struct SqliteStore {
    pool: SqlitePool,
    path: PathBuf,
    mode: JournalMode,
    busy_timeout: Duration,
}

impl SqliteStore {
    /// Open (or create) the store, applying pragmas and migrations.
    ///
    /// Unless `preserve_existing` is set, a pre-existing store and its
    /// companion files are removed first. A store that fails the startup
    /// integrity check is quarantined and recreated fresh -- opening only
    /// fails for non-corruption reasons (permissions, disk, bad path).
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store cannot be opened even after
    /// corruption recovery.
    pub async fn open(config: &StoreConfig) -> Result<Self, DbError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        if !config.preserve_existing && config.path.exists() {
            info!(path = %config.path.display(), "removing existing store for a fresh start");
            remove_store_files(&config.path)?;
        }

        let pool = match Self::connect_and_verify(config).await {
            Ok(pool) => pool,
            Err(e) if e.kind() == FailureKind::Corrupt => {
                error!(
                    path = %config.path.display(),
                    error = %e,
                    "store failed startup verification; quarantining and recreating"
                );
                let quarantined = quarantine_store_files(&config.path)?;
                info!(quarantined = %quarantined.display(), "corrupt store preserved");
                Self::connect_and_verify(config).await?
            }
            Err(e) => return Err(e),
        };

        let active_mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await?;
        info!(
            path = %config.path.display(),
            journal_mode = active_mode,
            "store opened"
        );

        Ok(Self {
            pool,
            path: config.path.clone(),
            mode: config.journal_mode,
            busy_timeout: config.busy_timeout,
        })
    }

    /// Connect, verify integrity, and migrate.
    async fn connect_and_verify(config: &StoreConfig) -> Result<SqlitePool, DbError> {
        let pool = Self::connect(&config.path, config.journal_mode, config.busy_timeout).await?;

        let report: String = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_one(&pool)
            .await?;
        if !report.eq_ignore_ascii_case("ok") {
            pool.close().await;
            return Err(DbError::IntegrityCheck { report });
        }

        MIGRATOR.run(&pool).await?;
        Ok(pool)
    }

    /// Build the single-connection pool with the standard pragma set.
    async fn connect(
        path: &Path,
        mode: JournalMode,
        busy_timeout: Duration,
    ) -> Result<SqlitePool, DbError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(mode.as_sqlite())
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(busy_timeout)
            .pragma("cache_size", "-64000")
            .pragma("temp_store", "MEMORY")
            .pragma("mmap_size", "134217728");

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(pool)
    }

    /// Quarantine the (presumed corrupt) store files and recreate a fresh
    /// store with the expected schema. Returns the quarantine path of the
    /// primary file.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the rename or the fresh open fails; the
    /// caller treats that as unrecoverable.
    pub async fn quarantine_and_recreate(&mut self) -> Result<PathBuf, DbError> {
        self.pool.close().await;
        let quarantined = quarantine_store_files(&self.path)?;
        error!(
            path = %self.path.display(),
            quarantined = %quarantined.display(),
            "store corrupted at runtime; old file quarantined, recreating fresh store"
        );

        let pool = Self::connect(&self.path, self.mode, self.busy_timeout).await?;
        MIGRATOR.run(&pool).await?;
        self.pool = pool;
        Ok(quarantined)
    }

    /// Fold the write-ahead journal back into the main file.
    ///
    /// Returns `None` under the rollback journal, where there is nothing
    /// to checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the checkpoint statement fails. Callers log
    /// and retry on the next interval; this is never fatal.
    pub async fn checkpoint(&self) -> Result<Option<CheckpointStats>, DbError> {
        if !self.mode.is_wal() {
            return Ok(None);
        }
        let (busy, log_pages, checkpointed_pages): (i64, i64, i64) =
            sqlx::query_as("PRAGMA wal_checkpoint(TRUNCATE)")
                .fetch_one(&self.pool)
                .await?;
        let stats = CheckpointStats {
            busy: busy != 0,
            log_pages,
            checkpointed_pages,
        };
        if stats.busy {
            warn!(log_pages, "checkpoint could not complete while readers were active");
        }
        Ok(Some(stats))
    }

    /// Probe the connection with a trivial query.
    pub async fn is_healthy(&self) -> bool {
        matches!(
            sqlx::query_scalar::<_, i64>("SELECT 1")
                .fetch_one(&self.pool)
                .await,
            Ok(1)
        )
    }

    /// Close the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        info!(path = %self.path.display(), "store closed");
    }

    /// The underlying pool (single write connection).
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The primary store file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The configured journal mode.
    pub const fn journal_mode(&self) -> JournalMode {
        self.mode
    }
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

/// The path of a companion file (`-wal`, `-shm`, `-journal`).
fn companion_path(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

/// Remove the store file and any companions.
fn remove_store_files(path: &Path) -> Result<(), DbError> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    for suffix in COMPANION_SUFFIXES {
        let companion = companion_path(path, suffix);
        if companion.exists() {
            std::fs::remove_file(&companion)?;
        }
    }
    Ok(())
}

/// Rename the store file and companions aside with a timestamp suffix.
///
/// The original content is preserved under the new name for post-mortem
/// inspection; the companions move together so the quarantined set stays a
/// consistent unit.
fn quarantine_store_files(path: &Path) -> Result<PathBuf, DbError> {
    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let quarantined = companion_path(path, &format!(".corrupt-{stamp}"));
    if path.exists() {
        std::fs::rename(path, &quarantined)?;
    }
    for suffix in COMPANION_SUFFIXES {
        let source = companion_path(path, suffix);
        if source.exists() {
            std::fs::rename(&source, companion_path(&quarantined, suffix))?;
        }
    }
    Ok(quarantined)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn companion_paths_append_suffix() {
        let path = Path::new("/data/sensor_data.db");
        assert_eq!(
            companion_path(path, "-wal"),
            PathBuf::from("/data/sensor_data.db-wal")
        );
        assert_eq!(
            companion_path(path, "-shm"),
            PathBuf::from("/data/sensor_data.db-shm")
        );
    }

    #[test]
    fn journal_mode_from_flag() {
        assert_eq!(JournalMode::from_wal_flag(true), JournalMode::Wal);
        assert_eq!(JournalMode::from_wal_flag(false), JournalMode::Rollback);
        assert!(JournalMode::Wal.is_wal());
        assert!(!JournalMode::Rollback.is_wal());
    }

    #[test]
    fn store_config_builders() {
        let config = StoreConfig::new("/tmp/test.db")
            .with_journal_mode(JournalMode::Rollback)
            .with_preserve_existing(true)
            .with_busy_timeout(Duration::from_millis(250));
        assert_eq!(config.journal_mode, JournalMode::Rollback);
        assert!(config.preserve_existing);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
    }
}
