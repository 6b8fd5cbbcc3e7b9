//! Error types and failure taxonomy for the data layer.
//!
//! Every storage failure is classified into one of three [`FailureKind`]s,
//! which drive the writer's behavior: transient contention is retried with
//! backoff, corruption triggers quarantine-and-recreate, and everything
//! else (disk full, permissions, I/O) is fatal and stops the process.

// SQLite primary result codes relevant to classification. The extended
// code's low byte is the primary code.
const SQLITE_PERM: i64 = 3;
const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;
const SQLITE_READONLY: i64 = 8;
const SQLITE_IOERR: i64 = 10;
const SQLITE_CORRUPT: i64 = 11;
const SQLITE_FULL: i64 = 13;
const SQLITE_NOTADB: i64 = 26;

/// How a storage failure should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Lock/busy contention: retry locally with backoff.
    Transient,
    /// Format/integrity damage: quarantine the file and recreate.
    Corrupt,
    /// Not locally recoverable (disk full, permissions, I/O): stop.
    Fatal,
}

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// An SQLite operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// A schema migration failed.
    #[error("SQLite migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A filesystem operation on the store files failed.
    #[error("store file error: {0}")]
    Io(#[from] std::io::Error),

    /// `PRAGMA integrity_check` reported damage.
    #[error("integrity check failed: {report}")]
    IntegrityCheck {
        /// The first line of the integrity report.
        report: String,
    },

    /// A configuration error.
    #[error("storage configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Classify this error for the writer's recovery logic.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Sqlite(e) => classify_sqlx(e),
            Self::IntegrityCheck { .. } => FailureKind::Corrupt,
            Self::Migration(_) | Self::Io(_) | Self::Config(_) => FailureKind::Fatal,
        }
    }
}

/// Classify an [`sqlx::Error`] by its SQLite result code, falling back to
/// message matching for drivers that do not expose a numeric code.
fn classify_sqlx(error: &sqlx::Error) -> FailureKind {
    match error {
        sqlx::Error::Database(db) => {
            if let Some(code) = db.code().and_then(|c| c.parse::<i64>().ok()) {
                // The extended result code carries the primary code in its
                // low byte (e.g. 261 SQLITE_BUSY_RECOVERY -> 5).
                return classify_primary_code(code & 0xff);
            }
            classify_message(db.message())
        }
        sqlx::Error::PoolTimedOut => FailureKind::Transient,
        _ => FailureKind::Fatal,
    }
}

const fn classify_primary_code(code: i64) -> FailureKind {
    match code {
        SQLITE_BUSY | SQLITE_LOCKED => FailureKind::Transient,
        SQLITE_CORRUPT | SQLITE_NOTADB => FailureKind::Corrupt,
        SQLITE_PERM | SQLITE_READONLY | SQLITE_IOERR | SQLITE_FULL => FailureKind::Fatal,
        // Anything unrecognized is treated as fatal: never spin on the
        // unexpected.
        _ => FailureKind::Fatal,
    }
}

fn classify_message(message: &str) -> FailureKind {
    let lower = message.to_lowercase();
    if lower.contains("database is locked") || lower.contains("database table is locked") {
        FailureKind::Transient
    } else if lower.contains("malformed") || lower.contains("not a database") {
        FailureKind::Corrupt
    } else {
        FailureKind::Fatal
    }
}

/// Errors surfaced by a flush after local handling is exhausted.
#[derive(Debug, thiserror::Error)]
pub enum FlushError {
    /// Transient contention persisted through every retry attempt. The
    /// batch was NOT persisted and must be retained by the caller.
    #[error("flush retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The last transient error observed.
        source: DbError,
    },

    /// Corruption was detected and the quarantine-and-recreate recovery
    /// itself failed.
    #[error("store corruption recovery failed: {source}")]
    RecoveryFailed {
        /// The error that defeated recovery.
        source: DbError,
    },

    /// A non-recoverable storage failure (disk full, permissions, I/O).
    #[error("fatal storage failure: {source}")]
    Fatal {
        /// The underlying error.
        source: DbError,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn primary_code_classification() {
        assert_eq!(classify_primary_code(SQLITE_BUSY), FailureKind::Transient);
        assert_eq!(classify_primary_code(SQLITE_LOCKED), FailureKind::Transient);
        assert_eq!(classify_primary_code(SQLITE_CORRUPT), FailureKind::Corrupt);
        assert_eq!(classify_primary_code(SQLITE_NOTADB), FailureKind::Corrupt);
        assert_eq!(classify_primary_code(SQLITE_FULL), FailureKind::Fatal);
        assert_eq!(classify_primary_code(SQLITE_PERM), FailureKind::Fatal);
        // Unknown codes default to fatal: never spin on the unexpected.
        assert_eq!(classify_primary_code(9999), FailureKind::Fatal);
    }

    #[test]
    fn extended_codes_reduce_to_primary() {
        // 261 = SQLITE_BUSY_RECOVERY, 523 = SQLITE_BUSY_SNAPSHOT.
        assert_eq!(classify_primary_code(261 & 0xff), FailureKind::Transient);
        assert_eq!(classify_primary_code(523 & 0xff), FailureKind::Transient);
    }

    #[test]
    fn message_fallback_classification() {
        assert_eq!(
            classify_message("database is locked"),
            FailureKind::Transient
        );
        assert_eq!(
            classify_message("database disk image is malformed"),
            FailureKind::Corrupt
        );
        assert_eq!(
            classify_message("file is not a database"),
            FailureKind::Corrupt
        );
        assert_eq!(
            classify_message("database or disk is full"),
            FailureKind::Fatal
        );
    }

    #[test]
    fn integrity_failure_is_corrupt() {
        let err = DbError::IntegrityCheck {
            report: String::from("row 7 missing from index"),
        };
        assert_eq!(err.kind(), FailureKind::Corrupt);
    }

    #[test]
    fn io_errors_are_fatal() {
        let err = DbError::Io(std::io::Error::other("disk on fire"));
        assert_eq!(err.kind(), FailureKind::Fatal);
    }
}
