//! SQLite data layer for the Sensogen telemetry generator.
//!
//! This crate owns everything that touches the store file: the single write
//! connection with its pragma and journal-mode setup, the ordered batch
//! buffer, the transactional batched writer with retry/backoff and
//! corruption quarantine, and the WAL checkpoint controller.
//!
//! # Single-writer model
//!
//! Exactly one [`StorageWriter`] mutates the store; it runs on one task, so
//! flushes and checkpoints can never overlap. External readers are expected
//! to open their own connections in explicit read-only mode
//! (`mode=ro` plus `PRAGMA query_only`) and must never request write
//! access -- that convention is what the single-writer assumption rests on.
//! Under WAL they read the previous or latest committed snapshot without
//! blocking the writer; under a rollback journal they may see a transient
//! busy condition during a commit and should retry briefly on their side.
//!
//! # File layout
//!
//! One primary store file. Under WAL mode the `-wal` journal and `-shm`
//! index appear alongside it; the three files are a unit, and the
//! quarantine path moves them aside together.
//!
//! # Modules
//!
//! - [`sqlite`] -- connection options, pragmas, journal mode, quarantine
//! - [`reading_store`] -- batched insert and query operations
//! - [`batch`] -- ordered bounded buffer with threshold signalling
//! - [`retry`] -- explicit retry/backoff policy and state
//! - [`writer`] -- the storage writer: flush orchestration and recovery
//! - [`checkpoint`] -- checkpoint scheduling
//! - [`error`] -- error taxonomy (transient / corrupt / fatal)

pub mod batch;
pub mod checkpoint;
pub mod error;
pub mod reading_store;
pub mod retry;
pub mod sqlite;
pub mod writer;

// Re-export primary types for convenience.
pub use batch::BatchBuffer;
pub use checkpoint::CheckpointController;
pub use error::{DbError, FailureKind, FlushError};
pub use reading_store::{ReadingRow, ReadingStore};
pub use retry::{RetryPolicy, RetryState};
pub use sqlite::{CheckpointStats, JournalMode, SqliteStore, StoreConfig};
pub use writer::{StorageWriter, WriterStats};
