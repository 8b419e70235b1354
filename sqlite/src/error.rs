//! Error types for store operations.
//!
//! Every failure a store operation can hit is one of these variants: engine
//! errors, rejected input, schema conflicts, lifecycle problems and
//! configuration issues. Point lookups that find nothing are not errors; they
//! return `Ok(None)`.

use recordstore_core::ValidationError;
use recordstore_db::DefinitionError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite engine failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Input rejected before reaching the engine.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// DDL needed to extend or adopt a table failed or would contradict the
    /// table's recorded shape.
    #[error("schema conflict on table '{table}': {message}")]
    SchemaConflict {
        /// Affected table.
        table: String,
        /// Engine or consistency message.
        message: String,
    },

    /// The table is neither declared nor a known dynamic table.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// A dynamic handle was requested for a static table.
    #[error("table '{0}' is static and cannot grow columns")]
    NotDynamic(String),

    /// Full-text search on a static table without searchable columns.
    #[error("table '{0}' has no full-text index")]
    NotSearchable(String),

    /// The manager has no partition with this name.
    #[error("unknown partition: {0}")]
    UnknownPartition(String),

    /// The store has been closed.
    #[error("store is closed")]
    Closed,

    /// The store's worker thread failed or went away mid-job.
    #[error("worker error: {0}")]
    Worker(String),

    /// Loading table definitions failed.
    #[error("definition error: {0}")]
    Definitions(#[from] DefinitionError),

    /// Manager configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// The store's own catalog holds something it cannot read back.
    #[error("corrupt metadata for table '{table}': {message}")]
    Metadata {
        /// Affected table.
        table: String,
        /// What could not be read.
        message: String,
    },
}

impl StoreError {
    pub(crate) fn conflict(table: &str, message: impl ToString) -> Self {
        StoreError::SchemaConflict {
            table: table.to_string(),
            message: message.to_string(),
        }
    }
}

/// Convenience alias for results with [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;
