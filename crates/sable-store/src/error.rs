//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record body could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A write lost an optimistic-concurrency race.
    #[error("stale write to {kind} {id}: stored revision {current}, attempted {attempted}")]
    Stale {
        kind: String,
        id: String,
        current: u64,
        attempted: u64,
    },

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock was poisoned by a panicking holder.
    #[error("lock poisoned: {0}")]
    Poisoned(String),

    /// A blocking storage task failed to complete.
    #[error("background task failed: {0}")]
    Task(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
