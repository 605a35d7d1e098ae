//! Error types for the adapter.

use thiserror::Error;

/// Errors surfaced by the adapter library.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A computed dynamic table identifier failed allow-list validation.
    /// Dynamic names are interpolated into SQL, so anything that is not a
    /// 32-character lowercase hex digest is refused outright.
    #[error("invalid dynamic table identifier: {0}")]
    InvalidTableName(String),

    /// Any statement, transaction, or pool error from the database.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Startup connectivity probing failed on every allowed attempt.
    #[error("database unreachable after {attempts} attempts: {last}")]
    ConnectRetriesExhausted {
        attempts: u32,
        #[source]
        last: sqlx::Error,
    },
}
