#![forbid(unsafe_code)]

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("failed to (de)serialize snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("snapshot schema version {found} is not supported (expected {expected})")]
    SchemaMismatch { found: u32, expected: u32 },

    #[error("state store unavailable: {0}")]
    Store(String),
}
