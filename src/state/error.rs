//! Error types for the state database.

use std::path::PathBuf;

use thiserror::Error;

/// Storage faults. The store is assumed always available, so these are
/// propagated to the caller rather than retried.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to open database at {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("Database migration failed: {0}")]
    Migration(#[from] rusqlite::Error),

    #[error("Database query failed: {0}")]
    Query(String),

    #[error("Stored value in {column} is not valid: '{value}'")]
    Corrupt { column: &'static str, value: String },

    #[error("Failed to spawn blocking task: {0}")]
    Spawn(#[from] tokio::task::JoinError),

    #[error("Database schema version {found} is newer than supported version {expected}")]
    UnsupportedSchemaVersion { found: i32, expected: i32 },
}

impl StateError {
    pub fn query(source: rusqlite::Error) -> Self {
        Self::Query(source.to_string())
    }
}
