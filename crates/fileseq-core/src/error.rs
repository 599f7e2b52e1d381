//! Core error types for fileseq-core.
//!
//! This module defines the error hierarchy using thiserror. Storage faults
//! live in [`DatabaseError`], domain rejections in [`SequenceError`], and
//! per-item transport failures in [`DeliveryError`].

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for fileseq-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Another thread panicked while holding the connection
    #[error("Database connection mutex poisoned")]
    Poisoned,

    /// The user already has an open sequence
    #[error("User {user_id} already has an open sequence")]
    Conflict { user_id: i64 },

    /// The sequence does not exist or is not in the state the operation needs
    #[error("Sequence {sequence_id} not found in the required state")]
    NotFound { sequence_id: i64 },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Errors raised by the sequence state machine.
#[derive(Error, Debug)]
pub enum SequenceError {
    /// A second sequence was requested while one is open
    #[error("A sequence is already open (sequence {sequence_id:?})")]
    Conflict { sequence_id: Option<i64> },

    /// Item or end command arrived with no open sequence
    #[error("No open sequence; start one first")]
    NoOpenSequence,

    /// Media kind outside the supported set
    #[error("Unsupported media kind: {0}")]
    UnsupportedKind(String),

    /// Referenced sequence does not exist
    #[error("Sequence {0} not found")]
    NotFound(i64),

    /// Replay was requested for a sequence that has not been closed
    #[error("Sequence {0} is still open")]
    StillOpen(i64),

    /// Underlying persistence failure
    #[error("Storage failure: {0}")]
    Storage(#[source] DatabaseError),
}

/// A single failed delivery during replay.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The transport rejected the payload reference
    #[error("Transport rejected payload: {0}")]
    Rejected(String),

    /// The transport could not be reached
    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg) => match code.code {
                rusqlite::ErrorCode::DatabaseLocked | rusqlite::ErrorCode::DatabaseBusy => {
                    DatabaseError::Locked
                }
                _ => DatabaseError::QueryFailed(err.to_string()),
            },
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<DatabaseError> for SequenceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Conflict { .. } => SequenceError::Conflict { sequence_id: None },
            other => SequenceError::Storage(other),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}
