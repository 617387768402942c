//! Core error types for roundtrack-core.
//!
//! Local state changes are validated up front and otherwise cannot fail;
//! the only errors that reach a caller come from validation, storage,
//! configuration and the remote sync boundary.

use std::path::PathBuf;
use thiserror::Error;

use crate::sync::SyncError;

/// Core error type for roundtrack-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Remote sync errors
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// A data-loss operation was requested without confirmation
    #[error("'{operation}' discards data and requires explicit confirmation")]
    ConfirmationRequired { operation: &'static str },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
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

    /// Stored row could not be decoded
    #[error("Corrupt row in '{table}': {message}")]
    CorruptRow { table: &'static str, message: String },

    /// Row not found
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,
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

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// No usable data directory
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
///
/// Raised at the boundary before any state is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Timer thresholds out of order or out of range
    #[error("Thresholds must satisfy 0 <= red ({red}) < orange ({orange}) < yellow ({yellow}) <= 100")]
    UnorderedThresholds { yellow: u8, orange: u8, red: u8 },

    /// Timer duration must be positive
    #[error("Timer duration must be at least one minute")]
    ZeroDuration,

    /// Counter delta must be positive
    #[error("Counter delta must be greater than zero")]
    ZeroDelta,

    /// Field id does not exist in the process definition
    #[error("Unknown field '{field}' for process '{process}'")]
    UnknownField { process: String, field: String },

    /// Derived fields are computed, never edited
    #[error("Field '{0}' is derived and cannot be edited")]
    DerivedField(String),

    /// Field belongs to a different process than the active one
    #[error("Field '{field}' does not belong to process '{process}'")]
    FieldProcessMismatch { process: String, field: String },

    /// Unknown process type
    #[error("Unknown process type '{0}'")]
    UnknownProcess(String),

    /// Level table must be strictly increasing and start at zero XP
    #[error("Invalid level table: {0}")]
    InvalidLevelTable(String),

    /// Invalid date range
    #[error("Invalid date range: start ({start}) is after end ({end})")]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    /// Operation not allowed while a round is in progress
    #[error("Cannot {0} while a round is in progress")]
    RoundInProgress(&'static str),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
