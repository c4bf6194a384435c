//! Core error types for flexcal-core.
//!
//! `SchedulerError` is what every public operation surfaces to its caller.
//! The store, calendar and config layers have their own enums which lift
//! into it through `From`, so `?` carries collaborator failures upward
//! without losing their source.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::event::EventId;

/// Error type surfaced by slot finding, event construction and optimization.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The permitted window is malformed or too small for the duration.
    #[error("Invalid window {valid_start} - {valid_end} for a {duration_minutes} minute event")]
    InvalidWindow {
        valid_start: DateTime<Utc>,
        valid_end: DateTime<Utc>,
        duration_minutes: i64,
    },

    /// Every gap in the window was too short.
    #[error("No {duration_minutes}-minute slot between {valid_start} and {valid_end}")]
    NoAvailableSlot {
        valid_start: DateTime<Utc>,
        valid_end: DateTime<Utc>,
        duration_minutes: i64,
    },

    /// The solver produced no usable assignment.
    #[error("Optimization failed: {0}")]
    OptimizationFailed(String),

    /// Event store I/O failed.
    #[error("Event store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// External calendar I/O failed.
    #[error("Calendar service unavailable: {0}")]
    CalendarServiceUnavailable(#[from] CalendarError),

    /// An event violates one of its invariants.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Event invariant violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("summary cannot be empty")]
    EmptySummary,

    #[error("end ({end}) must be after start ({start})")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("event {start} - {end} lies outside its window {valid_start} - {valid_end}")]
    OutsideWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        valid_start: DateTime<Utc>,
        valid_end: DateTime<Utc>,
    },

    #[error("event has not been stored yet")]
    MissingId,

    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Event store errors.
#[derive(Error, Debug)]
pub enum StoreError {
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

    #[error("No event with id {0}")]
    NotFound(EventId),

    #[error("No event with external id {0}")]
    ExternalIdNotFound(String),

    #[error("Event with external id {0} already exists")]
    DuplicateExternalId(String),

    /// A row could not be turned back into a valid event
    #[error("Corrupt event row {id}: {message}")]
    CorruptRow { id: i64, message: String },

    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// External calendar errors.
#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Calendar API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed calendar event: {0}")]
    Malformed(String),

    #[error("Calendar event {0} not found")]
    NotFound(String),

    #[error("Invalid calendar endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
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

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for SchedulerError {
    fn from(err: rusqlite::Error) -> Self {
        SchedulerError::StoreUnavailable(err.into())
    }
}

impl From<good_lp::ResolutionError> for SchedulerError {
    fn from(err: good_lp::ResolutionError) -> Self {
        SchedulerError::OptimizationFailed(err.to_string())
    }
}

/// Result type alias for SchedulerError
pub type Result<T, E = SchedulerError> = std::result::Result<T, E>;
