//! Core error types for focusguard-core.
//!
//! One umbrella [`CoreError`] with per-subsystem enums underneath, so each
//! layer can return its own error and callers higher up still get a single
//! type to match on.

use thiserror::Error;

/// Core error type for focusguard-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Session store / database errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Group session errors
    #[error("Group error: {0}")]
    Group(#[from] GroupError),

    /// Alarm scheduling errors
    #[error("Alarm error: {0}")]
    Alarm(#[from] AlarmError),

    /// Missing platform permissions
    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Session store and schedule database errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the database file
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: std::path::PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A schedule status was asked to move backwards
    #[error("Invalid schedule transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    /// No schedule with the given id
    #[error("Schedule not found: {0}")]
    ScheduleNotFound(String),
}

/// Group session errors. `JoinInvalid` and `JoinExpired` are deliberately
/// distinct so the UI can tell "no such code" from "window already over".
#[derive(Error, Debug)]
pub enum GroupError {
    /// Invite code already taken after exhausting retries
    #[error("Could not allocate a unique invite code")]
    CodeCollision,

    /// Invite code does not resolve to a joinable session
    #[error("No open session with that invite code")]
    JoinInvalid,

    /// The session behind the code has already ended
    #[error("That session's window is already over")]
    JoinExpired,

    /// Remote call failed; local state untouched
    #[error("Group service unavailable: {0}")]
    RemoteUnavailable(String),

    /// No signed-in user
    #[error("Not signed in")]
    NotSignedIn,

    /// No group remote configured
    #[error("Group sync is not configured")]
    NotConfigured,
}

/// Alarm scheduling errors.
#[derive(Error, Debug)]
pub enum AlarmError {
    /// The OS refused precise wake scheduling. Callers fall back to the
    /// foreground tick path (degraded but functional).
    #[error("Precise wake scheduling denied: {0}")]
    Denied(String),

    /// Spawning the scheduling helper failed
    #[error("Failed to invoke wake scheduler: {0}")]
    SpawnFailed(String),
}

/// Missing platform permissions. Surfaced to the user, never retried
/// automatically.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionError {
    #[error("Foreground-app query permission not granted")]
    ForegroundQueryMissing,

    #[error("Overlay permission not granted")]
    OverlayMissing,
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end ({end}) must be after start ({start})")]
    InvalidTimeRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    /// Empty collection
    #[error("Empty collection: {0}")]
    EmptyCollection(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::QueryFailed(err.to_string())
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Store(StoreError::from(err))
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
