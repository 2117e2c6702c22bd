//! Error taxonomy of the reminder core. Only [ValidationError] ever reaches a caller of the
//! core operations; [PersistenceError] is logged where it happens and [UnknownActionError] is
//! turned into a response.

use thiserror::Error;

/// Rejection of a single malformed activity record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown activity type `{0}`")]
    UnknownType(String),

    #[error("timestamp must be a finite non-negative integer, got {0}")]
    InvalidTimestamp(String),
}

/// Storage read or write failure.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Inbound message of a kind the daemon does not handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown action")]
pub struct UnknownActionError;

/// Invalid wall-clock time for the daily alarm.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid time of day {hours:02}:{minutes:02}")]
pub struct ScheduleError {
    pub hours: u32,
    pub minutes: u32,
}
