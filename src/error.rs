//! Trip log error types
//!
//! Defines the errors surfaced by the record, persistence and export layers.
//! Index operations never fail with an error: out-of-range reads return
//! `None` and out-of-range removals return `false`.

use thiserror::Error;

/// Errors that can occur while building, loading or exporting trips
#[derive(Error, Debug)]
pub enum TripError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Trip violates a record invariant (end before start, bad distance)
    #[error("Invalid trip: {0}")]
    InvalidTrip(String),

    /// CSV writing failed
    #[error("CSV error: {0}")]
    Csv(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for TripError {
    fn from(err: serde_json::Error) -> Self {
        TripError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for TripError {
    fn from(err: csv::Error) -> Self {
        TripError::Csv(err.to_string())
    }
}

/// Result type alias for trip log operations
pub type TripResult<T> = Result<T, TripError>;
