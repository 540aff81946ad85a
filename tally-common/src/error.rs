//! Common error types for Stock Tally

use thiserror::Error;

/// Common result type for Stock Tally operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the Stock Tally crates
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or incomplete backend configuration, or a bad bootstrap file
    #[error("Configuration error: {0}")]
    Config(String),

    /// Lookup, health probe or export failure (transport, status or body)
    #[error("Network error: {0}")]
    Network(String),

    /// Malformed payload received from the backend
    #[error("Validation error: {0}")]
    Validation(String),

    /// Ledger operation on an index outside the ledger
    #[error("Index {index} out of range for ledger of {len} entries")]
    Index { index: usize, len: usize },

    /// Action refused because the backend health probe failed
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Feedback (vibration or audio cue) could not be dispatched
    #[error("Feedback error: {0}")]
    Feedback(String),

    /// The scan controller task is no longer running
    #[error("Scan controller stopped")]
    ControllerStopped,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
