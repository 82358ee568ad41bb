/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Error types for iteration bookkeeping

use thiserror::Error;

/// Errors raised by the iteration state machine
#[derive(Error, Debug)]
pub enum CycleError {
    /// Underlying filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted iteration record could not be parsed
    #[error("Cannot parse iteration record: {0}")]
    Parse(#[from] serde_json::Error),

    /// The requested axis does not exist in the current mode
    #[error("Iteration axis {axis} is not available in a {mode} calculation")]
    AxisUnavailable {
        /// Axis that was requested
        axis: String,
        /// Human-readable mode name
        mode: String,
    },

    /// An iteration cap was exceeded
    #[error("Iteration limit reached: {0}")]
    LimitExceeded(String),

    /// A lock file did not clear before the timeout
    #[error("Lock file {0} did not clear before the timeout")]
    LockTimeout(String),
}

/// A specialized Result type for iteration bookkeeping
pub type Result<T> = std::result::Result<T, CycleError>;
