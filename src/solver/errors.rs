/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Error types for the impurity-solver exchange layer

use thiserror::Error;

/// Errors raised while exchanging data with an impurity solver
#[derive(Error, Debug)]
pub enum SolverError {
    /// Underlying filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line in an exchange file could not be parsed
    #[error("Malformed exchange file {file} at line {line}: {reason}")]
    Format {
        /// File being read
        file: String,
        /// 1-based line number
        line: usize,
        /// What went wrong
        reason: String,
    },

    /// An expected exchange file never appeared
    #[error("Solver output {0} did not appear before the timeout")]
    Timeout(String),

    /// The exchange file disagrees with the expected dimensions
    #[error("Exchange dimension mismatch: {0}")]
    Dimension(String),

    /// The task file holds an unknown task label
    #[error("Unknown solver task '{0}'")]
    UnknownTask(String),
}

/// A specialized Result type for solver-exchange operations
pub type Result<T> = std::result::Result<T, SolverError>;
