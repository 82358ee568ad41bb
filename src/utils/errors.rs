/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Error types for the utils module

use thiserror::Error;

/// Errors that can occur in the utils module
#[derive(Error, Debug)]
pub enum UtilsError {
    /// Generic error with a message
    #[error("Utility error: {0}")]
    Generic(String),

    /// Matrix dimension mismatch
    #[error("Matrix dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Singular matrix encountered during inversion
    #[error("Singular matrix: pivot {pivot} below threshold at column {column}")]
    SingularMatrix {
        /// Magnitude of the offending pivot
        pivot: f64,
        /// Column index where elimination broke down
        column: usize,
    },

    /// Eigensolver failed to converge
    #[error("Eigensolver did not converge after {sweeps} sweeps (off-diagonal norm {off_norm})")]
    EigenNotConverged {
        /// Number of Jacobi sweeps performed
        sweeps: usize,
        /// Remaining off-diagonal Frobenius norm
        off_norm: f64,
    },
}

/// A specialized Result type for utils operations
pub type Result<T> = std::result::Result<T, UtilsError>;
