/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Error types for the DFT data model

use thiserror::Error;

/// Errors that can occur while assembling adaptor-provided DFT data
#[derive(Error, Debug)]
pub enum DftError {
    /// Arrays supplied by the adaptor disagree in their dimensions
    #[error("Inconsistent dimensions: {0}")]
    InconsistentDimensions(String),

    /// An orbital descriptor could not be interpreted
    #[error("Unknown orbital descriptor '{0}'")]
    UnknownDescriptor(String),

    /// A scalar parameter is outside its physical range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Underlying filesystem error while reading an interchange file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line in an interchange file could not be parsed
    #[error("Malformed interchange file {file} at line {line}: {reason}")]
    Malformed {
        /// File being read
        file: String,
        /// 1-based line number
        line: usize,
        /// What went wrong
        reason: String,
    },
}

/// A specialized Result type for DFT data operations
pub type Result<T> = std::result::Result<T, DftError>;
