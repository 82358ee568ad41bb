/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Error types for the basis mapper

use thiserror::Error;

/// Errors raised by the embedding/projection maps
#[derive(Error, Debug)]
pub enum BasisError {
    /// Operand shapes disagree with the overlap block
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
}

/// A specialized Result type for basis-mapping operations
pub type Result<T> = std::result::Result<T, BasisError>;
