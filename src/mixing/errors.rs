/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Error types for self-energy mixing

use thiserror::Error;

/// Errors raised by self-energy mixers
#[derive(Error, Debug)]
pub enum MixingError {
    /// Blending factor outside `[0, 1]`
    #[error("Mixing factor {0} is outside [0, 1]")]
    InvalidFactor(f64),

    /// Stored history and the supplied set have different site counts
    #[error("Mixer history holds {stored} sites but {supplied} were supplied")]
    HistoryMismatch {
        /// Sites in the stored history
        stored: usize,
        /// Sites in the supplied set
        supplied: usize,
    },

    /// Per-site array shapes disagree with the history
    #[error("Self-energy shape mismatch: {0}")]
    ShapeMismatch(String),
}

/// A specialized Result type for mixing operations
pub type Result<T> = std::result::Result<T, MixingError>;
