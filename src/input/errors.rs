/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Error types for configuration handling

use thiserror::Error;

/// Errors raised while loading or validating the control structure
#[derive(Error, Debug)]
pub enum InputError {
    /// The configuration file could not be read
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A configuration value is outside its allowed range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A specialized Result type for configuration operations
pub type Result<T> = std::result::Result<T, InputError>;
