/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Error types for the projector module

use thiserror::Error;

/// Errors raised during group setup and projector transformation
#[derive(Error, Debug)]
pub enum ProjectorError {
    /// The shell label has no entry in the rotation table
    #[error("Unrecognized shell label '{0}'")]
    UnknownShell(String),

    /// Declared impurity sites and discovered raw groups do not match up
    #[error("Shell declaration mismatch: {0}")]
    ShellMismatch(String),

    /// A group does not have exactly 2l+1 raw projectors
    #[error("Group at site {site} with l={l} has {found} projectors, expected {expected}")]
    IncompleteShell {
        /// Site index
        site: usize,
        /// Angular momentum
        l: u32,
        /// Number of raw projectors found
        found: usize,
        /// Expected 2l+1 count
        expected: usize,
    },

    /// Rotation matrix has the wrong number of columns
    #[error("Rotation matrix for site {site} has {cols} columns, expected {expected}")]
    RotationShape {
        /// Site index
        site: usize,
        /// Column count found
        cols: usize,
        /// Expected 2l+1 column count
        expected: usize,
    },

    /// The overlap matrix is not positive definite
    #[error(
        "Overlap not positive definite for group {group} at kpoint {kpt}, spin {spin} \
         (smallest eigenvalue {eigenvalue})"
    )]
    NotPositiveDefinite {
        /// Group index
        group: usize,
        /// k-point index
        kpt: usize,
        /// Spin index
        spin: usize,
        /// Offending eigenvalue
        eigenvalue: f64,
    },

    /// Tensor dimensions disagree with the group bookkeeping
    #[error("Dimension mismatch: {0}")]
    Dimension(String),

    /// Error from the linear algebra kernels
    #[error("Linear algebra error: {0}")]
    Linalg(#[from] crate::utils::UtilsError),
}

/// A specialized Result type for projector operations
pub type Result<T> = std::result::Result<T, ProjectorError>;
