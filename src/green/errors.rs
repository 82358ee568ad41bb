/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Error types for the Green's-function engine

use thiserror::Error;

/// Errors raised while building lattice/local Green's functions
#[derive(Error, Debug)]
pub enum GreenError {
    /// Operand shapes disagree with the engine bookkeeping
    #[error("Dimension mismatch: {0}")]
    Dimension(String),

    /// The inverse lattice Green's function is singular at one point
    #[error(
        "Singular lattice Green's function at kpoint {kpt}, spin {spin}, \
         frequency index {freq}"
    )]
    SingularLattice {
        /// k-point index
        kpt: usize,
        /// Spin index
        spin: usize,
        /// Frequency index
        freq: usize,
    },

    /// A local Green's function could not be inverted
    #[error(
        "Singular local Green's function for site {site} at spin {spin}, \
         frequency index {freq}"
    )]
    SingularLocal {
        /// Impurity site index
        site: usize,
        /// Spin index
        spin: usize,
        /// Frequency index
        freq: usize,
    },

    /// The requested operation needs a different frequency axis
    #[error("Frequency-axis mismatch: {0}")]
    Axis(String),

    /// The chemical-potential search could not bracket or converge
    #[error(
        "Chemical-potential search failed: target {target} electrons not \
         reached within [{lo}, {hi}] after {iterations} iterations"
    )]
    MuSearch {
        /// Target electron count
        target: f64,
        /// Final lower bracket
        lo: f64,
        /// Final upper bracket
        hi: f64,
        /// Iterations spent
        iterations: usize,
    },

    /// Error from the basis mapper
    #[error("Basis mapping error: {0}")]
    Basis(#[from] crate::basis::BasisError),

    /// Error from the linear algebra kernels
    #[error("Linear algebra error: {0}")]
    Linalg(#[from] crate::utils::UtilsError),
}

/// A specialized Result type for Green's-function operations
pub type Result<T> = std::result::Result<T, GreenError>;
