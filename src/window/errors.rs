/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Error types for band-window resolution

use thiserror::Error;

/// Errors raised while resolving band/energy windows
#[derive(Error, Debug)]
pub enum WindowError {
    /// The energy window misses the band structure entirely
    #[error(
        "Energy window [{emin}, {emax}] has no overlap with the band structure \
         (eigenvalues span [{band_min}, {band_max}])"
    )]
    NoOverlap {
        /// Requested lower energy bound
        emin: f64,
        /// Requested upper energy bound
        emax: f64,
        /// Global minimum eigenvalue
        band_min: f64,
        /// Global maximum eigenvalue
        band_max: f64,
    },

    /// No band falls inside the window at a particular (k, spin)
    #[error("Empty band window at kpoint {kpt}, spin {spin}")]
    EmptyWindow {
        /// k-point index
        kpt: usize,
        /// Spin index
        spin: usize,
    },

    /// Band-index bounds are malformed
    #[error("Invalid band bounds [{lo}, {hi}] for {nband} bands")]
    InvalidBandBounds {
        /// Requested lower band index
        lo: usize,
        /// Requested upper band index
        hi: usize,
        /// Number of bands available
        nband: usize,
    },

    /// The bound list length matches neither the shared nor the per-group convention
    #[error("Bound list has {found} entries; expected 1 (shared) or {ngroups} (per group)")]
    BadMultiplicity {
        /// Number of bound specifications supplied
        found: usize,
        /// Number of projector groups
        ngroups: usize,
    },
}

/// A specialized Result type for window operations
pub type Result<T> = std::result::Result<T, WindowError>;
