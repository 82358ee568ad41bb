/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Utility functions for DFT+DMFT calculations
//!
//! This module provides common utilities used throughout the crate:
//! unit conversions, physical constants, and the dense complex linear
//! algebra kernels that the downfolding engine relies on.

pub mod errors;
pub mod linear_algebra;

pub use errors::{Result, UtilsError};
pub use linear_algebra::{adjoint, eigh, faer_to_ndarray, invert_complex, ndarray_to_faer};

/// Physical constants
pub mod constants {
    /// Rydberg energy in eV
    pub const RYDBERG: f64 = 13.6057;

    /// Conversion from eV to Hartree
    pub const EV_TO_HARTREE: f64 = 1.0 / (2.0 * RYDBERG);

    /// Conversion from Hartree to eV
    pub const HARTREE_TO_EV: f64 = 2.0 * RYDBERG;

    /// Boltzmann constant in eV/K
    pub const KB_EV: f64 = 8.617333262e-5;
}

/// Convert energy from eV to Hartree
pub fn ev_to_hartree(ev: f64) -> f64 {
    ev * constants::EV_TO_HARTREE
}

/// Convert energy from Hartree to eV
pub fn hartree_to_ev(hartree: f64) -> f64 {
    hartree * constants::HARTREE_TO_EV
}

/// Convert a temperature in Kelvin to the inverse temperature beta in 1/eV
pub fn temperature_to_beta(kelvin: f64) -> f64 {
    1.0 / (constants::KB_EV * kelvin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_energy_conversions_roundtrip() {
        let ev = 13.6057 * 2.0;
        assert_relative_eq!(ev_to_hartree(ev), 1.0, epsilon = 1e-12);
        assert_relative_eq!(hartree_to_ev(ev_to_hartree(ev)), ev, epsilon = 1e-12);
    }

    #[test]
    fn test_temperature_to_beta() {
        // Room temperature is roughly 1/40 eV
        let beta = temperature_to_beta(300.0);
        assert_relative_eq!(1.0 / beta, 0.02585, epsilon = 1e-4);
    }
}
