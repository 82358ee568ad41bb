/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Double-counting corrections
//!
//! The correction subtracted from the impurity self-energy to avoid
//! double-including interaction effects already captured by the DFT
//! functional. The scheme is selected once from configuration through a
//! closed enum; there is no fallthrough default.

use crate::input::DoubleCountingScheme;

/// Evaluate the double-counting potential for one impurity site
///
/// # Arguments
///
/// * `scheme` - The configured double-counting scheme
/// * `occupation` - Total occupation N of the correlated shell
/// * `l` - Angular momentum of the shell
///
/// # Returns
///
/// The double-counting potential in eV
pub fn dc_value(scheme: &DoubleCountingScheme, occupation: f64, l: u32) -> f64 {
    match *scheme {
        DoubleCountingScheme::FullyLocalizedLimit { u, j } => {
            u * (occupation - 0.5) - 0.5 * j * (occupation - 1.0)
        }
        DoubleCountingScheme::AroundMeanField { u, j } => {
            // Czyzyk-Sawatzky, spin-averaged: the mean orbital occupation
            // replaces the -1/2 self-interaction terms of the FLL form.
            let m = (2 * l + 1) as f64;
            let n_avg = occupation / (2.0 * m);
            u * (occupation - n_avg) - j * (0.5 * occupation - n_avg)
        }
        DoubleCountingScheme::Fixed(value) => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fll_known_value() {
        let scheme = DoubleCountingScheme::FullyLocalizedLimit { u: 4.0, j: 0.8 };
        // N = 1: U/2 - 0
        assert_relative_eq!(dc_value(&scheme, 1.0, 2), 2.0, epsilon = 1e-12);
        // N = 3: 4*(2.5) - 0.4*2 = 9.2
        assert_relative_eq!(dc_value(&scheme, 3.0, 2), 9.2, epsilon = 1e-12);
    }

    #[test]
    fn test_amf_fll_ordering_across_half_filling() {
        let u = 4.0;
        let j = 0.8;
        let fll = DoubleCountingScheme::FullyLocalizedLimit { u, j };
        let amf = DoubleCountingScheme::AroundMeanField { u, j };
        // Above half filling the mean orbital occupation exceeds 1/2,
        // so the AMF potential sits below the FLL one
        let n = 8.0;
        assert!(dc_value(&amf, n, 2) < dc_value(&fll, n, 2));
        // Below half filling the ordering flips
        let n = 2.0;
        assert!(dc_value(&amf, n, 2) > dc_value(&fll, n, 2));
    }

    #[test]
    fn test_fixed_passthrough() {
        let scheme = DoubleCountingScheme::Fixed(3.25);
        assert_relative_eq!(dc_value(&scheme, 7.0, 2), 3.25, epsilon = 1e-15);
    }
}
