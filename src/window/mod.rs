/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Band-window resolution
//!
//! Each correlated subspace keeps only a contiguous range of Kohn-Sham
//! bands. The range may be given directly as a pair of band indices
//! (identical for every k-point and spin) or as an energy window that is
//! resolved per (k-point, spin) against the calibrated eigenvalues.

pub mod errors;

pub use errors::{Result, WindowError};

use crate::dft::BandStructure;
use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// Specification of a band window, before resolution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BoundSpec {
    /// Absolute band indices (0-based, inclusive), identical for all (k, spin)
    Bands {
        /// Lower band index
        lo: usize,
        /// Upper band index
        hi: usize,
    },
    /// Energy bounds relative to the Fermi level
    Energy {
        /// Lower energy bound
        emin: f64,
        /// Upper energy bound
        emax: f64,
    },
}

/// A resolved band window for one projector group
///
/// `kwin[kpt, spin, 0]` and `kwin[kpt, spin, 1]` hold the inclusive
/// lower and upper band indices. The invariant `lo <= hi` holds for
/// every (k, spin); resolution fails rather than produce an empty range.
#[derive(Debug, Clone)]
pub struct Window {
    /// Resolved per-(k, spin) band ranges
    pub kwin: Array3<usize>,
    /// Maximum band count across all (k, spin)
    pub max_width: usize,
}

impl Window {
    /// Inclusive band range at one (k, spin)
    pub fn range(&self, kpt: usize, spin: usize) -> (usize, usize) {
        (self.kwin[(kpt, spin, 0)], self.kwin[(kpt, spin, 1)])
    }

    /// Number of bands inside the window at one (k, spin)
    pub fn width(&self, kpt: usize, spin: usize) -> usize {
        let (lo, hi) = self.range(kpt, spin);
        hi - lo + 1
    }

    /// Number of k-points this window was resolved on
    pub fn nkpt(&self) -> usize {
        self.kwin.dim().0
    }

    /// Number of spin channels this window was resolved on
    pub fn nspin(&self) -> usize {
        self.kwin.dim().1
    }
}

/// Resolve one window specification against the band structure
///
/// # Arguments
///
/// * `spec` - Band-index or energy bounds
/// * `bands` - Calibrated band structure (Fermi level at zero)
///
/// # Returns
///
/// The resolved window, or an error if the specification selects no
/// bands globally or at any individual (k, spin)
pub fn resolve(spec: &BoundSpec, bands: &BandStructure) -> Result<Window> {
    let nband = bands.nband();
    let nkpt = bands.nkpt();
    let nspin = bands.nspin();

    let mut kwin = Array3::<usize>::zeros((nkpt, nspin, 2));

    match *spec {
        BoundSpec::Bands { lo, hi } => {
            if lo > hi || hi >= nband {
                return Err(WindowError::InvalidBandBounds { lo, hi, nband });
            }
            for k in 0..nkpt {
                for s in 0..nspin {
                    kwin[(k, s, 0)] = lo;
                    kwin[(k, s, 1)] = hi;
                }
            }
            Ok(Window {
                kwin,
                max_width: hi - lo + 1,
            })
        }
        BoundSpec::Energy { emin, emax } => {
            // Detect a fully disjoint window once, up front, instead of
            // failing on the first k-point inside the scan.
            let band_min = bands.enk.iter().cloned().fold(f64::INFINITY, f64::min);
            let band_max = bands.enk.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            if emax < band_min || emin > band_max {
                return Err(WindowError::NoOverlap {
                    emin,
                    emax,
                    band_min,
                    band_max,
                });
            }

            let mut max_width = 0;
            for k in 0..nkpt {
                for s in 0..nspin {
                    // Scan outward from the band edges: smallest band with
                    // enk >= emin, largest band with enk <= emax.
                    let mut lo = 0;
                    while lo < nband && bands.enk[(lo, k, s)] < emin {
                        lo += 1;
                    }
                    let mut hi = nband;
                    while hi > 0 && bands.enk[(hi - 1, k, s)] > emax {
                        hi -= 1;
                    }

                    if lo >= hi {
                        return Err(WindowError::EmptyWindow { kpt: k, spin: s });
                    }
                    let hi = hi - 1;

                    kwin[(k, s, 0)] = lo;
                    kwin[(k, s, 1)] = hi;
                    max_width = max_width.max(hi - lo + 1);
                }
            }

            Ok(Window { kwin, max_width })
        }
    }
}

/// Resolve the bound list for all projector groups
///
/// A single specification is shared by every group; otherwise the list
/// must supply exactly one specification per group, in group order.
///
/// # Arguments
///
/// * `specs` - One shared bound, or one per group
/// * `ngroups` - Number of projector groups
/// * `bands` - Calibrated band structure
///
/// # Returns
///
/// One resolved window per group
pub fn resolve_all(specs: &[BoundSpec], ngroups: usize, bands: &BandStructure) -> Result<Vec<Window>> {
    if specs.len() == 1 {
        let shared = resolve(&specs[0], bands)?;
        return Ok(vec![shared; ngroups]);
    }
    if specs.len() != ngroups {
        return Err(WindowError::BadMultiplicity {
            found: specs.len(),
            ngroups,
        });
    }
    specs.iter().map(|spec| resolve(spec, bands)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3 as A3;

    fn bands_from(enk: A3<f64>) -> BandStructure {
        let occupy = A3::zeros(enk.dim());
        BandStructure::new(enk, occupy).unwrap()
    }

    #[test]
    fn test_energy_window_scenario() {
        // Single k-point, single spin, eigenvalues -2.0 .. 1.5;
        // window [-1, 1] must keep the middle three bands.
        let values = [-2.0, -0.5, 0.2, 0.9, 1.5];
        let enk = A3::from_shape_fn((5, 1, 1), |(b, _, _)| values[b]);
        let bands = bands_from(enk);

        let window = resolve(
            &BoundSpec::Energy {
                emin: -1.0,
                emax: 1.0,
            },
            &bands,
        )
        .unwrap();

        assert_eq!(window.range(0, 0), (1, 3));
        assert_eq!(window.width(0, 0), 3);
        assert_eq!(window.max_width, 3);
    }

    #[test]
    fn test_band_bounds_identical_everywhere() {
        let enk = A3::from_shape_fn((6, 3, 2), |(b, _, _)| b as f64);
        let bands = bands_from(enk);

        let window = resolve(&BoundSpec::Bands { lo: 1, hi: 4 }, &bands).unwrap();
        for k in 0..3 {
            for s in 0..2 {
                assert_eq!(window.range(k, s), (1, 4));
            }
        }
    }

    #[test]
    fn test_no_overlap_fails_fast() {
        let enk = A3::from_shape_fn((3, 2, 1), |(b, _, _)| b as f64);
        let bands = bands_from(enk);

        let err = resolve(
            &BoundSpec::Energy {
                emin: 10.0,
                emax: 20.0,
            },
            &bands,
        )
        .unwrap_err();
        assert!(matches!(err, WindowError::NoOverlap { .. }));
    }

    #[test]
    fn test_empty_window_at_one_kpoint_raises() {
        // k = 0 has a band inside [0.4, 0.6]; k = 1 does not.
        let enk = A3::from_shape_fn((2, 2, 1), |(b, k, _)| {
            if k == 0 {
                0.5 * b as f64
            } else {
                2.0 + b as f64
            }
        });
        let bands = bands_from(enk);

        let err = resolve(
            &BoundSpec::Energy {
                emin: 0.4,
                emax: 0.6,
            },
            &bands,
        )
        .unwrap_err();
        assert!(matches!(err, WindowError::EmptyWindow { kpt: 1, spin: 0 }));
    }

    #[test]
    fn test_invalid_band_bounds() {
        let enk = A3::zeros((4, 1, 1));
        let bands = bands_from(enk);
        assert!(matches!(
            resolve(&BoundSpec::Bands { lo: 2, hi: 7 }, &bands),
            Err(WindowError::InvalidBandBounds { .. })
        ));
        assert!(matches!(
            resolve(&BoundSpec::Bands { lo: 3, hi: 1 }, &bands),
            Err(WindowError::InvalidBandBounds { .. })
        ));
    }

    #[test]
    fn test_shared_versus_per_group_multiplicity() {
        let enk = A3::from_shape_fn((4, 2, 1), |(b, _, _)| b as f64 - 1.5);
        let bands = bands_from(enk);
        let spec = BoundSpec::Bands { lo: 0, hi: 3 };

        // Shared: one spec, three groups
        let shared = resolve_all(&[spec], 3, &bands).unwrap();
        assert_eq!(shared.len(), 3);

        // Per group: three specs, three groups
        let per_group = resolve_all(&[spec, spec, spec], 3, &bands).unwrap();
        assert_eq!(per_group.len(), 3);

        // Anything else is rejected
        assert!(matches!(
            resolve_all(&[spec, spec], 3, &bands),
            Err(WindowError::BadMultiplicity {
                found: 2,
                ngroups: 3
            })
        ));
    }
}
