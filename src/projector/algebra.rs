/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Projector transforms: rotate, filter, orthogonalize
//!
//! Three pure operations applied in this order turn the raw projector
//! tensor into a well-defined local basis. Rotation applies the group's
//! symmetry-adapted matrix, filtering slices the band axis down to the
//! resolved window, and Löwdin orthogonalization makes the local
//! orbitals an orthonormal set before any physical quantity is computed
//! from them.

use super::errors::{ProjectorError, Result};
use super::group::ProjectorGroup;
use crate::utils::{adjoint, eigh};
use crate::window::Window;
use ndarray::{Array2, Array4};
use num_complex::Complex64;

/// Eigenvalues of the overlap below this threshold signal linearly
/// dependent or ill-windowed projectors.
const OVERLAP_EIGENVALUE_FLOOR: f64 = 1e-12;

/// Rotate the raw projector slice of one group into its symmetry-adapted
/// local orbitals
///
/// The rotation matrix `Tr` (shape `ndim x (2l+1)`) is applied
/// independently at every (band, kpoint, spin).
///
/// # Arguments
///
/// * `chipsi` - Raw projector tensor `[proj, band, kpt, spin]`
/// * `group` - The projector group whose raw indices and `Tr` to use
///
/// # Returns
///
/// The rotated tensor, shape `(ndim, nband, nkpt, nspin)`
pub fn rotate(chipsi: &ndarray::Array4<Complex64>, group: &ProjectorGroup) -> Result<Array4<Complex64>> {
    let multiplicity = group.multiplicity();
    if group.tr.ncols() != multiplicity {
        return Err(ProjectorError::RotationShape {
            site: group.site,
            cols: group.tr.ncols(),
            expected: multiplicity,
        });
    }
    if group.raw_indices.len() != multiplicity {
        return Err(ProjectorError::Dimension(format!(
            "group at site {} lists {} raw indices for multiplicity {}",
            group.site,
            group.raw_indices.len(),
            multiplicity
        )));
    }

    let (nproj, nband, nkpt, nspin) = chipsi.dim();
    if let Some(&bad) = group.raw_indices.iter().find(|&&p| p >= nproj) {
        return Err(ProjectorError::Dimension(format!(
            "raw projector index {} out of range ({} projectors)",
            bad, nproj
        )));
    }

    let ndim = group.ndim();
    let mut rotated = Array4::<Complex64>::zeros((ndim, nband, nkpt, nspin));

    for s in 0..nspin {
        for k in 0..nkpt {
            for b in 0..nband {
                for q in 0..ndim {
                    let mut sum = Complex64::new(0.0, 0.0);
                    for (m, &p) in group.raw_indices.iter().enumerate() {
                        sum += group.tr[(q, m)] * chipsi[(p, b, k, s)];
                    }
                    rotated[(q, b, k, s)] = sum;
                }
            }
        }
    }

    Ok(rotated)
}

/// Slice the rotated tensor's band axis down to the resolved window
///
/// Each (k, spin) slice is left-justified into a fixed-size buffer of
/// width `window.max_width`; trailing band slots beyond the local window
/// width stay zero.
///
/// # Arguments
///
/// * `rotated` - Rotated projector tensor `(ndim, nband, nkpt, nspin)`
/// * `window` - The group's resolved band window
///
/// # Returns
///
/// The filtered tensor, shape `(ndim, max_width, nkpt, nspin)`
pub fn filter(rotated: &Array4<Complex64>, window: &Window) -> Result<Array4<Complex64>> {
    let (ndim, nband, nkpt, nspin) = rotated.dim();
    if window.nkpt() != nkpt || window.nspin() != nspin {
        return Err(ProjectorError::Dimension(format!(
            "window resolved on ({}, {}) but tensor carries ({}, {})",
            window.nkpt(),
            window.nspin(),
            nkpt,
            nspin
        )));
    }

    let mut filtered = Array4::<Complex64>::zeros((ndim, window.max_width, nkpt, nspin));

    for s in 0..nspin {
        for k in 0..nkpt {
            let (lo, hi) = window.range(k, s);
            if hi >= nband {
                return Err(ProjectorError::Dimension(format!(
                    "window upper band {} exceeds band count {} at kpoint {}, spin {}",
                    hi, nband, k, s
                )));
            }
            for (slot, b) in (lo..=hi).enumerate() {
                for q in 0..ndim {
                    filtered[(q, slot, k, s)] = rotated[(q, b, k, s)];
                }
            }
        }
    }

    Ok(filtered)
}

/// Löwdin symmetric orthogonalization, in place, per (k, spin)
///
/// For each (k, spin) the projector block `M` (ndim x window width) is
/// replaced by `S M` with `S = V diag(1/sqrt(lambda)) V^H` from the
/// eigendecomposition of the overlap `O = M M^H`. Afterwards
/// `M M^H = I` holds to numerical tolerance. A zero or negative overlap
/// eigenvalue is fatal and reported with the offending (group, k, spin).
///
/// # Arguments
///
/// * `psi` - Filtered projector tensor `(ndim, max_width, nkpt, nspin)`, modified in place
/// * `window` - The group's resolved band window
/// * `group_index` - Index of the group, for error reporting only
pub fn orthogonalize(psi: &mut Array4<Complex64>, window: &Window, group_index: usize) -> Result<()> {
    let (ndim, _max_width, nkpt, nspin) = psi.dim();

    for s in 0..nspin {
        for k in 0..nkpt {
            let width = window.width(k, s);

            // Extract the active block
            let mut block = Array2::<Complex64>::zeros((ndim, width));
            for q in 0..ndim {
                for b in 0..width {
                    block[(q, b)] = psi[(q, b, k, s)];
                }
            }

            let overlap = block.dot(&adjoint(&block));
            let (eigenvalues, eigenvectors) = eigh(&overlap)?;

            if eigenvalues[0] <= OVERLAP_EIGENVALUE_FLOOR {
                return Err(ProjectorError::NotPositiveDefinite {
                    group: group_index,
                    kpt: k,
                    spin: s,
                    eigenvalue: eigenvalues[0],
                });
            }

            // S = V diag(1/sqrt(lambda)) V^H
            let mut scaled = eigenvectors.clone();
            for col in 0..ndim {
                let inv_sqrt = 1.0 / eigenvalues[col].sqrt();
                for row in 0..ndim {
                    scaled[(row, col)] *= inv_sqrt;
                }
            }
            let s_matrix = scaled.dot(&adjoint(&eigenvectors));
            let orthonormal = s_matrix.dot(&block);

            for q in 0..ndim {
                for b in 0..width {
                    psi[(q, b, k, s)] = orthonormal[(q, b)];
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dft::{BandStructure, ProjectorTrait};
    use crate::input::ImpuritySite;
    use crate::projector::group::build_registry;
    use crate::window::{resolve, BoundSpec};
    use approx::assert_relative_eq;
    use ndarray::Array3;

    fn t2g_group() -> ProjectorGroup {
        let traits: Vec<ProjectorTrait> = ["dxy", "dyz", "dz2", "dxz", "dx2-y2"]
            .iter()
            .map(|desc| ProjectorTrait::parse(0, desc).unwrap())
            .collect();
        let impurities = vec![ImpuritySite {
            site: 0,
            shell: "d_t2g".to_string(),
        }];
        build_registry(&traits, &impurities).unwrap().remove(0)
    }

    #[test]
    fn test_rotate_identity_projector_through_t2g() {
        // chipsi[p, b, k, s] = delta_{p, b}: rotation must reproduce the
        // selector rows {0, 1, 3} as delta peaks on the band axis.
        let group = t2g_group();
        let nband = 5;
        let mut chipsi = Array4::<Complex64>::zeros((5, nband, 2, 1));
        for p in 0..5 {
            for k in 0..2 {
                chipsi[(p, p, k, 0)] = Complex64::new(1.0, 0.0);
            }
        }

        let rotated = rotate(&chipsi, &group).unwrap();
        assert_eq!(rotated.dim(), (3, 5, 2, 1));

        let rows = [0usize, 1, 3];
        for k in 0..2 {
            for (q, &row) in rows.iter().enumerate() {
                for b in 0..nband {
                    let expected = if b == row { 1.0 } else { 0.0 };
                    assert_relative_eq!(rotated[(q, b, k, 0)].re, expected, epsilon = 1e-14);
                    assert_relative_eq!(rotated[(q, b, k, 0)].im, 0.0, epsilon = 1e-14);
                }
            }
        }
    }

    #[test]
    fn test_rotate_rejects_bad_tr_shape() {
        let mut group = t2g_group();
        group.tr = Array2::zeros((3, 4));
        let chipsi = Array4::<Complex64>::zeros((5, 5, 1, 1));
        assert!(matches!(
            rotate(&chipsi, &group),
            Err(ProjectorError::RotationShape { cols: 4, .. })
        ));
    }

    #[test]
    fn test_filter_zero_pads_trailing_slots() {
        // Window is [1, 2] at k=0 and [1, 3] at k=1, so max_width = 3 and
        // the k=0 slice must leave its last slot zero.
        let values_k0 = [-3.0, -0.5, 0.5, 3.0];
        let values_k1 = [-3.0, -0.5, 0.2, 0.9];
        let enk = Array3::from_shape_fn((4, 2, 1), |(b, k, _)| {
            if k == 0 {
                values_k0[b]
            } else {
                values_k1[b]
            }
        });
        let bands = BandStructure::new(enk, Array3::zeros((4, 2, 1))).unwrap();
        let window = resolve(
            &BoundSpec::Energy {
                emin: -1.0,
                emax: 1.0,
            },
            &bands,
        )
        .unwrap();
        assert_eq!(window.max_width, 3);

        let rotated = Array4::from_shape_fn((2, 4, 2, 1), |(q, b, k, _)| {
            Complex64::new((q * 100 + b * 10 + k) as f64, 0.0)
        });
        let filtered = filter(&rotated, &window).unwrap();
        assert_eq!(filtered.dim(), (2, 3, 2, 1));

        // k = 0: bands 1..=2 left-justified, slot 2 zero
        assert_relative_eq!(filtered[(0, 0, 0, 0)].re, 10.0, epsilon = 1e-14);
        assert_relative_eq!(filtered[(0, 1, 0, 0)].re, 20.0, epsilon = 1e-14);
        assert_relative_eq!(filtered[(0, 2, 0, 0)].re, 0.0, epsilon = 1e-14);

        // k = 1: bands 1..=3 fill all slots
        assert_relative_eq!(filtered[(1, 2, 1, 0)].re, 131.0, epsilon = 1e-14);
    }

    #[test]
    fn test_orthogonalize_restores_identity_overlap() {
        // Non-orthogonal starting blocks at each (k, spin)
        let ndim = 2;
        let width = 4;
        let mut psi = Array4::<Complex64>::zeros((ndim, width, 2, 1));
        for k in 0..2 {
            for b in 0..width {
                psi[(0, b, k, 0)] = Complex64::new(1.0 + b as f64, 0.1 * k as f64);
                psi[(1, b, k, 0)] = Complex64::new(0.5 * b as f64 + 0.2, -0.3);
            }
        }

        let kwin = Array3::from_shape_fn((2, 1, 2), |(_, _, edge)| if edge == 0 { 0 } else { 3 });
        let window = Window { kwin, max_width: 4 };

        orthogonalize(&mut psi, &window, 0).unwrap();

        for k in 0..2 {
            let mut block = Array2::<Complex64>::zeros((ndim, width));
            for q in 0..ndim {
                for b in 0..width {
                    block[(q, b)] = psi[(q, b, k, 0)];
                }
            }
            let overlap = block.dot(&adjoint(&block));
            for i in 0..ndim {
                for j in 0..ndim {
                    let expected = if i == j { 1.0 } else { 0.0 };
                    assert_relative_eq!(overlap[(i, j)].re, expected, epsilon = 1e-10);
                    assert_relative_eq!(overlap[(i, j)].im, 0.0, epsilon = 1e-10);
                }
            }
        }
    }

    #[test]
    fn test_orthogonalize_rejects_linear_dependence() {
        // Two identical rows make the overlap singular
        let mut psi = Array4::<Complex64>::zeros((2, 3, 1, 1));
        for b in 0..3 {
            psi[(0, b, 0, 0)] = Complex64::new(1.0, 0.0);
            psi[(1, b, 0, 0)] = Complex64::new(1.0, 0.0);
        }

        let kwin = Array3::from_shape_fn((1, 1, 2), |(_, _, edge)| if edge == 0 { 0 } else { 2 });
        let window = Window { kwin, max_width: 3 };

        assert!(matches!(
            orthogonalize(&mut psi, &window, 7),
            Err(ProjectorError::NotPositiveDefinite { group: 7, .. })
        ));
    }
}
