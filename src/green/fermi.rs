/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Occupation counting and chemical-potential search
//!
//! Two charge counters share one bisection driver. The non-interacting
//! counter sums the stored DFT occupations over the band window and is
//! exact at any temperature. The interacting counter is Matsubara-only:
//! the slowly convergent 1/(i omega) tail is summed analytically through
//! the Fermi function of the static effective levels, and only the
//! rapidly decaying difference to the full Green's function is summed
//! numerically over the mesh.

use super::{GreenEngine, GreenError, Result};
use crate::dft::{BandStructure, FrequencyAxis, KMesh};
use crate::utils::eigh;
use ndarray::{s, Array2, Array4};
use num_complex::Complex64;
use rayon::prelude::*;

/// Exponent beyond which the Fermi function saturates to 0 or 1
const FERMI_EXPONENT_CUTOFF: f64 = 500.0;

/// Fermi-Dirac occupation at inverse temperature `beta`
pub fn fermi_dirac(energy: f64, mu: f64, beta: f64) -> f64 {
    let x = beta * (energy - mu);
    if x > FERMI_EXPONENT_CUTOFF {
        0.0
    } else if x < -FERMI_EXPONENT_CUTOFF {
        1.0
    } else {
        1.0 / (x.exp() + 1.0)
    }
}

/// Non-interacting electron count inside a band window
///
/// Sums the stored DFT occupations over the windowed bands, weighted by
/// the k-point weights and normalized by their sum. For a spin-unpolarized
/// calculation the result carries the spin-degeneracy factor of two.
pub fn windowed_nelect(
    bands: &BandStructure,
    kmesh: &KMesh,
    window: &crate::window::Window,
) -> f64 {
    let mut total = 0.0;
    for s_idx in 0..bands.nspin() {
        for k in 0..bands.nkpt() {
            let (lo, hi) = window.range(k, s_idx);
            let mut count = 0.0;
            for b in lo..=hi {
                count += bands.occupy[(b, k, s_idx)];
            }
            total += count * kmesh.weights[k];
        }
    }
    total / kmesh.weight_sum() * bands.spin_factor()
}

/// Electron count of the bare windowed bands at chemical potential `mu`
///
/// Thermal occupation of the Kohn-Sham eigenvalues themselves; used for
/// the chemical-potential search when no impurity enters.
pub fn band_nelect(
    bands: &BandStructure,
    kmesh: &KMesh,
    window: &crate::window::Window,
    mu: f64,
    beta: f64,
) -> f64 {
    let mut total = 0.0;
    for s_idx in 0..bands.nspin() {
        for k in 0..bands.nkpt() {
            let (lo, hi) = window.range(k, s_idx);
            let mut count = 0.0;
            for b in lo..=hi {
                count += fermi_dirac(bands.enk[(b, k, s_idx)], mu, beta);
            }
            total += count * kmesh.weights[k];
        }
    }
    total / kmesh.weight_sum() * bands.spin_factor()
}

/// Union band window over all impurity sites at one (k, spin)
fn union_range(engine: &GreenEngine, kpt: usize, spin: usize) -> (usize, usize) {
    let mut lo = usize::MAX;
    let mut hi = 0;
    for basis in engine.bases() {
        let (l, h) = basis.window.range(kpt, spin);
        lo = lo.min(l);
        hi = hi.max(h);
    }
    (lo, hi)
}

/// Interacting electron count at chemical potential `mu`
///
/// Counts electrons in the union of the impurity band windows from the
/// interacting lattice Green's function. The frequency sum is split into
/// an analytic Fermi-Dirac part for the static effective Hamiltonian
/// `diag(eps) + Sigma(infinity)` and a numerically summed correction
/// `(2/beta) sum_m Re Tr (G - G_static)` that decays like 1/omega^2.
pub fn interacting_nelect(
    engine: &GreenEngine,
    mu: f64,
    sigma: &[Array4<Complex64>],
    dc: &[f64],
) -> Result<f64> {
    let mesh = engine.mesh();
    if mesh.axis != FrequencyAxis::Matsubara {
        return Err(GreenError::Axis(
            "interacting charge counting needs a Matsubara mesh".to_string(),
        ));
    }
    let bands = engine.bands();
    let kmesh = engine.kmesh();
    let nfreq = mesh.nfreq();
    let beta = mesh.beta;

    let weighted: f64 = (0..bands.nkpt())
        .into_par_iter()
        .try_fold(
            || 0.0_f64,
            |mut acc, k| -> Result<f64> {
                for s_idx in 0..bands.nspin() {
                    let (lo, hi) = union_range(engine, k, s_idx);
                    let width = hi - lo + 1;

                    // Embedded self-energy on the union window, one
                    // slice per frequency
                    let mut sigma_ks = vec![Array2::<Complex64>::zeros((width, width)); nfreq];
                    for (i, basis) in engine.bases().iter().enumerate() {
                        let site_ks = engine.sigma_ks_at(basis, &sigma[i], dc[i], k, s_idx)?;
                        let (site_lo, _) = basis.window.range(k, s_idx);
                        let offset = site_lo - lo;
                        let site_width = basis.window.width(k, s_idx);
                        for (f, slice) in sigma_ks.iter_mut().enumerate() {
                            let mut block = slice.slice_mut(s![
                                offset..offset + site_width,
                                offset..offset + site_width
                            ]);
                            block += &site_ks.slice(s![.., .., f]);
                        }
                    }

                    // Static effective Hamiltonian from the Hermitian
                    // part of the highest-frequency self-energy
                    let tail = &sigma_ks[nfreq - 1];
                    let mut heff = Array2::<Complex64>::zeros((width, width));
                    for q in 0..width {
                        for r in 0..width {
                            heff[(q, r)] =
                                (tail[(q, r)] + tail[(r, q)].conj()) * Complex64::new(0.5, 0.0);
                        }
                        heff[(q, q)] += Complex64::new(bands.enk[(lo + q, k, s_idx)], 0.0);
                    }
                    let (levels, _) = eigh(&heff)?;

                    let mut count: f64 = levels.iter().map(|&e| fermi_dirac(e, mu, beta)).sum();

                    let mut correction = 0.0;
                    for f in 0..nfreq {
                        let z = mesh.argument(f) + Complex64::new(mu, 0.0);
                        let mut ginv = Array2::<Complex64>::zeros((width, width));
                        for b in 0..width {
                            ginv[(b, b)] =
                                z - Complex64::new(bands.enk[(lo + b, k, s_idx)], 0.0);
                        }
                        ginv -= &sigma_ks[f];
                        let g = crate::utils::invert_complex(&ginv).map_err(|err| match err {
                            crate::utils::UtilsError::SingularMatrix { .. } => {
                                GreenError::SingularLattice {
                                    kpt: k,
                                    spin: s_idx,
                                    freq: f,
                                }
                            }
                            other => GreenError::Linalg(other),
                        })?;

                        let trace_g: Complex64 = (0..width).map(|b| g[(b, b)]).sum();
                        let trace_model: Complex64 = levels
                            .iter()
                            .map(|&e| Complex64::new(1.0, 0.0) / (z - Complex64::new(e, 0.0)))
                            .sum();
                        correction += (trace_g - trace_model).re;
                    }
                    count += 2.0 / beta * correction;

                    acc += count * kmesh.weights[k];
                }
                Ok(acc)
            },
        )
        .try_reduce(|| 0.0, |a, b| Ok(a + b))?;

    Ok(weighted / kmesh.weight_sum() * bands.spin_factor())
}

/// Bisect for the chemical potential that yields `target` electrons
///
/// `charge` must be a monotonically non-decreasing function of the
/// chemical potential. The bracket is grown outward from `guess` by
/// doubling before bisection starts.
///
/// # Arguments
///
/// * `target` - Desired electron count
/// * `charge` - Electron count as a function of the chemical potential
/// * `guess` - Starting point for the bracket search
/// * `tol` - Absolute tolerance on the electron count
/// * `max_iter` - Iteration cap shared by bracketing and bisection
pub fn search_mu<F>(target: f64, charge: F, guess: f64, tol: f64, max_iter: usize) -> Result<f64>
where
    F: Fn(f64) -> Result<f64>,
{
    let mut lo = guess - 1.0;
    let mut hi = guess + 1.0;
    let mut n_lo = charge(lo)?;
    let mut n_hi = charge(hi)?;

    let mut iterations = 0;
    while n_lo > target && iterations < max_iter {
        hi = lo;
        n_hi = n_lo;
        lo -= (hi - lo).max(1.0) * 2.0;
        n_lo = charge(lo)?;
        iterations += 1;
    }
    while n_hi < target && iterations < max_iter {
        lo = hi;
        n_lo = n_hi;
        hi += (hi - lo).max(1.0) * 2.0;
        n_hi = charge(hi)?;
        iterations += 1;
    }
    if n_lo > target || n_hi < target {
        return Err(GreenError::MuSearch {
            target,
            lo,
            hi,
            iterations,
        });
    }

    while iterations < max_iter {
        let mid = 0.5 * (lo + hi);
        let n_mid = charge(mid)?;
        if (n_mid - target).abs() < tol {
            return Ok(mid);
        }
        if n_mid < target {
            lo = mid;
        } else {
            hi = mid;
        }
        iterations += 1;
    }

    Err(GreenError::MuSearch {
        target,
        lo,
        hi,
        iterations,
    })
}
