/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Lattice and local Green's functions
//!
//! For every impurity site the engine builds the lattice Green's
//! function from the Kohn-Sham dispersion and the upfolded self-energy,
//! inverts it frequency by frequency, and downfolds the result to the
//! local basis. Lattice-sized objects only ever exist per (k, spin);
//! they are allocated inside the k-loop and dropped before the next
//! slice, so nothing of size bands x bands x frequencies x kpoints is
//! kept alive.
//!
//! The k-loop carries no data dependency across k-points and runs under
//! rayon with per-worker partial accumulators that are reduced by
//! summation at the end.

pub mod dcount;
pub mod errors;
pub mod fermi;

pub use dcount::dc_value;
pub use errors::{GreenError, Result};
pub use fermi::{fermi_dirac, search_mu, windowed_nelect};

use crate::basis::{embed, project};
use crate::dft::{BandStructure, FrequencyMesh, KMesh};
use crate::projector::LocalBasis;
use crate::utils::{adjoint, invert_complex, UtilsError};
use ndarray::{s, Array2, Array3, Array4};
use num_complex::Complex64;
use rayon::prelude::*;

/// Green's-function engine for a fixed set of impurity bases
///
/// Holds references to the immutable Kohn-Sham data; all per-call state
/// (chemical potential, self-energies, double counting) is passed into
/// the individual operations.
#[derive(Debug)]
pub struct GreenEngine<'a> {
    bands: &'a BandStructure,
    kmesh: &'a KMesh,
    mesh: &'a FrequencyMesh,
    bases: &'a [LocalBasis],
}

impl<'a> GreenEngine<'a> {
    /// Create an engine, checking that bands and k-mesh agree
    pub fn new(
        bands: &'a BandStructure,
        kmesh: &'a KMesh,
        mesh: &'a FrequencyMesh,
        bases: &'a [LocalBasis],
    ) -> Result<Self> {
        if bands.nkpt() != kmesh.nkpt() {
            return Err(GreenError::Dimension(format!(
                "bands carry {} k-points but the mesh has {}",
                bands.nkpt(),
                kmesh.nkpt()
            )));
        }
        for basis in bases {
            if basis.window.nkpt() != bands.nkpt() || basis.window.nspin() != bands.nspin() {
                return Err(GreenError::Dimension(format!(
                    "basis for site {} was resolved on a different mesh",
                    basis.site
                )));
            }
        }
        Ok(Self {
            bands,
            kmesh,
            mesh,
            bases,
        })
    }

    /// Borrow the frequency mesh this engine was built with
    pub fn mesh(&self) -> &FrequencyMesh {
        self.mesh
    }

    /// Number of impurity sites
    pub fn nsite(&self) -> usize {
        self.bases.len()
    }

    fn check_sigma(&self, sigma: &[Array4<Complex64>]) -> Result<()> {
        if sigma.len() != self.bases.len() {
            return Err(GreenError::Dimension(format!(
                "{} self-energies supplied for {} impurity sites",
                sigma.len(),
                self.bases.len()
            )));
        }
        for (basis, sig) in self.bases.iter().zip(sigma.iter()) {
            let expected = (
                basis.ndim,
                basis.ndim,
                self.mesh.nfreq(),
                self.bands.nspin(),
            );
            if sig.dim() != expected {
                return Err(GreenError::Dimension(format!(
                    "self-energy for site {} has shape {:?}, expected {:?}",
                    basis.site,
                    sig.dim(),
                    expected
                )));
            }
        }
        Ok(())
    }

    /// Dc-subtracted local self-energy of one site at one spin,
    /// shape `(ndim, ndim, nfreq)`
    fn sigma_local(
        &self,
        sigma: &Array4<Complex64>,
        dc: f64,
        ndim: usize,
        spin: usize,
    ) -> Array3<Complex64> {
        let nfreq = self.mesh.nfreq();
        let mut local = Array3::<Complex64>::zeros((ndim, ndim, nfreq));
        local.assign(&sigma.slice(s![.., .., .., spin]));
        for f in 0..nfreq {
            for q in 0..ndim {
                local[(q, q, f)] -= Complex64::new(dc, 0.0);
            }
        }
        local
    }

    /// Per-(k, spin) contribution of one site to its local Green's
    /// function, already weighted by the k-point weight
    fn site_contribution(
        &self,
        basis: &LocalBasis,
        sigma: &Array4<Complex64>,
        dc: f64,
        mu: f64,
        kpt: usize,
        spin: usize,
    ) -> Result<Array3<Complex64>> {
        let nfreq = self.mesh.nfreq();
        let (lo, _hi) = basis.window.range(kpt, spin);
        let width = basis.window.width(kpt, spin);

        let overlap = basis.overlap(kpt, spin);
        let sigma_loc = self.sigma_local(sigma, dc, basis.ndim, spin);
        let sigma_ks = embed(&sigma_loc, &overlap)?;

        // Lattice Green's function for this (k, spin), window-sized only
        let mut g_ks = Array3::<Complex64>::zeros((width, width, nfreq));
        for f in 0..nfreq {
            let z = self.mesh.argument(f) + Complex64::new(mu, 0.0);
            let mut ginv = Array2::<Complex64>::zeros((width, width));
            for b in 0..width {
                ginv[(b, b)] = z - Complex64::new(self.bands.enk[(lo + b, kpt, spin)], 0.0);
            }
            ginv -= &sigma_ks.slice(s![.., .., f]);

            let g = invert_complex(&ginv).map_err(|err| match err {
                UtilsError::SingularMatrix { .. } => GreenError::SingularLattice {
                    kpt,
                    spin,
                    freq: f,
                },
                other => GreenError::Linalg(other),
            })?;
            g_ks.slice_mut(s![.., .., f]).assign(&g);
        }

        let mut local = project(&g_ks, &overlap)?;
        let weight = Complex64::new(self.kmesh.weights[kpt], 0.0);
        local.mapv_inplace(|g| g * weight);
        Ok(local)
    }

    /// Local Green's function of every impurity site
    ///
    /// Runs the embed -> invert -> project chain at every (k, spin,
    /// frequency) point and accumulates the weighted k-sum, normalized
    /// by the k-weight sum.
    ///
    /// # Arguments
    ///
    /// * `mu` - Chemical potential
    /// * `sigma` - Impurity self-energy per site, `(ndim, ndim, nfreq, nspin)`
    /// * `dc` - Double-counting potential per site
    ///
    /// # Returns
    ///
    /// One local Green's function per site, `(ndim, ndim, nfreq, nspin)`
    pub fn local_green(
        &self,
        mu: f64,
        sigma: &[Array4<Complex64>],
        dc: &[f64],
    ) -> Result<Vec<Array4<Complex64>>> {
        self.check_sigma(sigma)?;
        if dc.len() != self.bases.len() {
            return Err(GreenError::Dimension(format!(
                "{} double-counting values for {} sites",
                dc.len(),
                self.bases.len()
            )));
        }

        let nkpt = self.bands.nkpt();
        let nspin = self.bands.nspin();
        let nfreq = self.mesh.nfreq();

        let zero_acc = || -> Vec<Array4<Complex64>> {
            self.bases
                .iter()
                .map(|b| Array4::zeros((b.ndim, b.ndim, nfreq, nspin)))
                .collect()
        };

        // Per-worker partial accumulators, reduced by an
        // order-independent sum at the end.
        let accumulated = (0..nkpt)
            .into_par_iter()
            .try_fold(zero_acc, |mut acc, k| -> Result<Vec<Array4<Complex64>>> {
                for s_idx in 0..nspin {
                    for (i, basis) in self.bases.iter().enumerate() {
                        let contribution =
                            self.site_contribution(basis, &sigma[i], dc[i], mu, k, s_idx)?;
                        let mut target = acc[i].slice_mut(s![.., .., .., s_idx]);
                        target += &contribution;
                    }
                }
                Ok(acc)
            })
            .try_reduce(zero_acc, |mut a, b| {
                for (ai, bi) in a.iter_mut().zip(b.iter()) {
                    *ai += bi;
                }
                Ok(a)
            })?;

        let norm = Complex64::new(1.0 / self.kmesh.weight_sum(), 0.0);
        let mut result = accumulated;
        for site in result.iter_mut() {
            site.mapv_inplace(|g| g * norm);
        }
        Ok(result)
    }

    /// Impurity energy levels: the k-averaged projection of the
    /// Kohn-Sham dispersion onto each local basis
    ///
    /// # Returns
    ///
    /// One `(ndim, ndim, nspin)` level matrix per site
    pub fn impurity_levels(&self) -> Result<Vec<Array3<Complex64>>> {
        let nspin = self.bands.nspin();
        let norm = 1.0 / self.kmesh.weight_sum();

        let mut levels = Vec::with_capacity(self.bases.len());
        for basis in self.bases {
            let mut eimp = Array3::<Complex64>::zeros((basis.ndim, basis.ndim, nspin));
            for s_idx in 0..nspin {
                for k in 0..self.bands.nkpt() {
                    let (lo, _) = basis.window.range(k, s_idx);
                    let width = basis.window.width(k, s_idx);
                    let overlap = basis.overlap(k, s_idx);

                    // M diag(eps) M^H, weighted
                    let mut scaled = overlap.clone();
                    for b in 0..width {
                        let eps = Complex64::new(self.bands.enk[(lo + b, k, s_idx)], 0.0);
                        for q in 0..basis.ndim {
                            scaled[(q, b)] *= eps;
                        }
                    }
                    let projected = scaled.dot(&adjoint(&overlap));
                    let weight = Complex64::new(self.kmesh.weights[k] * norm, 0.0);
                    for q in 0..basis.ndim {
                        for r in 0..basis.ndim {
                            eimp[(q, r, s_idx)] += projected[(q, r)] * weight;
                        }
                    }
                }
            }
            levels.push(eimp);
        }
        Ok(levels)
    }

    /// Hybridization function per site
    ///
    /// `Delta(z) = (z + mu) I - E_imp - Sigma_local - G_loc(z)^-1`,
    /// evaluated on the engine's frequency mesh. This is the quantity
    /// handed to the impurity solver together with the levels.
    ///
    /// # Arguments
    ///
    /// * `mu` - Chemical potential
    /// * `sigma` - Impurity self-energy per site
    /// * `dc` - Double-counting potential per site
    /// * `gloc` - Local Green's function per site (from [`Self::local_green`])
    /// * `eimp` - Impurity levels per site (from [`Self::impurity_levels`])
    ///
    /// # Returns
    ///
    /// One hybridization function per site, `(ndim, ndim, nfreq, nspin)`
    pub fn hybridization(
        &self,
        mu: f64,
        sigma: &[Array4<Complex64>],
        dc: &[f64],
        gloc: &[Array4<Complex64>],
        eimp: &[Array3<Complex64>],
    ) -> Result<Vec<Array4<Complex64>>> {
        self.check_sigma(sigma)?;
        let nfreq = self.mesh.nfreq();
        let nspin = self.bands.nspin();

        let mut delta_all = Vec::with_capacity(self.bases.len());
        for (i, basis) in self.bases.iter().enumerate() {
            let ndim = basis.ndim;
            let mut delta = Array4::<Complex64>::zeros((ndim, ndim, nfreq, nspin));
            for s_idx in 0..nspin {
                for f in 0..nfreq {
                    let g_slice = gloc[i].slice(s![.., .., f, s_idx]).to_owned();
                    let g_inv = invert_complex(&g_slice).map_err(|err| match err {
                        UtilsError::SingularMatrix { .. } => GreenError::SingularLocal {
                            site: basis.site,
                            spin: s_idx,
                            freq: f,
                        },
                        other => GreenError::Linalg(other),
                    })?;

                    let z = self.mesh.argument(f) + Complex64::new(mu, 0.0);
                    for q in 0..ndim {
                        for r in 0..ndim {
                            let mut value = -eimp[i][(q, r, s_idx)]
                                - (sigma[i][(q, r, f, s_idx)]
                                    - if q == r {
                                        Complex64::new(dc[i], 0.0)
                                    } else {
                                        Complex64::new(0.0, 0.0)
                                    })
                                - g_inv[(q, r)];
                            if q == r {
                                value += z;
                            }
                            delta[(q, r, f, s_idx)] = value;
                        }
                    }
                }
            }
            delta_all.push(delta);
        }
        Ok(delta_all)
    }

    /// Interacting electron count at a given chemical potential
    ///
    /// Matsubara-only: combines the analytic Fermi-Dirac occupation of
    /// the high-frequency (static) effective levels with the frequency
    /// sum of the difference between the interacting and the static
    /// Green's function.
    pub fn interacting_nelect(
        &self,
        mu: f64,
        sigma: &[Array4<Complex64>],
        dc: &[f64],
    ) -> Result<f64> {
        fermi::interacting_nelect(self, mu, sigma, dc)
    }

    pub(crate) fn bands(&self) -> &BandStructure {
        self.bands
    }

    pub(crate) fn kmesh(&self) -> &KMesh {
        self.kmesh
    }

    pub(crate) fn bases(&self) -> &[LocalBasis] {
        self.bases
    }

    /// Occupation of one site's correlated orbitals from its local
    /// Green's function
    ///
    /// Matsubara-only. Uses the 1/(i omega) tail analytically, so each
    /// orbital contributes `1/2 + (2/beta) sum_m Re G_qq(i omega_m)`
    /// per spin channel.
    pub fn local_occupation(&self, gloc: &Array4<Complex64>) -> Result<f64> {
        if self.mesh.axis != crate::dft::FrequencyAxis::Matsubara {
            return Err(GreenError::Axis(
                "occupation counting needs a Matsubara mesh".to_string(),
            ));
        }
        let (ndim, _, nfreq, nspin) = gloc.dim();
        let mut n = 0.0;
        for s_idx in 0..nspin {
            for q in 0..ndim {
                let mut acc = 0.0;
                for f in 0..nfreq {
                    acc += gloc[(q, q, f, s_idx)].re;
                }
                n += 0.5 + 2.0 / self.mesh.beta * acc;
            }
        }
        Ok(n * self.bands.spin_factor())
    }

    pub(crate) fn sigma_ks_at(
        &self,
        basis: &LocalBasis,
        sigma: &Array4<Complex64>,
        dc: f64,
        kpt: usize,
        spin: usize,
    ) -> Result<Array3<Complex64>> {
        let overlap = basis.overlap(kpt, spin);
        let sigma_loc = self.sigma_local(sigma, dc, basis.ndim, spin);
        Ok(embed(&sigma_loc, &overlap)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dft::FrequencyMesh;
    use crate::window::Window;
    use approx::assert_relative_eq;
    use ndarray::{Array1, Array3 as A3};

    /// One band, one k-point, one spin, a single s-like local orbital
    /// with perfect overlap: G_loc(iw) must equal 1/(iw + mu - eps).
    fn single_band_fixture(eps: f64) -> (BandStructure, KMesh, FrequencyMesh, Vec<LocalBasis>) {
        let enk = A3::from_elem((1, 1, 1), eps);
        let occupy = A3::zeros((1, 1, 1));
        let bands = BandStructure::new(enk, occupy).unwrap();

        let kmesh = KMesh::uniform(ndarray::Array2::zeros((1, 3)));
        let mesh = FrequencyMesh::matsubara(20.0, 8).unwrap();

        let mut psi = Array4::<Complex64>::zeros((1, 1, 1, 1));
        psi[(0, 0, 0, 0)] = Complex64::new(1.0, 0.0);
        let kwin = A3::zeros((1, 1, 2));
        let window = Window { kwin, max_width: 1 };

        let bases = vec![LocalBasis {
            group: 0,
            site: 0,
            shell: "s".to_string(),
            ndim: 1,
            psi,
            window,
        }];
        (bands, kmesh, mesh, bases)
    }

    #[test]
    fn test_local_green_single_band_analytic() {
        let eps = 0.3;
        let (bands, kmesh, mesh, bases) = single_band_fixture(eps);
        let engine = GreenEngine::new(&bands, &kmesh, &mesh, &bases).unwrap();

        let sigma = vec![Array4::<Complex64>::zeros((1, 1, mesh.nfreq(), 1))];
        let gloc = engine.local_green(0.0, &sigma, &[0.0]).unwrap();

        for f in 0..mesh.nfreq() {
            let z = mesh.argument(f);
            let expected = Complex64::new(1.0, 0.0) / (z - Complex64::new(eps, 0.0));
            assert_relative_eq!(gloc[0][(0, 0, f, 0)].re, expected.re, epsilon = 1e-12);
            assert_relative_eq!(gloc[0][(0, 0, f, 0)].im, expected.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_local_green_with_static_sigma_shifts_pole() {
        let eps = 0.3;
        let shift = 0.2;
        let (bands, kmesh, mesh, bases) = single_band_fixture(eps);
        let engine = GreenEngine::new(&bands, &kmesh, &mesh, &bases).unwrap();

        let sigma = vec![Array4::<Complex64>::from_elem(
            (1, 1, mesh.nfreq(), 1),
            Complex64::new(shift, 0.0),
        )];
        let gloc = engine.local_green(0.0, &sigma, &[0.0]).unwrap();

        let z = mesh.argument(0);
        let expected = Complex64::new(1.0, 0.0) / (z - Complex64::new(eps + shift, 0.0));
        assert_relative_eq!(gloc[0][(0, 0, 0, 0)].re, expected.re, epsilon = 1e-12);
        assert_relative_eq!(gloc[0][(0, 0, 0, 0)].im, expected.im, epsilon = 1e-12);
    }

    #[test]
    fn test_double_counting_cancels_equal_static_sigma() {
        // Sigma = dc * I must reproduce the non-interacting function
        let eps = -0.4;
        let (bands, kmesh, mesh, bases) = single_band_fixture(eps);
        let engine = GreenEngine::new(&bands, &kmesh, &mesh, &bases).unwrap();

        let dc = 1.7;
        let sigma = vec![Array4::<Complex64>::from_elem(
            (1, 1, mesh.nfreq(), 1),
            Complex64::new(dc, 0.0),
        )];
        let gloc = engine.local_green(0.0, &sigma, &[dc]).unwrap();

        let z = mesh.argument(3);
        let expected = Complex64::new(1.0, 0.0) / (z - Complex64::new(eps, 0.0));
        assert_relative_eq!(gloc[0][(0, 0, 3, 0)].re, expected.re, epsilon = 1e-12);
        assert_relative_eq!(gloc[0][(0, 0, 3, 0)].im, expected.im, epsilon = 1e-12);
    }

    #[test]
    fn test_impurity_levels_single_band() {
        let eps = 0.55;
        let (bands, kmesh, mesh, bases) = single_band_fixture(eps);
        let engine = GreenEngine::new(&bands, &kmesh, &mesh, &bases).unwrap();

        let levels = engine.impurity_levels().unwrap();
        assert_relative_eq!(levels[0][(0, 0, 0)].re, eps, epsilon = 1e-12);
        assert_relative_eq!(levels[0][(0, 0, 0)].im, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_hybridization_vanishes_for_single_pole() {
        // With a one-band lattice and perfect overlap the impurity IS the
        // lattice, so the hybridization must vanish identically.
        let eps = 0.1;
        let (bands, kmesh, mesh, bases) = single_band_fixture(eps);
        let engine = GreenEngine::new(&bands, &kmesh, &mesh, &bases).unwrap();

        let sigma = vec![Array4::<Complex64>::zeros((1, 1, mesh.nfreq(), 1))];
        let dc = [0.0];
        let gloc = engine.local_green(0.0, &sigma, &dc).unwrap();
        let eimp = engine.impurity_levels().unwrap();
        let delta = engine
            .hybridization(0.0, &sigma, &dc, &gloc, &eimp)
            .unwrap();

        for f in 0..mesh.nfreq() {
            assert_relative_eq!(delta[0][(0, 0, f, 0)].re, 0.0, epsilon = 1e-10);
            assert_relative_eq!(delta[0][(0, 0, f, 0)].im, 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_weighted_kmesh_normalization() {
        // Two k-points with weights 3 and 1: the local function is the
        // weighted average of the two single-pole functions.
        let enk = A3::from_shape_fn((1, 2, 1), |(_, k, _)| if k == 0 { -0.5 } else { 0.5 });
        let bands = BandStructure::new(enk, A3::zeros((1, 2, 1))).unwrap();
        let kmesh = KMesh::new(
            ndarray::Array2::zeros((2, 3)),
            Array1::from_vec(vec![3.0, 1.0]),
        )
        .unwrap();
        let mesh = FrequencyMesh::matsubara(20.0, 4).unwrap();

        let mut psi = Array4::<Complex64>::zeros((1, 1, 2, 1));
        psi[(0, 0, 0, 0)] = Complex64::new(1.0, 0.0);
        psi[(0, 0, 1, 0)] = Complex64::new(1.0, 0.0);
        let window = Window {
            kwin: A3::zeros((2, 1, 2)),
            max_width: 1,
        };
        let bases = vec![LocalBasis {
            group: 0,
            site: 0,
            shell: "s".to_string(),
            ndim: 1,
            psi,
            window,
        }];

        let engine = GreenEngine::new(&bands, &kmesh, &mesh, &bases).unwrap();
        let sigma = vec![Array4::<Complex64>::zeros((1, 1, 4, 1))];
        let gloc = engine.local_green(0.0, &sigma, &[0.0]).unwrap();

        let z = mesh.argument(0);
        let g0 = Complex64::new(1.0, 0.0) / (z + Complex64::new(0.5, 0.0));
        let g1 = Complex64::new(1.0, 0.0) / (z - Complex64::new(0.5, 0.0));
        let expected = (g0 * 3.0 + g1) / 4.0;
        assert_relative_eq!(gloc[0][(0, 0, 0, 0)].re, expected.re, epsilon = 1e-12);
        assert_relative_eq!(gloc[0][(0, 0, 0, 0)].im, expected.im, epsilon = 1e-12);
    }

    #[test]
    fn test_local_occupation_single_pole() {
        // One level at eps, mu = 0, beta = 5: the Matsubara sum with the
        // analytic tail must land near 2 f(eps) for a long enough mesh.
        let eps = 0.3;
        let beta = 5.0;
        let enk = A3::from_elem((1, 1, 1), eps);
        let bands = BandStructure::new(enk, A3::zeros((1, 1, 1))).unwrap();
        let kmesh = KMesh::uniform(ndarray::Array2::zeros((1, 3)));
        let mesh = FrequencyMesh::matsubara(beta, 2048).unwrap();

        let mut psi = Array4::<Complex64>::zeros((1, 1, 1, 1));
        psi[(0, 0, 0, 0)] = Complex64::new(1.0, 0.0);
        let bases = vec![LocalBasis {
            group: 0,
            site: 0,
            shell: "s".to_string(),
            ndim: 1,
            psi,
            window: Window {
                kwin: A3::zeros((1, 1, 2)),
                max_width: 1,
            },
        }];
        let engine = GreenEngine::new(&bands, &kmesh, &mesh, &bases).unwrap();

        let sigma = vec![Array4::<Complex64>::zeros((1, 1, 2048, 1))];
        let gloc = engine.local_green(0.0, &sigma, &[0.0]).unwrap();
        let n = engine.local_occupation(&gloc[0]).unwrap();

        let expected = 2.0 / ((beta * eps).exp() + 1.0);
        assert_relative_eq!(n, expected, epsilon = 1e-3);
    }

    #[test]
    fn test_sigma_shape_mismatch_rejected() {
        let (bands, kmesh, mesh, bases) = single_band_fixture(0.0);
        let engine = GreenEngine::new(&bands, &kmesh, &mesh, &bases).unwrap();

        let sigma = vec![Array4::<Complex64>::zeros((2, 2, mesh.nfreq(), 1))];
        assert!(matches!(
            engine.local_green(0.0, &sigma, &[0.0]),
            Err(GreenError::Dimension(_))
        ));
    }
}
