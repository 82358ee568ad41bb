/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! # dmft-rs
//!
//! A Rust engine for projected-local-orbital downfolding and DFT+DMFT
//! iteration control.
//!
//! The crate takes Kohn-Sham output (bands, k-mesh, raw projectors),
//! builds Löwdin-orthonormalized local bases for the declared correlated
//! subspaces, and drives the DMFT self-consistency loop: lattice
//! Green's function, hybridization, impurity solver exchange, double
//! counting, self-energy mixing and convergence bookkeeping.

pub mod basis;
pub mod cli;
pub mod cycle;
pub mod dft;
pub mod green;
pub mod input;
pub mod mixing;
pub mod projector;
pub mod solver;
pub mod utils;
pub mod window;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

use crate::cycle::{Axis, IterInfo};
use crate::dft::{BandStructure, FrequencyAxis, FrequencyMesh, KMesh, RawProjectors};
use crate::green::{
    dc_value, fermi::band_nelect, search_mu, windowed_nelect, GreenEngine,
};
use crate::input::{CalculationMode, Control, DoubleCountingScheme};
use crate::mixing::{sigma_distance, SigmaMixer};
use crate::projector::{build_local_bases, build_registry, LocalBasis, ProjectorGroup};
use crate::solver::{ImpuritySolver, SolverInput};
use crate::window::{resolve, resolve_all, Window};
use ndarray::Array4;
use num_complex::Complex64;
use std::path::{Path, PathBuf};

/// A fully assembled DFT+DMFT calculation
///
/// Construction resolves the correlated-subspace registry, the band
/// windows and the orthonormal local bases; [`Dmft::run`] then drives
/// the iteration loop against a solver and a mixer.
pub struct Dmft {
    control: Control,
    kmesh: KMesh,
    bands: BandStructure,
    groups: Vec<ProjectorGroup>,
    windows: Vec<Window>,
    bases: Vec<LocalBasis>,
    mesh: FrequencyMesh,
    workdir: PathBuf,
}

impl Dmft {
    /// Assemble a calculation from in-memory Kohn-Sham data
    pub fn new(
        control: Control,
        kmesh: KMesh,
        bands: BandStructure,
        raw: RawProjectors,
    ) -> anyhow::Result<Self> {
        control.validate()?;

        let groups = build_registry(&raw.traits, &control.impurities)?;
        control.validate_bounds(groups.len())?;
        // Without impurities the first bound still defines the charge
        // window for the chemical-potential search.
        let windows = if groups.is_empty() {
            vec![resolve(&control.bounds[0], &bands)?]
        } else {
            resolve_all(&control.bounds, groups.len(), &bands)?
        };
        let bases = build_local_bases(&raw, &groups, &windows)?;

        let mesh = match control.axis {
            FrequencyAxis::Matsubara => FrequencyMesh::matsubara(control.beta, control.nfreq)?,
            FrequencyAxis::Real => {
                FrequencyMesh::real(control.emin, control.emax, control.nfreq, control.eta)?
            }
        };

        log::info!(
            "assembled case '{}': {} bands, {} k-points, {} correlated subspace(s)",
            control.case,
            bands.nband(),
            kmesh.nkpt(),
            bases.len()
        );

        Ok(Self {
            control,
            kmesh,
            bands,
            groups,
            windows,
            bases,
            mesh,
            workdir: PathBuf::from("."),
        })
    }

    /// Assemble a calculation from a control file and a data directory
    ///
    /// Expects `<case>.kmesh`, `<case>.enk` and `<case>.chipsi` in
    /// `datadir`, in the native interchange format.
    pub fn from_files(control_path: &Path, datadir: &Path) -> anyhow::Result<Self> {
        let control = Control::from_json_file(control_path)?;
        let kmesh = dft::io::read_kmesh(&datadir.join(format!("{}.kmesh", control.case)))?;
        let bands = dft::io::read_bands(&datadir.join(format!("{}.enk", control.case)))?;
        let raw =
            dft::io::read_projectors(&datadir.join(format!("{}.chipsi", control.case)), &bands)?;

        let mut dmft = Self::new(control, kmesh, bands, raw)?;
        dmft.workdir = datadir.to_path_buf();
        Ok(dmft)
    }

    /// Directory where the iteration record is written
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    /// The validated run control
    pub fn control(&self) -> &Control {
        &self.control
    }

    /// The resolved band windows, one per projector group
    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    /// The orthonormal local bases, one per correlated group
    pub fn bases(&self) -> &[LocalBasis] {
        &self.bases
    }

    fn zero_sigma(&self) -> Vec<Array4<Complex64>> {
        self.bases
            .iter()
            .map(|b| Array4::zeros((b.ndim, b.ndim, self.mesh.nfreq(), self.bands.nspin())))
            .collect()
    }

    fn info_path(&self) -> PathBuf {
        self.workdir.join(format!("{}.iter.json", self.control.case))
    }

    /// Target electron count for the chemical-potential search
    fn charge_target(&self) -> f64 {
        self.control
            .nelect
            .unwrap_or_else(|| windowed_nelect(&self.bands, &self.kmesh, &self.windows[0]))
    }

    /// Run the calculation to convergence or the iteration cap
    ///
    /// In `FermiSearch` mode only the chemical potential is determined.
    /// Otherwise the DMFT loop iterates: chemical potential, local
    /// Green's function, double counting, hybridization, impurity
    /// solver, mixing, convergence check. The iteration record is
    /// persisted to `<case>.iter.json` after every step.
    pub fn run(
        &self,
        solver: &mut dyn ImpuritySolver,
        mixer: &mut dyn SigmaMixer,
    ) -> anyhow::Result<IterInfo> {
        let engine = GreenEngine::new(&self.bands, &self.kmesh, &self.mesh, &self.bases)?;
        let mut info = IterInfo::new(self.control.mode, self.bases.len());
        let target = self.charge_target();

        if self.control.mode == CalculationMode::FermiSearch {
            return self.fermi_search(&engine, &mut info, target);
        }

        let mut sigma = self.zero_sigma();
        // FLL and AMF are refreshed from the Matsubara occupations each
        // iteration; a fixed double counting applies on either axis.
        let mut dc = match self.control.dcount {
            DoubleCountingScheme::Fixed(v) => vec![v; self.bases.len()],
            _ => vec![0.0; self.bases.len()],
        };
        info.dcount = dc.clone();
        let mut mu = 0.0;
        let max_dmft = self.control.max_iterations.dmft as usize;

        loop {
            info.advance(Axis::Dmft)?;

            if self.mesh.axis == FrequencyAxis::Matsubara {
                mu = search_mu(
                    target,
                    |m| engine.interacting_nelect(m, &sigma, &dc),
                    mu,
                    self.control.tolerances.charge,
                    200,
                )?;
            }
            info.mu_lattice = mu;

            let gloc = engine.local_green(mu, &sigma, &dc)?;

            if self.mesh.axis == FrequencyAxis::Matsubara {
                let mut total = 0.0;
                for (i, g) in gloc.iter().enumerate() {
                    let n = engine.local_occupation(g)?;
                    info.occupations[i] = n;
                    total += n;
                    dc[i] = dc_value(&self.control.dcount, n, self.groups[self.bases[i].group].l);
                }
                info.total_occupation = total;
                info.dcount = dc.clone();
            }

            let eimp = engine.impurity_levels()?;
            let delta = engine.hybridization(mu, &sigma, &dc, &gloc, &eimp)?;

            let input = SolverInput {
                mesh: &self.mesh,
                mu,
                levels: &eimp,
                hybridization: &delta,
            };
            let raw_sigma = solver.solve(&input)?;

            if !info.should_mix() {
                mixer.reset();
            }
            let new_sigma = mixer.mix(raw_sigma)?;

            let distance = sigma_distance(&sigma, &new_sigma);
            info.sigma_converged = distance < self.control.tolerances.sigma;
            sigma = new_sigma;

            log::info!(
                "dmft iteration {}: mu = {:.6}, n = {:.6}, |dSigma| = {:.3e}",
                info.i1,
                mu,
                info.total_occupation,
                distance
            );
            info.save(&self.info_path())?;

            if info.converged() {
                log::info!("self-energy converged after {} iterations", info.i1);
                break;
            }
            if info.i1 >= max_dmft {
                log::warn!("stopping unconverged at the cap of {} iterations", max_dmft);
                break;
            }
        }

        Ok(info)
    }

    fn fermi_search(
        &self,
        engine: &GreenEngine,
        info: &mut IterInfo,
        target: f64,
    ) -> anyhow::Result<IterInfo> {
        let mu = if self.bases.is_empty() {
            search_mu(
                target,
                |m| {
                    Ok(band_nelect(
                        &self.bands,
                        &self.kmesh,
                        &self.windows[0],
                        m,
                        self.control.beta,
                    ))
                },
                0.0,
                self.control.tolerances.charge,
                200,
            )?
        } else {
            let sigma = self.zero_sigma();
            let dc = vec![0.0; self.bases.len()];
            search_mu(
                target,
                |m| engine.interacting_nelect(m, &sigma, &dc),
                0.0,
                self.control.tolerances.charge,
                200,
            )?
        };

        info.mu_lattice = mu;
        // No impurity problem enters, so the single flag that gates
        // convergence in a single-level run is satisfied by definition.
        info.sigma_converged = true;
        info.save(&self.info_path())?;
        log::info!("fermi search finished: mu = {:.6} for {} electrons", mu, target);
        Ok(info.clone())
    }
}
