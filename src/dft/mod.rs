/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Kohn-Sham data model
//!
//! This module holds the data handed over by the DFT-output adaptor:
//! the crystal lattice, the k-mesh with integration weights, the band
//! structure (eigenvalues and occupations), and the raw projector
//! tensor together with its per-projector traits. Parsers for the
//! native interchange files live in [`io`]; adaptors for specific
//! external codes convert into that format outside this crate. The
//! types here enforce the dimensional contracts the downfolding engine
//! depends on.

pub mod errors;
pub mod io;

pub use errors::{DftError, Result};

use ndarray::{Array1, Array2, Array3, Array4};
use num_complex::Complex64;
use std::f64::consts::PI;

/// Crystal lattice as reported by the electronic-structure engine
///
/// Immutable once read; owned by the adaptor stage.
#[derive(Debug, Clone)]
pub struct Lattice {
    /// Case label (system name)
    pub case: String,
    /// Universal scaling factor
    pub scale: f64,
    /// Number of atomic sorts
    pub nsort: usize,
    /// Total number of atoms
    pub natom: usize,
    /// Lattice vectors, one per row
    pub vectors: [[f64; 3]; 3],
    /// Chemical symbol per sort
    pub sorts: Vec<(String, usize)>,
    /// Chemical symbol per atom
    pub atoms: Vec<String>,
    /// Fractional coordinates per atom
    pub coords: Vec<[f64; 3]>,
}

impl Lattice {
    /// Basic consistency check between the sort table and the atom list
    pub fn validate(&self) -> Result<()> {
        let counted: usize = self.sorts.iter().map(|(_, n)| n).sum();
        if counted != self.natom || self.atoms.len() != self.natom || self.coords.len() != self.natom
        {
            return Err(DftError::InconsistentDimensions(format!(
                "lattice declares {} atoms but sorts sum to {}, {} symbols, {} coordinates",
                self.natom,
                counted,
                self.atoms.len(),
                self.coords.len()
            )));
        }
        if self.sorts.len() != self.nsort {
            return Err(DftError::InconsistentDimensions(format!(
                "lattice declares {} sorts but lists {}",
                self.nsort,
                self.sorts.len()
            )));
        }
        Ok(())
    }
}

/// Brillouin-zone sampling mesh with integration weights
///
/// The weight-sum convention is `sum(weights) = nkpt` for a uniform
/// mesh; non-uniform meshes carry their reduced weights and all
/// accumulation paths in this crate normalize by the weight sum.
#[derive(Debug, Clone)]
pub struct KMesh {
    /// k-points in fractional coordinates, shape `(nkpt, 3)`
    pub points: Array2<f64>,
    /// Integration weight per k-point
    pub weights: Array1<f64>,
}

impl KMesh {
    /// Create a k-mesh, checking that points and weights agree in length
    pub fn new(points: Array2<f64>, weights: Array1<f64>) -> Result<Self> {
        if points.nrows() != weights.len() {
            return Err(DftError::InconsistentDimensions(format!(
                "{} k-points but {} weights",
                points.nrows(),
                weights.len()
            )));
        }
        if weights.iter().any(|&w| w < 0.0) {
            return Err(DftError::InvalidParameter(
                "negative k-point weight".to_string(),
            ));
        }
        Ok(Self { points, weights })
    }

    /// Uniform-weight mesh with `weights[k] = 1` for every k-point
    pub fn uniform(points: Array2<f64>) -> Self {
        let nkpt = points.nrows();
        Self {
            points,
            weights: Array1::from_elem(nkpt, 1.0),
        }
    }

    /// Number of k-points
    pub fn nkpt(&self) -> usize {
        self.points.nrows()
    }

    /// Sum of the integration weights
    pub fn weight_sum(&self) -> f64 {
        self.weights.sum()
    }
}

/// Kohn-Sham band structure: eigenvalues and occupations
///
/// Both arrays are indexed `[band, kpoint, spin]`. Eigenvalues are
/// calibrated so that the Fermi level sits at zero; `calibrate` must be
/// called exactly once per adaptor pass (calling it twice with a
/// nonzero Fermi level double-subtracts).
#[derive(Debug, Clone)]
pub struct BandStructure {
    /// Eigenvalues `enk[band, kpoint, spin]`
    pub enk: Array3<f64>,
    /// Occupations `occupy[band, kpoint, spin]`
    pub occupy: Array3<f64>,
}

impl BandStructure {
    /// Create a band structure, checking that the two arrays agree in shape
    pub fn new(enk: Array3<f64>, occupy: Array3<f64>) -> Result<Self> {
        if enk.dim() != occupy.dim() {
            return Err(DftError::InconsistentDimensions(format!(
                "eigenvalues have shape {:?} but occupations {:?}",
                enk.dim(),
                occupy.dim()
            )));
        }
        let (_, _, nspin) = enk.dim();
        if nspin != 1 && nspin != 2 {
            return Err(DftError::InvalidParameter(format!(
                "nspin must be 1 or 2, got {}",
                nspin
            )));
        }
        Ok(Self { enk, occupy })
    }

    /// Number of bands
    pub fn nband(&self) -> usize {
        self.enk.dim().0
    }

    /// Number of k-points
    pub fn nkpt(&self) -> usize {
        self.enk.dim().1
    }

    /// Number of spin channels (1 or 2)
    pub fn nspin(&self) -> usize {
        self.enk.dim().2
    }

    /// Spin degeneracy factor: 2 for spin-unpolarized data, 1 otherwise
    pub fn spin_factor(&self) -> f64 {
        if self.nspin() == 1 {
            2.0
        } else {
            1.0
        }
    }

    /// Shift all eigenvalues so the Fermi level sits at zero
    ///
    /// Caller discipline: exactly once per adaptor pass.
    pub fn calibrate(&mut self, fermi: f64) {
        self.enk.mapv_inplace(|e| e - fermi);
    }
}

/// Trait of one raw projector: which atom it sits on and which orbital
/// it projects onto
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectorTrait {
    /// Site (atom) index, 0-based
    pub site: usize,
    /// Orbital descriptor as written by the DFT engine, e.g. "dxy"
    pub desc: String,
    /// Angular momentum quantum number parsed from the descriptor
    pub l: u32,
    /// Magnetic/orbital sub-index within the shell, 0-based
    pub m: usize,
}

impl ProjectorTrait {
    /// Parse an orbital descriptor into a projector trait
    ///
    /// The descriptor names follow the real-harmonic ordering used by
    /// plane-wave codes: `s`; `py, pz, px`; `dxy, dyz, dz2, dxz, dx2-y2`;
    /// and the seven f components.
    pub fn parse(site: usize, desc: &str) -> Result<Self> {
        let (l, m) = match desc {
            "s" => (0, 0),
            "py" => (1, 0),
            "pz" => (1, 1),
            "px" => (1, 2),
            "dxy" => (2, 0),
            "dyz" => (2, 1),
            "dz2" => (2, 2),
            "dxz" => (2, 3),
            "dx2-y2" | "x2-y2" => (2, 4),
            "fy3x2" => (3, 0),
            "fxyz" => (3, 1),
            "fyz2" => (3, 2),
            "fz3" => (3, 3),
            "fxz2" => (3, 4),
            "fzx2" => (3, 5),
            "fx3" => (3, 6),
            _ => return Err(DftError::UnknownDescriptor(desc.to_string())),
        };
        Ok(Self {
            site,
            desc: desc.to_string(),
            l,
            m,
        })
    }
}

/// Raw projector tensor `chipsi[proj, band, kpoint, spin]` plus the
/// per-projector traits
///
/// Immutable once read from the adaptor.
#[derive(Debug, Clone)]
pub struct RawProjectors {
    /// The complex projector tensor
    pub chipsi: Array4<Complex64>,
    /// One trait per projector index
    pub traits: Vec<ProjectorTrait>,
}

impl RawProjectors {
    /// Create a raw projector set, checking dimensions against the bands
    pub fn new(
        chipsi: Array4<Complex64>,
        traits: Vec<ProjectorTrait>,
        bands: &BandStructure,
    ) -> Result<Self> {
        let (nproj, nband, nkpt, nspin) = chipsi.dim();
        if nproj != traits.len() {
            return Err(DftError::InconsistentDimensions(format!(
                "projector tensor has {} projectors but {} traits",
                nproj,
                traits.len()
            )));
        }
        if nband != bands.nband() || nkpt != bands.nkpt() || nspin != bands.nspin() {
            return Err(DftError::InconsistentDimensions(format!(
                "projector tensor trailing axes {:?} disagree with bands ({}, {}, {})",
                (nband, nkpt, nspin),
                bands.nband(),
                bands.nkpt(),
                bands.nspin()
            )));
        }
        Ok(Self { chipsi, traits })
    }

    /// Number of raw projectors
    pub fn nproj(&self) -> usize {
        self.chipsi.dim().0
    }
}

/// Frequency axis selector for Green's functions and self-energies
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FrequencyAxis {
    /// Imaginary (Matsubara) axis
    Matsubara,
    /// Real-energy axis with a small broadening
    Real,
}

/// Frequency mesh for local and lattice quantities
///
/// On the Matsubara axis the points are the fermionic frequencies
/// `w_m = (2m + 1) pi / beta`; the Green's-function argument is then
/// `i w_m`. On the real axis the points span a linear energy grid and
/// every argument carries a small positive broadening `eta` to keep the
/// lattice inverse away from poles.
#[derive(Debug, Clone)]
pub struct FrequencyMesh {
    /// Which axis this mesh lives on
    pub axis: FrequencyAxis,
    /// Inverse temperature (1/eV); meaningful on the Matsubara axis
    pub beta: f64,
    /// The frequency points (real numbers)
    pub points: Vec<f64>,
    /// Broadening for real-axis points
    pub eta: f64,
}

impl FrequencyMesh {
    /// Build a fermionic Matsubara mesh with `nfreq` positive frequencies
    pub fn matsubara(beta: f64, nfreq: usize) -> Result<Self> {
        if beta <= 0.0 {
            return Err(DftError::InvalidParameter(format!(
                "inverse temperature must be positive, got {}",
                beta
            )));
        }
        if nfreq == 0 {
            return Err(DftError::InvalidParameter(
                "frequency mesh must contain at least one point".to_string(),
            ));
        }
        let points = (0..nfreq)
            .map(|m| (2.0 * m as f64 + 1.0) * PI / beta)
            .collect();
        Ok(Self {
            axis: FrequencyAxis::Matsubara,
            beta,
            points,
            eta: 0.0,
        })
    }

    /// Build a linear real-axis mesh with broadening `eta`
    pub fn real(emin: f64, emax: f64, nfreq: usize, eta: f64) -> Result<Self> {
        if nfreq < 2 {
            return Err(DftError::InvalidParameter(
                "real-axis mesh needs at least two points".to_string(),
            ));
        }
        if emax <= emin {
            return Err(DftError::InvalidParameter(format!(
                "real-axis mesh requires emax > emin, got [{}, {}]",
                emin, emax
            )));
        }
        if eta <= 0.0 {
            return Err(DftError::InvalidParameter(
                "real-axis broadening must be positive".to_string(),
            ));
        }
        let step = (emax - emin) / (nfreq as f64 - 1.0);
        let points = (0..nfreq).map(|m| emin + step * m as f64).collect();
        Ok(Self {
            axis: FrequencyAxis::Real,
            beta: 0.0,
            points,
            eta,
        })
    }

    /// Number of frequency points
    pub fn nfreq(&self) -> usize {
        self.points.len()
    }

    /// Complex frequency argument entering the lattice Green's function
    ///
    /// Matsubara: `i w_m`. Real axis: `w_m + i eta`.
    pub fn argument(&self, m: usize) -> Complex64 {
        match self.axis {
            FrequencyAxis::Matsubara => Complex64::new(0.0, self.points[m]),
            FrequencyAxis::Real => Complex64::new(self.points[m], self.eta),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_calibrate_shifts_fermi_to_zero() {
        let enk = Array3::from_shape_fn((3, 2, 1), |(b, k, _)| b as f64 + 0.1 * k as f64);
        let occupy = Array3::zeros((3, 2, 1));
        let mut bands = BandStructure::new(enk, occupy).unwrap();

        bands.calibrate(1.0);
        assert_relative_eq!(bands.enk[(0, 0, 0)], -1.0, epsilon = 1e-15);
        assert_relative_eq!(bands.enk[(2, 1, 0)], 1.1, epsilon = 1e-15);

        // A second pass with fermi = 0 is a no-op
        bands.calibrate(0.0);
        assert_relative_eq!(bands.enk[(0, 0, 0)], -1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_band_structure_shape_mismatch() {
        let enk = Array3::zeros((3, 2, 1));
        let occupy = Array3::zeros((3, 2, 2));
        assert!(BandStructure::new(enk, occupy).is_err());
    }

    #[test]
    fn test_projector_trait_parse() {
        let t = ProjectorTrait::parse(0, "dxy").unwrap();
        assert_eq!(t.l, 2);
        assert_eq!(t.m, 0);

        let t = ProjectorTrait::parse(3, "dx2-y2").unwrap();
        assert_eq!(t.l, 2);
        assert_eq!(t.m, 4);

        assert!(ProjectorTrait::parse(0, "g9").is_err());
    }

    #[test]
    fn test_raw_projectors_dimension_check() {
        let enk = Array3::zeros((4, 2, 1));
        let occupy = Array3::zeros((4, 2, 1));
        let bands = BandStructure::new(enk, occupy).unwrap();

        let chipsi = Array4::zeros((1, 4, 2, 1));
        let traits = vec![ProjectorTrait::parse(0, "s").unwrap()];
        assert!(RawProjectors::new(chipsi, traits.clone(), &bands).is_ok());

        let bad = Array4::zeros((1, 5, 2, 1));
        assert!(RawProjectors::new(bad, traits, &bands).is_err());
    }

    #[test]
    fn test_matsubara_mesh() {
        let mesh = FrequencyMesh::matsubara(10.0, 3).unwrap();
        assert_eq!(mesh.nfreq(), 3);
        assert_relative_eq!(mesh.points[0], PI / 10.0, epsilon = 1e-12);
        assert_relative_eq!(mesh.points[1], 3.0 * PI / 10.0, epsilon = 1e-12);

        let z = mesh.argument(0);
        assert_relative_eq!(z.re, 0.0, epsilon = 1e-15);
        assert_relative_eq!(z.im, PI / 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_real_mesh_carries_broadening() {
        let mesh = FrequencyMesh::real(-1.0, 1.0, 5, 0.01).unwrap();
        assert_eq!(mesh.nfreq(), 5);
        let z = mesh.argument(2);
        assert_relative_eq!(z.re, 0.0, epsilon = 1e-12);
        assert_relative_eq!(z.im, 0.01, epsilon = 1e-15);
    }

    #[test]
    fn test_kmesh_weight_sum() {
        let points = Array2::zeros((4, 3));
        let mesh = KMesh::uniform(points);
        assert_relative_eq!(mesh.weight_sum(), 4.0, epsilon = 1e-15);
    }

    #[test]
    fn test_lattice_validate() {
        let lattice = Lattice {
            case: "SrVO3".to_string(),
            scale: 1.0,
            nsort: 2,
            natom: 3,
            vectors: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            sorts: vec![("Sr".to_string(), 1), ("O".to_string(), 2)],
            atoms: vec!["Sr".to_string(), "O".to_string(), "O".to_string()],
            coords: vec![[0.0; 3], [0.5, 0.5, 0.0], [0.0, 0.5, 0.5]],
        };
        assert!(lattice.validate().is_ok());

        let mut bad = lattice.clone();
        bad.natom = 4;
        assert!(bad.validate().is_err());
    }
}
