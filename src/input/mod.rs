/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Calculation control structure
//!
//! All run-time knobs live in one immutable [`Control`] struct that is
//! constructed once (from a JSON file or programmatically) and passed by
//! reference into every component that needs it. Numerical routines
//! never consult any ambient global configuration.

pub mod errors;

pub use errors::{InputError, Result};

use crate::dft::FrequencyAxis;
use crate::window::BoundSpec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Overall calculation mode, selected once and never re-evaluated mid-run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalculationMode {
    /// Chemical-potential search only; no impurity problem is solved
    FermiSearch,
    /// One-shot DFT+DMFT: only the DMFT side iterates
    OneShot,
    /// Fully charge-self-consistent loop (counter contract only; the
    /// charge-feedback protocol upstream is a placeholder)
    ChargeSelfConsistent,
}

impl CalculationMode {
    /// Self-consistency level: 1 for one-shot-like modes, 2 for the full loop
    pub fn sc(&self) -> u32 {
        match self {
            CalculationMode::FermiSearch | CalculationMode::OneShot => 1,
            CalculationMode::ChargeSelfConsistent => 2,
        }
    }
}

/// Double-counting scheme selector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DoubleCountingScheme {
    /// Fully-localized limit
    FullyLocalizedLimit {
        /// Screened Coulomb interaction U (eV)
        u: f64,
        /// Hund exchange J (eV)
        j: f64,
    },
    /// Around-mean-field limit
    AroundMeanField {
        /// Screened Coulomb interaction U (eV)
        u: f64,
        /// Hund exchange J (eV)
        j: f64,
    },
    /// User-supplied constant (eV)
    Fixed(f64),
}

/// Declaration of one impurity site: which atom carries a correlated
/// shell and which symmetry-adapted subset of it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpuritySite {
    /// Site (atom) index, 0-based
    pub site: usize,
    /// Shell label: "s", "p", "d", "f", "d_t2g", or "d_eg"
    pub shell: String,
}

/// Convergence tolerances for the three independent flags
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Tolerances {
    /// Self-energy convergence threshold (max abs difference)
    pub sigma: f64,
    /// Charge convergence threshold
    pub charge: f64,
    /// Total-energy convergence threshold
    pub energy: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            sigma: 1e-4,
            charge: 1e-6,
            energy: 1e-6,
        }
    }
}

/// Maximum iteration counts per loop level
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MaxIterations {
    /// Inner DMFT iterations per outer cycle
    pub dmft: u32,
    /// Inner DFT-correction iterations per outer cycle
    pub dft: u32,
    /// Outer self-consistency cycles
    pub outer: u32,
}

impl Default for MaxIterations {
    fn default() -> Self {
        Self {
            dmft: 30,
            dft: 10,
            outer: 10,
        }
    }
}

/// The immutable run-control structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Control {
    /// Case label carried over from the DFT run
    pub case: String,
    /// Calculation mode
    pub mode: CalculationMode,
    /// Frequency axis for Green's functions and self-energies
    pub axis: FrequencyAxis,
    /// Inverse temperature (1/eV)
    pub beta: f64,
    /// Number of frequency points
    pub nfreq: usize,
    /// Real-axis broadening (ignored on the Matsubara axis)
    pub eta: f64,
    /// Real-axis energy range (ignored on the Matsubara axis)
    pub emin: f64,
    /// Real-axis energy range (ignored on the Matsubara axis)
    pub emax: f64,
    /// Band/energy window bounds: one shared entry or one per group
    pub bounds: Vec<BoundSpec>,
    /// Declared impurity sites
    pub impurities: Vec<ImpuritySite>,
    /// Double-counting scheme
    pub dcount: DoubleCountingScheme,
    /// Target total electron count for the chemical-potential search;
    /// `None` means take it from the DFT occupations
    pub nelect: Option<f64>,
    /// Linear mixing parameter for the self-energy
    pub mixing: f64,
    /// Convergence tolerances
    pub tolerances: Tolerances,
    /// Maximum iteration counts
    pub max_iterations: MaxIterations,
}

impl Control {
    /// Load a control structure from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let control: Control = serde_json::from_str(&text)?;
        control.validate()?;
        Ok(control)
    }

    /// Reject malformed configurations before any numerical work starts
    pub fn validate(&self) -> Result<()> {
        if self.beta <= 0.0 && self.axis == FrequencyAxis::Matsubara {
            return Err(InputError::Invalid(format!(
                "inverse temperature must be positive on the Matsubara axis, got {}",
                self.beta
            )));
        }
        if self.nfreq == 0 {
            return Err(InputError::Invalid(
                "at least one frequency point is required".to_string(),
            ));
        }
        if self.axis == FrequencyAxis::Real && self.eta <= 0.0 {
            return Err(InputError::Invalid(
                "real-axis calculations need a positive broadening".to_string(),
            ));
        }
        if self.axis == FrequencyAxis::Real && self.emax <= self.emin {
            return Err(InputError::Invalid(format!(
                "real-axis energy range must satisfy emax > emin, got [{}, {}]",
                self.emin, self.emax
            )));
        }
        if self.bounds.is_empty() {
            return Err(InputError::Invalid(
                "no band/energy window bounds declared".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.mixing) {
            return Err(InputError::Invalid(format!(
                "mixing parameter must lie in [0, 1], got {}",
                self.mixing
            )));
        }
        if self.tolerances.sigma <= 0.0
            || self.tolerances.charge <= 0.0
            || self.tolerances.energy <= 0.0
        {
            return Err(InputError::Invalid(
                "convergence tolerances must be positive".to_string(),
            ));
        }
        if self.mode != CalculationMode::FermiSearch && self.impurities.is_empty() {
            return Err(InputError::Invalid(
                "no impurity sites declared".to_string(),
            ));
        }

        // Each site may carry exactly one shell declaration.
        for (i, a) in self.impurities.iter().enumerate() {
            for b in self.impurities.iter().skip(i + 1) {
                if a.site == b.site {
                    return Err(InputError::Invalid(format!(
                        "site {} is declared more than once",
                        a.site
                    )));
                }
            }
        }

        Ok(())
    }

    /// Check the bound-list multiplicity against the discovered group count
    ///
    /// One entry is shared by all groups; otherwise the list must match
    /// the group count exactly.
    pub fn validate_bounds(&self, ngroups: usize) -> Result<()> {
        if self.bounds.len() != 1 && self.bounds.len() != ngroups {
            return Err(InputError::Invalid(format!(
                "{} window bounds declared for {} projector groups",
                self.bounds.len(),
                ngroups
            )));
        }
        Ok(())
    }
}

impl Default for Control {
    fn default() -> Self {
        Self {
            case: String::new(),
            mode: CalculationMode::OneShot,
            axis: FrequencyAxis::Matsubara,
            beta: 40.0,
            nfreq: 512,
            eta: 0.01,
            emin: -10.0,
            emax: 10.0,
            bounds: vec![BoundSpec::Energy {
                emin: -2.0,
                emax: 2.0,
            }],
            impurities: Vec::new(),
            dcount: DoubleCountingScheme::FullyLocalizedLimit { u: 4.0, j: 0.7 },
            nelect: None,
            mixing: 0.3,
            tolerances: Tolerances::default(),
            max_iterations: MaxIterations::default(),
        }
    }
}
