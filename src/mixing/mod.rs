/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Self-energy mixing between iterations
//!
//! Straight substitution of the solver output tends to oscillate, so the
//! new self-energy is blended with the previous one before the next
//! lattice step. Mixers are stateful objects behind a trait; the loop
//! driver only sees [`SigmaMixer`].

pub mod errors;

pub use errors::{MixingError, Result};

use ndarray::Array4;
use num_complex::Complex64;

/// A stateful mixer for per-site self-energies
pub trait SigmaMixer {
    /// Blend the freshly computed self-energies with the history
    ///
    /// `new` is consumed; the returned vector is what the next lattice
    /// step should use. Implementations keep whatever history they need
    /// across calls.
    fn mix(&mut self, new: Vec<Array4<Complex64>>) -> Result<Vec<Array4<Complex64>>>;

    /// Drop all history, e.g. at the start of a new outer cycle
    fn reset(&mut self);
}

/// Linear mixing: `sigma = alpha * new + (1 - alpha) * old`
///
/// The first call passes the input through unchanged since there is no
/// history yet.
#[derive(Debug)]
pub struct LinearMixer {
    alpha: f64,
    history: Option<Vec<Array4<Complex64>>>,
}

impl LinearMixer {
    /// Create a linear mixer with blending factor `alpha` in `[0, 1]`
    pub fn new(alpha: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(MixingError::InvalidFactor(alpha));
        }
        Ok(Self {
            alpha,
            history: None,
        })
    }

    /// The blending factor
    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl SigmaMixer for LinearMixer {
    fn mix(&mut self, new: Vec<Array4<Complex64>>) -> Result<Vec<Array4<Complex64>>> {
        let mixed = match self.history.take() {
            None => new,
            Some(old) => {
                if old.len() != new.len() {
                    return Err(MixingError::HistoryMismatch {
                        stored: old.len(),
                        supplied: new.len(),
                    });
                }
                let a = Complex64::new(self.alpha, 0.0);
                let b = Complex64::new(1.0 - self.alpha, 0.0);
                let mut out = Vec::with_capacity(new.len());
                for (n, o) in new.into_iter().zip(old.into_iter()) {
                    if n.dim() != o.dim() {
                        return Err(MixingError::ShapeMismatch(format!(
                            "stored {:?} vs supplied {:?}",
                            o.dim(),
                            n.dim()
                        )));
                    }
                    let mut blended = n;
                    blended.zip_mut_with(&o, |x, &y| *x = a * *x + b * y);
                    out.push(blended);
                }
                out
            }
        };
        self.history = Some(mixed.clone());
        Ok(mixed)
    }

    fn reset(&mut self) {
        self.history = None;
    }
}

/// Largest absolute elementwise difference between two self-energy sets
///
/// Used as the convergence measure for the self-energy between
/// successive iterations.
pub fn sigma_distance(a: &[Array4<Complex64>], b: &[Array4<Complex64>]) -> f64 {
    let mut max = 0.0_f64;
    for (x, y) in a.iter().zip(b.iter()) {
        for (u, v) in x.iter().zip(y.iter()) {
            max = max.max((u - v).norm());
        }
    }
    max
}
