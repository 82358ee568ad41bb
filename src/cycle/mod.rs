/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Iteration bookkeeping for the self-consistency loop
//!
//! A calculation advances along up to three nested axes: the DMFT loop,
//! the DFT loop inside a charge-self-consistent run, and the outer cycle
//! that alternates between the two. [`IterInfo`] is the single record of
//! where the run currently stands; it is serialized to JSON after every
//! step so an interrupted run can be inspected or resumed.
//!
//! One-shot runs collapse to the DMFT axis alone; asking for any other
//! axis in that mode is an error, not a no-op.

pub mod errors;

pub use errors::{CycleError, Result};

use crate::input::CalculationMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};

/// Name of the lock file guarding shared exchange directories
pub const LOCK_FILE: &str = "run.lock";

/// The three nested iteration axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Inner DMFT loop (self-energy self-consistency)
    Dmft,
    /// Inner DFT loop (charge self-consistency)
    Dft,
    /// Outer cycle alternating DFT and DMFT blocks
    Outer,
}

impl Axis {
    fn name(&self) -> &'static str {
        match self {
            Axis::Dmft => "dmft",
            Axis::Dft => "dft",
            Axis::Outer => "outer",
        }
    }
}

/// Complete record of one run's iteration state
///
/// Counters are 1-based once the axis has been entered; a counter of
/// zero means that axis has not started its current cycle yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterInfo {
    /// Number of nested self-consistency levels (1 or 2)
    pub sc: usize,
    /// DMFT iteration within the current outer cycle
    pub i1: usize,
    /// DFT iteration within the current outer cycle
    pub i2: usize,
    /// Outer cycle index
    pub i3: usize,
    /// Total inner iterations across all outer cycles
    pub i4: usize,
    /// Chemical potential on the lattice side
    pub mu_lattice: f64,
    /// Chemical potential reported by the impurity solver
    pub mu_impurity: f64,
    /// Chemical potential of the last DFT charge step
    pub mu_dft: f64,
    /// Double-counting potential per impurity site
    pub dcount: Vec<f64>,
    /// Correlated occupation per impurity site
    pub occupations: Vec<f64>,
    /// Total electron count in the correlated window
    pub total_occupation: f64,
    /// Total energy of the last completed step
    pub total_energy: f64,
    /// Self-energy difference below tolerance
    pub sigma_converged: bool,
    /// Charge difference below tolerance
    pub charge_converged: bool,
    /// Energy difference below tolerance
    pub energy_converged: bool,
    /// Completed `(i1, i2)` pairs of earlier outer cycles
    history: Vec<(usize, usize)>,
}

impl IterInfo {
    /// Fresh record for a run in the given mode
    pub fn new(mode: CalculationMode, nsite: usize) -> Self {
        Self {
            sc: mode.sc() as usize,
            i1: 0,
            i2: 0,
            i3: 1,
            i4: 0,
            mu_lattice: 0.0,
            mu_impurity: 0.0,
            mu_dft: 0.0,
            dcount: vec![0.0; nsite],
            occupations: vec![0.0; nsite],
            total_occupation: 0.0,
            total_energy: 0.0,
            sigma_converged: false,
            charge_converged: false,
            energy_converged: false,
            history: Vec::new(),
        }
    }

    /// Step one axis forward
    ///
    /// The DMFT and DFT axes also bump the global inner counter.
    /// Advancing the outer axis archives the finished inner counters and
    /// resets them for the next cycle. In a single-level run only the
    /// DMFT axis exists.
    pub fn advance(&mut self, axis: Axis) -> Result<()> {
        if self.sc == 1 && axis != Axis::Dmft {
            return Err(CycleError::AxisUnavailable {
                axis: axis.name().to_string(),
                mode: "single-level".to_string(),
            });
        }
        match axis {
            Axis::Dmft => {
                self.i1 += 1;
                self.i4 += 1;
            }
            Axis::Dft => {
                self.i2 += 1;
                self.i4 += 1;
            }
            Axis::Outer => {
                self.history.push((self.i1, self.i2));
                self.i1 = 0;
                self.i2 = 0;
                self.i3 += 1;
            }
        }
        Ok(())
    }

    /// Whether the run as a whole has converged
    ///
    /// A single-level run needs only the self-energy criterion; a
    /// charge-self-consistent run needs all three.
    pub fn converged(&self) -> bool {
        if self.sc == 1 {
            self.sigma_converged
        } else {
            self.sigma_converged && self.charge_converged && self.energy_converged
        }
    }

    /// Whether the self-energy should be mixed this iteration
    ///
    /// The first DMFT step of every outer cycle takes the solver output
    /// unmixed since there is no history within the cycle yet.
    pub fn should_mix(&self) -> bool {
        self.i1 > 1
    }

    /// Coordinates `(outer, dmft)` of the previous DMFT iteration
    ///
    /// Crosses outer-cycle boundaries through the archived counters.
    /// `None` before the very first DMFT iteration completes.
    pub fn prev_iteration(&self) -> Option<(usize, usize)> {
        if self.i1 > 1 {
            return Some((self.i3, self.i1 - 1));
        }
        for (back, &(i1, _)) in self.history.iter().rev().enumerate() {
            if i1 > 0 {
                return Some((self.i3 - 1 - back, i1));
            }
        }
        None
    }

    /// Fail if the given axis has exceeded its cap
    pub fn check_limit(&self, axis: Axis, cap: usize) -> Result<()> {
        let current = match axis {
            Axis::Dmft => self.i1,
            Axis::Dft => self.i2,
            Axis::Outer => self.i3,
        };
        if current > cap {
            return Err(CycleError::LimitExceeded(format!(
                "{} iteration {} exceeds the cap of {}",
                axis.name(),
                current,
                cap
            )));
        }
        Ok(())
    }

    /// Persist the record as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Load a previously saved record
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Block until a lock file disappears
///
/// Used when two processes share an exchange directory: the writer
/// creates the lock, the reader waits for it to clear. With `timeout`
/// set the wait gives up instead of hanging forever.
pub fn wait_for_unlock(
    path: &Path,
    interval: Duration,
    timeout: Option<Duration>,
) -> Result<()> {
    let start = Instant::now();
    while path.exists() {
        if let Some(limit) = timeout {
            if start.elapsed() > limit {
                return Err(CycleError::LockTimeout(path.display().to_string()));
            }
        }
        std::thread::sleep(interval);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_one_shot_only_dmft_axis() {
        let mut info = IterInfo::new(CalculationMode::OneShot, 1);
        assert_eq!(info.sc, 1);
        info.advance(Axis::Dmft).unwrap();
        assert_eq!((info.i1, info.i3, info.i4), (1, 1, 1));
        assert!(matches!(
            info.advance(Axis::Dft),
            Err(CycleError::AxisUnavailable { .. })
        ));
        assert!(matches!(
            info.advance(Axis::Outer),
            Err(CycleError::AxisUnavailable { .. })
        ));
        assert_eq!(info.i3, 1);
    }

    #[test]
    fn test_charge_self_consistent_axes() {
        let mut info = IterInfo::new(CalculationMode::ChargeSelfConsistent, 1);
        assert_eq!(info.sc, 2);
        info.advance(Axis::Dmft).unwrap();
        info.advance(Axis::Dmft).unwrap();
        info.advance(Axis::Dft).unwrap();
        assert_eq!((info.i1, info.i2, info.i4), (2, 1, 3));

        info.advance(Axis::Outer).unwrap();
        assert_eq!((info.i1, info.i2, info.i3), (0, 0, 2));
        // The global counter survives the cycle boundary
        assert_eq!(info.i4, 3);
    }

    #[test]
    fn test_should_mix_gates_first_inner_step() {
        let mut info = IterInfo::new(CalculationMode::ChargeSelfConsistent, 1);
        info.advance(Axis::Dmft).unwrap();
        assert!(!info.should_mix());
        info.advance(Axis::Dmft).unwrap();
        assert!(info.should_mix());
        info.advance(Axis::Outer).unwrap();
        info.advance(Axis::Dmft).unwrap();
        assert!(!info.should_mix());
    }

    #[test]
    fn test_prev_iteration_crosses_outer_boundary() {
        let mut info = IterInfo::new(CalculationMode::ChargeSelfConsistent, 1);
        assert_eq!(info.prev_iteration(), None);

        info.advance(Axis::Dmft).unwrap();
        assert_eq!(info.prev_iteration(), None);
        info.advance(Axis::Dmft).unwrap();
        info.advance(Axis::Dmft).unwrap();
        assert_eq!(info.prev_iteration(), Some((1, 2)));

        info.advance(Axis::Outer).unwrap();
        info.advance(Axis::Dmft).unwrap();
        // First step of cycle 2 looks back to the last step of cycle 1
        assert_eq!(info.prev_iteration(), Some((1, 3)));
    }

    #[test]
    fn test_converged_per_mode() {
        let mut one_shot = IterInfo::new(CalculationMode::OneShot, 1);
        one_shot.sigma_converged = true;
        assert!(one_shot.converged());

        let mut csc = IterInfo::new(CalculationMode::ChargeSelfConsistent, 1);
        csc.sigma_converged = true;
        assert!(!csc.converged());
        csc.charge_converged = true;
        csc.energy_converged = true;
        assert!(csc.converged());
    }

    #[test]
    fn test_check_limit() {
        let mut info = IterInfo::new(CalculationMode::OneShot, 1);
        for _ in 0..3 {
            info.advance(Axis::Dmft).unwrap();
        }
        assert!(info.check_limit(Axis::Dmft, 3).is_ok());
        assert!(matches!(
            info.check_limit(Axis::Dmft, 2),
            Err(CycleError::LimitExceeded(_))
        ));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("iter.json");

        let mut info = IterInfo::new(CalculationMode::ChargeSelfConsistent, 2);
        info.advance(Axis::Dmft).unwrap();
        info.mu_lattice = 1.25;
        info.dcount = vec![2.0, 2.5];
        info.sigma_converged = true;
        info.save(&path).unwrap();

        let back = IterInfo::load(&path).unwrap();
        assert_eq!(back.i1, 1);
        assert_eq!(back.dcount, vec![2.0, 2.5]);
        assert!(back.sigma_converged);
        assert!((back.mu_lattice - 1.25).abs() < 1e-15);
    }

    #[test]
    fn test_wait_for_unlock_clears() {
        let dir = tempdir().unwrap();
        let lock = dir.path().join(LOCK_FILE);
        std::fs::write(&lock, "").unwrap();

        let lock_clone = lock.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            std::fs::remove_file(&lock_clone).unwrap();
        });

        wait_for_unlock(&lock, Duration::from_millis(5), Some(Duration::from_secs(5))).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_for_unlock_times_out() {
        let dir = tempdir().unwrap();
        let lock = dir.path().join(LOCK_FILE);
        std::fs::write(&lock, "").unwrap();

        assert!(matches!(
            wait_for_unlock(
                &lock,
                Duration::from_millis(5),
                Some(Duration::from_millis(30))
            ),
            Err(CycleError::LockTimeout(_))
        ));
    }
}
