/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Impurity-solver exchange layer
//!
//! The quantum impurity problem is solved by an external program. This
//! module fixes the on-disk protocol between the lattice side and that
//! program: a task file naming the next action, and a set of
//! frequency-indexed matrix files for the hybridization, the impurity
//! levels and the returned self-energy. Every file name and task label
//! is a closed enum; unknown strings are hard errors, never silently
//! mapped to a default.
//!
//! Matrix files are plain text. The first non-comment line carries the
//! dimensions, each following line one element:
//!
//! ```text
//! ndim nfreq nspin
//! freq spin row col re im
//! ```

pub mod errors;

pub use errors::{Result, SolverError};

use crate::dft::FrequencyMesh;
use ndarray::{Array3, Array4};
use num_complex::Complex64;
use std::fmt;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Name of the shared task file
pub const TASK_FILE: &str = "solver.task";

/// Actions the lattice side can ask of the solver process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverTask {
    /// Discard all solver state and start fresh
    Reset,
    /// Recompute the double-counting term from the current occupations
    Dcount,
    /// Distribute the new impurity inputs to the per-site solvers
    Split,
    /// Collect the per-site self-energies into the exchange files
    Gather,
}

impl SolverTask {
    /// The label written to the task file
    pub fn label(&self) -> &'static str {
        match self {
            SolverTask::Reset => "reset",
            SolverTask::Dcount => "dcount",
            SolverTask::Split => "split",
            SolverTask::Gather => "gather",
        }
    }
}

impl fmt::Display for SolverTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SolverTask {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "reset" => Ok(SolverTask::Reset),
            "dcount" => Ok(SolverTask::Dcount),
            "split" => Ok(SolverTask::Split),
            "gather" => Ok(SolverTask::Gather),
            other => Err(SolverError::UnknownTask(other.to_string())),
        }
    }
}

/// The fixed set of matrix exchange files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeFile {
    /// Impurity self-energy, solver -> lattice
    Sigma,
    /// Hybridization function, lattice -> solver
    Delta,
    /// Impurity energy levels, lattice -> solver
    Eimpx,
    /// Scattering rate, solver -> lattice
    Gamma,
}

impl ExchangeFile {
    /// File name inside the exchange directory, suffixed by the site index
    pub fn filename(&self, site: usize) -> String {
        let stem = match self {
            ExchangeFile::Sigma => "sigma",
            ExchangeFile::Delta => "delta",
            ExchangeFile::Eimpx => "eimpx",
            ExchangeFile::Gamma => "gamma",
        };
        format!("{}.{}.dmft", stem, site)
    }
}

/// Write the task file, atomically via a rename
pub fn write_task(dir: &Path, task: SolverTask) -> Result<()> {
    let tmp = dir.join(format!("{}.tmp", TASK_FILE));
    fs::write(&tmp, format!("{}\n", task.label()))?;
    fs::rename(&tmp, dir.join(TASK_FILE))?;
    Ok(())
}

/// Read and parse the task file
pub fn read_task(dir: &Path) -> Result<SolverTask> {
    let content = fs::read_to_string(dir.join(TASK_FILE))?;
    content.parse()
}

/// Write a frequency-indexed matrix function to an exchange file
pub fn write_matrix_function(path: &Path, data: &Array4<Complex64>) -> Result<()> {
    let (ndim, ndim2, nfreq, nspin) = data.dim();
    debug_assert_eq!(ndim, ndim2);
    let file = fs::File::create(path)?;
    let mut out = BufWriter::new(file);
    writeln!(out, "{} {} {}", ndim, nfreq, nspin)?;
    for s in 0..nspin {
        for f in 0..nfreq {
            for i in 0..ndim {
                for j in 0..ndim {
                    let v = data[(i, j, f, s)];
                    writeln!(out, "{} {} {} {} {:.16e} {:.16e}", f, s, i, j, v.re, v.im)?;
                }
            }
        }
    }
    out.flush()?;
    Ok(())
}

/// Write the static impurity levels as a single-frequency matrix file
pub fn write_level_matrix(path: &Path, levels: &Array3<Complex64>) -> Result<()> {
    let (ndim, _, nspin) = levels.dim();
    let mut data = Array4::<Complex64>::zeros((ndim, ndim, 1, nspin));
    data.slice_mut(ndarray::s![.., .., 0, ..]).assign(levels);
    write_matrix_function(path, &data)
}

/// Read a frequency-indexed matrix function from an exchange file
///
/// The declared dimensions must match `(ndim, nfreq, nspin)`; every
/// element must be present exactly once.
pub fn read_matrix_function(
    path: &Path,
    ndim: usize,
    nfreq: usize,
    nspin: usize,
) -> Result<Array4<Complex64>> {
    let name = path.display().to_string();
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut data = Array4::<Complex64>::zeros((ndim, ndim, nfreq, nspin));
    let mut seen = 0_usize;
    let mut header_done = false;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();

        if !header_done {
            if fields.len() != 3 {
                return Err(SolverError::Format {
                    file: name.clone(),
                    line: idx + 1,
                    reason: "header must be 'ndim nfreq nspin'".to_string(),
                });
            }
            let parse = |s: &str| -> Result<usize> {
                s.parse().map_err(|_| SolverError::Format {
                    file: name.clone(),
                    line: idx + 1,
                    reason: format!("bad integer '{}'", s),
                })
            };
            let (d, f, sp) = (parse(fields[0])?, parse(fields[1])?, parse(fields[2])?);
            if (d, f, sp) != (ndim, nfreq, nspin) {
                return Err(SolverError::Dimension(format!(
                    "{} declares ({}, {}, {}), expected ({}, {}, {})",
                    name, d, f, sp, ndim, nfreq, nspin
                )));
            }
            header_done = true;
            continue;
        }

        if fields.len() != 6 {
            return Err(SolverError::Format {
                file: name.clone(),
                line: idx + 1,
                reason: format!("expected 6 fields, found {}", fields.len()),
            });
        }
        let bad = |what: &str| SolverError::Format {
            file: name.clone(),
            line: idx + 1,
            reason: format!("bad {} '{}'", what, fields.join(" ")),
        };
        let f: usize = fields[0].parse().map_err(|_| bad("frequency index"))?;
        let s: usize = fields[1].parse().map_err(|_| bad("spin index"))?;
        let i: usize = fields[2].parse().map_err(|_| bad("row index"))?;
        let j: usize = fields[3].parse().map_err(|_| bad("column index"))?;
        let re: f64 = fields[4].parse().map_err(|_| bad("real part"))?;
        let im: f64 = fields[5].parse().map_err(|_| bad("imaginary part"))?;

        if f >= nfreq || s >= nspin || i >= ndim || j >= ndim {
            return Err(SolverError::Format {
                file: name.clone(),
                line: idx + 1,
                reason: format!("index ({}, {}, {}, {}) out of range", f, s, i, j),
            });
        }
        data[(i, j, f, s)] = Complex64::new(re, im);
        seen += 1;
    }

    let expected = ndim * ndim * nfreq * nspin;
    if seen != expected {
        return Err(SolverError::Dimension(format!(
            "{} holds {} elements, expected {}",
            name, seen, expected
        )));
    }
    Ok(data)
}

/// Everything the solver needs for one iteration
#[derive(Debug)]
pub struct SolverInput<'a> {
    /// Frequency mesh shared by both sides
    pub mesh: &'a FrequencyMesh,
    /// Chemical potential
    pub mu: f64,
    /// Impurity levels per site, `(ndim, ndim, nspin)`
    pub levels: &'a [Array3<Complex64>],
    /// Hybridization function per site, `(ndim, ndim, nfreq, nspin)`
    pub hybridization: &'a [Array4<Complex64>],
}

/// A quantum impurity solver
///
/// Given the hybridization and the levels, produce a new self-energy for
/// every site. Implementations may run in-process or drive an external
/// program through the exchange files.
pub trait ImpuritySolver {
    /// Solve all impurity problems for one iteration
    fn solve(&mut self, input: &SolverInput<'_>) -> Result<Vec<Array4<Complex64>>>;
}

/// Solver that talks to an external program through the exchange files
///
/// One `solve` call writes the hybridization and level files plus a
/// `split` task, then polls for the self-energy files to appear. The
/// external program signals completion by deleting the task file.
#[derive(Debug)]
pub struct FileExchangeSolver {
    workdir: PathBuf,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl FileExchangeSolver {
    /// Create a solver bound to an exchange directory
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            poll_interval: Duration::from_millis(500),
            timeout: None,
        }
    }

    /// Abort `solve` if the external program has not answered in time
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Change the polling interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn wait_for_completion(&self) -> Result<()> {
        let task_path = self.workdir.join(TASK_FILE);
        let start = Instant::now();
        while task_path.exists() {
            if let Some(limit) = self.timeout {
                if start.elapsed() > limit {
                    return Err(SolverError::Timeout(task_path.display().to_string()));
                }
            }
            std::thread::sleep(self.poll_interval);
        }
        Ok(())
    }
}

impl ImpuritySolver for FileExchangeSolver {
    fn solve(&mut self, input: &SolverInput<'_>) -> Result<Vec<Array4<Complex64>>> {
        let nfreq = input.mesh.nfreq();

        for (site, (delta, levels)) in input
            .hybridization
            .iter()
            .zip(input.levels.iter())
            .enumerate()
        {
            let delta_path = self.workdir.join(ExchangeFile::Delta.filename(site));
            write_matrix_function(&delta_path, delta)?;
            let level_path = self.workdir.join(ExchangeFile::Eimpx.filename(site));
            write_level_matrix(&level_path, levels)?;
        }
        write_task(&self.workdir, SolverTask::Split)?;
        log::info!(
            "Waiting for the impurity solver in {}",
            self.workdir.display()
        );
        self.wait_for_completion()?;

        let mut sigma = Vec::with_capacity(input.hybridization.len());
        for (site, delta) in input.hybridization.iter().enumerate() {
            let (ndim, _, _, nspin) = delta.dim();
            let path = self.workdir.join(ExchangeFile::Sigma.filename(site));
            sigma.push(read_matrix_function(&path, ndim, nfreq, nspin)?);
        }
        Ok(sigma)
    }
}
