/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Correlated-subspace registry
//!
//! Raw projectors are grouped by (site, angular momentum). Each group is
//! a value-type record owning its own list of raw projector indices; the
//! groups that match a user-declared impurity site additionally carry a
//! symmetry-adapted rotation matrix picked from a fixed shell table.

use super::errors::{ProjectorError, Result};
use crate::dft::ProjectorTrait;
use crate::input::ImpuritySite;
use ndarray::Array2;
use num_complex::Complex64;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// One correlated subspace: a (site, l) shell of raw projectors
#[derive(Debug, Clone)]
pub struct ProjectorGroup {
    /// Site (atom) index
    pub site: usize,
    /// Angular momentum quantum number
    pub l: u32,
    /// Whether this group is an impurity problem per user configuration
    pub corr: bool,
    /// Shell label, e.g. "d" or "d_t2g"
    pub shell: String,
    /// Rotation matrix mapping raw projectors to symmetry-adapted local
    /// orbitals, shape `ndim x (2l+1)`
    pub tr: Array2<Complex64>,
    /// Raw projector indices belonging to this group, in m order
    pub raw_indices: Vec<usize>,
}

impl ProjectorGroup {
    /// Number of symmetry-adapted local orbitals after rotation
    pub fn ndim(&self) -> usize {
        self.tr.nrows()
    }

    /// Shell multiplicity 2l+1
    pub fn multiplicity(&self) -> usize {
        (2 * self.l + 1) as usize
    }
}

fn identity_rotation(size: usize) -> Array2<Complex64> {
    Array2::eye(size)
}

fn selector_rotation(rows: &[usize], cols: usize) -> Array2<Complex64> {
    let mut tr = Array2::<Complex64>::zeros((rows.len(), cols));
    for (q, &row) in rows.iter().enumerate() {
        tr[(q, row)] = Complex64::new(1.0, 0.0);
    }
    tr
}

/// Fixed table mapping shell labels to rotation matrices
///
/// Real-harmonic d ordering: dxy, dyz, dz2, dxz, dx2-y2. The t2g
/// selector keeps rows {0, 1, 3}; the eg selector rows {2, 4}.
static SHELL_TABLE: Lazy<HashMap<&'static str, (u32, Array2<Complex64>)>> = Lazy::new(|| {
    let mut table = HashMap::new();
    table.insert("s", (0, identity_rotation(1)));
    table.insert("p", (1, identity_rotation(3)));
    table.insert("d", (2, identity_rotation(5)));
    table.insert("f", (3, identity_rotation(7)));
    table.insert("d_t2g", (2, selector_rotation(&[0, 1, 3], 5)));
    table.insert("d_eg", (2, selector_rotation(&[2, 4], 5)));
    table
});

/// Look up a shell label in the fixed rotation table
///
/// # Returns
///
/// The implied angular momentum and the rotation matrix, or an
/// `UnknownShell` error; there is no silent default.
pub fn shell_rotation(label: &str) -> Result<(u32, Array2<Complex64>)> {
    SHELL_TABLE
        .get(label)
        .cloned()
        .ok_or_else(|| ProjectorError::UnknownShell(label.to_string()))
}

fn default_shell_label(l: u32) -> &'static str {
    match l {
        0 => "s",
        1 => "p",
        2 => "d",
        _ => "f",
    }
}

/// Build the projector-group registry from raw traits and impurity
/// declarations
///
/// Groups are discovered from the raw projector traits in order of first
/// appearance; each must contain exactly 2l+1 members. Declared impurity
/// sites are then matched against the discovered groups: every
/// declaration must find its group (with a compatible angular momentum),
/// and undeclared groups remain uncorrelated passthroughs with identity
/// rotations.
///
/// # Arguments
///
/// * `traits` - Per-projector traits from the adaptor
/// * `impurities` - User-declared impurity sites with shell labels
///
/// # Returns
///
/// The complete group registry
pub fn build_registry(
    traits: &[ProjectorTrait],
    impurities: &[ImpuritySite],
) -> Result<Vec<ProjectorGroup>> {
    // Discover (site, l) groups in order of first appearance
    let mut order: Vec<(usize, u32)> = Vec::new();
    let mut members: HashMap<(usize, u32), Vec<usize>> = HashMap::new();
    for (p, t) in traits.iter().enumerate() {
        let key = (t.site, t.l);
        if !members.contains_key(&key) {
            order.push(key);
        }
        members.entry(key).or_default().push(p);
    }

    let mut groups = Vec::with_capacity(order.len());
    for (site, l) in order {
        let raw_indices = members.remove(&(site, l)).unwrap_or_default();
        let expected = (2 * l + 1) as usize;
        if raw_indices.len() != expected {
            return Err(ProjectorError::IncompleteShell {
                site,
                l,
                found: raw_indices.len(),
                expected,
            });
        }
        groups.push(ProjectorGroup {
            site,
            l,
            corr: false,
            shell: default_shell_label(l).to_string(),
            tr: identity_rotation(expected),
            raw_indices,
        });
    }

    // Attach the impurity declarations
    for imp in impurities {
        let (shell_l, tr) = shell_rotation(&imp.shell)?;
        let group = groups
            .iter_mut()
            .find(|g| g.site == imp.site && g.l == shell_l)
            .ok_or_else(|| {
                ProjectorError::ShellMismatch(format!(
                    "no raw projector group with l={} found at site {} for shell '{}'",
                    shell_l, imp.site, imp.shell
                ))
            })?;
        if group.corr {
            return Err(ProjectorError::ShellMismatch(format!(
                "site {} matched by more than one impurity declaration",
                imp.site
            )));
        }
        group.corr = true;
        group.shell = imp.shell.clone();
        group.tr = tr;
    }

    Ok(groups)
}
