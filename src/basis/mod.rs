/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Basis mapping between the local and Kohn-Sham bases
//!
//! The overlap block `M` (ndim x nbnd) of an orthonormalized local basis
//! defines two mutually adjoint linear maps, applied independently at
//! every frequency point:
//!
//! * embedding (upfolding), local -> Kohn-Sham: `X_ks = M^H X M`
//! * projection (downfolding), Kohn-Sham -> local: `X_loc = M X M^H`
//!
//! For a square, unitary overlap block `project(embed(X)) = X` holds to
//! numerical tolerance; this is the key testable property of the pair.

pub mod errors;

pub use errors::{BasisError, Result};

use crate::utils::adjoint;
use ndarray::{Array2, Array3};
use num_complex::Complex64;

/// Embed a local-basis operator into the Kohn-Sham subspace (upfolding)
///
/// # Arguments
///
/// * `x_local` - Local operator, shape `(ndim, ndim, nfreq)`
/// * `overlap` - Overlap block, shape `(ndim, nbnd)`
///
/// # Returns
///
/// The embedded operator, shape `(nbnd, nbnd, nfreq)`
pub fn embed(x_local: &Array3<Complex64>, overlap: &Array2<Complex64>) -> Result<Array3<Complex64>> {
    let (ndim, nbnd) = overlap.dim();
    let (rows, cols, nfreq) = x_local.dim();
    if rows != ndim || cols != ndim {
        return Err(BasisError::DimensionMismatch(format!(
            "local operator is {}x{} but overlap has {} local orbitals",
            rows, cols, ndim
        )));
    }

    let overlap_h = adjoint(overlap);
    let mut x_ks = Array3::<Complex64>::zeros((nbnd, nbnd, nfreq));

    for f in 0..nfreq {
        let slice = x_local.slice(ndarray::s![.., .., f]).to_owned();
        let mapped = overlap_h.dot(&slice).dot(overlap);
        x_ks.slice_mut(ndarray::s![.., .., f]).assign(&mapped);
    }

    Ok(x_ks)
}

/// Project a Kohn-Sham-subspace operator back to the local basis
/// (downfolding)
///
/// # Arguments
///
/// * `x_ks` - Kohn-Sham operator, shape `(nbnd, nbnd, nfreq)`
/// * `overlap` - Overlap block, shape `(ndim, nbnd)`
///
/// # Returns
///
/// The projected operator, shape `(ndim, ndim, nfreq)`
pub fn project(x_ks: &Array3<Complex64>, overlap: &Array2<Complex64>) -> Result<Array3<Complex64>> {
    let (ndim, nbnd) = overlap.dim();
    let (rows, cols, nfreq) = x_ks.dim();
    if rows != nbnd || cols != nbnd {
        return Err(BasisError::DimensionMismatch(format!(
            "Kohn-Sham operator is {}x{} but overlap has {} bands",
            rows, cols, nbnd
        )));
    }

    let overlap_h = adjoint(overlap);
    let mut x_local = Array3::<Complex64>::zeros((ndim, ndim, nfreq));

    for f in 0..nfreq {
        let slice = x_ks.slice(ndarray::s![.., .., f]).to_owned();
        let mapped = overlap.dot(&slice).dot(&overlap_h);
        x_local.slice_mut(ndarray::s![.., .., f]).assign(&mapped);
    }

    Ok(x_local)
}
