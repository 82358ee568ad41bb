/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Dense complex linear algebra kernels
//!
//! This module provides the matrix operations the downfolding engine is
//! built on: conversions between `ndarray` tensors (used at module seams)
//! and `faer` matrices (used inside the kernels), a pivoted-LU inversion
//! for the frequency-dependent lattice Green's function, and a cyclic
//! Jacobi eigensolver for the Hermitian overlap matrices that appear in
//! Löwdin orthogonalization.

use super::errors::{Result, UtilsError};
use faer::Mat;
use ndarray::{Array1, Array2};
use num_complex::Complex64;

/// Pivots smaller than this are treated as an exactly singular column.
const PIVOT_THRESHOLD: f64 = 1e-300;

/// Convert from `ndarray::Array2<Complex64>` to `faer::Mat<Complex64>`
pub fn ndarray_to_faer(array: &Array2<Complex64>) -> Mat<Complex64> {
    let (rows, cols) = array.dim();
    let mut result = Mat::<Complex64>::zeros(rows, cols);

    for i in 0..rows {
        for j in 0..cols {
            result[(i, j)] = array[(i, j)];
        }
    }

    result
}

/// Convert from `faer::Mat<Complex64>` to `ndarray::Array2<Complex64>`
pub fn faer_to_ndarray(matrix: &Mat<Complex64>) -> Array2<Complex64> {
    let rows = matrix.nrows();
    let cols = matrix.ncols();
    let mut result = Array2::<Complex64>::zeros((rows, cols));

    for i in 0..rows {
        for j in 0..cols {
            result[(i, j)] = matrix[(i, j)];
        }
    }

    result
}

/// Conjugate transpose of a complex matrix
pub fn adjoint(a: &Array2<Complex64>) -> Array2<Complex64> {
    let (rows, cols) = a.dim();
    let mut result = Array2::<Complex64>::zeros((cols, rows));

    for i in 0..rows {
        for j in 0..cols {
            result[(j, i)] = a[(i, j)].conj();
        }
    }

    result
}

/// Invert a general complex matrix via LU decomposition with partial pivoting
///
/// This is the dominant per-(k, frequency) cost of the lattice
/// Green's-function construction, so the matrix is kept in `faer` storage
/// throughout the elimination and the triangular solves.
///
/// # Arguments
///
/// * `matrix` - The square complex matrix to invert
///
/// # Returns
///
/// The inverse matrix, or a `SingularMatrix` error when a pivot collapses
pub fn invert_complex(matrix: &Array2<Complex64>) -> Result<Array2<Complex64>> {
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return Err(UtilsError::DimensionMismatch(format!(
            "cannot invert a {}x{} matrix",
            rows, cols
        )));
    }

    let n = rows;
    let mut a = ndarray_to_faer(matrix);
    let mut p = (0..n).collect::<Vec<usize>>();
    let mut l = Mat::<Complex64>::zeros(n, n);
    let mut u = Mat::<Complex64>::zeros(n, n);

    // LU decomposition with partial pivoting
    for k in 0..n {
        // Find pivot
        let mut pivot_row = k;
        let mut pivot_val = a[(k, k)].norm();

        for i in (k + 1)..n {
            let val = a[(i, k)].norm();
            if val > pivot_val {
                pivot_row = i;
                pivot_val = val;
            }
        }

        if pivot_val < PIVOT_THRESHOLD {
            return Err(UtilsError::SingularMatrix {
                pivot: pivot_val,
                column: k,
            });
        }

        // Swap rows if necessary
        if pivot_row != k {
            for j in 0..n {
                let temp = a[(k, j)];
                a[(k, j)] = a[(pivot_row, j)];
                a[(pivot_row, j)] = temp;
            }
            p.swap(k, pivot_row);
        }

        // Fill in U for this row
        for i in k..n {
            u[(k, i)] = a[(k, i)];
        }

        // Update the current column of L and the remaining submatrix
        for i in (k + 1)..n {
            l[(i, k)] = a[(i, k)] / u[(k, k)];
            for j in k..n {
                a[(i, j)] -= l[(i, k)] * u[(k, j)];
            }
        }
    }

    // Fill in the diagonal of L with 1's
    for i in 0..n {
        l[(i, i)] = Complex64::new(1.0, 0.0);
    }

    // Permuted identity as the right-hand side: row i of P*I is row
    // p[i] of the identity
    let rhs = Mat::<Complex64>::identity(n, n);
    let mut p_rhs = Mat::<Complex64>::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            p_rhs[(i, j)] = rhs[(p[i], j)];
        }
    }

    // Forward substitution to solve L*Y = P*I
    let mut y = Mat::<Complex64>::zeros(n, n);
    for j in 0..n {
        for i in 0..n {
            let mut sum = Complex64::new(0.0, 0.0);
            for k in 0..i {
                sum += l[(i, k)] * y[(k, j)];
            }
            y[(i, j)] = p_rhs[(i, j)] - sum;
        }
    }

    // Backward substitution to solve U*X = Y
    let mut inverted = Mat::<Complex64>::zeros(n, n);
    for j in 0..n {
        for i in (0..n).rev() {
            let mut sum = Complex64::new(0.0, 0.0);
            for k in (i + 1)..n {
                sum += u[(i, k)] * inverted[(k, j)];
            }
            inverted[(i, j)] = (y[(i, j)] - sum) / u[(i, i)];
        }
    }

    Ok(faer_to_ndarray(&inverted))
}

/// Eigendecomposition of a Hermitian complex matrix by cyclic Jacobi sweeps
///
/// Eigenvalues are returned in ascending order with eigenvectors in
/// matching columns, so that `A = V * diag(w) * V^H`.
///
/// # Arguments
///
/// * `matrix` - The Hermitian matrix to diagonalize
///
/// # Returns
///
/// A pair `(eigenvalues, eigenvectors)`
pub fn eigh(matrix: &Array2<Complex64>) -> Result<(Array1<f64>, Array2<Complex64>)> {
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return Err(UtilsError::DimensionMismatch(format!(
            "eigh requires a square matrix, got {}x{}",
            rows, cols
        )));
    }

    let n = rows;
    let mut a = matrix.clone();
    let mut v = Array2::<Complex64>::eye(n);

    let max_sweeps = 64;
    let tolerance = 1e-14 * frobenius_norm(matrix).max(1.0);

    let mut off = off_diagonal_norm(&a);
    let mut sweeps = 0;

    while off > tolerance {
        if sweeps >= max_sweeps {
            return Err(UtilsError::EigenNotConverged {
                sweeps,
                off_norm: off,
            });
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[(p, q)];
                if apq.norm() <= tolerance / (n as f64) {
                    continue;
                }

                let app = a[(p, p)].re;
                let aqq = a[(q, q)].re;
                let phi = apq.arg();
                let theta = 0.5 * (2.0 * apq.norm()).atan2(app - aqq);
                let c = theta.cos();
                let s = theta.sin();

                // Unitary plane rotation: G[p,p]=c, G[p,q]=-s e^{i phi},
                // G[q,p]=s e^{-i phi}, G[q,q]=c; A <- G^H A G, V <- V G.
                let e_pos = Complex64::from_polar(1.0, phi);
                let e_neg = e_pos.conj();

                // Row update (G^H A)
                for i in 0..n {
                    let api = a[(p, i)];
                    let aqi = a[(q, i)];
                    a[(p, i)] = api * c + aqi * (e_pos * s);
                    a[(q, i)] = api * (-s * e_neg) + aqi * c;
                }

                // Column update (A G)
                for i in 0..n {
                    let aip = a[(i, p)];
                    let aiq = a[(i, q)];
                    a[(i, p)] = aip * c + aiq * (e_neg * s);
                    a[(i, q)] = aip * (-s * e_pos) + aiq * c;
                }

                // Accumulate eigenvectors
                for i in 0..n {
                    let vip = v[(i, p)];
                    let viq = v[(i, q)];
                    v[(i, p)] = vip * c + viq * (e_neg * s);
                    v[(i, q)] = vip * (-s * e_pos) + viq * c;
                }
            }
        }

        off = off_diagonal_norm(&a);
        sweeps += 1;
    }

    // Collect eigenvalues from the (now real) diagonal and sort ascending
    let mut order: Vec<usize> = (0..n).collect();
    let diag: Vec<f64> = (0..n).map(|i| a[(i, i)].re).collect();
    order.sort_by(|&i, &j| diag[i].partial_cmp(&diag[j]).unwrap());

    let mut eigenvalues = Array1::<f64>::zeros(n);
    let mut eigenvectors = Array2::<Complex64>::zeros((n, n));
    for (col, &idx) in order.iter().enumerate() {
        eigenvalues[col] = diag[idx];
        for row in 0..n {
            eigenvectors[(row, col)] = v[(row, idx)];
        }
    }

    Ok((eigenvalues, eigenvectors))
}

/// Frobenius norm of a complex matrix
pub fn frobenius_norm(a: &Array2<Complex64>) -> f64 {
    a.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt()
}

fn off_diagonal_norm(a: &Array2<Complex64>) -> f64 {
    let n = a.nrows();
    let mut sum = 0.0;
    for p in 0..n {
        for q in 0..n {
            if p != q {
                sum += a[(p, q)].norm_sqr();
            }
        }
    }
    sum.sqrt()
}
