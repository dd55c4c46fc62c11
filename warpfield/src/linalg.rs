/////////////////////////////////////////////////////////////////////////////////////////////
//
// Adds a pivoted LU factorisation with explicit singularity detection for kernel systems.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # linalg
//!
//! Helper linear algebra functionality.
//!
//! Kernel transform systems are symmetric saddle point systems `[[K, P], [P^T, 0]]`.
//! They are indefinite, so a Cholesky factorisation never applies. They are solved by
//! Gaussian elimination with partial pivoting, which reports rank deficiency as an
//! error instead of producing non-finite coefficients.
//!
//! Kernel entries grow with landmark separation while the affine block does not, so
//! systems are equilibrated with [`symmetric_equilibration`] before factorising.
//!
//! # References
//! 1. G. H. Golub, C. F. Van Loan. Matrix Computations, 4th ed., Algorithm 3.4.1, 2013.
//! 2. D. Ruiz. A scaling algorithm to equilibrate both rows and columns norms in
//!    matrices. Tech. Rep. RAL-TR-2001-034, Rutherford Appleton Laboratory, 2001.

use faer::{Mat, MatRef, linalg::triangular_solve};

/// Pivots smaller than this fraction of the largest matrix entry are treated as zero.
pub(crate) const PIVOT_TOLERANCE: f64 = 1e-12;

/// Row maxima within this distance of one end the equilibration.
const EQUILIBRATION_TOLERANCE: f64 = 1e-3;

const MAX_EQUILIBRATION_SWEEPS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FactorizationError {
    /// No pivot above tolerance was found for `column`.
    Singular { column: usize, pivot: f64 },
}

/// LU factorisation `P A = L U` of a square matrix, with `L` unit lower triangular.
///
/// `L` and `U` share one matrix: the strictly lower part holds `L`, the upper part `U`.
#[derive(Debug, Clone)]
pub struct PivotedLu {
    factors: Mat<f64>,
    row_perm: Vec<usize>,
}

#[allow(non_snake_case)]
impl PivotedLu {
    /// Factorises `A`, failing with [`FactorizationError::Singular`] when a column has
    /// no usable pivot.
    pub fn try_new(A: MatRef<'_, f64>) -> Result<Self, FactorizationError> {
        assert_eq!(A.nrows(), A.ncols(), "PivotedLu requires a square matrix");
        let n = A.nrows();

        let mut LU = A.to_owned();
        let mut row_perm: Vec<usize> = (0..n).collect();

        let mut scale = 0.0f64;
        for j in 0..n {
            for i in 0..n {
                scale = scale.max(LU[(i, j)].abs());
            }
        }
        let threshold = PIVOT_TOLERANCE * scale;

        for k in 0..n {
            // Pivot search down column k
            let mut pivot_row = k;
            let mut pivot_abs = LU[(k, k)].abs();
            for i in k + 1..n {
                let candidate = LU[(i, k)].abs();
                if candidate > pivot_abs {
                    pivot_row = i;
                    pivot_abs = candidate;
                }
            }

            // Negated so that NaN pivots are rejected as well
            if !(pivot_abs > threshold) {
                return Err(FactorizationError::Singular {
                    column: k,
                    pivot: pivot_abs,
                });
            }

            if pivot_row != k {
                for j in 0..n {
                    let tmp = LU[(k, j)];
                    LU[(k, j)] = LU[(pivot_row, j)];
                    LU[(pivot_row, j)] = tmp;
                }
                row_perm.swap(k, pivot_row);
            }

            let inv_pivot = 1.0 / LU[(k, k)];
            for i in k + 1..n {
                LU[(i, k)] *= inv_pivot;
            }

            // Rank-1 update of the trailing block, column by column
            for j in k + 1..n {
                let u_kj = LU[(k, j)];
                if u_kj == 0.0 {
                    continue;
                }
                for i in k + 1..n {
                    let l_ik = LU[(i, k)];
                    LU[(i, j)] -= l_ik * u_kj;
                }
            }
        }

        Ok(Self {
            factors: LU,
            row_perm,
        })
    }

    /// Dimension of the factorised matrix.
    pub fn dim(&self) -> usize {
        self.factors.nrows()
    }

    /// Solves `A X = B` for every column of `B`.
    pub fn solve(&self, B: &Mat<f64>) -> Mat<f64> {
        let n = self.dim();
        assert_eq!(B.nrows(), n, "right-hand side has the wrong number of rows");

        let mut X = Mat::from_fn(n, B.ncols(), |i, j| B[(self.row_perm[i], j)]);
        let par = faer::get_global_parallelism();

        // Forward substitution: L Y = P B
        triangular_solve::solve_unit_lower_triangular_in_place(
            self.factors.as_ref(),
            X.as_mut(),
            par,
        );

        // Backward substitution: U X = Y
        triangular_solve::solve_upper_triangular_in_place(self.factors.as_ref(), X.as_mut(), par);

        X
    }
}

/// Diagonal scaling `d` of a symmetric matrix `A` such that every row of
/// `diag(d) A diag(d)` has its largest absolute entry close to one.
///
/// Ruiz iteration in the max norm. Zero rows keep a unit scale.
pub(crate) fn symmetric_equilibration(A: MatRef<'_, f64>) -> Vec<f64> {
    let n = A.nrows();
    let mut scale = vec![1.0f64; n];
    let mut row_max = vec![0.0f64; n];

    for _ in 0..MAX_EQUILIBRATION_SWEEPS {
        for (i, max) in row_max.iter_mut().enumerate() {
            *max = (0..n)
                .map(|j| (scale[i] * A[(i, j)] * scale[j]).abs())
                .fold(0.0, f64::max);
        }

        let converged = row_max
            .iter()
            .all(|m| *m == 0.0 || !m.is_finite() || (1.0 - m).abs() <= EQUILIBRATION_TOLERANCE);
        if converged {
            break;
        }

        for (s, max) in scale.iter_mut().zip(&row_max) {
            if *max > 0.0 && max.is_finite() {
                *s /= max.sqrt();
            }
        }
    }

    scale
}

/// Infinity norm (maximum absolute row sum) of a matrix.
pub(crate) fn norm_inf(A: MatRef<'_, f64>) -> f64 {
    let mut best = 0.0f64;
    for i in 0..A.nrows() {
        let mut row_sum = 0.0;
        for j in 0..A.ncols() {
            row_sum += A[(i, j)].abs();
        }
        best = best.max(row_sum);
    }
    best
}

/// Largest absolute entry of a matrix.
pub(crate) fn max_abs(A: MatRef<'_, f64>) -> f64 {
    let mut best = 0.0f64;
    for j in 0..A.ncols() {
        for i in 0..A.nrows() {
            let value = A[(i, j)];
            if value.is_nan() {
                return f64::NAN;
            }
            best = best.max(value.abs());
        }
    }
    best
}
