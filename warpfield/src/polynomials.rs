/////////////////////////////////////////////////////////////////////////////////////////////
//
// Evaluates the affine basis used for the linear part of kernel transforms.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::common;
use faer::Mat;

/// Evaluates the affine basis `[1, x_0, ..., x_{d-1}]` at every row of `points`, with
/// coordinates first scaled into the `[-1, 1]^d` hypercube.
pub(crate) fn evaluate_affine_basis(
    points: &Mat<f64>,
    translation_factor: &[f64],
    scale_factor: &[f64],
) -> Mat<f64> {
    let mut scaled_points = points.clone();

    common::scale_points(&mut scaled_points, translation_factor, scale_factor);

    let (n, d) = scaled_points.shape();
    let mut basis = Mat::<f64>::zeros(n, d + 1);

    // constant column
    basis.col_mut(0).fill(1.0);

    // linear columns
    basis.subcols_mut(1, d).copy_from(&scaled_points.as_ref());

    basis
}

/// Writes the scaled affine basis of a single point into `out`, which holds `d + 1` values.
#[inline(always)]
pub(crate) fn affine_basis_at(
    point: &[f64],
    translation_factor: &[f64],
    scale_factor: &[f64],
    out: &mut [f64],
) {
    out[0] = 1.0;
    for (j, x) in point.iter().enumerate() {
        out[j + 1] = (x - translation_factor[j]) / scale_factor[j];
    }
}
