/////////////////////////////////////////////////////////////////////////////////////////////
//
// Provides synthetic warps for validating and demonstrating landmark kernel transforms.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use faer::Mat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Struct that implements synthetic 2D and 3D warps that map source landmarks to target
/// landmarks for testing kernel transforms.
pub struct WarpTestFunctions;

impl WarpTestFunctions {
    /// Affine warp `x -> M x + t`, with `M` given row-major as `d x d` values.
    pub fn affine(points: &Mat<f64>, matrix: &[f64], translation: &[f64]) -> Mat<f64> {
        let d = points.ncols();
        assert_eq!(matrix.len(), d * d);
        assert_eq!(translation.len(), d);

        Mat::from_fn(points.nrows(), d, |i, k| {
            translation[k] + (0..d).map(|m| matrix[k * d + m] * points[(i, m)]).sum::<f64>()
        })
    }

    /// Smooth non-linear warp: each coordinate is displaced by a sinusoid of the next.
    ///
    /// <div>
    /// $$ y_k = x_k + a \sin(\omega x_{k+1}) + \tfrac{a}{2} \cos(\omega x_k) $$
    /// </div>
    pub fn sinusoidal(points: &Mat<f64>, amplitude: f64, frequency: f64) -> Mat<f64> {
        let d = points.ncols();
        Mat::from_fn(points.nrows(), d, |i, k| {
            let x_k = points[(i, k)];
            let x_next = points[(i, (k + 1) % d)];
            x_k + amplitude * (frequency * x_next).sin() + 0.5 * amplitude * (frequency * x_k).cos()
        })
    }

    /// Radial bulge pushing points away from `center` with a Gaussian falloff of width
    /// `radius`.
    pub fn bulge(points: &Mat<f64>, center: &[f64], radius: f64, amplitude: f64) -> Mat<f64> {
        let d = points.ncols();
        assert_eq!(center.len(), d);

        let mut warped = points.clone();
        for i in 0..points.nrows() {
            let r2: f64 = (0..d).map(|k| (points[(i, k)] - center[k]).powi(2)).sum();
            let weight = amplitude * (-r2 / (radius * radius)).exp();
            for k in 0..d {
                warped[(i, k)] += weight * (points[(i, k)] - center[k]) / radius;
            }
        }
        warped
    }

    /// Adds reproducible uniform noise in `[-magnitude, magnitude)` to every coordinate.
    pub fn with_noise(points: &Mat<f64>, magnitude: f64, seed: u64) -> Mat<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        Mat::from_fn(points.nrows(), points.ncols(), |i, k| {
            points[(i, k)] + rng.random_range(-magnitude..magnitude)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::mat;

    #[test]
    fn affine_applies_matrix_then_translation() {
        let points = mat![[1.0, 2.0], [0.0, -1.0f64]];
        let warped = WarpTestFunctions::affine(&points, &[0.0, -1.0, 1.0, 0.0], &[10.0, 0.0]);
        assert_eq!(warped, mat![[8.0, 1.0], [11.0, 0.0f64]]);
    }

    #[test]
    fn bulge_leaves_center_fixed() {
        let points = mat![[5.0, 5.0], [6.0, 5.0f64]];
        let warped = WarpTestFunctions::bulge(&points, &[5.0, 5.0], 2.0, 1.0);
        assert_eq!(warped[(0, 0)], 5.0);
        assert!(warped[(1, 0)] > 6.0);
        assert_eq!(warped[(1, 1)], 5.0);
    }

    #[test]
    fn noise_is_bounded_and_reproducible() {
        let points = Mat::<f64>::zeros(50, 3);
        let a = WarpTestFunctions::with_noise(&points, 0.1, 3);
        let b = WarpTestFunctions::with_noise(&points, 0.1, 3);
        assert_eq!(a, b);
        assert!(a.col_iter().all(|c| c.iter().all(|v| v.abs() <= 0.1)));
    }
}
