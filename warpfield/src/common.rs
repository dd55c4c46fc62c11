/////////////////////////////////////////////////////////////////////////////////////////////
//
// Defines shared helpers for random point generation and coordinate scaling.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

use faer::Mat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generate a matrix of random points in the unit hypercube.
///
/// # Parameters
/// - `n`: Number of points to generate (rows in the output matrix).
/// - `d`: Number of spatial dimensions per point (columns in the output matrix).
/// - `seed`: Optional random seed.  
///   - If `Some(seed)` is provided, the same sequence of points will be generated
///     deterministically across runs and platforms (useful for reproducible tests).
///   - If `None`, the generator is seeded from the operating system's randomness source.
///
/// # Returns
/// A `Mat<f64>` of shape `(n, d)` where each element lies in `[0.0, 1.0)`.
///
/// # Example
/// ```
/// use warpfield::generate_random_points;
///
/// // Generate 20 reproducible 3D landmarks
/// let pts = generate_random_points(20, 3, Some(42));
/// assert_eq!(pts.ncols(), 3);
/// ```
pub fn generate_random_points(n: usize, d: usize, seed: Option<u64>) -> Mat<f64> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    Mat::from_fn(n, d, |_, _| rng.random_range(0.0..1.0))
}

/// Returns the per-dimension translation and scale mapping the bounding box of
/// `point_locations` onto `[-1, 1]^d`.
///
/// Zero-width dimensions get a scale of `1.0`.
pub(crate) fn get_cheb_cube_scaling_factors(point_locations: &Mat<f64>) -> (Vec<f64>, Vec<f64>) {
    let dimensions = point_locations.ncols();
    let extents = warpfield_utils::get_pointarray_extents(point_locations);

    let mut translation_factor: Vec<f64> = Vec::with_capacity(dimensions);
    let mut scale_factor: Vec<f64> = Vec::with_capacity(dimensions);

    (0..dimensions).for_each(|d| {
        let max_coord = extents[d + dimensions];
        let min_coord = extents[d];
        translation_factor.push((max_coord + min_coord) / 2.0);
        scale_factor.push((max_coord - min_coord) / 2.0);
    });

    scale_factor.iter_mut().for_each(|element| {
        if *element == 0.0 {
            *element = 1.0;
        }
    });

    (translation_factor, scale_factor)
}

/// Applies `(x - translation) / scale` to every row of `points` in place.
pub(crate) fn scale_points(points: &mut Mat<f64>, translation_factor: &[f64], scale_factor: &[f64]) {
    points.row_iter_mut().for_each(|row| {
        row.iter_mut().enumerate().for_each(|(col_idx, element)| {
            *element = (*element - translation_factor[col_idx]) / scale_factor[col_idx];
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::mat;

    #[test]
    fn seeded_points_are_reproducible() {
        let a = generate_random_points(10, 3, Some(7));
        let b = generate_random_points(10, 3, Some(7));
        assert_eq!(a, b);
        assert!(a.col_iter().all(|c| c.iter().all(|v| (0.0..1.0).contains(v))));
    }

    #[test]
    fn scaling_maps_extents_to_unit_cube() {
        let mut points = mat![[0.0, 5.0], [10.0, 5.0], [4.0, 5.0f64]];
        let (translation, scale) = get_cheb_cube_scaling_factors(&points);

        assert_eq!(translation, vec![5.0, 5.0]);
        assert_eq!(scale, vec![5.0, 1.0]);

        scale_points(&mut points, &translation, &scale);
        assert_eq!(points, mat![[-1.0, 0.0], [1.0, 0.0], [-0.2, 0.0f64]]);
    }
}
