/////////////////////////////////////////////////////////////////////////////////////////////
//
// Supplies distance helpers, kernel matrix assembly, and the kernel registry dispatchers.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{KernelFromParams, KernelFunction, KernelParams, constants::MAX_DIMENSIONS};
use faer::{Mat, RowRef};
use serde::{Deserialize, Serialize};
use std::{error::Error, fmt, str::FromStr};

/// Computes the axis aligned bounding box (AABB) extents of a matrix of points.
///
/// Returns a flat vector containing the minimum and maximum values along each column (dimension)
/// of the input matrix. The result is arranged as:
///
/// `[min_0, min_1, ..., min_n, max_0, max_1, ..., max_n]`
///
/// where `n` is the number of columns in the matrix.
///
/// # Examples
///
/// ```
/// use faer::mat;
/// use warpfield_utils::get_pointarray_extents;
///
/// let points = mat![
///     [1.0, 2.0],
///     [3.0, -1.0],
///     [0.5, 4.0f64]
/// ];
/// let extents = get_pointarray_extents(&points);
/// assert_eq!(extents, vec![0.5, -1.0, 3.0, 4.0]);
/// ```
#[inline(always)]
pub fn get_pointarray_extents(points: &Mat<f64>) -> Vec<f64> {
    let ncols = points.ncols();
    let mut extents = vec![0.0; 2 * ncols];

    if points.nrows() == 0 {
        return extents;
    }

    for col in 0..ncols {
        extents[col] = points[(0, col)];
        extents[col + ncols] = points[(0, col)];
    }

    for row in points.row_iter() {
        for (col, item) in row.iter().enumerate() {
            if *item < extents[col] {
                extents[col] = *item;
            }
            if *item > extents[col + ncols] {
                extents[col + ncols] = *item;
            }
        }
    }

    extents
}

/// Calculates the euclidean distance between two points.
///
/// # Examples
///
/// ```
/// use faer::mat;
/// use warpfield_utils::get_distance;
///
/// let points = mat![
///     [1.0, 2.0],
///     [4.0, 6.0],
/// ];
///
/// let dist = get_distance(points.row(0), points.row(1));
///
/// assert_eq!(dist, 5.0);
/// ```
#[inline(always)]
pub fn get_distance(target: RowRef<f64>, source: RowRef<f64>) -> f64 {
    let mut dist = 0.0;
    for (t, s) in target.iter().zip(source.iter()) {
        let diff = t - s;
        dist += diff * diff;
    }
    dist.sqrt()
}

/// Euclidean length of a separation vector.
#[inline(always)]
pub fn norm(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Builds the symmetric landmark kernel matrix using a typed kernel function.
///
/// Isotropic kernels produce an `N x N` matrix of `phi(|p_i - p_j|)`. Tensor kernels produce
/// an `N D x N D` matrix whose `(i, j)` block is `G(p_i - p_j)`, so that the unknown for
/// landmark `i` and component `k` sits at row `i D + k`.
#[inline(always)]
pub fn get_kernel_matrix_typed<K>(points: &Mat<f64>, kernel_function: &K) -> Mat<f64>
where
    K: KernelFunction,
{
    let n = points.nrows();
    let d = points.ncols();
    debug_assert!(d <= MAX_DIMENSIONS);

    if K::ISOTROPIC {
        let mut k_matrix = Mat::<f64>::zeros(n, n);

        for j in 0..n {
            let source_row = points.row(j);

            for i in j..n {
                let k_val = kernel_function.phi(get_distance(points.row(i), source_row));

                // Write both symmetric entries
                k_matrix[(i, j)] = k_val;
                k_matrix[(j, i)] = k_val;
            }
        }

        return k_matrix;
    }

    let mut k_matrix = Mat::<f64>::zeros(n * d, n * d);
    let mut separation = [0.0; MAX_DIMENSIONS];
    let mut g = [0.0; MAX_DIMENSIONS * MAX_DIMENSIONS];

    for j in 0..n {
        for i in j..n {
            for (c, x) in separation[..d].iter_mut().enumerate() {
                *x = points[(i, c)] - points[(j, c)];
            }
            kernel_function.response(&separation[..d], &mut g[..d * d]);

            // G is symmetric and even, so the (j, i) block is the transpose of the (i, j) block.
            for r in 0..d {
                for c in 0..d {
                    let k_val = g[r * d + c];
                    k_matrix[(i * d + r, j * d + c)] = k_val;
                    k_matrix[(j * d + c, i * d + r)] = k_val;
                }
            }
        }
    }

    k_matrix
}

/// Adds `sum_i G(point - landmarks[i]) weights[i]` into `out` using a typed kernel function.
#[inline(always)]
pub fn accumulate_kernel_sum_typed<K>(
    point: &[f64],
    landmarks: &Mat<f64>,
    weights: &Mat<f64>,
    kernel_function: &K,
    out: &mut [f64],
) where
    K: KernelFunction,
{
    let d = point.len();
    debug_assert!(d <= MAX_DIMENSIONS);
    debug_assert_eq!(landmarks.ncols(), d);

    let mut separation = [0.0; MAX_DIMENSIONS];
    let mut g = [0.0; MAX_DIMENSIONS * MAX_DIMENSIONS];

    for i in 0..landmarks.nrows() {
        let mut r2 = 0.0;
        for c in 0..d {
            let diff = point[c] - landmarks[(i, c)];
            separation[c] = diff;
            r2 += diff * diff;
        }

        if K::ISOTROPIC {
            let value = kernel_function.phi(r2.sqrt());
            if value == 0.0 {
                continue;
            }
            for k in 0..d {
                out[k] += value * weights[(i, k)];
            }
        } else {
            kernel_function.response(&separation[..d], &mut g[..d * d]);
            for k in 0..d {
                let mut acc = 0.0;
                for m in 0..d {
                    acc += g[k * d + m] * weights[(i, m)];
                }
                out[k] += acc;
            }
        }
    }
}

/// Error returned when a kernel identifier does not name a registered kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKernelError {
    pub identifier: String,
}

impl fmt::Display for UnknownKernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let known: Vec<&str> = KernelType::ALL.iter().map(|k| k.identifier()).collect();
        write!(
            f,
            "unknown kernel {:?} (expected one of {})",
            self.identifier,
            known.join(", ")
        )
    }
}

impl Error for UnknownKernelError {}

// K-free dispatcher generated from the kernel registry below.
// Assumes each kernel type implements `KernelFromParams::from_params(&KernelParams) -> K`.
macro_rules! for_each_kernel {
    ( registry = [ $( ($V:ident, $id:literal, $Kty:path) ),* $(,)? ] ) => {

        /// Runtime kernel selector built from the kernel registry.
        ///
        /// Serialized and parsed through the short identifiers `TPS`, `TPSR2LOGR`, `VS`,
        /// `EBS` and `EBSR`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum KernelType {
            $(
                #[serde(rename = $id)]
                $V,
            )*
        }

        impl KernelType {
            /// Every registered kernel, in registry order.
            pub const ALL: &'static [KernelType] = &[ $( KernelType::$V, )* ];

            /// Short identifier of the kernel.
            pub fn identifier(&self) -> &'static str {
                match self {
                    $( KernelType::$V => $id, )*
                }
            }

            /// `true` when the kernel response is a scalar multiple of the identity.
            pub fn is_isotropic(&self) -> bool {
                match self {
                    $( KernelType::$V => <$Kty as KernelFunction>::ISOTROPIC, )*
                }
            }
        }

        /// Builds the symmetric landmark kernel matrix for the selected [`KernelType`].
        #[inline(always)]
        pub fn get_kernel_matrix(
            points: &Mat<f64>,
            params: &KernelParams,
        ) -> Mat<f64> {
            match params.kernel_type {
                $(
                    KernelType::$V => {
                        // Convert uniform params -> concrete kernel type
                        let k = <$Kty as KernelFromParams>::from_params(params);
                        // Call the generic; type `K` is inferred as `$Kty`
                        get_kernel_matrix_typed(points, &k)
                    }
                ),*
            }
        }

        /// Adds the weighted kernel sum at `point` into `out` for the selected [`KernelType`].
        #[inline(always)]
        pub fn accumulate_kernel_sum(
            point: &[f64],
            landmarks: &Mat<f64>,
            weights: &Mat<f64>,
            params: &KernelParams,
            out: &mut [f64],
        ) {
            match params.kernel_type {
                $(
                    KernelType::$V => {
                        let k = <$Kty as KernelFromParams>::from_params(params);
                        accumulate_kernel_sum_typed(point, landmarks, weights, &k, out)
                    }
                ),*
            }
        }

        /// Sign under which the selected kernel is conditionally positive definite.
        #[inline(always)]
        pub fn kernel_definiteness(params: &KernelParams) -> f64 {
            match params.kernel_type {
                $(
                    KernelType::$V => {
                        let k = <$Kty as KernelFromParams>::from_params(params);
                        k.definiteness()
                    }
                ), *
            }
        }
    };
}

for_each_kernel! {
    registry = [
        (ThinPlateSpline,             "TPS",       crate::kernels::ThinPlateSplineKernel),
        (ThinPlateR2LogRSpline,       "TPSR2LOGR", crate::kernels::ThinPlateR2LogRSplineKernel),
        (VolumeSpline,                "VS",        crate::kernels::VolumeSplineKernel),
        (ElasticBodySpline,           "EBS",       crate::kernels::ElasticBodySplineKernel),
        (ElasticBodyReciprocalSpline, "EBSR",      crate::kernels::ElasticBodyReciprocalSplineKernel),
    ]
}

impl Default for KernelType {
    fn default() -> Self {
        KernelType::ThinPlateSpline
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for KernelType {
    type Err = UnknownKernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        KernelType::ALL
            .iter()
            .copied()
            .find(|k| k.identifier().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownKernelError {
                identifier: s.to_string(),
            })
    }
}
