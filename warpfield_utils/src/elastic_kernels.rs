/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the elastic body splines, whose response couples the displacement components.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Elastic body splines model the landmarks as point loads in a homogeneous isotropic
//! elastic body.
//!
//! # References
//! 1. M. H. Davis, A. Khotanzad, D. P. Flamig, S. E. Harms. A physics-based coordinate
//!    transformation for 3-D image matching. IEEE Trans. Med. Imaging, 16(3):317-328, 1997.

use crate::{
    KernelFromParams, KernelFunction, KernelParams,
    constants::{ELASTIC_ALPHA, SEPARATION_EPSILON},
};

/// Elastic body spline with `G(x) = (alpha r^2 I - 3 x x^T) r`.
#[derive(Clone, Debug, Copy)]
pub struct ElasticBodySplineKernel;

impl KernelFunction for ElasticBodySplineKernel {
    const ISOTROPIC: bool = false;

    /// Isotropic part of the response, `alpha r^3`.
    #[inline(always)]
    fn phi(&self, r: f64) -> f64 {
        ELASTIC_ALPHA * r.powi(3)
    }

    #[inline(always)]
    fn definiteness(&self) -> f64 {
        1.0
    }

    #[inline(always)]
    fn response(&self, separation: &[f64], g: &mut [f64]) {
        let d = separation.len();
        let r2: f64 = separation.iter().map(|x| x * x).sum();
        let r = r2.sqrt();

        for k in 0..d {
            for m in 0..d {
                let diagonal = if k == m { ELASTIC_ALPHA * r2 } else { 0.0 };
                g[k * d + m] = (diagonal - 3.0 * separation[k] * separation[m]) * r;
            }
        }
    }
}

impl KernelFromParams for ElasticBodySplineKernel {
    #[inline(always)]
    fn from_params(_: &KernelParams) -> Self {
        ElasticBodySplineKernel
    }
}

/// Elastic body reciprocal spline with `G(x) = alpha r I - 3 x x^T / r`.
#[derive(Clone, Debug, Copy)]
pub struct ElasticBodyReciprocalSplineKernel;

impl KernelFunction for ElasticBodyReciprocalSplineKernel {
    const ISOTROPIC: bool = false;

    /// Isotropic part of the response, `alpha r`.
    #[inline(always)]
    fn phi(&self, r: f64) -> f64 {
        ELASTIC_ALPHA * r
    }

    #[inline(always)]
    fn definiteness(&self) -> f64 {
        -1.0
    }

    #[inline(always)]
    fn response(&self, separation: &[f64], g: &mut [f64]) {
        let d = separation.len();
        let r = crate::norm(separation);

        if r < SEPARATION_EPSILON {
            g[..d * d].fill(0.0);
            return;
        }

        for k in 0..d {
            for m in 0..d {
                let diagonal = if k == m { ELASTIC_ALPHA * r } else { 0.0 };
                g[k * d + m] = diagonal - 3.0 * separation[k] * separation[m] / r;
            }
        }
    }
}

impl KernelFromParams for ElasticBodyReciprocalSplineKernel {
    #[inline(always)]
    fn from_params(_: &KernelParams) -> Self {
        ElasticBodyReciprocalSplineKernel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elastic_body_response_along_axis() {
        let mut g = [0.0; 9];
        ElasticBodySplineKernel.response(&[2.0, 0.0, 0.0], &mut g);

        // (8 * 4 - 3 * 4) * 2 on the loaded axis, 8 * 4 * 2 across it.
        assert_eq!(g[0], 40.0);
        assert_eq!(g[4], 64.0);
        assert_eq!(g[8], 64.0);
        assert_eq!(g[1], 0.0);
    }

    #[test]
    fn reciprocal_response_along_axis() {
        let mut g = [0.0; 4];
        ElasticBodyReciprocalSplineKernel.response(&[0.0, 2.0], &mut g);

        assert_eq!(g[0], 16.0);
        assert_eq!(g[3], 10.0);
        assert_eq!(g[1], 0.0);
        assert_eq!(g[2], 0.0);
    }

    #[test]
    fn responses_vanish_at_zero_separation() {
        let mut g = [f64::NAN; 9];
        ElasticBodySplineKernel.response(&[0.0; 3], &mut g);
        assert!(g.iter().all(|v| *v == 0.0));

        let mut g = [f64::NAN; 9];
        ElasticBodyReciprocalSplineKernel.response(&[1e-12, 0.0, 0.0], &mut g);
        assert!(g.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn responses_are_symmetric_and_even() {
        let x = [0.3, -1.2, 0.7];
        let minus_x = [-0.3, 1.2, -0.7];
        let mut g = [0.0; 9];
        let mut g_neg = [0.0; 9];

        ElasticBodySplineKernel.response(&x, &mut g);
        ElasticBodySplineKernel.response(&minus_x, &mut g_neg);
        for k in 0..3 {
            for m in 0..3 {
                assert!((g[k * 3 + m] - g[m * 3 + k]).abs() < 1e-14);
                assert!((g[k * 3 + m] - g_neg[k * 3 + m]).abs() < 1e-14);
            }
        }

        ElasticBodyReciprocalSplineKernel.response(&x, &mut g);
        for k in 0..3 {
            for m in 0..3 {
                assert!((g[k * 3 + m] - g[m * 3 + k]).abs() < 1e-14);
            }
        }
    }
}
