/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the isotropic spline kernels whose response is a radial profile times identity.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{KernelFromParams, KernelFunction, KernelParams};

#[inline(always)]
fn r2_log_r(r: f64) -> f64 {
    match r.abs() < f64::EPSILON {
        true => 0.0,
        false => r.powi(2) * r.ln(),
    }
}

/// Thin-plate spline.
///
/// The radial profile is the fundamental solution of the biharmonic equation for the
/// point dimensionality: `phi(r) = r^2 log r` in 2D and `phi(r) = r` in 3D.
#[derive(Clone, Debug, Copy)]
pub struct ThinPlateSplineKernel {
    dimensions: usize,
}

impl ThinPlateSplineKernel {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl KernelFunction for ThinPlateSplineKernel {
    const ISOTROPIC: bool = true;

    #[inline(always)]
    fn phi(&self, r: f64) -> f64 {
        match self.dimensions {
            2 => r2_log_r(r),
            _ => r,
        }
    }

    #[inline(always)]
    fn definiteness(&self) -> f64 {
        match self.dimensions {
            2 => 1.0,
            _ => -1.0,
        }
    }
}

impl KernelFromParams for ThinPlateSplineKernel {
    #[inline(always)]
    fn from_params(p: &KernelParams) -> Self {
        ThinPlateSplineKernel::new(p.dimensions)
    }
}

/// Thin-plate spline with `phi(r) = r^2 log r` in every dimensionality.
#[derive(Clone, Debug, Copy)]
pub struct ThinPlateR2LogRSplineKernel;

impl KernelFunction for ThinPlateR2LogRSplineKernel {
    const ISOTROPIC: bool = true;

    #[inline(always)]
    fn phi(&self, r: f64) -> f64 {
        r2_log_r(r)
    }

    #[inline(always)]
    fn definiteness(&self) -> f64 {
        1.0
    }
}

impl KernelFromParams for ThinPlateR2LogRSplineKernel {
    #[inline(always)]
    fn from_params(_: &KernelParams) -> Self {
        ThinPlateR2LogRSplineKernel
    }
}

/// Volume spline with `phi(r) = r`.
#[derive(Clone, Debug, Copy)]
pub struct VolumeSplineKernel;

impl KernelFunction for VolumeSplineKernel {
    const ISOTROPIC: bool = true;

    #[inline(always)]
    fn phi(&self, r: f64) -> f64 {
        r
    }

    #[inline(always)]
    fn definiteness(&self) -> f64 {
        -1.0
    }
}

impl KernelFromParams for VolumeSplineKernel {
    #[inline(always)]
    fn from_params(_: &KernelParams) -> Self {
        VolumeSplineKernel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thin_plate_profiles_follow_dimensionality() {
        let tps_2d = ThinPlateSplineKernel::new(2);
        let tps_3d = ThinPlateSplineKernel::new(3);

        assert_eq!(tps_2d.phi(0.0), 0.0);
        assert_eq!(tps_2d.phi(1.0), 0.0);
        let e = std::f64::consts::E;
        assert!((tps_2d.phi(e) - e * e).abs() < 1e-12);

        assert_eq!(tps_3d.phi(0.0), 0.0);
        assert_eq!(tps_3d.phi(2.5), 2.5);
        assert_eq!(tps_2d.definiteness(), 1.0);
        assert_eq!(tps_3d.definiteness(), -1.0);
    }

    #[test]
    fn r2_log_r_is_dimension_independent() {
        let k = ThinPlateR2LogRSplineKernel;
        assert_eq!(k.phi(0.0), 0.0);
        assert!((k.phi(2.0) - 4.0 * 2.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn isotropic_response_is_scaled_identity() {
        let k = VolumeSplineKernel;
        let mut g = [f64::NAN; 9];
        k.response(&[3.0, 0.0, 4.0], &mut g);
        assert_eq!(g, [5.0, 0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 5.0]);
    }
}
