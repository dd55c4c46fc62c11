/////////////////////////////////////////////////////////////////////////////////////////////
//
// Declares the kernel function trait and the shared kernel parameter conversion trait.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::kernel_helpers::KernelParams;
use std::fmt::Debug;

/// Converts a shared [`KernelParams`] configuration into a concrete kernel type.
pub trait KernelFromParams: Sized {
    /// Constructs `Self` from a set of uniform kernel parameters.
    fn from_params(p: &KernelParams) -> Self;
}

/// A spline kernel `G(x)` evaluated on the separation `x` between two points.
///
/// Isotropic kernels respond with `phi(|x|) I` and only need [`KernelFunction::phi`].
/// Tensor kernels override [`KernelFunction::response`] with their full `D x D` response.
pub trait KernelFunction: Copy + Send + Sync + Debug {
    /// `true` when the response is `phi(|x|)` times the identity.
    const ISOTROPIC: bool;

    /// Radial profile of the kernel.
    fn phi(&self, r: f64) -> f64;

    /// Sign `s` for which `s * G` is conditionally positive definite.
    fn definiteness(&self) -> f64;

    /// Writes the row-major `D x D` response to `separation` into `g`.
    #[inline(always)]
    fn response(&self, separation: &[f64], g: &mut [f64]) {
        let d = separation.len();
        let value = self.phi(crate::norm(separation));
        g[..d * d].fill(0.0);
        for k in 0..d {
            g[k * d + k] = value;
        }
    }
}
