/////////////////////////////////////////////////////////////////////////////////////////////
//
// Provides the parameter type used to instantiate concrete spline kernels.
//
// Created on: 15 Nov 2025     Author: Daniel Owen 
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License. 
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::utils::KernelType;
use serde::{Deserialize, Serialize};

/// Defines the [`KernelType`] to use and the dimensionality of the points it acts on.
///
/// The thin-plate spline changes its radial profile with dimensionality, so every kernel
/// is built from both values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelParams {
    /// KernelType enum variant to use.
    pub kernel_type: KernelType,

    /// Number of coordinates per point.
    pub dimensions: usize,
}

impl KernelParams {
    /// Creates the parameters for `kernel_type` acting on `dimensions`-dimensional points.
    pub fn new(kernel_type: KernelType, dimensions: usize) -> Self {
        Self {
            kernel_type,
            dimensions,
        }
    }
}
