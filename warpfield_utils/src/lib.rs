/////////////////////////////////////////////////////////////////////////////////////////////
//
// Re-exports kernel utilities, constants, and helper functions used across the warpfield crates.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Kernel utilities for the [`warpfield`] crate
//!
//! Defines the five spline kernels used to build landmark transforms, the
//! [`KernelType`] registry that maps identifiers to them, and the dense kernel
//! matrix and kernel sum routines shared by fitting and evaluation.
mod constants;
mod elastic_kernels;
mod kernel_helpers;
mod rbf_kernels;
mod traits;
mod utils;

/// Implemented kernels for use in the [`warpfield`] crate.
pub mod kernels {
    pub use super::elastic_kernels::*;
    pub use super::rbf_kernels::*;
}

pub use {
    constants::{ELASTIC_ALPHA, MAX_DIMENSIONS, POISSON_RATIO},
    kernel_helpers::KernelParams,
    traits::{KernelFromParams, KernelFunction},
    utils::{
        KernelType, UnknownKernelError, accumulate_kernel_sum, accumulate_kernel_sum_typed,
        get_distance, get_kernel_matrix, get_kernel_matrix_typed, get_pointarray_extents,
        kernel_definiteness, norm,
    },
};
