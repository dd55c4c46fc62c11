/////////////////////////////////////////////////////////////////////////////////////////////
//
// Specifies kernel and stiffness options for configuring landmark kernel transforms.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Specifies kernel and stiffness options for configuring landmark kernel transforms.
use crate::error::{FieldError, FieldResult};
use serde::{Deserialize, Serialize};
use warpfield_utils::KernelType;

/// Kernel settings for a [`KernelTransform`](crate::KernelTransform).
///
/// ### Default Values
/// - `kernel_type`: [`KernelType::ThinPlateSpline`]
/// - `stiffness`: `0.0` (exact interpolation of the landmarks)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformSettings {
    /// Spline kernel used to build the transform.
    pub kernel_type: KernelType,

    /// Regularization trading landmark reproduction for smoothness.
    ///
    /// `0.0` interpolates the landmarks exactly. Larger values load the diagonal of the
    /// kernel matrix and let the transform pass near, rather than through, the targets.
    /// Useful values are usually small, between `0.001` and `0.1`.
    pub stiffness: f64,
}

impl Default for TransformSettings {
    fn default() -> Self {
        TransformSettings::builder(KernelType::default()).build()
    }
}

impl TransformSettings {
    /// Begins building a [`TransformSettings`] instance for the given kernel type.
    pub fn builder(kernel_type: KernelType) -> TransformSettingsBuilder {
        TransformSettingsBuilder {
            kernel_type,
            stiffness: 0.0,
        }
    }

    /// Rejects negative or non-finite stiffness.
    pub(crate) fn validate(&self) -> FieldResult<()> {
        if !self.stiffness.is_finite() || self.stiffness < 0.0 {
            return Err(FieldError::malformed(format!(
                "stiffness must be a finite non-negative number, got {}",
                self.stiffness
            )));
        }
        Ok(())
    }
}

/// Builder for [`TransformSettings`].
#[derive(Debug, Clone, Copy)]
pub struct TransformSettingsBuilder {
    kernel_type: KernelType,
    stiffness: f64,
}

impl TransformSettingsBuilder {
    /// Sets the stiffness.
    pub fn stiffness(mut self, stiffness: f64) -> Self {
        self.stiffness = stiffness;
        self
    }

    /// Finalises the builder into a [`TransformSettings`] value.
    pub fn build(self) -> TransformSettings {
        TransformSettings {
            kernel_type: self.kernel_type,
            stiffness: self.stiffness,
        }
    }
}
