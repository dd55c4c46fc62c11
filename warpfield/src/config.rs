/////////////////////////////////////////////////////////////////////////////////////////////
//
// Declares configuration types for dense field evaluation and complete generation jobs.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! Declares configuration types for dense field evaluation and complete generation jobs.
use crate::transform_config::TransformSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Parameters controlling dense field evaluation.
///
/// ### Default Values
/// - `parallel`: `true`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationParams {
    /// Evaluate grid scan lines on the rayon thread pool. When `false` the grid is
    /// visited sequentially. Both produce identical fields.
    pub parallel: bool,
}

impl Default for EvaluationParams {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Inputs and outputs of one deformation field generation run.
///
/// The fixed image defines the output grid and converts index-valued fixed points. The
/// moving image is only consulted when the moving points are index-valued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationJob {
    /// Header of the reference (fixed) image.
    pub fixed_image: PathBuf,

    /// Header of the moving image.
    pub moving_image: Option<PathBuf>,

    /// Landmarks in the fixed image, the transform sources.
    pub fixed_points: PathBuf,

    /// Landmarks in the moving image, the transform targets.
    pub moving_points: PathBuf,

    /// Destination of the displacement field.
    pub output: PathBuf,

    /// Optional destination for the fitted transform as JSON.
    pub transform_output: Option<PathBuf>,

    /// Kernel and stiffness of the fitted transform.
    pub transform_settings: TransformSettings,

    /// Dense evaluation options.
    pub evaluation: EvaluationParams,
}

impl GenerationJob {
    /// Begins building a [`GenerationJob`] from its required paths.
    pub fn builder(
        fixed_image: impl AsRef<Path>,
        fixed_points: impl AsRef<Path>,
        moving_points: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> GenerationJobBuilder {
        GenerationJobBuilder {
            job: GenerationJob {
                fixed_image: fixed_image.as_ref().to_path_buf(),
                moving_image: None,
                fixed_points: fixed_points.as_ref().to_path_buf(),
                moving_points: moving_points.as_ref().to_path_buf(),
                output: output.as_ref().to_path_buf(),
                transform_output: None,
                transform_settings: TransformSettings::default(),
                evaluation: EvaluationParams::default(),
            },
        }
    }
}

/// Builder for [`GenerationJob`].
#[derive(Debug, Clone)]
pub struct GenerationJobBuilder {
    job: GenerationJob,
}

impl GenerationJobBuilder {
    /// Sets the moving image header, needed when the moving points are indices.
    pub fn moving_image(mut self, path: impl AsRef<Path>) -> Self {
        self.job.moving_image = Some(path.as_ref().to_path_buf());
        self
    }

    /// Saves the fitted transform to `path` as well as the field.
    pub fn save_transform(mut self, path: impl AsRef<Path>) -> Self {
        self.job.transform_output = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the kernel settings.
    pub fn transform_settings(mut self, settings: TransformSettings) -> Self {
        self.job.transform_settings = settings;
        self
    }

    /// Sets the dense evaluation options.
    pub fn evaluation(mut self, params: EvaluationParams) -> Self {
        self.job.evaluation = params;
        self
    }

    /// Finalises the builder into a [`GenerationJob`].
    pub fn build(self) -> GenerationJob {
        self.job
    }
}
