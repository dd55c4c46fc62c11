/////////////////////////////////////////////////////////////////////////////////////////////
//
// Exposes the public API and high-level documentation for landmark deformation fields.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Dense deformation fields from landmark correspondences.
//!
//! Given a handful of corresponding landmarks in two 2D or 3D coordinate spaces, this
//! crate fits a kernel (radial basis function) transform that maps the first set onto
//! the second, then evaluates the transform at every cell of a reference grid to
//! produce a dense displacement field.
//!
//! The transform is
//!
//! <div>
//! $$ T(x) = x + a(x) + \sum_{i=1}^{N} G(x - p_i)\, w_i $$
//! </div>
//!
//! with an affine part `a` and one of five kernels `G`:
//!
//! - `TPS` - thin plate spline, `r^2 log r` in 2D and `r` in 3D
//! - `TPSR2LOGR` - thin plate spline with `r^2 log r` in every dimension
//! - `VS` - volume spline, `r`
//! - `EBS` - elastic body spline (`1`)
//! - `EBSR` - elastic body reciprocal spline (`1`)
//!
//! A positive stiffness turns interpolation into approximation, trading landmark
//! reproduction for smoothness.
//!
//! Reference grids are discovered at run time. The [`dispatch`] registry maps the
//! discovered scalar type and dimensionality onto a generator compiled for that
//! dimensionality, and [`generate_deformation_field`] runs the whole job.
//!
//! # Examples
//!
//! ```
//! use warpfield::{
//!     CorrespondenceSet, EvaluationParams, Grid, KernelTransform, TransformSettings,
//!     WarpTestFunctions, evaluate_dense_field, generate_random_points,
//! };
//! use warpfield_utils::KernelType;
//!
//! // Random landmarks in the unit square and a smooth warp of them
//! let source = generate_random_points(25, 2, Some(42));
//! let target = WarpTestFunctions::sinusoidal(&source, 0.05, 3.0);
//!
//! let settings = TransformSettings::builder(KernelType::ThinPlateSpline).build();
//! let correspondences = CorrespondenceSet::new(source, target)?;
//! let transform = KernelTransform::builder(correspondences, settings).build()?;
//!
//! // The fitted transform reproduces the landmarks
//! let max_residual = transform.landmark_residuals().into_iter().fold(0.0, f64::max);
//! assert!(max_residual < 1e-8);
//!
//! // Evaluate the displacement over a 32 x 32 grid covering the unit square
//! let grid = Grid::new([32, 32], [1.0 / 31.0; 2], [0.0; 2])?;
//! let field = evaluate_dense_field(&transform, &grid, &EvaluationParams::default(), None)?;
//! assert_eq!(field.num_cells(), 1024);
//! # Ok::<(), warpfield::FieldError>(())
//! ```
//!
//! # References
//! 1. M. H. Davis, A. Khotanzad, D. P. Flamig, S. E. Harms. A physics-based coordinate
//!    transformation for 3-D image matching. IEEE Trans. Med. Imaging, 16(3):317-328, 1997.
//! 2. F. L. Bookstein. Principal warps: thin-plate splines and the decomposition of
//!    deformations. IEEE Trans. Pattern Anal. Mach. Intell., 11(6):567-585, 1989.
pub mod transform_config;

pub mod config;

pub mod progress;

pub mod io;

pub mod dispatch;

mod common;

mod correspondence;

mod dense_field;

mod error;

mod grid;

mod kernel_transform;

mod linalg;

mod pipeline;

mod polynomials;

mod warp_test_functions;

pub use {
    common::generate_random_points,
    config::{EvaluationParams, GenerationJob, GenerationJobBuilder},
    correspondence::{
        CorrespondenceSet, PointKind, PointList, load_correspondences, resolve_points,
    },
    dense_field::{DisplacementField, FieldView, evaluate_dense_field},
    dispatch::{DispatchRegistry, FieldGenerator, ScalarType, field_generator_registry},
    error::{FieldError, FieldErrorKind, FieldResult},
    grid::{Grid, GridDescriptor},
    kernel_transform::{Coefficients, KernelTransform, KernelTransformBuilder},
    linalg::{FactorizationError, PivotedLu},
    pipeline::{Collaborators, FieldSummary, generate_deformation_field},
    transform_config::{TransformSettings, TransformSettingsBuilder},
    warp_test_functions::WarpTestFunctions,
};
