/////////////////////////////////////////////////////////////////////////////////////////////
//
// Implements the landmark kernel transform, its fitting, evaluation and persistence.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{
    common,
    correspondence::CorrespondenceSet,
    error::{FieldError, FieldResult},
    io,
    linalg::{self, FactorizationError, PivotedLu},
    polynomials,
    progress::{self, ProgressMsg, ProgressSink},
    transform_config::TransformSettings,
};

use faer::{Mat, concat};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};
use warpfield_utils::{self, KernelParams, KernelType, MAX_DIMENSIONS};

/// Backward error allowed for a solution, relative to `|A| |x| + |b|`.
const SOLVE_BACKWARD_TOLERANCE: f64 = 1e-8;

/// Coefficients of a solved kernel transform system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coefficients {
    /// Kernel weights, one row per landmark and one column per displacement component.
    pub point_coefficients: Mat<f64>,

    /// Affine displacement coefficients, `(D + 1) x D`.
    ///
    /// Row 0 holds the translation, row `j + 1` the coefficient of the scaled
    /// coordinate `j`.
    pub affine_coefficients: Mat<f64>,
}

impl Coefficients {
    pub(crate) fn new(point_coefficients: Mat<f64>, affine_coefficients: Mat<f64>) -> Self {
        Self {
            point_coefficients,
            affine_coefficients,
        }
    }

    fn zeros(num_landmarks: usize, dimensions: usize) -> Self {
        Self::new(
            Mat::zeros(num_landmarks, dimensions),
            Mat::zeros(dimensions + 1, dimensions),
        )
    }
}

/// Convenience builder for fitting a [`KernelTransform`].
///
/// The builder should be called via the [`KernelTransform::builder`] method.
pub struct KernelTransformBuilder {
    correspondences: CorrespondenceSet,
    transform_settings: TransformSettings,
    progress_callback: Option<Arc<dyn ProgressSink>>,
}

impl KernelTransformBuilder {
    fn new(correspondences: CorrespondenceSet, transform_settings: TransformSettings) -> Self {
        Self {
            correspondences,
            transform_settings,
            progress_callback: None,
        }
    }

    /// Attaches a progress sink that receives fitting events.
    pub fn progress_callback(mut self, progress_callback: Arc<dyn ProgressSink>) -> Self {
        self.progress_callback = Some(progress_callback);
        self
    }

    /// Solves the kernel system and returns the fitted [`KernelTransform`].
    ///
    /// ### Errors
    /// - Unsupported configuration for points that are not 2D or 3D.
    /// - Malformed input for an empty landmark set or an invalid stiffness.
    /// - Singular system for coincident landmarks, or landmarks that do not span the
    ///   space, when the stiffness is zero.
    pub fn build(self) -> FieldResult<KernelTransform> {
        let settings = self.transform_settings;
        settings.validate()?;

        let dimensions = self.correspondences.dimensions();
        let num_landmarks = self.correspondences.len();

        if !(2..=MAX_DIMENSIONS).contains(&dimensions) {
            return Err(FieldError::unsupported(format!(
                "kernel transforms support 2D and 3D landmarks, got {}D",
                dimensions
            )));
        }
        if num_landmarks == 0 {
            return Err(FieldError::malformed("at least one landmark pair is required"));
        }

        let start = Instant::now();
        let (source_landmarks, target_landmarks) = self.correspondences.into_parts();
        let kernel_params = KernelParams::new(settings.kernel_type, dimensions);
        let (translation_factor, scale_factor) =
            common::get_cheb_cube_scaling_factors(&source_landmarks);

        let displacements = &target_landmarks - &source_landmarks;

        // Identical landmark sets give the identity, whatever the conditioning of the system.
        let coefficients = if linalg::max_abs(displacements.as_ref()) == 0.0 {
            Coefficients::zeros(num_landmarks, dimensions)
        } else {
            if settings.stiffness == 0.0 {
                if let Some((first, second)) = find_coincident_landmarks(&source_landmarks) {
                    return Err(FieldError::SingularSystem {
                        kernel_type: settings.kernel_type,
                        num_landmarks,
                        reason: format!(
                            "source landmarks {} and {} coincide; use a positive stiffness to approximate them",
                            first, second
                        ),
                    });
                }
            }

            solve_kernel_system(
                &source_landmarks,
                &displacements,
                &kernel_params,
                settings.stiffness,
                &translation_factor,
                &scale_factor,
            )?
        };

        let transform = KernelTransform {
            source_landmarks,
            target_landmarks,
            coefficients,
            transform_settings: settings,
            kernel_params,
            translation_factor,
            scale_factor,
        };

        let max_residual = transform
            .landmark_residuals()
            .into_iter()
            .fold(0.0, f64::max);

        progress::report(
            &self.progress_callback,
            ProgressMsg::TransformFitted {
                kernel_type: settings.kernel_type,
                num_landmarks,
                max_residual,
            },
        );
        progress::report_message(
            &self.progress_callback,
            format!(
                "Fitted {} transform to {} landmarks in {:.3?}",
                settings.kernel_type,
                num_landmarks,
                start.elapsed()
            ),
        );

        Ok(transform)
    }
}

/// A kernel (radial basis function) transform fitted to landmark correspondences.
///
/// Evaluates
///
/// `T(q) = q + a(q) + sum_i G(q - source_i) w_i`
///
/// where `a` is an affine displacement, `G` the kernel response and `w_i` the kernel
/// weights. With zero stiffness `T(source_i) = target_i` for every landmark.
///
/// The transform is immutable once fitted and can be shared across threads.
///
/// # Examples
///
/// ```
/// use faer::mat;
/// use warpfield::{CorrespondenceSet, KernelTransform, TransformSettings};
/// use warpfield_utils::KernelType;
///
/// let source = mat![[0.0, 0.0], [10.0, 0.0], [0.0, 10.0], [10.0, 10.0], [5.0, 5.0f64]];
/// let target = mat![[0.0, 0.0], [10.0, 0.0], [0.0, 10.0], [10.0, 10.0], [5.5, 4.5f64]];
///
/// let correspondences = CorrespondenceSet::new(source, target.clone())?;
/// let settings = TransformSettings::builder(KernelType::ThinPlateSpline).build();
/// let transform = KernelTransform::builder(correspondences, settings).build()?;
///
/// let moved = transform.transform_point(&[5.0, 5.0])?;
/// assert!((moved[0] - 5.5).abs() < 1e-9 && (moved[1] - 4.5).abs() < 1e-9);
/// # Ok::<(), warpfield::FieldError>(())
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelTransform {
    source_landmarks: Mat<f64>,
    target_landmarks: Mat<f64>,
    coefficients: Coefficients,
    transform_settings: TransformSettings,
    kernel_params: KernelParams,

    /// Per-dimension translation factor (used for scaling/normalization of the affine basis).
    translation_factor: Vec<f64>,

    /// Per-dimension scaling factor (used for scaling/normalization of the affine basis).
    scale_factor: Vec<f64>,
}

impl KernelTransform {
    /// Begins fitting a transform to `correspondences` with the given kernel settings.
    pub fn builder(
        correspondences: CorrespondenceSet,
        transform_settings: TransformSettings,
    ) -> KernelTransformBuilder {
        KernelTransformBuilder::new(correspondences, transform_settings)
    }

    /// Number of coordinates per point.
    pub fn dimensions(&self) -> usize {
        self.source_landmarks.ncols()
    }

    pub fn num_landmarks(&self) -> usize {
        self.source_landmarks.nrows()
    }

    pub fn kernel_type(&self) -> KernelType {
        self.transform_settings.kernel_type
    }

    pub fn transform_settings(&self) -> &TransformSettings {
        &self.transform_settings
    }

    pub fn source_landmarks(&self) -> &Mat<f64> {
        &self.source_landmarks
    }

    pub fn target_landmarks(&self) -> &Mat<f64> {
        &self.target_landmarks
    }

    pub fn coefficients(&self) -> &Coefficients {
        &self.coefficients
    }

    /// Writes the displacement `T(point) - point` into `out`.
    ///
    /// Both slices must hold [`KernelTransform::dimensions`] values.
    #[inline]
    pub fn displacement_into(&self, point: &[f64], out: &mut [f64]) {
        let d = self.dimensions();
        debug_assert_eq!(point.len(), d);
        debug_assert_eq!(out.len(), d);

        let mut basis = [0.0; MAX_DIMENSIONS + 1];
        polynomials::affine_basis_at(
            point,
            &self.translation_factor,
            &self.scale_factor,
            &mut basis[..d + 1],
        );

        let affine = &self.coefficients.affine_coefficients;
        for (k, value) in out.iter_mut().enumerate() {
            *value = (0..=d).map(|j| basis[j] * affine[(j, k)]).sum();
        }

        warpfield_utils::accumulate_kernel_sum(
            point,
            &self.source_landmarks,
            &self.coefficients.point_coefficients,
            &self.kernel_params,
            out,
        );
    }

    /// Maps a single point through the transform.
    pub fn transform_point(&self, point: &[f64]) -> FieldResult<Vec<f64>> {
        self.check_dimensions(point.len())?;

        let mut out = vec![0.0; point.len()];
        self.displacement_into(point, &mut out);
        for (value, x) in out.iter_mut().zip(point) {
            *value += x;
        }
        Ok(out)
    }

    /// Maps every row of `points` through the transform.
    pub fn transform_points(&self, points: &Mat<f64>) -> FieldResult<Mat<f64>> {
        self.check_dimensions(points.ncols())?;
        Ok(self.transform_rows(points))
    }

    /// Evaluates the transform at the source landmarks.
    pub fn evaluate_at_source(&self) -> Mat<f64> {
        self.transform_rows(&self.source_landmarks)
    }

    /// Euclidean distance between `T(source_i)` and `target_i` for every landmark.
    ///
    /// All zero, up to rounding, when the stiffness is zero.
    pub fn landmark_residuals(&self) -> Vec<f64> {
        let fitted = self.evaluate_at_source();
        (0..self.num_landmarks())
            .map(|i| warpfield_utils::get_distance(fitted.row(i), self.target_landmarks.row(i)))
            .collect()
    }

    fn transform_rows(&self, points: &Mat<f64>) -> Mat<f64> {
        let d = self.dimensions();
        let mut transformed = Mat::<f64>::zeros(points.nrows(), d);
        let mut point = [0.0; MAX_DIMENSIONS];
        let mut displacement = [0.0; MAX_DIMENSIONS];

        for i in 0..points.nrows() {
            for (k, x) in point[..d].iter_mut().enumerate() {
                *x = points[(i, k)];
            }
            self.displacement_into(&point[..d], &mut displacement[..d]);
            for k in 0..d {
                transformed[(i, k)] = point[k] + displacement[k];
            }
        }

        transformed
    }

    fn check_dimensions(&self, dimensions: usize) -> FieldResult<()> {
        if dimensions != self.dimensions() {
            return Err(FieldError::unsupported(format!(
                "cannot evaluate a {}D transform at {}D points",
                self.dimensions(),
                dimensions
            )));
        }
        Ok(())
    }

    /// Save this transform to a **JSON envelope** `{ format, version, model }`.
    ///
    /// The envelope is written to a temporary sibling of `path` and renamed over it once
    /// complete, so `path` never holds a truncated transform. Files produced here are
    /// intended to be read back with [`KernelTransform::load_model`].
    ///
    /// ### Errors
    /// - Returns `FieldError::{Write, Serialize}` on I/O or serialization failures.
    pub fn save_model<P: AsRef<Path>>(&self, path: P) -> FieldResult<()> {
        let path_ref = path.as_ref();
        let temporary = self.stage_model(path_ref)?;
        io::commit_temporary(&temporary, path_ref)
    }

    /// Writes the JSON envelope to the temporary sibling of `path` and returns its
    /// location, leaving the rename to the caller.
    pub(crate) fn stage_model(&self, path: &Path) -> FieldResult<PathBuf> {
        let env = JsonEnvelopeRef {
            format: JSON_FORMAT_NAME,
            version: JSON_VERSION,
            model: self,
        };

        let bytes = serde_json::to_vec_pretty(&env).map_err(|e| FieldError::Serialize {
            path: path.to_path_buf(),
            source: e,
        })?;
        io::write_temporary(path, &[&bytes])
    }

    /// Load a transform from a versioned **JSON envelope**, validating format, version
    /// and the consistency of the stored matrices.
    ///
    /// ### Errors
    /// - Returns `FieldError::{Read, Parse, Malformed}` as appropriate.
    pub fn load_model<P: AsRef<Path>>(path: P) -> FieldResult<Self> {
        let path_ref = path.as_ref();

        let file = File::open(path_ref).map_err(|e| FieldError::read(path_ref, e))?;
        let reader = BufReader::new(file);

        let env: JsonEnvelopeOwned<Self> =
            serde_json::from_reader(reader).map_err(|e| FieldError::Parse {
                path: path_ref.to_path_buf(),
                source: e,
            })?;

        // Validate envelope
        if env.format != JSON_FORMAT_NAME {
            return Err(FieldError::malformed_file(
                path_ref,
                format!(
                    "unsupported format {:?} (expected {:?})",
                    env.format, JSON_FORMAT_NAME
                ),
            ));
        }
        if env.version != JSON_VERSION {
            return Err(FieldError::malformed_file(
                path_ref,
                format!(
                    "unsupported version {} (expected {})",
                    env.version, JSON_VERSION
                ),
            ));
        }

        let model = env.model;
        model
            .check_consistency()
            .map_err(|reason| FieldError::malformed_file(path_ref, reason))?;
        Ok(model)
    }

    fn check_consistency(&self) -> Result<(), String> {
        let (n, d) = self.source_landmarks.shape();
        let checks = [
            (self.target_landmarks.shape() == (n, d), "target landmarks"),
            (self.coefficients.point_coefficients.shape() == (n, d), "kernel weights"),
            (self.coefficients.affine_coefficients.shape() == (d + 1, d), "affine coefficients"),
            (self.translation_factor.len() == d, "translation factors"),
            (
                self.scale_factor.len() == d && self.scale_factor.iter().all(|s| *s != 0.0),
                "scale factors",
            ),
            (
                self.kernel_params.dimensions == d
                    && self.kernel_params.kernel_type == self.transform_settings.kernel_type,
                "kernel parameters",
            ),
            ((2..=MAX_DIMENSIONS).contains(&d), "dimensionality"),
        ];

        match checks.iter().find(|(ok, _)| !ok) {
            Some((_, what)) => Err(format!(
                "{} are inconsistent with {} {}D landmarks",
                what, n, d
            )),
            None => Ok(()),
        }
    }
}

/// Returns the first pair of source landmarks closer than rounding allows to separate.
fn find_coincident_landmarks(source: &Mat<f64>) -> Option<(usize, usize)> {
    let extents = warpfield_utils::get_pointarray_extents(source);
    let d = source.ncols();
    let diagonal = (0..d)
        .map(|k| (extents[k + d] - extents[k]).powi(2))
        .sum::<f64>()
        .sqrt();
    let tolerance = 1e-12 * diagonal.max(1.0);

    for j in 0..source.nrows() {
        for i in j + 1..source.nrows() {
            if warpfield_utils::get_distance(source.row(i), source.row(j)) <= tolerance {
                return Some((j, i));
            }
        }
    }
    None
}

/// Assembles and solves the kernel system for the landmark displacements.
///
/// Isotropic kernels use the `(N + D + 1)` square system with one right-hand side per
/// displacement component. Tensor kernels use the `N D + D (D + 1)` square system with a
/// single right-hand side, where the weight of landmark `i` and component `k` is unknown
/// `i D + k` and the affine coefficient `j` of component `k` is unknown
/// `N D + k (D + 1) + j`.
fn solve_kernel_system(
    source: &Mat<f64>,
    displacements: &Mat<f64>,
    kernel_params: &KernelParams,
    stiffness: f64,
    translation_factor: &[f64],
    scale_factor: &[f64],
) -> FieldResult<Coefficients> {
    let (n, d) = source.shape();
    let num_affine = d + 1;
    let singular = |reason: String| FieldError::SingularSystem {
        kernel_type: kernel_params.kernel_type,
        num_landmarks: n,
        reason,
    };

    let mut k_matrix = warpfield_utils::get_kernel_matrix(source, kernel_params);

    if stiffness > 0.0 {
        let size = k_matrix.nrows();
        let trace: f64 = (0..size).map(|i| k_matrix[(i, i)]).sum();
        let mean_diagonal = (trace / n as f64).abs();

        // Every kernel vanishes at zero separation, leaving no trace to scale by.
        let scale = if mean_diagonal > f64::EPSILON {
            mean_diagonal
        } else {
            1.0
        };
        let loading = warpfield_utils::kernel_definiteness(kernel_params) * stiffness * scale;

        for i in 0..size {
            k_matrix[(i, i)] += loading;
        }
    }

    let basis = polynomials::evaluate_affine_basis(source, translation_factor, scale_factor);
    let isotropic = kernel_params.kernel_type.is_isotropic();

    let (lhs, rhs) = if isotropic {
        let basis_t = basis.transpose().to_owned();
        let lhs_zeros = Mat::<f64>::zeros(num_affine, num_affine);
        let lhs = concat![[k_matrix, basis], [basis_t, lhs_zeros]];
        let rhs = concat![[displacements], [Mat::<f64>::zeros(num_affine, d)]];
        (lhs, rhs)
    } else {
        let num_weights = n * d;
        let num_poly = d * num_affine;

        let mut poly_matrix = Mat::<f64>::zeros(num_weights, num_poly);
        for i in 0..n {
            for k in 0..d {
                for j in 0..num_affine {
                    poly_matrix[(i * d + k, k * num_affine + j)] = basis[(i, j)];
                }
            }
        }
        let poly_t = poly_matrix.transpose().to_owned();
        let lhs_zeros = Mat::<f64>::zeros(num_poly, num_poly);
        let lhs = concat![[k_matrix, poly_matrix], [poly_t, lhs_zeros]];
        let rhs = Mat::from_fn(num_weights + num_poly, 1, |row, _| match row < num_weights {
            true => displacements[(row / d, row % d)],
            false => 0.0,
        });
        (lhs, rhs)
    };

    // Kernel entries grow with separation and the affine block does not
    let scale = linalg::symmetric_equilibration(lhs.as_ref());
    let lhs = Mat::from_fn(lhs.nrows(), lhs.ncols(), |i, j| scale[i] * lhs[(i, j)] * scale[j]);
    let rhs = Mat::from_fn(rhs.nrows(), rhs.ncols(), |i, j| scale[i] * rhs[(i, j)]);

    let lu = PivotedLu::try_new(lhs.as_ref()).map_err(|err| match err {
        FactorizationError::Singular { column, pivot } => singular(format!(
            "no usable pivot for unknown {} (|pivot| = {:.3e}); landmarks may be coincident or fail to span the space",
            column, pivot
        )),
    })?;
    let scaled_solution = lu.solve(&rhs);

    // Backward error check
    let product = &lhs * &scaled_solution;
    let residual = &product - &rhs;
    let residual_norm = linalg::max_abs(residual.as_ref());
    let bound = SOLVE_BACKWARD_TOLERANCE
        * (linalg::norm_inf(lhs.as_ref()) * linalg::max_abs(scaled_solution.as_ref())
            + linalg::max_abs(rhs.as_ref()));
    if !(residual_norm <= bound) {
        return Err(singular(format!(
            "solution residual {:.3e} exceeds {:.3e}",
            residual_norm, bound
        )));
    }

    let solution = Mat::from_fn(scaled_solution.nrows(), scaled_solution.ncols(), |i, j| {
        scale[i] * scaled_solution[(i, j)]
    });

    let coefficients = match isotropic {
        true => Coefficients::new(
            Mat::from_fn(n, d, |i, k| solution[(i, k)]),
            Mat::from_fn(num_affine, d, |j, k| solution[(n + j, k)]),
        ),
        false => Coefficients::new(
            Mat::from_fn(n, d, |i, k| solution[(i * d + k, 0)]),
            Mat::from_fn(num_affine, d, |j, k| {
                solution[(n * d + k * num_affine + j, 0)]
            }),
        ),
    };

    Ok(coefficients)
}

const JSON_FORMAT_NAME: &str = "warpfield.kernel_transform.json";
const JSON_VERSION: u32 = 1;

/// Borrowing envelope for SAVE (no clone of the model).
#[derive(Serialize)]
struct JsonEnvelopeRef<'a, T: ?Sized> {
    format: &'static str,
    version: u32,
    #[serde(flatten)]
    model: &'a T,
}

/// Owning envelope for LOAD (generic over the concrete model).
#[derive(Deserialize)]
struct JsonEnvelopeOwned<T> {
    format: String,
    version: u32,
    #[serde(flatten)]
    model: T,
}
