/////////////////////////////////////////////////////////////////////////////////////////////
//
// Runs a complete landmark to deformation field generation job.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use crate::{
    config::GenerationJob,
    correspondence::{self, PointKind, PointList},
    dense_field,
    dispatch::{self, ScalarType},
    error::{FieldError, FieldResult},
    grid::{Grid, GridDescriptor},
    io::{FieldWriter, GridDescriptorReader, MetaImageReader, MetaImageWriter, PointFileReader, PointSetReader},
    kernel_transform::KernelTransform,
    progress::{self, ProgressMsg, ProgressSink},
};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};
use warpfield_utils::KernelType;

/// File collaborators used by a generation run.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub grid_reader: &'a dyn GridDescriptorReader,
    pub point_reader: &'a dyn PointSetReader,
    pub field_writer: &'a dyn FieldWriter,
}

impl Collaborators<'static> {
    /// MetaImage grids and fields with transformix or CSV landmark files.
    pub fn metaimage() -> Self {
        Self {
            grid_reader: &MetaImageReader,
            point_reader: &PointFileReader,
            field_writer: &MetaImageWriter,
        }
    }
}

impl Default for Collaborators<'static> {
    fn default() -> Self {
        Self::metaimage()
    }
}

/// Outcome of a successful generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSummary {
    pub scalar_type: ScalarType,
    pub dimensions: usize,
    pub kernel_type: KernelType,
    pub num_landmarks: usize,
    pub num_cells: usize,

    /// Largest distance between a mapped source landmark and its target.
    pub max_residual: f64,
    pub output: PathBuf,
}

/// Generates the deformation field described by `job`.
///
/// The fixed image header is described first, and its scalar type and dimensionality
/// select a statically typed generator from the dispatch registry. That generator
/// loads the landmarks, fits the kernel transform, evaluates it over the fixed grid and
/// writes the field.
///
/// ### Errors
/// - Unsupported configuration for vector images and unregistered
///   `(scalar type, dimensions)` pairs.
/// - Any error of the individual stages, see [`crate::FieldErrorKind`].
pub fn generate_deformation_field(
    job: &GenerationJob,
    io: &Collaborators<'_>,
    progress_callback: Option<Arc<dyn ProgressSink>>,
) -> FieldResult<FieldSummary> {
    job.transform_settings.validate()?;

    let fixed = io.grid_reader.describe(&job.fixed_image)?;
    progress::report_message(
        &progress_callback,
        format!("Fixed image {}:\n{}", job.fixed_image.display(), fixed),
    );

    if fixed.num_components > 1 {
        return Err(FieldError::unsupported(format!(
            "{} is a vector image with {} components, only scalar images are supported",
            job.fixed_image.display(),
            fixed.num_components
        )));
    }

    let registry = dispatch::field_generator_registry()?;
    let generator = registry
        .lookup(fixed.scalar_type, fixed.dimensions)
        .ok_or_else(|| {
            FieldError::unsupported(format!(
                "no field generator for {} pixels in {}D, supported dimensionalities are 2 and 3",
                fixed.scalar_type, fixed.dimensions
            ))
        })?;

    generator.run(job, &fixed, io, progress_callback)
}

fn read_landmarks(
    io: &Collaborators<'_>,
    path: &Path,
    role: &str,
    progress_callback: &Option<Arc<dyn ProgressSink>>,
) -> FieldResult<PointList> {
    let list = io.point_reader.read_points(path)?;

    progress::report(
        progress_callback,
        ProgressMsg::LandmarksLoaded {
            num_points: list.len(),
            dimensions: list.dimensions(),
            as_indices: list.kind == PointKind::Index,
        },
    );
    progress::report_message(
        progress_callback,
        format!(
            "Read {} {} landmarks from {} as {}",
            list.len(),
            role,
            path.display(),
            match list.kind {
                PointKind::Index => "indices",
                PointKind::Physical => "points",
            }
        ),
    );

    Ok(list)
}

/// Generation body for a `D`-dimensional fixed grid.
pub(crate) fn generate_typed<const D: usize>(
    job: &GenerationJob,
    fixed: &GridDescriptor,
    io: &Collaborators<'_>,
    progress_callback: Option<Arc<dyn ProgressSink>>,
) -> FieldResult<FieldSummary> {
    let start = Instant::now();
    let fixed_grid = Grid::<D>::from_descriptor(fixed)?;

    let fixed_points = read_landmarks(io, &job.fixed_points, "fixed", &progress_callback)?;
    let moving_points = read_landmarks(io, &job.moving_points, "moving", &progress_callback)?;

    if fixed_points.len() != moving_points.len() {
        return Err(FieldError::malformed(format!(
            "{} holds {} landmarks but {} holds {}",
            job.fixed_points.display(),
            fixed_points.len(),
            job.moving_points.display(),
            moving_points.len()
        )));
    }

    // The moving image only matters for index-valued moving landmarks
    let moving_grid = match (moving_points.kind, &job.moving_image) {
        (PointKind::Index, Some(path)) => {
            let moving = io.grid_reader.describe(path)?;
            progress::report_message(
                &progress_callback,
                format!("Moving image {}:\n{}", path.display(), moving),
            );
            Some(Grid::<D>::from_descriptor(&moving)?)
        }
        _ => None,
    };

    let correspondences = correspondence::load_correspondences(
        &fixed_points,
        &moving_points,
        &fixed_grid,
        moving_grid.as_ref(),
    )?;

    let mut builder = KernelTransform::builder(correspondences, job.transform_settings);
    if let Some(sink) = &progress_callback {
        builder = builder.progress_callback(Arc::clone(sink));
    }
    let transform = builder.build()?;
    let max_residual = transform
        .landmark_residuals()
        .into_iter()
        .fold(0.0, f64::max);

    let field = dense_field::evaluate_dense_field(
        &transform,
        &fixed_grid,
        &job.evaluation,
        progress_callback.clone(),
    )?;

    // Outputs appear together or not at all: the transform is staged before the field
    // is written and renamed into place after it.
    let staged_transform = match &job.transform_output {
        Some(path) => Some((path, transform.stage_model(path)?)),
        None => None,
    };

    progress::report_message(
        &progress_callback,
        format!("Writing deformation field to {}", job.output.display()),
    );
    if let Err(err) = io.field_writer.write(&job.output, field.view()) {
        if let Some((_, staged)) = &staged_transform {
            let _ = fs::remove_file(staged);
        }
        return Err(err);
    }

    if let Some((path, staged)) = staged_transform {
        if let Err(err) = crate::io::commit_temporary(&staged, path) {
            io.field_writer.discard(&job.output);
            return Err(err);
        }
        progress::report_message(
            &progress_callback,
            format!("Saved transform to {}", path.display()),
        );
    }

    progress::report_message(
        &progress_callback,
        format!("Generated {} cells in {:.3?}", field.num_cells(), start.elapsed()),
    );

    Ok(FieldSummary {
        scalar_type: fixed.scalar_type,
        dimensions: D,
        kernel_type: transform.kernel_type(),
        num_landmarks: transform.num_landmarks(),
        num_cells: field.num_cells(),
        max_residual,
        output: job.output.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::EvaluationParams, dense_field::FieldView, error::FieldErrorKind,
        transform_config::TransformSettings,
    };
    use std::{fs, sync::Mutex};

    fn scratch_dir(test: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "warpfield_pipeline_{}_{}",
            test,
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn read_raw(path: &Path) -> Vec<f32> {
        fs::read(path)
            .unwrap()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    #[derive(Default)]
    struct MemoryWriter {
        data: Mutex<Vec<f64>>,
    }

    impl FieldWriter for MemoryWriter {
        fn write(&self, _path: &Path, field: FieldView<'_>) -> FieldResult<()> {
            *self.data.lock().unwrap() = field.data.to_vec();
            Ok(())
        }
    }

    #[test]
    fn two_identical_landmarks_give_zero_field() {
        let dir = scratch_dir("identity");
        let fixed_image = write(
            &dir,
            "fixed.mhd",
            "NDims = 2\nDimSize = 2 2\nElementSpacing = 1 1\nOffset = 0 0\nElementType = MET_SHORT\nElementDataFile = fixed.raw\n",
        );
        let points = write(&dir, "points.txt", "point\n2\n0 0\n1 1\n");
        let output = dir.join("field.mhd");

        let job = GenerationJob::builder(&fixed_image, &points, &points, &output).build();
        let summary = generate_deformation_field(&job, &Collaborators::default(), None).unwrap();

        assert_eq!(summary.num_cells, 4);
        assert_eq!(summary.dimensions, 2);
        assert_eq!(summary.scalar_type, ScalarType::I16);
        assert_eq!(read_raw(&dir.join("field.raw")), vec![0.0f32; 8]);
    }

    #[test]
    fn moving_indices_use_moving_grid() {
        let dir = scratch_dir("moving_grid");
        let fixed_image = write(
            &dir,
            "fixed.mhd",
            "NDims = 2\nDimSize = 5 4\nElementType = MET_UCHAR\nElementDataFile = fixed.raw\n",
        );
        let moving_image = write(
            &dir,
            "moving.mha",
            "NDims = 2\nDimSize = 5 4\nOffset = 1.5 0\nElementType = MET_UCHAR\nElementDataFile = LOCAL\n",
        );
        let fixed_points = write(&dir, "fixed.txt", "point\n4\n0 0\n4 0\n0 3\n4 3\n");
        let moving_points = write(&dir, "moving.txt", "index\n4\n0 0\n4 0\n0 3\n4 3\n");

        let memory = MemoryWriter::default();
        let io = Collaborators {
            field_writer: &memory,
            ..Collaborators::metaimage()
        };

        let job = GenerationJob::builder(&fixed_image, &fixed_points, &moving_points, dir.join("unused.mhd"))
            .transform_settings(TransformSettings::builder(KernelType::VolumeSpline).build())
            .evaluation(EvaluationParams { parallel: false })
            .build();

        let err = generate_deformation_field(&job, &io, None).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::MissingDependency);

        let job = GenerationJob {
            moving_image: Some(moving_image),
            ..job
        };
        let summary = generate_deformation_field(&job, &io, None).unwrap();
        assert_eq!(summary.num_landmarks, 4);

        let data = memory.data.lock().unwrap();
        assert_eq!(data.len(), 40);
        for cell in data.chunks_exact(2) {
            assert!((cell[0] - 1.5).abs() < 1e-9);
            assert!(cell[1].abs() < 1e-9);
        }
    }

    #[test]
    fn saves_transform_for_3d_runs() {
        let dir = scratch_dir("three_d");
        let fixed_image = write(
            &dir,
            "fixed.mha",
            "NDims = 3\nDimSize = 4 4 4\nElementSpacing = 2 2 2\nElementType = MET_FLOAT\nElementDataFile = LOCAL\n",
        );
        let fixed_points = write(
            &dir,
            "fixed.csv",
            "x,y,z\n0,0,0\n6,0,0\n0,6,0\n0,0,6\n6,6,6\n3,3,3\n",
        );
        let moving_points = write(
            &dir,
            "moving.csv",
            "0,0,0\n6,0,0\n0,6,0\n0,0,6\n6,6,6\n3.5,3,2.5\n",
        );
        let output = dir.join("field.mha");
        let saved = dir.join("transform.json");

        let job = GenerationJob::builder(&fixed_image, &fixed_points, &moving_points, &output)
            .transform_settings(TransformSettings::builder(KernelType::ElasticBodySpline).build())
            .save_transform(&saved)
            .build();
        let summary = generate_deformation_field(&job, &Collaborators::default(), None).unwrap();
        assert_eq!(summary.num_cells, 64);
        assert!(summary.max_residual < 1e-6);

        let transform = KernelTransform::load_model(&saved).unwrap();
        let moved = transform.transform_point(&[3.0, 3.0, 3.0]).unwrap();
        assert!((moved[0] - 3.5).abs() < 1e-6 && (moved[2] - 2.5).abs() < 1e-6);
        assert!(output.exists());
    }

    struct FailingWriter;

    impl FieldWriter for FailingWriter {
        fn write(&self, path: &Path, _field: FieldView<'_>) -> FieldResult<()> {
            Err(FieldError::write(
                path,
                std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            ))
        }
    }

    fn small_job(dir: &Path, output: &Path, saved: &Path) -> GenerationJob {
        let fixed_image = write(
            dir,
            "fixed.mhd",
            "NDims = 2\nDimSize = 4 4\nElementType = MET_FLOAT\nElementDataFile = fixed.raw\n",
        );
        let fixed_points = write(dir, "fixed.txt", "point\n3\n0 0\n3 0\n0 3\n");
        let moving_points = write(dir, "moving.txt", "point\n3\n0.5 0\n3 0.5\n0 3\n");
        GenerationJob::builder(&fixed_image, &fixed_points, &moving_points, output)
            .save_transform(saved)
            .build()
    }

    #[test]
    fn failed_transform_save_leaves_no_field() {
        let dir = scratch_dir("failed_save");
        let output = dir.join("field.mhd");
        let saved = dir.join("no_such_dir").join("transform.json");

        let job = small_job(&dir, &output, &saved);
        let err = generate_deformation_field(&job, &Collaborators::default(), None).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::IoFailure);
        assert!(!output.exists());
        assert!(!dir.join("field.raw").exists());
        assert!(!saved.exists());
    }

    #[test]
    fn failed_field_write_leaves_no_transform() {
        let dir = scratch_dir("failed_field");
        let output = dir.join("field.mhd");
        let saved = dir.join("transform.json");

        let io = Collaborators {
            field_writer: &FailingWriter,
            ..Collaborators::metaimage()
        };
        let job = small_job(&dir, &output, &saved);
        let err = generate_deformation_field(&job, &io, None).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::IoFailure);
        assert!(!saved.exists());
        assert!(!dir.join("transform.json.partial").exists());
    }

    #[test]
    fn rejects_unsupported_images() {
        let dir = scratch_dir("unsupported");
        let points = write(&dir, "points.txt", "point\n1\n0 0\n");
        let output = dir.join("field.mhd");

        let vector = write(
            &dir,
            "vector.mhd",
            "NDims = 2\nDimSize = 3 3\nElementNumberOfChannels = 2\nElementType = MET_FLOAT\nElementDataFile = vector.raw\n",
        );
        let job = GenerationJob::builder(&vector, &points, &points, &output).build();
        let err = generate_deformation_field(&job, &Collaborators::default(), None).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::UnsupportedConfiguration);

        let four_d = write(
            &dir,
            "four.mhd",
            "NDims = 4\nDimSize = 2 2 2 2\nElementType = MET_FLOAT\nElementDataFile = four.raw\n",
        );
        let job = GenerationJob::builder(&four_d, &points, &points, &output).build();
        let err = generate_deformation_field(&job, &Collaborators::default(), None).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::UnsupportedConfiguration);
        assert!(!output.exists());
    }

    #[test]
    fn unequal_landmark_counts_fail_fast() {
        let dir = scratch_dir("counts");
        let fixed_image = write(
            &dir,
            "fixed.mhd",
            "NDims = 2\nDimSize = 3 3\nElementType = MET_INT\nElementDataFile = fixed.raw\n",
        );
        let fixed_points = write(&dir, "fixed.txt", "point\n2\n0 0\n1 1\n");
        let moving_points = write(&dir, "moving.txt", "index\n1\n0 0\n");
        let output = dir.join("field.mhd");

        let job = GenerationJob::builder(&fixed_image, &fixed_points, &moving_points, &output).build();
        let err = generate_deformation_field(&job, &Collaborators::default(), None).unwrap_err();
        assert_eq!(err.kind(), FieldErrorKind::MalformedInput);
        assert!(!output.exists());
    }

    #[test]
    fn reports_progress_through_sink() {
        let dir = scratch_dir("progress");
        let fixed_image = write(
            &dir,
            "fixed.mhd",
            "NDims = 2\nDimSize = 6 6\nElementType = MET_DOUBLE\nElementDataFile = fixed.raw\n",
        );
        let fixed_points = write(&dir, "fixed.txt", "point\n3\n0 0\n5 0\n0 5\n");
        let moving_points = write(&dir, "moving.txt", "point\n3\n0.5 0\n5 0.5\n0 5\n");

        let messages = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::clone(&messages);
        let (sink, handle) = progress::closure_sink(64, move |msg| {
            store.lock().unwrap().push(msg);
        });

        let job = GenerationJob::builder(&fixed_image, &fixed_points, &moving_points, dir.join("field.mhd"))
            .build();
        generate_deformation_field(&job, &Collaborators::default(), Some(sink)).unwrap();
        handle.join().unwrap();

        let messages = messages.lock().unwrap();
        let loaded = messages
            .iter()
            .filter(|m| matches!(m, ProgressMsg::LandmarksLoaded { num_points: 3, .. }))
            .count();
        assert_eq!(loaded, 2);
        assert!(messages.iter().any(|m| matches!(m, ProgressMsg::TransformFitted { .. })));
        assert!(messages.iter().any(|m| matches!(m, ProgressMsg::FieldProgress { .. })));
    }
}
