/////////////////////////////////////////////////////////////////////////////////////////////
//
// Command line front end that turns landmark files into a deformation field image.
//
// Created on: 15 Nov 2025     Author: Daniel Owen
//
// Copyright (c) 2025, Maptek Pty Ltd. All rights reserved. Licensed under the MIT License.
//
/////////////////////////////////////////////////////////////////////////////////////////////

use clap::Parser;
use std::path::PathBuf;
use warpfield::{
    Collaborators, EvaluationParams, GenerationJob, TransformSettings,
    generate_deformation_field,
    progress::{ProgressMsg, closure_sink},
};
use warpfield_utils::KernelType;

/// Command line arguments structure.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Generates a dense deformation field from corresponding landmarks in two images."
)]
struct Args {
    /// Fixed image; defines the output grid and converts index-valued fixed points
    #[arg(long = "in1", value_name = "FIXED_IMAGE")]
    fixed_image: PathBuf,

    /// Moving image; only needed when the moving points are indices
    #[arg(long = "in2", value_name = "MOVING_IMAGE")]
    moving_image: Option<PathBuf>,

    /// Landmarks in the fixed image (transformix point file or .csv)
    #[arg(long = "ipp1", value_name = "FIXED_POINTS")]
    fixed_points: PathBuf,

    /// Landmarks in the moving image (transformix point file or .csv)
    #[arg(long = "ipp2", value_name = "MOVING_POINTS")]
    moving_points: PathBuf,

    /// Output deformation field (.mhd or .mha)
    #[arg(long = "out", value_name = "FIELD")]
    output: PathBuf,

    /// Kernel: TPS, TPSR2LOGR, VS, EBS or EBSR.
    #[arg(short, long, default_value = "TPS")]
    kernel: KernelType,

    /// Stiffness; 0 interpolates the landmarks, larger values give smoother fields
    #[arg(short, long, default_value_t = 0.0)]
    stiffness: f64,

    /// Optionally save the fitted transform as JSON
    #[arg(long, value_name = "JSON")]
    save_transform: Option<PathBuf>,

    /// Evaluate the field on a single thread
    #[arg(long)]
    sequential: bool,
}

fn main() {
    let args = Args::parse();

    let settings = TransformSettings::builder(args.kernel)
        .stiffness(args.stiffness)
        .build();

    let mut builder = GenerationJob::builder(
        &args.fixed_image,
        &args.fixed_points,
        &args.moving_points,
        &args.output,
    )
    .transform_settings(settings)
    .evaluation(EvaluationParams {
        parallel: !args.sequential,
    });
    if let Some(moving_image) = &args.moving_image {
        builder = builder.moving_image(moving_image);
    }
    if let Some(path) = &args.save_transform {
        builder = builder.save_transform(path);
    }
    let job = builder.build();

    let (sink, handle) = closure_sink(256, |msg| match msg {
        ProgressMsg::Message { message } => println!("{}", message),
        ProgressMsg::LandmarksLoaded { .. } => {}
        ProgressMsg::TransformFitted {
            kernel_type,
            num_landmarks,
            max_residual,
        } => println!(
            "{} transform: {} landmarks, max landmark residual {:.3e}",
            kernel_type, num_landmarks, max_residual
        ),
        ProgressMsg::FieldProgress { progress } => {
            if progress >= 1.0 {
                println!("Field evaluation complete");
            }
        }
    });

    let result = generate_deformation_field(&job, &Collaborators::default(), Some(sink));
    let _ = handle.join();

    match result {
        Ok(summary) => {
            println!(
                "Wrote {} displacement vectors ({}D, {} pixels) to {}",
                summary.num_cells,
                summary.dimensions,
                summary.scalar_type,
                summary.output.display()
            );
        }
        Err(err) => {
            eprintln!("ERROR: {}", err);
            std::process::exit(err.exit_code());
        }
    }
}
