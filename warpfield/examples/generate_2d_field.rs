use warpfield::generate_random_points;
use warpfield::{
    CorrespondenceSet, EvaluationParams, Grid, KernelTransform, TransformSettings,
    WarpTestFunctions, evaluate_dense_field,
    io::{FieldWriter, MetaImageWriter},
};
use warpfield_utils::KernelType;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Scatter landmarks over a 100 x 100 physical domain
    let mut source = generate_random_points(40, 2, Some(42));
    source.col_iter_mut().for_each(|col| {
        col.iter_mut().for_each(|v| *v *= 100.0);
    });

    // Push them outwards from the centre with a smooth bulge
    let target = WarpTestFunctions::bulge(&source, &[50.0, 50.0], 30.0, 8.0);

    // Approximate, rather than interpolate, the landmarks with a little stiffness
    let settings = TransformSettings::builder(KernelType::ThinPlateSpline)
        .stiffness(0.01)
        .build();

    let correspondences = CorrespondenceSet::new(source, target)?;
    let transform = KernelTransform::builder(correspondences, settings).build()?;

    // Evaluate over a 128 x 128 grid covering the domain
    let grid = Grid::new([128, 128], [100.0 / 127.0; 2], [0.0; 2])?;
    let field = evaluate_dense_field(&transform, &grid, &EvaluationParams::default(), None)?;

    let output = std::env::temp_dir().join("bulge_field.mhd");
    MetaImageWriter.write(&output, field.view())?;
    println!("Wrote {} displacement vectors to {}", field.num_cells(), output.display());

    Ok(())
}
