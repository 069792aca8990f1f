//! Example: robust 2D rigid registration from noisy correspondences
//!
//! Generates matches between two point clouds related by a rotation and a
//! translation, corrupts a share of them, and compares the M-estimator
//! aggregator with plain and trimmed least squares.
//!
//! Run with `RUST_LOG=debug` to see the per-iteration trace.

use nalgebra::Vector2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use transform_aggregator::synthetic::{
    add_noise, apply_transform, correspondences, corrupt_targets, random_points, rigid_2d,
};
use transform_aggregator::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    println!("=== Robust Rigid 2D Aggregation Example ===\n");

    let n_points = 200;
    let n_outliers = 50;
    let angle = 0.4;
    let translation = Vector2::new(25.0, -10.0);

    let mut rng = StdRng::seed_from_u64(2024);
    let sources = random_points::<2, _>(&mut rng, n_points, 100.0);
    let mut targets = apply_transform(&rigid_2d(angle, translation), &sources);
    add_noise(&mut rng, &mut targets, 0.2);
    let corrupted = corrupt_targets(&mut rng, &mut targets, n_outliers, 150.0);
    let set = correspondences(&sources, &targets)?;

    println!("Ground truth: angle {angle:.4} rad, translation {translation:?}");
    println!("{n_points} correspondences, {} corrupted\n", corrupted.len());

    let settings = AggregatorSettings::default().with_output_model(ModelClass::Rigid);
    let strategies: [(&str, Box<dyn TransformAggregator<2>>); 3] = [
        ("M-estimator", Box::new(MEstimateAggregator::<2>::new(settings.clone()))),
        ("Least squares", Box::new(LeastSquaresAggregator::<2>::new(settings.clone()))),
        ("Trimmed squares", Box::new(LtsAggregator::<2>::new(settings))),
    ];

    for (name, mut aggregator) in strategies {
        aggregator.set_correspondences(set.clone());
        let report = aggregator.update()?;
        let Some(estimate) = aggregator.estimate() else {
            continue;
        };
        println!("{name}:");
        println!("  status:       {:?} after {} iterations", report.status, report.iterations);
        println!(
            "  angle error:  {:.2e} rad",
            (estimate.rotation_angle() - angle).abs()
        );
        println!(
            "  shift error:  {:.2e}",
            (estimate.translation() - translation).norm()
        );
        if let Some(barycenter) = aggregator.estimation_barycenter() {
            println!("  barycenter:   ({:.3}, {:.3})", barycenter.x, barycenter.y);
        }
        let flagged = report.outlier_indices(0.05);
        let hits = corrupted.iter().filter(|i| flagged.contains(i)).count();
        println!("  flagged:      {} pairs ({hits} corrupted)\n", flagged.len());
    }

    Ok(())
}
