//! Integration tests for the public aggregation API.
//!
//! These tests run the aggregators end to end on synthetic correspondences
//! and check recovery, robustness, convergence reporting and failure modes.

use approx::assert_abs_diff_eq;
use nalgebra::{DMatrix, Matrix2, Matrix3, Rotation3, Vector2, Vector3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use transform_aggregator::synthetic::{
    add_noise, apply_transform, correspondences, corrupt_targets, random_points, rigid_2d,
};
use transform_aggregator::*;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn to_matrix<const D: usize>(points: &[Point<D>]) -> DMatrix<f64> {
    DMatrix::from_fn(points.len(), D, |i, k| points[i][k])
}

/// 100 exact rigid correspondences plus 15 with random unrelated targets.
fn rotation_scenario(seed: u64) -> (CorrespondenceSet<2>, f64, Vector2<f64>) {
    let angle = 0.25;
    let translation = Vector2::new(12.0, -7.0);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut sources = random_points::<2, _>(&mut rng, 100, 50.0);
    let mut targets = apply_transform(&rigid_2d(angle, translation), &sources);
    sources.extend(random_points::<2, _>(&mut rng, 15, 50.0));
    targets.extend(random_points::<2, _>(&mut rng, 15, 60.0));

    (correspondences(&sources, &targets).unwrap(), angle, translation)
}

#[test]
fn test_exact_translation_recovery() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(1);
    let t = Vector3::new(0.5, -4.0, 2.25);
    let sources = random_points::<3, _>(&mut rng, 30, 10.0);
    let targets: Vec<_> = sources.iter().map(|p| p + t).collect();

    let out = estimate_translation::<3>(&to_matrix(&sources), &to_matrix(&targets), None, None)
        .unwrap();
    assert!(out.report.converged());
    assert_eq!(out.estimate.model_class(), ModelClass::Translation);
    assert_abs_diff_eq!(out.estimate.translation(), t, epsilon = 1e-9);
}

#[test]
fn test_exact_rigid_recovery_3d() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(2);
    let r = Rotation3::from_euler_angles(0.3, -0.2, 0.9);
    let t = Vector3::new(-1.0, 3.0, 0.5);
    let sources = random_points::<3, _>(&mut rng, 25, 20.0);
    let targets: Vec<_> = sources.iter().map(|p| r * p + t).collect();

    let out =
        estimate_rigid::<3>(&to_matrix(&sources), &to_matrix(&targets), None, None).unwrap();
    assert!(out.report.converged());
    assert_abs_diff_eq!(out.estimate.linear(), *r.matrix(), epsilon = 1e-9);
    assert_abs_diff_eq!(out.estimate.translation(), t, epsilon = 1e-9);
}

#[test]
fn test_exact_affine_recovery_2d_and_3d() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(3);

    let a2 = Matrix2::new(1.3, 0.2, -0.4, 0.8);
    let t2 = Vector2::new(5.0, -2.0);
    let estimate = TransformEstimate::Affine {
        linear: a2,
        translation: t2,
    };
    let src = random_points::<2, _>(&mut rng, 40, 30.0);
    let dst = apply_transform(&estimate, &src);
    let mut agg = MEstimateAggregator::new(AggregatorSettings::default())
        .with_correspondences(correspondences(&src, &dst).unwrap());
    assert!(agg.update().unwrap().converged());
    assert_abs_diff_eq!(agg.estimate().unwrap().linear(), a2, epsilon = 1e-9);
    assert_abs_diff_eq!(agg.estimate().unwrap().translation(), t2, epsilon = 1e-9);

    let a3 = Matrix3::new(1.0, 0.1, -0.2, 0.0, 0.9, 0.3, 0.2, 0.0, 1.1);
    let t3 = Vector3::new(1.0, 2.0, 3.0);
    let estimate = TransformEstimate::Affine {
        linear: a3,
        translation: t3,
    };
    let src = random_points::<3, _>(&mut rng, 40, 30.0);
    let dst = apply_transform(&estimate, &src);
    let out = estimate_affine::<3>(&to_matrix(&src), &to_matrix(&dst), None, None).unwrap();
    assert!(out.report.converged());
    assert_abs_diff_eq!(out.estimate.linear(), a3, epsilon = 1e-9);
    assert_abs_diff_eq!(out.estimate.translation(), t3, epsilon = 1e-9);
}

#[test]
fn test_robust_affine_with_twenty_percent_outliers() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(4);
    let a = Matrix2::new(0.95, -0.3, 0.3, 0.95);
    let t = Vector2::new(-8.0, 15.0);
    let truth = TransformEstimate::Affine {
        linear: a,
        translation: t,
    };

    let sources = random_points::<2, _>(&mut rng, 100, 50.0);
    let mut targets = apply_transform(&truth, &sources);
    let corrupted = corrupt_targets(&mut rng, &mut targets, 20, 100.0);
    let set = correspondences(&sources, &targets).unwrap();

    let mut robust = MEstimateAggregator::new(AggregatorSettings::default())
        .with_correspondences(set.clone());
    let report = robust.update().unwrap();
    assert!(report.converged());
    let est = robust.estimate().unwrap();
    assert_abs_diff_eq!(est.linear(), a, epsilon = 1e-4);
    assert_abs_diff_eq!(est.translation(), t, epsilon = 1e-4);

    // every corrupted pair ends up heavily down-weighted
    let flagged = report.outlier_indices(1e-2);
    assert!(corrupted.iter().all(|i| flagged.contains(i)));

    let mut plain = LeastSquaresAggregator::new(AggregatorSettings::default())
        .with_correspondences(set);
    plain.update().unwrap();
    assert!(plain.estimate().unwrap().parameter_distance(&truth) > 1e-2);
}

#[test]
fn test_concrete_rotation_scenario() {
    init_logger();
    let (set, angle, translation) = rotation_scenario(42);
    let settings = AggregatorSettings::default()
        .with_m_estimate_factor(1.0)
        .with_stopping_threshold(1e-6)
        .with_max_iterations(50);

    for model in [ModelClass::Rigid, ModelClass::Affine] {
        let mut agg = MEstimateAggregator::new(settings.clone().with_output_model(model))
            .with_correspondences(set.clone());
        let report = agg.update().unwrap();
        assert!(report.converged(), "{model:?} did not converge");
        let est = agg.estimate().unwrap();
        assert!((est.rotation_angle() - angle).abs() < 1e-3, "{model:?}");
        assert!((est.translation() - translation).norm() < 1e-3, "{model:?}");
    }

    // the same data fools plain least squares
    let mut plain = LeastSquaresAggregator::new(settings.with_output_model(ModelClass::Rigid))
        .with_correspondences(set);
    plain.update().unwrap();
    let est = plain.estimate().unwrap();
    let angle_error = (est.rotation_angle() - angle).abs();
    let translation_error = (est.translation() - translation).norm();
    assert!(angle_error > 1e-3 || translation_error > 1e-3);
}

#[test]
fn test_update_is_idempotent() {
    init_logger();
    let (set, _, _) = rotation_scenario(7);
    let mut agg = MEstimateAggregator::new(AggregatorSettings::default()).with_correspondences(set);

    let first = agg.update().unwrap();
    let first_estimate = agg.estimate().unwrap().clone();
    let first_barycenter = agg.estimation_barycenter().unwrap();

    let second = agg.update().unwrap();
    assert_eq!(first, second);
    assert_eq!(&first_estimate, agg.estimate().unwrap());
    assert_eq!(first_barycenter, agg.estimation_barycenter().unwrap());
}

#[test]
fn test_cost_never_increases_between_iterations() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(8);
    let truth = rigid_2d(-0.4, Vector2::new(3.0, 1.0));
    let sources = random_points::<2, _>(&mut rng, 80, 40.0);
    let mut targets = apply_transform(&truth, &sources);
    add_noise(&mut rng, &mut targets, 0.5);
    corrupt_targets(&mut rng, &mut targets, 12, 80.0);
    let set = correspondences(&sources, &targets).unwrap();

    for weighting in [RobustWeighting::Cauchy, RobustWeighting::Huber] {
        for model in [ModelClass::Translation, ModelClass::Rigid, ModelClass::Affine] {
            let settings = AggregatorSettings::default()
                .with_weighting(weighting)
                .with_output_model(model);
            let mut agg = MEstimateAggregator::new(settings).with_correspondences(set.clone());
            let report = agg.update().unwrap();
            assert!(!report.history.is_empty());
            let first = &report.history[0];
            assert!(first.cost_after <= first.cost_before + 1e-9 * first.cost_before.max(1.0));
            for pair in report.history.windows(2) {
                let (prev, next) = (&pair[0], &pair[1]);
                let slack = 1e-9 * prev.cost_after.abs().max(1.0);
                assert!(
                    next.cost_after <= prev.cost_after + slack,
                    "{weighting:?}/{model:?} iteration {}: {} -> {}",
                    next.iteration,
                    prev.cost_after,
                    next.cost_after
                );
            }
        }
    }
}

/// Five light pairs displaced around the origin and four pairs with 20x the
/// confidence displaced around (10, 0).
fn competing_clusters() -> CorrespondenceSet<2> {
    let light = [(0.0, 0.0), (0.5, 0.0), (-0.5, 0.0), (0.0, 0.5), (0.0, -0.5)];
    let heavy = [(10.0, 0.0), (10.5, 0.0), (9.5, 0.0), (10.0, 0.5)];
    let mut set = CorrespondenceSet::new();
    for (i, &(dx, dy)) in light.iter().enumerate() {
        let p = Vector2::new(i as f64, 1.0);
        set.push(Correspondence::new(p, p + Vector2::new(dx, dy))).unwrap();
    }
    for (i, &(dx, dy)) in heavy.iter().enumerate() {
        let p = Vector2::new(i as f64, -1.0);
        set.push(Correspondence::weighted(p, p + Vector2::new(dx, dy), 20.0))
            .unwrap();
    }
    set
}

#[test]
fn test_rising_cost_stops_with_estimate_before_the_rise() {
    init_logger();
    let settings = AggregatorSettings::default()
        .with_output_model(ModelClass::Translation)
        .with_anneal_scale(false)
        .with_max_cost_increases(2);

    // the scale follows the growing residuals of the light pairs and the
    // cost rises in passes 2 and 3
    let mut agg = MEstimateAggregator::new(settings.clone())
        .with_correspondences(competing_clusters());
    let report = agg.update().unwrap();
    assert_eq!(
        report.status,
        AggregationStatus::NotConverged(NonConvergence::CostOscillation)
    );
    assert_eq!(report.iterations, 3);
    let h = &report.history;
    assert!(h[1].scale > h[0].scale);
    assert!(h[1].cost_after > h[0].cost_after);
    assert!(h[2].cost_after > h[1].cost_after);

    // the kept estimate is the one reached after pass 1
    let mut first_pass = MEstimateAggregator::new(settings.with_max_iterations(1))
        .with_correspondences(competing_clusters());
    let first_report = first_pass.update().unwrap();
    assert_eq!(agg.estimate(), first_pass.estimate());
    assert_eq!(agg.estimation_barycenter(), first_pass.estimation_barycenter());
    assert_eq!(report.final_weights, first_report.final_weights);
}

#[test]
fn test_annealed_scale_keeps_competing_clusters_monotone() {
    init_logger();
    let settings = AggregatorSettings::default().with_output_model(ModelClass::Translation);
    let mut agg = MEstimateAggregator::new(settings).with_correspondences(competing_clusters());
    let report = agg.update().unwrap();
    assert!(report.converged());
    assert!(report.history.len() > 2);
    for pair in report.history.windows(2) {
        assert!(pair[1].scale <= pair[0].scale);
        assert!(pair[1].cost_after <= pair[0].cost_after + 1e-9 * pair[0].cost_after.max(1.0));
    }
}

#[test]
fn test_minimal_point_counts() {
    init_logger();
    let affine = AggregatorSettings::default();

    // D + 1 independent points succeed, D fail
    let three = correspondences(
        &[Vector2::new(0.0, 0.0), Vector2::new(1.0, 0.0), Vector2::new(0.0, 1.0)],
        &[Vector2::new(1.0, 1.0), Vector2::new(3.0, 1.0), Vector2::new(1.0, 2.0)],
    )
    .unwrap();
    let mut agg = MEstimateAggregator::new(affine.clone()).with_correspondences(three);
    assert!(agg.update().unwrap().converged());

    let two = correspondences(
        &[Vector2::new(0.0, 0.0), Vector2::new(1.0, 0.0)],
        &[Vector2::new(1.0, 1.0), Vector2::new(3.0, 1.0)],
    )
    .unwrap();
    let mut agg = MEstimateAggregator::new(affine).with_correspondences(two.clone());
    assert_eq!(
        agg.update().unwrap_err(),
        AggregationError::InsufficientData {
            model: ModelClass::Affine,
            required: 3,
            usable: 2,
        }
    );
    assert!(agg.estimate().is_none());

    // in 3D the affine minimum is four points
    let src3 = [
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
        Vector3::new(0.0, 0.0, 1.0),
    ];
    let dst3: Vec<_> = src3.iter().map(|p| 2.0 * p).collect();
    let mut agg = MEstimateAggregator::new(AggregatorSettings::default())
        .with_correspondences(correspondences(&src3, &dst3).unwrap());
    assert!(agg.update().is_ok());
    let mut agg = MEstimateAggregator::new(AggregatorSettings::default())
        .with_correspondences(correspondences(&src3[..3], &dst3[..3]).unwrap());
    assert!(matches!(
        agg.update(),
        Err(AggregationError::InsufficientData { required: 4, .. })
    ));

    // rigid needs two points in the plane, translation one
    let rigid = AggregatorSettings::default().with_output_model(ModelClass::Rigid);
    let mut agg = MEstimateAggregator::new(rigid.clone()).with_correspondences(two.clone());
    assert!(agg.update().is_ok());
    let one = correspondences(&[Vector2::new(2.0, 2.0)], &[Vector2::new(0.0, 1.0)]).unwrap();
    let mut agg = MEstimateAggregator::new(rigid).with_correspondences(one.clone());
    assert!(matches!(
        agg.update(),
        Err(AggregationError::InsufficientData { .. })
    ));
    let mut agg = MEstimateAggregator::new(
        AggregatorSettings::default().with_output_model(ModelClass::Translation),
    )
    .with_correspondences(one);
    agg.update().unwrap();
    assert_abs_diff_eq!(
        agg.estimate().unwrap().translation(),
        Vector2::new(-2.0, -1.0),
        epsilon = 1e-12
    );
}

#[test]
fn test_repeated_point_is_insufficient_regardless_of_count() {
    init_logger();
    let p = Vector2::new(3.7, -1.3);
    let q = Vector2::new(0.1, 9.9);
    for n in [1, 3, 10, 101, 1000] {
        let set = correspondences(&vec![p; n], &vec![q; n]).unwrap();
        for model in [ModelClass::Rigid, ModelClass::Affine] {
            let settings = AggregatorSettings::default().with_output_model(model);
            let mut agg = MEstimateAggregator::new(settings).with_correspondences(set.clone());
            assert!(
                matches!(agg.update(), Err(AggregationError::InsufficientData { .. })),
                "{model:?} with {n} copies"
            );
        }
    }
}

#[test]
fn test_zero_confidence_pairs_are_unusable() {
    init_logger();
    let mut set = CorrespondenceSet::<2>::new();
    for i in 0..5 {
        let p = Vector2::new(i as f64, (i * i) as f64);
        set.push(Correspondence::weighted(p, p, 0.0)).unwrap();
    }
    let mut agg = MEstimateAggregator::new(AggregatorSettings::default()).with_correspondences(set);
    assert!(matches!(
        agg.update(),
        Err(AggregationError::InsufficientData { usable: 0, .. })
    ));
}

#[test]
fn test_collapsed_weights_are_degenerate() {
    init_logger();
    // every pair sits at distance 1 from the fitted translation, and
    // Tukey rejects anything beyond the scale 0.5
    let sources = [
        Vector2::new(0.0, 0.0),
        Vector2::new(4.0, 0.0),
        Vector2::new(0.0, 4.0),
        Vector2::new(4.0, 4.0),
    ];
    let offsets = [
        Vector2::new(1.0, 0.0),
        Vector2::new(-1.0, 0.0),
        Vector2::new(0.0, 1.0),
        Vector2::new(0.0, -1.0),
    ];
    let targets: Vec<_> = sources.iter().zip(&offsets).map(|(p, d)| p + d).collect();
    let settings = AggregatorSettings::default()
        .with_output_model(ModelClass::Translation)
        .with_weighting(RobustWeighting::Tukey)
        .with_m_estimate_factor(0.5);
    let mut agg = MEstimateAggregator::new(settings)
        .with_correspondences(correspondences(&sources, &targets).unwrap());
    assert!(matches!(
        agg.update(),
        Err(AggregationError::DegenerateWeighting { .. })
    ));
    assert!(agg.estimate().is_none());
}

#[test]
fn test_iteration_budget_is_reported() {
    init_logger();
    let (set, _, _) = rotation_scenario(9);
    let mut agg = MEstimateAggregator::new(AggregatorSettings::default().with_max_iterations(2))
        .with_correspondences(set);
    let report = agg.update().unwrap();
    assert_eq!(
        report.status,
        AggregationStatus::NotConverged(NonConvergence::IterationBudgetExhausted)
    );
    assert_eq!(report.history.len(), 2);
    assert!(agg.estimate().is_some());
}

#[test]
fn test_invalid_settings_are_rejected() {
    init_logger();
    let (set, _, _) = rotation_scenario(10);
    for settings in [
        AggregatorSettings::default().with_m_estimate_factor(0.0),
        AggregatorSettings::default().with_stopping_threshold(-1.0),
        AggregatorSettings::default().with_max_iterations(0),
        AggregatorSettings::default().with_max_cost_increases(0),
    ] {
        let mut agg = MEstimateAggregator::new(settings).with_correspondences(set.clone());
        assert!(matches!(
            agg.update(),
            Err(AggregationError::InvalidSettings { .. })
        ));
    }

    // the keep fraction only matters to the trimmed aggregator
    let trimmed = AggregatorSettings {
        lts_keep_fraction: 1.5,
        ..Default::default()
    };
    let mut agg = MEstimateAggregator::new(trimmed.clone()).with_correspondences(set.clone());
    assert!(agg.update().is_ok());
    let mut agg = LeastSquaresAggregator::new(trimmed.clone()).with_correspondences(set.clone());
    assert!(agg.update().is_ok());
    let mut agg = LtsAggregator::new(trimmed).with_correspondences(set);
    assert!(matches!(
        agg.update(),
        Err(AggregationError::InvalidSettings {
            field: "lts_keep_fraction",
            ..
        })
    ));
}

#[test]
fn test_settings_from_partial_json() {
    init_logger();
    let settings: AggregatorSettings = serde_json::from_str(
        r#"{ "output_model": "rigid", "weighting": "geman_mc_clure", "max_iterations": 20 }"#,
    )
    .unwrap();
    assert_eq!(settings.output_model, ModelClass::Rigid);
    assert_eq!(settings.weighting, RobustWeighting::GemanMcClure);
    assert_eq!(settings.max_iterations, 20);
    assert_eq!(settings.m_estimate_factor, 1.0);

    let (set, angle, _) = rotation_scenario(11);
    let mut agg = MEstimateAggregator::new(settings).with_correspondences(set);
    agg.update().unwrap();
    assert!((agg.estimate().unwrap().rotation_angle() - angle).abs() < 1e-3);
}

#[test]
fn test_strategies_are_interchangeable() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(12);
    let truth = rigid_2d(0.6, Vector2::new(-2.0, 5.0));
    let sources = random_points::<2, _>(&mut rng, 20, 10.0);
    let targets = apply_transform(&truth, &sources);
    let set = correspondences(&sources, &targets).unwrap();
    let settings = AggregatorSettings::default().with_output_model(ModelClass::Rigid);

    let mut strategies: Vec<Box<dyn TransformAggregator<2>>> = vec![
        Box::new(MEstimateAggregator::<2>::new(settings.clone())),
        Box::new(LeastSquaresAggregator::<2>::new(settings.clone())),
        Box::new(LtsAggregator::<2>::new(settings)),
    ];
    for strategy in strategies.iter_mut() {
        strategy.set_correspondences(set.clone());
        assert!(strategy.update().unwrap().converged());
        assert!(strategy.estimate().unwrap().parameter_distance(&truth) < 1e-9);
        assert!(strategy.estimation_barycenter().is_some());
    }
}

#[test]
fn test_independent_instances_on_threads() {
    init_logger();
    let results: Vec<(f64, f64)> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4u64)
            .map(|seed| {
                s.spawn(move || {
                    let (set, angle, _) = rotation_scenario(100 + seed);
                    let mut agg = MEstimateAggregator::new(
                        AggregatorSettings::default().with_output_model(ModelClass::Rigid),
                    )
                    .with_correspondences(set);
                    agg.update().unwrap();
                    (agg.estimate().unwrap().rotation_angle(), angle)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(results.len(), 4);
    for (estimated, expected) in results {
        assert!((estimated - expected).abs() < 1e-3);
    }
}
