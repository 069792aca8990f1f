//! High-level matrix API.
//!
//! These helpers take N×D point matrices (one point per row), build the
//! correspondence set and run a [`MEstimateAggregator`] on it.

use crate::aggregators::MEstimateAggregator;
use crate::core::AggregationReport;
use crate::error::{AggregationError, AggregationResult};
use crate::models::{ModelClass, TransformEstimate};
use crate::settings::AggregatorSettings;
use crate::types::{Correspondence, CorrespondenceSet, Point};
use nalgebra::DMatrix;

/// Result of a robust aggregation.
#[derive(Debug, Clone)]
pub struct AggregationOutput<const D: usize> {
    /// The estimated transform.
    pub estimate: TransformEstimate<D>,
    /// Weighted centroid of the sources under the final working weights.
    pub barycenter: Point<D>,
    /// Convergence status, final weights and per-iteration diagnostics.
    pub report: AggregationReport,
}

/// Robustly estimate a transform mapping `sources` onto `targets`.
///
/// # Arguments
/// * `sources` - Source points (N×D matrix)
/// * `targets` - Target points (N×D matrix)
/// * `weights` - Optional per-row confidence weights (defaults to 1)
/// * `settings` - Optional aggregation settings (uses defaults if None)
///
/// # Returns
/// `AggregationOutput` with the estimate of class `settings.output_model`,
/// its barycenter and the aggregation report.
pub fn estimate_transform<const D: usize>(
    sources: &DMatrix<f64>,
    targets: &DMatrix<f64>,
    weights: Option<&[f64]>,
    settings: Option<AggregatorSettings>,
) -> AggregationResult<AggregationOutput<D>> {
    let set = correspondences_from_matrices::<D>(sources, targets, weights)?;
    let outputs = MEstimateAggregator::new(settings.unwrap_or_default())
        .with_correspondences(set)
        .run()?;
    Ok(AggregationOutput {
        barycenter: outputs.solution.source_barycenter,
        estimate: outputs.solution.estimate,
        report: outputs.report,
    })
}

/// Robust translation-only estimate. See [`estimate_transform`].
pub fn estimate_translation<const D: usize>(
    sources: &DMatrix<f64>,
    targets: &DMatrix<f64>,
    weights: Option<&[f64]>,
    settings: Option<AggregatorSettings>,
) -> AggregationResult<AggregationOutput<D>> {
    let settings = with_model(settings, ModelClass::Translation);
    estimate_transform(sources, targets, weights, Some(settings))
}

/// Robust rotation-plus-translation estimate. See [`estimate_transform`].
pub fn estimate_rigid<const D: usize>(
    sources: &DMatrix<f64>,
    targets: &DMatrix<f64>,
    weights: Option<&[f64]>,
    settings: Option<AggregatorSettings>,
) -> AggregationResult<AggregationOutput<D>> {
    let settings = with_model(settings, ModelClass::Rigid);
    estimate_transform(sources, targets, weights, Some(settings))
}

/// Robust affine estimate. See [`estimate_transform`].
pub fn estimate_affine<const D: usize>(
    sources: &DMatrix<f64>,
    targets: &DMatrix<f64>,
    weights: Option<&[f64]>,
    settings: Option<AggregatorSettings>,
) -> AggregationResult<AggregationOutput<D>> {
    let settings = with_model(settings, ModelClass::Affine);
    estimate_transform(sources, targets, weights, Some(settings))
}

fn with_model(settings: Option<AggregatorSettings>, model: ModelClass) -> AggregatorSettings {
    settings.unwrap_or_default().with_output_model(model)
}

/// Build a validated correspondence set from row-wise point matrices.
pub fn correspondences_from_matrices<const D: usize>(
    sources: &DMatrix<f64>,
    targets: &DMatrix<f64>,
    weights: Option<&[f64]>,
) -> AggregationResult<CorrespondenceSet<D>> {
    if sources.ncols() != D || targets.ncols() != D {
        return Err(AggregationError::DimensionMismatch {
            expected: format!("N×{D} point matrices"),
            found: format!(
                "{}×{} sources and {}×{} targets",
                sources.nrows(),
                sources.ncols(),
                targets.nrows(),
                targets.ncols()
            ),
        });
    }
    let n = sources.nrows();
    if targets.nrows() != n {
        return Err(AggregationError::DimensionMismatch {
            expected: format!("{n} target rows"),
            found: format!("{} target rows", targets.nrows()),
        });
    }
    if let Some(w) = weights {
        if w.len() != n {
            return Err(AggregationError::DimensionMismatch {
                expected: format!("{n} weights"),
                found: format!("{} weights", w.len()),
            });
        }
    }

    let mut set = CorrespondenceSet::with_capacity(n);
    for i in 0..n {
        let source = Point::<D>::from_fn(|k, _| sources[(i, k)]);
        let target = Point::<D>::from_fn(|k, _| targets[(i, k)]);
        let weight = weights.map_or(1.0, |w| w[i]);
        set.push(Correspondence::weighted(source, target, weight))?;
    }
    Ok(set)
}
