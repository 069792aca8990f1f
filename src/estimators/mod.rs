//! Closed-form weighted least-squares solvers.
//!
//! One estimator per model class:
//! - Translation-only (weighted mean displacement)
//! - Rigid (weighted Procrustes / Kabsch)
//! - Affine (normal equations on centred coordinates)
//!
//! All of them are stateless and share the weight validation and centring in
//! this module.

pub mod affine;
pub mod rigid;
pub mod translation;

pub use affine::AffineEstimator;
pub use rigid::RigidEstimator;
pub use translation::TranslationEstimator;

use crate::core::Estimator;
use crate::error::{AggregationError, AggregationResult};
use crate::models::{ModelClass, TransformEstimate};
use crate::types::{CorrespondenceSet, Point};
use crate::utils::{to_dynamic, SpdDecomposition, RANK_TOLERANCE};
use nalgebra::SMatrix;

/// Output of a single weighted solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution<const D: usize> {
    pub estimate: TransformEstimate<D>,
    /// Weighted centroid of the source points used by this solve.
    pub source_barycenter: Point<D>,
    pub target_barycenter: Point<D>,
    pub total_weight: f64,
}

/// Solve for `model` with the given per-pair weights.
pub fn solve<const D: usize>(
    set: &CorrespondenceSet<D>,
    weights: &[f64],
    model: ModelClass,
) -> AggregationResult<Solution<D>> {
    match model {
        ModelClass::Translation => TranslationEstimator.solve(set, weights),
        ModelClass::Rigid => RigidEstimator.solve(set, weights),
        ModelClass::Affine => AffineEstimator.solve(set, weights),
    }
}

/// Weighted centroids and centred second moments of a correspondence set.
pub(crate) struct CenteredMoments<const D: usize> {
    pub source_barycenter: Point<D>,
    pub target_barycenter: Point<D>,
    pub total_weight: f64,
    /// Number of pairs with positive weight.
    pub usable: usize,
    /// Largest absolute source coordinate among those pairs.
    pub extent: f64,
    /// `sum w (x - x̄)(x - x̄)^T`
    pub source_covariance: SMatrix<f64, D, D>,
    /// `sum w (y - ȳ)(x - x̄)^T`
    pub cross_covariance: SMatrix<f64, D, D>,
}

impl<const D: usize> CenteredMoments<D> {
    pub fn compute(
        set: &CorrespondenceSet<D>,
        weights: &[f64],
        model: ModelClass,
    ) -> AggregationResult<Self> {
        validate_weights(set, weights)?;

        let mut total_weight = 0.0;
        let mut usable = 0usize;
        let mut extent = 0.0_f64;
        let mut sx = Point::<D>::zeros();
        let mut sy = Point::<D>::zeros();
        for (c, &w) in set.iter().zip(weights) {
            if w > 0.0 {
                usable += 1;
                total_weight += w;
                extent = extent.max(c.source.amax());
                sx += c.source * w;
                sy += c.target * w;
            }
        }
        if usable == 0 || total_weight <= 0.0 {
            return Err(AggregationError::InsufficientData {
                model,
                required: model.min_independent_points(D),
                usable: 0,
            });
        }
        let source_barycenter = sx / total_weight;
        let target_barycenter = sy / total_weight;

        let mut source_covariance = SMatrix::<f64, D, D>::zeros();
        let mut cross_covariance = SMatrix::<f64, D, D>::zeros();
        for (c, &w) in set.iter().zip(weights) {
            if w > 0.0 {
                let x = c.source - source_barycenter;
                let y = c.target - target_barycenter;
                source_covariance += x * x.transpose() * w;
                cross_covariance += y * x.transpose() * w;
            }
        }

        Ok(Self {
            source_barycenter,
            target_barycenter,
            total_weight,
            usable,
            extent,
            source_covariance,
            cross_covariance,
        })
    }

    /// Decompose the source covariance and fail with `InsufficientData` when
    /// its numerical rank is below `required_rank`.
    ///
    /// Spreads below `RANK_TOLERANCE` times the coordinate extent are treated
    /// as rounding noise, so repeated points never count as independent.
    pub fn require_spread(
        &self,
        model: ModelClass,
        required_rank: usize,
    ) -> AggregationResult<SpdDecomposition> {
        let noise = RANK_TOLERANCE * self.extent;
        let floor = self.total_weight * noise * noise;
        let dec = SpdDecomposition::with_floor(to_dynamic(&self.source_covariance), floor);
        if dec.rank < required_rank {
            return Err(AggregationError::InsufficientData {
                model,
                required: model.min_independent_points(D),
                // rank + 1 affinely independent points span a rank-dimensional space
                usable: (dec.rank + 1).min(self.usable),
            });
        }
        Ok(dec)
    }
}

fn validate_weights<const D: usize>(
    set: &CorrespondenceSet<D>,
    weights: &[f64],
) -> AggregationResult<()> {
    if weights.len() != set.len() {
        return Err(AggregationError::DimensionMismatch {
            expected: format!("{} weights", set.len()),
            found: format!("{} weights", weights.len()),
        });
    }
    if let Some(index) = weights.iter().position(|w| !w.is_finite() || *w < 0.0) {
        return Err(AggregationError::InvalidCorrespondence {
            index,
            reason: format!("working weight {} is not finite and non-negative", weights[index]),
        });
    }
    Ok(())
}
