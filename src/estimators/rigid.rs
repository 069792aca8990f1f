//! Rigid transform estimator using weighted Procrustes analysis.

use super::{CenteredMoments, Solution};
use crate::core::Estimator;
use crate::error::{AggregationError, AggregationResult};
use crate::models::{ModelClass, TransformEstimate};
use crate::types::CorrespondenceSet;
use crate::utils::{to_dynamic, to_static};
use nalgebra::DMatrix;

/// Rotation plus translation, fitted with the weighted Kabsch algorithm.
///
/// The rotation is the orthogonal polar factor of the weighted cross
/// covariance, with the last singular direction flipped when needed so that
/// `det(R) = +1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RigidEstimator;

impl<const D: usize> Estimator<D> for RigidEstimator {
    fn model_class(&self) -> ModelClass {
        ModelClass::Rigid
    }

    fn solve(&self, set: &CorrespondenceSet<D>, weights: &[f64]) -> AggregationResult<Solution<D>> {
        let m = CenteredMoments::compute(set, weights, ModelClass::Rigid)?;
        // A rotation is pinned down once the sources span D - 1 directions.
        m.require_spread(ModelClass::Rigid, D.saturating_sub(1).max(1))?;

        // H = sum w x̃ ỹ^T
        let h = to_dynamic(&m.cross_covariance.transpose());
        let svd = h.svd(true, true);
        let insufficient = || AggregationError::InsufficientData {
            model: ModelClass::Rigid,
            required: ModelClass::Rigid.min_independent_points(D),
            usable: m.usable,
        };
        let u = svd.u.ok_or_else(insufficient)?;
        let v = svd.v_t.ok_or_else(insufficient)?.transpose();

        let mut correction = DMatrix::<f64>::identity(D, D);
        if (&v * u.transpose()).determinant() < 0.0 {
            // nalgebra sorts singular values in decreasing order
            correction[(D - 1, D - 1)] = -1.0;
        }
        let rotation = to_static::<D, D>(&(v * correction * u.transpose()));
        let translation = m.target_barycenter - rotation * m.source_barycenter;

        Ok(Solution {
            estimate: TransformEstimate::Rigid {
                rotation,
                translation,
            },
            source_barycenter: m.source_barycenter,
            target_barycenter: m.target_barycenter,
            total_weight: m.total_weight,
        })
    }
}
