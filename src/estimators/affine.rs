//! Full affine estimator.
//!
//! Minimises `sum w |y - (A x + t)|^2` jointly over `A` and `t`. Centring both
//! clouds on their weighted barycenters decouples the two: `A` solves the
//! normal equations `A C = B` with `C = sum w x̃ x̃^T` and `B = sum w ỹ x̃^T`,
//! then `t = ȳ - A x̄`.

use super::{CenteredMoments, Solution};
use crate::core::Estimator;
use crate::error::AggregationResult;
use crate::models::{ModelClass, TransformEstimate};
use crate::types::CorrespondenceSet;
use crate::utils::to_static;

#[derive(Debug, Clone, Copy, Default)]
pub struct AffineEstimator;

impl<const D: usize> Estimator<D> for AffineEstimator {
    fn model_class(&self) -> ModelClass {
        ModelClass::Affine
    }

    fn solve(&self, set: &CorrespondenceSet<D>, weights: &[f64]) -> AggregationResult<Solution<D>> {
        let m = CenteredMoments::compute(set, weights, ModelClass::Affine)?;
        let dec = m.require_spread(ModelClass::Affine, D)?;

        let c_inv = to_static::<D, D>(&dec.inverse());
        let linear = m.cross_covariance * c_inv;
        let translation = m.target_barycenter - linear * m.source_barycenter;

        Ok(Solution {
            estimate: TransformEstimate::Affine {
                linear,
                translation,
            },
            source_barycenter: m.source_barycenter,
            target_barycenter: m.target_barycenter,
            total_weight: m.total_weight,
        })
    }
}
