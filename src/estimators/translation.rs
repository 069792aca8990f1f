//! Translation-only estimator.

use super::{CenteredMoments, Solution};
use crate::core::Estimator;
use crate::error::AggregationResult;
use crate::models::{ModelClass, TransformEstimate};
use crate::types::CorrespondenceSet;

/// Weighted mean displacement, `t = sum w (y - x) / sum w`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TranslationEstimator;

impl<const D: usize> Estimator<D> for TranslationEstimator {
    fn model_class(&self) -> ModelClass {
        ModelClass::Translation
    }

    fn solve(&self, set: &CorrespondenceSet<D>, weights: &[f64]) -> AggregationResult<Solution<D>> {
        let m = CenteredMoments::compute(set, weights, ModelClass::Translation)?;
        // Difference of barycenters equals the weighted mean displacement.
        let offset = m.target_barycenter - m.source_barycenter;
        Ok(Solution {
            estimate: TransformEstimate::Translation(offset),
            source_barycenter: m.source_barycenter,
            target_barycenter: m.target_barycenter,
            total_weight: m.total_weight,
        })
    }
}
