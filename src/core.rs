//! Core traits and the report types shared by every aggregator.
//!
//! - [`Estimator`]: a closed-form weighted least-squares solver for one model
//!   class.
//! - [`TransformAggregator`]: the common contract of the aggregation
//!   strategies (collect correspondences, produce an estimate, report the
//!   barycenter). [`MEstimateAggregator`](crate::aggregators::MEstimateAggregator)
//!   is the robust variant; plain and trimmed least squares are the others.

use crate::convergence::outliers;
use crate::error::AggregationResult;
use crate::estimators::Solution;
use crate::models::{ModelClass, TransformEstimate};
use crate::types::{Correspondence, CorrespondenceSet, Point};

/// Weighted least-squares solver for a single model class.
pub trait Estimator<const D: usize> {
    /// Model class produced by this estimator.
    fn model_class(&self) -> ModelClass;

    /// Fit the model to `set` with one weight per correspondence.
    ///
    /// Pairs with zero weight are ignored. Fails with
    /// [`InsufficientData`](crate::AggregationError::InsufficientData) when
    /// the positively weighted sources do not span enough directions.
    fn solve(&self, set: &CorrespondenceSet<D>, weights: &[f64]) -> AggregationResult<Solution<D>>;
}

/// Why an aggregation stopped without converging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonConvergence {
    /// `max_iterations` reweighting passes ran without meeting the stopping rule.
    IterationBudgetExhausted,
    /// The robust cost kept increasing for `max_cost_increases` passes.
    CostOscillation,
}

/// Outcome of a successful `update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationStatus {
    Converged,
    /// The last estimate is still available but should be treated with suspicion.
    NotConverged(NonConvergence),
}

impl AggregationStatus {
    pub fn is_converged(&self) -> bool {
        matches!(self, AggregationStatus::Converged)
    }
}

/// Diagnostics for one reweighting pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationRecord {
    pub iteration: usize,
    /// Robust scale used for the weights and both costs of this pass.
    pub scale: f64,
    /// Robust cost of the estimate entering the pass.
    pub cost_before: f64,
    /// Robust cost of the re-solved estimate, at the same scale. Compared
    /// with the previous pass's `cost_after` by the convergence policy.
    pub cost_after: f64,
    pub parameter_change: f64,
}

/// Summary of an `update` call.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationReport {
    pub status: AggregationStatus,
    /// Number of reweighting passes after the initial solve.
    pub iterations: usize,
    /// Per-pair weights used by the final accepted solve.
    pub final_weights: Vec<f64>,
    /// Caller-supplied confidence weights, for comparison with `final_weights`.
    pub confidence_weights: Vec<f64>,
    pub history: Vec<IterationRecord>,
}

impl AggregationReport {
    pub fn converged(&self) -> bool {
        self.status.is_converged()
    }

    /// Indices whose final weight fell below `ratio` times their confidence.
    pub fn outlier_indices(&self, ratio: f64) -> Vec<usize> {
        outliers(&self.final_weights, &self.confidence_weights, ratio)
    }
}

/// Common contract of the transform-aggregation strategies.
///
/// Implementations own their correspondences; any mutation clears the stored
/// estimate, which only becomes available again after a successful
/// [`update`](TransformAggregator::update).
pub trait TransformAggregator<const D: usize> {
    fn correspondences(&self) -> &CorrespondenceSet<D>;

    /// Replace the whole correspondence set.
    fn set_correspondences(&mut self, set: CorrespondenceSet<D>);

    /// Validate and append one correspondence, returning its index.
    fn add_correspondence(&mut self, correspondence: Correspondence<D>) -> AggregationResult<usize>;

    /// Run the aggregation from scratch on the current correspondences.
    ///
    /// On error the stored estimate and barycenter are cleared.
    fn update(&mut self) -> AggregationResult<AggregationReport>;

    /// Estimate from the last successful `update`.
    fn estimate(&self) -> Option<&TransformEstimate<D>>;

    /// Weighted centroid of the sources at the final accepted solve.
    fn estimation_barycenter(&self) -> Option<Point<D>>;
}
