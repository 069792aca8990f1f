//! Robust M-estimate aggregation by iteratively reweighted least squares.
//!
//! Each pass measures the residuals of the current estimate, derives a
//! robust scale from them, turns the residuals into working weights with the
//! configured weighting function and re-solves the output model. Both the
//! cost of the incoming and of the re-solved estimate are evaluated at the
//! scale of the pass.
//!
//! With `anneal_scale` the scale of a pass never exceeds that of the previous
//! one. The reweighted solve cannot raise the cost at a fixed scale and a
//! smaller scale cannot raise it either, so the cost is non-increasing over
//! the whole run. Without it, a pass whose scale grew may end above the
//! previous one. After `max_cost_increases` such passes in a row the run
//! stops and keeps the estimate from before the first of them.

use super::{initial_model, prepare, Outputs};
use crate::convergence::{ConvergencePolicy, PolicyDecision};
use crate::core::{
    AggregationReport, AggregationStatus, IterationRecord, NonConvergence, TransformAggregator,
};
use crate::error::AggregationResult;
use crate::estimators::{self, Solution};
use crate::models::TransformEstimate;
use crate::scoring::{effective_residuals, residuals, reweight, robust_cost, robust_scale};
use crate::settings::AggregatorSettings;
use crate::types::{Correspondence, CorrespondenceSet, Point};
use log::{debug, trace, warn};

/// M-estimator transform aggregator.
///
/// ```
/// use nalgebra::Vector2;
/// use transform_aggregator::{
///     AggregatorSettings, Correspondence, MEstimateAggregator, ModelClass, TransformAggregator,
/// };
///
/// let mut aggregator = MEstimateAggregator::<2>::new(
///     AggregatorSettings::default().with_output_model(ModelClass::Translation),
/// );
/// for (x, y) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
///     let p = Vector2::new(x, y);
///     aggregator
///         .add_correspondence(Correspondence::new(p, p + Vector2::new(2.0, -1.0)))
///         .unwrap();
/// }
/// let report = aggregator.update().unwrap();
/// assert!(report.converged());
/// let t = aggregator.estimate().unwrap().translation();
/// assert!((t - Vector2::new(2.0, -1.0)).norm() < 1e-9);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MEstimateAggregator<const D: usize> {
    settings: AggregatorSettings,
    correspondences: CorrespondenceSet<D>,
    outputs: Option<Outputs<D>>,
}

impl<const D: usize> MEstimateAggregator<D> {
    pub fn new(settings: AggregatorSettings) -> Self {
        Self {
            settings,
            correspondences: CorrespondenceSet::new(),
            outputs: None,
        }
    }

    pub fn with_correspondences(mut self, correspondences: CorrespondenceSet<D>) -> Self {
        self.correspondences = correspondences;
        self
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    /// Replace the settings. The stored estimate is discarded.
    pub fn set_settings(&mut self, settings: AggregatorSettings) {
        self.settings = settings;
        self.outputs = None;
    }

    /// Report of the last successful `update`.
    pub fn last_report(&self) -> Option<&AggregationReport> {
        self.outputs.as_ref().map(|o| &o.report)
    }

    /// Solution of the last successful `update`, with both barycenters.
    pub fn solution(&self) -> Option<&Solution<D>> {
        self.outputs.as_ref().map(|o| &o.solution)
    }

    pub(crate) fn run(&self) -> AggregationResult<Outputs<D>> {
        let settings = &self.settings;
        let set = &self.correspondences;
        prepare(settings, set)?;

        let confidence = set.confidence_weights();
        let total_confidence: f64 = confidence.iter().sum();

        let mut current = estimators::solve(set, &confidence, initial_model(settings))?;
        let mut current_weights = confidence.clone();
        let mut policy = ConvergencePolicy::new(settings);
        let mut history = Vec::with_capacity(settings.max_iterations);
        let mut status = AggregationStatus::NotConverged(NonConvergence::IterationBudgetExhausted);
        let mut previous_scale = f64::INFINITY;
        let mut before_rise: Option<(Solution<D>, Vec<f64>)> = None;

        for iteration in 1..=settings.max_iterations {
            let effective = effective_residuals(set, &residuals(set, &current.estimate));
            let mut scale = robust_scale(
                settings.scale_estimator,
                &effective,
                &confidence,
                settings.m_estimate_factor,
                settings.min_scale,
            );
            if settings.anneal_scale {
                scale = scale.min(previous_scale);
            }
            previous_scale = scale;
            let cost_before = robust_cost(settings.weighting, &effective, &confidence, scale);

            let weights = reweight(settings.weighting, &effective, &confidence, scale);
            trace!("iteration {iteration}: working weights {weights:?}");
            policy.check_weights(&weights, total_confidence)?;

            let next = estimators::solve(set, &weights, settings.output_model)?;
            let cost_after = cost_at_scale(settings, set, &next.estimate, &confidence, scale);
            let parameter_change = next.estimate.parameter_distance(&current.estimate);

            debug!(
                "MEstimateAggregator iteration {iteration}: scale={scale:.3e} cost {cost_before:.6e} -> {cost_after:.6e} step={parameter_change:.3e}"
            );
            history.push(IterationRecord {
                iteration,
                scale,
                cost_before,
                cost_after,
                parameter_change,
            });

            // mean of phi(u) for the early-exit test
            let normaliser = total_confidence * scale * scale;
            let decision = policy.evaluate(parameter_change, cost_before, cost_after, normaliser);
            match policy.consecutive_increases() {
                0 => before_rise = None,
                1 => before_rise = Some((current.clone(), current_weights.clone())),
                _ => {}
            }

            match decision {
                PolicyDecision::Continue => {
                    current = next;
                    current_weights = weights;
                }
                PolicyDecision::Converged => {
                    current = next;
                    current_weights = weights;
                    status = AggregationStatus::Converged;
                    debug!("MEstimateAggregator converged after {iteration} iterations");
                    break;
                }
                PolicyDecision::Oscillating => {
                    if let Some((solution, weights)) = before_rise.take() {
                        current = solution;
                        current_weights = weights;
                    }
                    status = AggregationStatus::NotConverged(NonConvergence::CostOscillation);
                    warn!(
                        "MEstimateAggregator: robust cost increased {} times in a row, stopping at iteration {iteration}",
                        policy.consecutive_increases()
                    );
                    break;
                }
            }
        }

        if status == AggregationStatus::NotConverged(NonConvergence::IterationBudgetExhausted) {
            warn!(
                "MEstimateAggregator: no convergence within {} iterations",
                settings.max_iterations
            );
        }

        Ok(Outputs {
            report: AggregationReport {
                status,
                iterations: history.len(),
                final_weights: current_weights,
                confidence_weights: confidence,
                history,
            },
            solution: current,
        })
    }
}

fn cost_at_scale<const D: usize>(
    settings: &AggregatorSettings,
    set: &CorrespondenceSet<D>,
    estimate: &TransformEstimate<D>,
    confidence: &[f64],
    scale: f64,
) -> f64 {
    let effective = effective_residuals(set, &residuals(set, estimate));
    robust_cost(settings.weighting, &effective, confidence, scale)
}

impl<const D: usize> TransformAggregator<D> for MEstimateAggregator<D> {
    fn correspondences(&self) -> &CorrespondenceSet<D> {
        &self.correspondences
    }

    fn set_correspondences(&mut self, set: CorrespondenceSet<D>) {
        self.correspondences = set;
        self.outputs = None;
    }

    fn add_correspondence(&mut self, correspondence: Correspondence<D>) -> AggregationResult<usize> {
        self.outputs = None;
        self.correspondences.push(correspondence)
    }

    fn update(&mut self) -> AggregationResult<AggregationReport> {
        self.outputs = None;
        let outputs = self.run()?;
        let report = outputs.report.clone();
        self.outputs = Some(outputs);
        Ok(report)
    }

    fn estimate(&self) -> Option<&TransformEstimate<D>> {
        self.outputs.as_ref().map(|o| &o.solution.estimate)
    }

    fn estimation_barycenter(&self) -> Option<Point<D>> {
        self.outputs.as_ref().map(|o| o.solution.source_barycenter)
    }
}
