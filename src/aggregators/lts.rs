//! Least trimmed squares aggregation.
//!
//! Alternates between keeping the `lts_keep_fraction` share of pairs with the
//! smallest residuals and refitting the output model on them alone (the
//! classic concentration step). The trimmed cost of a fixed kept set can only
//! drop when refitting. Re-trimming picks the smallest residuals, which with
//! unequal confidences need not give the smallest weighted cost, so a pass
//! can still end above the previous one.

use super::{initial_model, prepare, Outputs};
use crate::convergence::{ConvergencePolicy, PolicyDecision};
use crate::core::{
    AggregationReport, AggregationStatus, IterationRecord, NonConvergence, TransformAggregator,
};
use crate::error::{AggregationError, AggregationResult};
use crate::estimators::{self, Solution};
use crate::models::TransformEstimate;
use crate::scoring::{effective_residuals, residuals};
use crate::settings::AggregatorSettings;
use crate::types::{Correspondence, CorrespondenceSet, Point};
use log::{debug, trace, warn};

/// Trimmed least-squares aggregator.
#[derive(Debug, Clone, Default)]
pub struct LtsAggregator<const D: usize> {
    settings: AggregatorSettings,
    correspondences: CorrespondenceSet<D>,
    outputs: Option<Outputs<D>>,
}

impl<const D: usize> LtsAggregator<D> {
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

    pub fn set_settings(&mut self, settings: AggregatorSettings) {
        self.settings = settings;
        self.outputs = None;
    }

    pub fn last_report(&self) -> Option<&AggregationReport> {
        self.outputs.as_ref().map(|o| &o.report)
    }

    fn run(&self) -> AggregationResult<Outputs<D>> {
        let settings = &self.settings;
        let set = &self.correspondences;
        prepare(settings, set)?;
        check_keep_fraction(settings.lts_keep_fraction)?;

        let confidence = set.confidence_weights();
        let total_confidence: f64 = confidence.iter().sum();
        let candidates: Vec<usize> = (0..set.len()).filter(|&i| confidence[i] > 0.0).collect();
        let keep = keep_count(
            candidates.len(),
            settings.lts_keep_fraction,
            settings.output_model.min_independent_points(D),
        );

        let mut current = estimators::solve(set, &confidence, initial_model(settings))?;
        let mut current_weights = confidence.clone();
        let mut policy = ConvergencePolicy::new(settings);
        let mut history = Vec::with_capacity(settings.max_iterations);
        let mut status = AggregationStatus::NotConverged(NonConvergence::IterationBudgetExhausted);
        let mut before_rise: Option<(Solution<D>, Vec<f64>)> = None;

        for iteration in 1..=settings.max_iterations {
            let effective = effective_residuals(set, &residuals(set, &current.estimate));
            let (weights, cutoff) = trim(&effective, &confidence, &candidates, keep);
            trace!("iteration {iteration}: kept weights {weights:?}");
            let cost_before = trimmed_cost(&effective, &weights);

            let next = estimators::solve(set, &weights, settings.output_model)?;
            let next_effective = effective_residuals(set, &residuals(set, &next.estimate));
            let cost_after = trimmed_cost(&next_effective, &weights);
            let parameter_change = next.estimate.parameter_distance(&current.estimate);

            debug!(
                "LtsAggregator iteration {iteration}: kept {keep} cutoff={cutoff:.3e} cost {cost_before:.6e} -> {cost_after:.6e} step={parameter_change:.3e}"
            );
            history.push(IterationRecord {
                iteration,
                scale: cutoff,
                cost_before,
                cost_after,
                parameter_change,
            });

            let decision =
                policy.evaluate(parameter_change, cost_before, cost_after, total_confidence);
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
                    debug!("LtsAggregator converged after {iteration} iterations");
                    break;
                }
                PolicyDecision::Oscillating => {
                    if let Some((solution, weights)) = before_rise.take() {
                        current = solution;
                        current_weights = weights;
                    }
                    status = AggregationStatus::NotConverged(NonConvergence::CostOscillation);
                    warn!("LtsAggregator: trimmed cost kept increasing, stopping at iteration {iteration}");
                    break;
                }
            }
        }

        if status == AggregationStatus::NotConverged(NonConvergence::IterationBudgetExhausted) {
            warn!(
                "LtsAggregator: no convergence within {} iterations",
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

fn check_keep_fraction(fraction: f64) -> AggregationResult<()> {
    if fraction > 0.0 && fraction <= 1.0 {
        Ok(())
    } else {
        Err(AggregationError::invalid_settings(
            "lts_keep_fraction",
            format!("must lie in (0, 1], got {fraction}"),
        ))
    }
}

/// Number of pairs kept out of `available`, never below what the model needs.
fn keep_count(available: usize, fraction: f64, minimum: usize) -> usize {
    let wanted = (fraction * available as f64).ceil() as usize;
    wanted.clamp(minimum.min(available), available)
}

/// Confidence weights restricted to the `keep` candidates with the smallest
/// residuals, plus the largest kept residual.
fn trim(effective: &[f64], confidence: &[f64], candidates: &[usize], keep: usize) -> (Vec<f64>, f64) {
    let mut order = candidates.to_vec();
    order.sort_by(|&a, &b| effective[a].total_cmp(&effective[b]));
    let mut weights = vec![0.0; confidence.len()];
    let mut cutoff = 0.0;
    for &i in order.iter().take(keep) {
        weights[i] = confidence[i];
        cutoff = effective[i];
    }
    (weights, cutoff)
}

fn trimmed_cost(effective: &[f64], weights: &[f64]) -> f64 {
    effective
        .iter()
        .zip(weights)
        .map(|(&r, &w)| w * r * r)
        .sum()
}

impl<const D: usize> TransformAggregator<D> for LtsAggregator<D> {
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
