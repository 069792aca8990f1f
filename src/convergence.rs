//! Stopping rules for the reweighting loop.

use crate::error::{AggregationError, AggregationResult};
use crate::settings::AggregatorSettings;

/// What the reweighting loop should do after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Continue,
    Converged,
    /// The cost rose in too many consecutive passes.
    Oscillating,
}

/// Convergence and rejection checks, configured from [`AggregatorSettings`].
///
/// One policy serves one aggregation run. It remembers the cost reached by
/// the previous pass and counts consecutive passes that ended above it.
#[derive(Debug, Clone)]
pub struct ConvergencePolicy {
    stopping_threshold: f64,
    cost_tolerance: f64,
    max_cost_increases: usize,
    degenerate_weight_ratio: f64,
    consecutive_increases: usize,
    previous_cost: Option<f64>,
}

impl ConvergencePolicy {
    pub fn new(settings: &AggregatorSettings) -> Self {
        Self {
            stopping_threshold: settings.stopping_threshold,
            cost_tolerance: settings.cost_tolerance,
            max_cost_increases: settings.max_cost_increases,
            degenerate_weight_ratio: settings.degenerate_weight_ratio,
            consecutive_increases: 0,
            previous_cost: None,
        }
    }

    pub fn consecutive_increases(&self) -> usize {
        self.consecutive_increases
    }

    /// Whether `cost_after` exceeds `cost_before` by more than the numerical
    /// slack `cost_tolerance * max(|cost_before|, 1)`.
    pub fn cost_increased(&self, cost_before: f64, cost_after: f64) -> bool {
        let slack = self.cost_tolerance * cost_before.abs().max(1.0);
        cost_after > cost_before + slack
    }

    /// Decide after one pass.
    ///
    /// `cost_after` is compared with the `cost_after` of the previous pass;
    /// the first pass is compared with its own `cost_before`. `normaliser`
    /// turns `cost_after` into a mean cost for the "cost below tolerance"
    /// test.
    pub fn evaluate(
        &mut self,
        parameter_change: f64,
        cost_before: f64,
        cost_after: f64,
        normaliser: f64,
    ) -> PolicyDecision {
        let reference = self.previous_cost.replace(cost_after).unwrap_or(cost_before);
        let increased = self.cost_increased(reference, cost_after);
        if increased {
            self.consecutive_increases += 1;
            if self.consecutive_increases >= self.max_cost_increases {
                return PolicyDecision::Oscillating;
            }
        } else {
            self.consecutive_increases = 0;
        }

        let mean_cost = if normaliser > 0.0 {
            cost_after / normaliser
        } else {
            f64::INFINITY
        };
        if (!increased && parameter_change < self.stopping_threshold)
            || mean_cost <= self.cost_tolerance
        {
            PolicyDecision::Converged
        } else {
            PolicyDecision::Continue
        }
    }

    /// Fail with `DegenerateWeighting` when the working weights have
    /// collapsed relative to the confidence weights.
    pub fn check_weights(&self, working: &[f64], total_confidence: f64) -> AggregationResult<()> {
        let total_weight: f64 = working.iter().sum();
        if !(total_weight > self.degenerate_weight_ratio * total_confidence) {
            return Err(AggregationError::DegenerateWeighting { total_weight });
        }
        Ok(())
    }
}

/// Indices whose working weight fell below `ratio` times their confidence
/// weight. Pairs with zero confidence are never reported.
pub fn outliers(weights: &[f64], confidence: &[f64], ratio: f64) -> Vec<usize> {
    weights
        .iter()
        .zip(confidence)
        .enumerate()
        .filter(|&(_, (&w, &w0))| w0 > 0.0 && w < ratio * w0)
        .map(|(i, _)| i)
        .collect()
}
