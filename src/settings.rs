//! Aggregation configuration.
//!
//! Every field has a default, and the struct deserializes from partial
//! documents (`#[serde(default)]`), so a config file only needs to name what
//! it changes.

use crate::error::{AggregationError, AggregationResult};
use crate::models::ModelClass;
use crate::scoring::{RobustWeighting, ScaleEstimator};
use serde::{Deserialize, Serialize};

/// Settings shared by all aggregators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorSettings {
    /// Model class of the final estimate.
    pub output_model: ModelClass,
    /// Multiplies the robust residual scale. Smaller values reject outliers
    /// more aggressively.
    pub m_estimate_factor: f64,
    /// Parameter-change tolerance below which iterations stop.
    pub stopping_threshold: f64,
    /// Hard cap on reweighting iterations.
    pub max_iterations: usize,
    pub weighting: RobustWeighting,
    pub scale_estimator: ScaleEstimator,
    /// Floor for the robust residual scale, in point units.
    pub min_scale: f64,
    /// Relative slack when checking that the robust cost does not increase,
    /// and absolute bound on the mean robust cost for early convergence.
    pub cost_tolerance: f64,
    /// Consecutive cost increases tolerated before giving up.
    pub max_cost_increases: usize,
    /// Fit a translation first and use it to seed the output model.
    pub warm_start: bool,
    /// Never let the robust scale grow from one pass to the next. This keeps
    /// the robust cost non-increasing over the whole run. When off, the scale
    /// follows the residuals and a growing scale can raise the cost, which
    /// the `max_cost_increases` guard then bounds.
    pub anneal_scale: bool,
    /// Total working weight below this fraction of the total confidence is
    /// treated as a collapse of the weighting.
    pub degenerate_weight_ratio: f64,
    /// Share of correspondences kept per iteration by the trimmed aggregator.
    pub lts_keep_fraction: f64,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            output_model: ModelClass::Affine,
            m_estimate_factor: 1.0,
            stopping_threshold: f64::EPSILON.sqrt(),
            max_iterations: 50,
            weighting: RobustWeighting::Cauchy,
            scale_estimator: ScaleEstimator::MedianResidual,
            min_scale: 1e-6,
            cost_tolerance: 1e-9,
            max_cost_increases: 3,
            warm_start: true,
            anneal_scale: true,
            degenerate_weight_ratio: 1e-12,
            lts_keep_fraction: 0.5,
        }
    }
}

impl AggregatorSettings {
    pub fn with_output_model(mut self, model: ModelClass) -> Self {
        self.output_model = model;
        self
    }

    pub fn with_m_estimate_factor(mut self, factor: f64) -> Self {
        self.m_estimate_factor = factor;
        self
    }

    pub fn with_stopping_threshold(mut self, threshold: f64) -> Self {
        self.stopping_threshold = threshold;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_weighting(mut self, weighting: RobustWeighting) -> Self {
        self.weighting = weighting;
        self
    }

    pub fn with_scale_estimator(mut self, estimator: ScaleEstimator) -> Self {
        self.scale_estimator = estimator;
        self
    }

    pub fn with_warm_start(mut self, warm_start: bool) -> Self {
        self.warm_start = warm_start;
        self
    }

    pub fn with_anneal_scale(mut self, anneal_scale: bool) -> Self {
        self.anneal_scale = anneal_scale;
        self
    }

    pub fn with_max_cost_increases(mut self, max_cost_increases: usize) -> Self {
        self.max_cost_increases = max_cost_increases;
        self
    }

    /// Check the fields shared by every aggregator against their admissible
    /// ranges. `lts_keep_fraction` is checked by the trimmed aggregator.
    pub fn validate(&self) -> AggregationResult<()> {
        fn positive(field: &'static str, value: f64) -> AggregationResult<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(AggregationError::invalid_settings(
                    field,
                    format!("must be finite and > 0, got {value}"),
                ))
            }
        }

        positive("m_estimate_factor", self.m_estimate_factor)?;
        positive("stopping_threshold", self.stopping_threshold)?;
        positive("min_scale", self.min_scale)?;
        positive("cost_tolerance", self.cost_tolerance)?;
        if self.max_iterations == 0 {
            return Err(AggregationError::invalid_settings(
                "max_iterations",
                "must be at least 1",
            ));
        }
        if self.max_cost_increases == 0 {
            return Err(AggregationError::invalid_settings(
                "max_cost_increases",
                "must be at least 1",
            ));
        }
        if !(0.0..1.0).contains(&self.degenerate_weight_ratio) {
            return Err(AggregationError::invalid_settings(
                "degenerate_weight_ratio",
                format!("must lie in [0, 1), got {}", self.degenerate_weight_ratio),
            ));
        }
        Ok(())
    }
}
