//! Residuals, robust weighting functions and the robust cost.
//!
//! Each weighting function is expressed on the normalised squared residual
//! `u = (r^2 + e) / s^2`, where `r` is the geometric residual, `e` the pair's
//! local error and `s` the robust scale. A function provides a concave loss
//! `phi(u)` and the IRLS weight `phi'(u)`, normalised so that `phi'(0) = 1`.
//! Concavity is what makes a reweighted least-squares step never increase
//! the robust cost at a fixed scale.
//!
//! The robust cost is `sum w0 * s^2 * phi(u)`, in squared residual units.
//! For a concave `phi` with `phi(0) = 0` each term is non-decreasing in `s`,
//! so a pass that lowers the scale can only lower the cost as well.

use crate::models::TransformEstimate;
use crate::types::CorrespondenceSet;
use crate::utils::median;
use serde::{Deserialize, Serialize};

/// M-estimator weighting function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobustWeighting {
    /// `phi = ln(1 + u)`, `w = 1 / (1 + u)`.
    #[default]
    Cauchy,
    /// `phi = u / (1 + u)`, `w = 1 / (1 + u)^2`.
    GemanMcClure,
    /// Quadratic up to `u = 1`, linear in `r` beyond.
    Huber,
    /// Tukey biweight; pairs beyond `u = 1` get zero weight.
    Tukey,
    /// `phi = 1 - exp(-u)`, `w = exp(-u)`.
    Welsch,
}

impl RobustWeighting {
    /// Loss `phi(u)` for a normalised squared residual.
    pub fn loss(self, u: f64) -> f64 {
        match self {
            RobustWeighting::Cauchy => u.ln_1p(),
            RobustWeighting::GemanMcClure => u / (1.0 + u),
            RobustWeighting::Huber => {
                if u <= 1.0 {
                    u
                } else {
                    2.0 * u.sqrt() - 1.0
                }
            }
            RobustWeighting::Tukey => {
                if u <= 1.0 {
                    (1.0 - (1.0 - u).powi(3)) / 3.0
                } else {
                    1.0 / 3.0
                }
            }
            RobustWeighting::Welsch => -(-u).exp_m1(),
        }
    }

    /// IRLS weight `phi'(u)`, in `[0, 1]` and non-increasing in `u`.
    pub fn weight(self, u: f64) -> f64 {
        match self {
            RobustWeighting::Cauchy => 1.0 / (1.0 + u),
            RobustWeighting::GemanMcClure => {
                let d = 1.0 + u;
                1.0 / (d * d)
            }
            RobustWeighting::Huber => {
                if u <= 1.0 {
                    1.0
                } else {
                    1.0 / u.sqrt()
                }
            }
            RobustWeighting::Tukey => {
                if u <= 1.0 {
                    let d = 1.0 - u;
                    d * d
                } else {
                    0.0
                }
            }
            RobustWeighting::Welsch => (-u).exp(),
        }
    }
}

/// Estimator of the typical residual magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleEstimator {
    /// Median of the residuals of pairs with positive confidence.
    #[default]
    MedianResidual,
    /// Confidence-weighted mean residual.
    WeightedMeanResidual,
}

impl ScaleEstimator {
    /// Raw scale of `residuals` (already including local errors), `0.0` when
    /// no pair has positive confidence.
    pub fn estimate(self, residuals: &[f64], confidence: &[f64]) -> f64 {
        match self {
            ScaleEstimator::MedianResidual => {
                let mut kept: Vec<f64> = residuals
                    .iter()
                    .zip(confidence)
                    .filter(|&(_, &w)| w > 0.0)
                    .map(|(&r, _)| r)
                    .collect();
                median(&mut kept).unwrap_or(0.0)
            }
            ScaleEstimator::WeightedMeanResidual => {
                let (num, den) = residuals
                    .iter()
                    .zip(confidence)
                    .fold((0.0, 0.0), |(n, d), (&r, &w)| (n + w * r, d + w));
                if den > 0.0 {
                    num / den
                } else {
                    0.0
                }
            }
        }
    }
}

/// Geometric residuals `|y_i - T(x_i)|` in index order.
pub fn residuals<const D: usize>(
    set: &CorrespondenceSet<D>,
    estimate: &TransformEstimate<D>,
) -> Vec<f64> {
    set.iter().map(|c| estimate.residual(c)).collect()
}

/// Residual magnitudes with each pair's local error folded in:
/// `sqrt(r^2 + e)`.
pub fn effective_residuals<const D: usize>(
    set: &CorrespondenceSet<D>,
    residuals: &[f64],
) -> Vec<f64> {
    set.iter()
        .zip(residuals)
        .map(|(c, &r)| (r * r + c.local_error).sqrt())
        .collect()
}

/// Robust scale used to normalise residuals: the raw scale multiplied by the
/// M-estimate factor and floored at `min_scale`.
pub fn robust_scale(
    estimator: ScaleEstimator,
    effective: &[f64],
    confidence: &[f64],
    m_estimate_factor: f64,
    min_scale: f64,
) -> f64 {
    (m_estimate_factor * estimator.estimate(effective, confidence)).max(min_scale)
}

/// `sum_i w0_i * s^2 * phi(u_i)`. Reduces to the weighted sum of squared
/// residuals for small residuals.
pub fn robust_cost(
    weighting: RobustWeighting,
    effective: &[f64],
    confidence: &[f64],
    scale: f64,
) -> f64 {
    let s2 = scale * scale;
    effective
        .iter()
        .zip(confidence)
        .map(|(&r, &w0)| w0 * s2 * weighting.loss(r * r / s2))
        .sum()
}

/// New working weights `w0_i * phi'(u_i)`.
pub fn reweight(
    weighting: RobustWeighting,
    effective: &[f64],
    confidence: &[f64],
    scale: f64,
) -> Vec<f64> {
    let s2 = scale * scale;
    effective
        .iter()
        .zip(confidence)
        .map(|(&r, &w0)| w0 * weighting.weight(r * r / s2))
        .collect()
}
