//! Aggregation strategies implementing [`TransformAggregator`](crate::core::TransformAggregator).
//!
//! - [`MEstimateAggregator`]: iteratively reweighted least squares with a
//!   robust weighting function. The default choice.
//! - [`LeastSquaresAggregator`]: a single confidence-weighted solve, useful
//!   as a non-robust baseline.
//! - [`LtsAggregator`]: least trimmed squares, refitting on the best share of
//!   the correspondences.

pub mod least_squares;
pub mod lts;
pub mod mest;

pub use least_squares::LeastSquaresAggregator;
pub use lts::LtsAggregator;
pub use mest::MEstimateAggregator;

use crate::core::AggregationReport;
use crate::error::{AggregationError, AggregationResult};
use crate::estimators::Solution;
use crate::models::ModelClass;
use crate::settings::AggregatorSettings;
use crate::types::CorrespondenceSet;

/// Checks run at the start of every `update`: valid settings and at least
/// one pair with positive confidence.
fn prepare<const D: usize>(
    settings: &AggregatorSettings,
    set: &CorrespondenceSet<D>,
) -> AggregationResult<()> {
    settings.validate()?;
    if set.iter().all(|c| c.weight <= 0.0) {
        let model = settings.output_model;
        return Err(AggregationError::InsufficientData {
            model,
            required: model.min_independent_points(D),
            usable: 0,
        });
    }
    Ok(())
}

/// Model used for the first solve of an iterative aggregator.
fn initial_model(settings: &AggregatorSettings) -> ModelClass {
    if settings.warm_start && settings.output_model != ModelClass::Translation {
        ModelClass::Translation
    } else {
        settings.output_model
    }
}

/// Latest outputs of an aggregator; dropped wholesale on any mutation.
#[derive(Debug, Clone)]
pub(crate) struct Outputs<const D: usize> {
    pub(crate) solution: Solution<D>,
    pub(crate) report: AggregationReport,
}
