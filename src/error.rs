//! Error types for the aggregation crate.
//!
//! Every fallible operation returns [`AggregationResult`]. Non-convergence is
//! not an error: it is reported through
//! [`AggregationStatus`](crate::core::AggregationStatus) with the last estimate
//! still available.

use crate::models::ModelClass;
use thiserror::Error;

/// Result type used throughout the crate.
pub type AggregationResult<T> = Result<T, AggregationError>;

/// Fatal failures of an aggregation attempt.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregationError {
    /// Not enough usable (positive-weight, geometrically independent)
    /// correspondences for the requested model.
    #[error("insufficient data for {model:?} model: need {required} independent points, got {usable}")]
    InsufficientData {
        model: ModelClass,
        required: usize,
        usable: usize,
    },

    /// Robust reweighting drove every weight to zero.
    #[error("robust reweighting collapsed all weights (total weight {total_weight:e})")]
    DegenerateWeighting { total_weight: f64 },

    #[error("invalid setting `{field}`: {reason}")]
    InvalidSettings { field: &'static str, reason: String },

    #[error("invalid correspondence #{index}: {reason}")]
    InvalidCorrespondence { index: usize, reason: String },

    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: String, found: String },
}

impl AggregationError {
    pub(crate) fn invalid_settings(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSettings {
            field,
            reason: reason.into(),
        }
    }

    /// Whether the error stems from the data rather than the configuration.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData { .. } | Self::DegenerateWeighting { .. }
        )
    }
}
