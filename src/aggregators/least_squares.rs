//! Non-robust baseline: one confidence-weighted least-squares solve.

use super::{prepare, Outputs};
use crate::core::{AggregationReport, AggregationStatus, TransformAggregator};
use crate::error::AggregationResult;
use crate::estimators;
use crate::models::TransformEstimate;
use crate::settings::AggregatorSettings;
use crate::types::{Correspondence, CorrespondenceSet, Point};
use log::debug;

/// Weighted least-squares aggregator.
///
/// Only `output_model` is read from the settings; every pair keeps its
/// confidence weight, so outliers pull the estimate freely.
#[derive(Debug, Clone, Default)]
pub struct LeastSquaresAggregator<const D: usize> {
    settings: AggregatorSettings,
    correspondences: CorrespondenceSet<D>,
    outputs: Option<Outputs<D>>,
}

impl<const D: usize> LeastSquaresAggregator<D> {
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
}

impl<const D: usize> TransformAggregator<D> for LeastSquaresAggregator<D> {
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
        prepare(&self.settings, &self.correspondences)?;

        let confidence = self.correspondences.confidence_weights();
        let solution =
            estimators::solve(&self.correspondences, &confidence, self.settings.output_model)?;
        debug!(
            "LeastSquaresAggregator: {:?} fit over total weight {}",
            self.settings.output_model, solution.total_weight
        );

        let report = AggregationReport {
            status: AggregationStatus::Converged,
            iterations: 0,
            final_weights: confidence.clone(),
            confidence_weights: confidence,
            history: Vec::new(),
        };
        self.outputs = Some(Outputs {
            solution,
            report: report.clone(),
        });
        Ok(report)
    }

    fn estimate(&self) -> Option<&TransformEstimate<D>> {
        self.outputs.as_ref().map(|o| &o.solution.estimate)
    }

    fn estimation_barycenter(&self) -> Option<Point<D>> {
        self.outputs.as_ref().map(|o| o.solution.source_barycenter)
    }
}
