//! Core shared types: points, correspondences and the correspondence set.
//!
//! A [`CorrespondenceSet`] is the only input of every aggregator. Indices are
//! stable: the `i`-th pushed correspondence is always index `i`, which is what
//! lets the reweighting loop keep its per-pair weights in a plain vector
//! running in lock-step with the set.

use crate::error::{AggregationError, AggregationResult};
use nalgebra::SVector;

/// Point in `D`-dimensional space.
pub type Point<const D: usize> = SVector<f64, D>;

/// A source/target pair with its confidence weight.
///
/// `local_error` is an optional non-negative scalar (e.g. the matching cost of
/// the block that produced the pair). It is added to the squared residual
/// before the M-estimator sees it, so pairs that were already poor matches are
/// down-weighted sooner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence<const D: usize> {
    pub source: Point<D>,
    pub target: Point<D>,
    pub weight: f64,
    pub local_error: f64,
}

impl<const D: usize> Correspondence<D> {
    /// Pair with unit confidence.
    pub fn new(source: Point<D>, target: Point<D>) -> Self {
        Self::weighted(source, target, 1.0)
    }

    pub fn weighted(source: Point<D>, target: Point<D>, weight: f64) -> Self {
        Self {
            source,
            target,
            weight,
            local_error: 0.0,
        }
    }

    /// Pair described as a local displacement attached to an origin, the form
    /// block matchers usually produce.
    pub fn from_displacement(origin: Point<D>, displacement: Point<D>, weight: f64) -> Self {
        Self::weighted(origin, origin + displacement, weight)
    }

    pub fn with_local_error(mut self, local_error: f64) -> Self {
        self.local_error = local_error;
        self
    }

    /// Displacement `target - source`.
    pub fn displacement(&self) -> Point<D> {
        self.target - self.source
    }

    fn validate(&self, index: usize) -> AggregationResult<()> {
        let invalid = |reason: &str| AggregationError::InvalidCorrespondence {
            index,
            reason: reason.to_string(),
        };
        if self.source.iter().any(|v| !v.is_finite()) {
            return Err(invalid("source point has non-finite coordinates"));
        }
        if self.target.iter().any(|v| !v.is_finite()) {
            return Err(invalid("target point has non-finite coordinates"));
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(invalid("weight must be finite and non-negative"));
        }
        if !self.local_error.is_finite() || self.local_error < 0.0 {
            return Err(invalid("local error must be finite and non-negative"));
        }
        Ok(())
    }
}

/// Ordered collection of correspondences with stable indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrespondenceSet<const D: usize> {
    items: Vec<Correspondence<D>>,
}

impl<const D: usize> CorrespondenceSet<D> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    /// Validate and append a correspondence, returning its index.
    pub fn push(&mut self, correspondence: Correspondence<D>) -> AggregationResult<usize> {
        let index = self.items.len();
        correspondence.validate(index)?;
        self.items.push(correspondence);
        Ok(index)
    }

    /// Build a set from `(source, target)` pairs with unit weights.
    pub fn try_from_pairs<I>(pairs: I) -> AggregationResult<Self>
    where
        I: IntoIterator<Item = (Point<D>, Point<D>)>,
    {
        let mut set = Self::new();
        for (source, target) in pairs {
            set.push(Correspondence::new(source, target))?;
        }
        Ok(set)
    }

    /// Append every correspondence, stopping at the first invalid one.
    pub fn try_extend<I>(&mut self, items: I) -> AggregationResult<()>
    where
        I: IntoIterator<Item = Correspondence<D>>,
    {
        for c in items {
            self.push(c)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Correspondence<D>> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Correspondence<D>> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Correspondence<D>] {
        &self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Caller-supplied confidence weights, in index order.
    pub fn confidence_weights(&self) -> Vec<f64> {
        self.items.iter().map(|c| c.weight).collect()
    }

    /// Weighted centroid of the source points, `None` if the weights sum to zero.
    pub fn weighted_source_centroid(&self, weights: &[f64]) -> Option<Point<D>> {
        weighted_centroid(self.items.iter().map(|c| &c.source), weights)
    }

    pub fn weighted_target_centroid(&self, weights: &[f64]) -> Option<Point<D>> {
        weighted_centroid(self.items.iter().map(|c| &c.target), weights)
    }
}

impl<'a, const D: usize> IntoIterator for &'a CorrespondenceSet<D> {
    type Item = &'a Correspondence<D>;
    type IntoIter = std::slice::Iter<'a, Correspondence<D>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

fn weighted_centroid<'a, const D: usize>(
    points: impl Iterator<Item = &'a Point<D>>,
    weights: &[f64],
) -> Option<Point<D>> {
    let mut sum = Point::<D>::zeros();
    let mut total = 0.0;
    for (p, &w) in points.zip(weights) {
        sum += p * w;
        total += w;
    }
    if total > 0.0 {
        Some(sum / total)
    } else {
        None
    }
}
