//! Transform models produced by the aggregators.
//!
//! A [`TransformEstimate`] maps a source point `x` to `L x + t`. The three
//! variants only differ in how `L` is constrained: identity for
//! translations, a proper rotation for rigid transforms, and an unconstrained
//! matrix for affine ones.

use crate::types::{Correspondence, Point};
use nalgebra::SMatrix;
use serde::{Deserialize, Serialize};

/// Square `D x D` matrix.
pub type Linear<const D: usize> = SMatrix<f64, D, D>;

/// Model class a solver is asked to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelClass {
    Translation,
    Rigid,
    Affine,
}

impl ModelClass {
    /// Number of free parameters in dimension `dim`.
    pub fn degrees_of_freedom(self, dim: usize) -> usize {
        match self {
            ModelClass::Translation => dim,
            ModelClass::Rigid => dim + dim * (dim.saturating_sub(1)) / 2,
            ModelClass::Affine => dim * (dim + 1),
        }
    }

    /// Minimum number of affinely independent points needed in dimension `dim`.
    pub fn min_independent_points(self, dim: usize) -> usize {
        match self {
            ModelClass::Translation => 1,
            ModelClass::Rigid => dim.max(2),
            ModelClass::Affine => dim + 1,
        }
    }
}

/// A fitted global transform.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformEstimate<const D: usize> {
    Translation(Point<D>),
    Rigid {
        rotation: Linear<D>,
        translation: Point<D>,
    },
    Affine {
        linear: Linear<D>,
        translation: Point<D>,
    },
}

impl<const D: usize> TransformEstimate<D> {
    pub fn model_class(&self) -> ModelClass {
        match self {
            TransformEstimate::Translation(_) => ModelClass::Translation,
            TransformEstimate::Rigid { .. } => ModelClass::Rigid,
            TransformEstimate::Affine { .. } => ModelClass::Affine,
        }
    }

    /// Linear part; identity for pure translations.
    pub fn linear(&self) -> Linear<D> {
        match self {
            TransformEstimate::Translation(_) => Linear::<D>::identity(),
            TransformEstimate::Rigid { rotation, .. } => *rotation,
            TransformEstimate::Affine { linear, .. } => *linear,
        }
    }

    pub fn translation(&self) -> Point<D> {
        match self {
            TransformEstimate::Translation(t) => *t,
            TransformEstimate::Rigid { translation, .. } => *translation,
            TransformEstimate::Affine { translation, .. } => *translation,
        }
    }

    pub fn apply(&self, point: &Point<D>) -> Point<D> {
        match self {
            TransformEstimate::Translation(t) => point + t,
            TransformEstimate::Rigid {
                rotation,
                translation,
            } => rotation * point + translation,
            TransformEstimate::Affine {
                linear,
                translation,
            } => linear * point + translation,
        }
    }

    /// Euclidean distance between the mapped source and the target.
    pub fn residual(&self, correspondence: &Correspondence<D>) -> f64 {
        (correspondence.target - self.apply(&correspondence.source)).norm()
    }

    /// `sqrt(|dL|_F^2 + |dt|^2)` between two estimates of any class.
    pub fn parameter_distance(&self, other: &Self) -> f64 {
        let dl = (self.linear() - other.linear()).norm_squared();
        let dt = (self.translation() - other.translation()).norm_squared();
        (dl + dt).sqrt()
    }

    /// Same transform expressed as an affine estimate.
    pub fn to_affine(&self) -> Self {
        TransformEstimate::Affine {
            linear: self.linear(),
            translation: self.translation(),
        }
    }
}

impl TransformEstimate<2> {
    /// Rotation angle of the closest rotation to the linear part, in radians.
    pub fn rotation_angle(&self) -> f64 {
        let l = self.linear();
        (l[(1, 0)] - l[(0, 1)]).atan2(l[(0, 0)] + l[(1, 1)])
    }
}
