//! Synthetic correspondence generation for tests, demos and benchmarks.
//!
//! All generators take the random number generator explicitly so results are
//! reproducible with a seeded `StdRng`.

use crate::error::AggregationResult;
use crate::models::TransformEstimate;
use crate::types::{CorrespondenceSet, Point};
use nalgebra::{Rotation2, Vector2};
use rand::Rng;

/// `n` points drawn uniformly from the cube `[-half_extent, half_extent]^D`.
pub fn random_points<const D: usize, R: Rng + ?Sized>(
    rng: &mut R,
    n: usize,
    half_extent: f64,
) -> Vec<Point<D>> {
    (0..n)
        .map(|_| Point::<D>::from_fn(|_, _| rng.random_range(-half_extent..=half_extent)))
        .collect()
}

/// Image of every point under `transform`.
pub fn apply_transform<const D: usize>(
    transform: &TransformEstimate<D>,
    points: &[Point<D>],
) -> Vec<Point<D>> {
    points.iter().map(|p| transform.apply(p)).collect()
}

/// Perturb every coordinate by uniform noise in `[-amplitude, amplitude]`.
pub fn add_noise<const D: usize, R: Rng + ?Sized>(
    rng: &mut R,
    points: &mut [Point<D>],
    amplitude: f64,
) {
    if amplitude <= 0.0 {
        return;
    }
    for p in points.iter_mut() {
        for v in p.iter_mut() {
            *v += rng.random_range(-amplitude..=amplitude);
        }
    }
}

/// Replace `count` targets, chosen without repetition, by unrelated points
/// drawn from `[-half_extent, half_extent]^D`. Returns the corrupted indices
/// in increasing order.
pub fn corrupt_targets<const D: usize, R: Rng + ?Sized>(
    rng: &mut R,
    targets: &mut [Point<D>],
    count: usize,
    half_extent: f64,
) -> Vec<usize> {
    let amount = count.min(targets.len());
    let mut indices = rand::seq::index::sample(rng, targets.len(), amount).into_vec();
    indices.sort_unstable();
    for &i in &indices {
        targets[i] = Point::<D>::from_fn(|_, _| rng.random_range(-half_extent..=half_extent));
    }
    indices
}

/// Planar rotation by `angle` radians followed by `translation`.
pub fn rigid_2d(angle: f64, translation: Vector2<f64>) -> TransformEstimate<2> {
    TransformEstimate::Rigid {
        rotation: *Rotation2::new(angle).matrix(),
        translation,
    }
}

/// Unit-weight correspondence set pairing `sources[i]` with `targets[i]`.
pub fn correspondences<const D: usize>(
    sources: &[Point<D>],
    targets: &[Point<D>],
) -> AggregationResult<CorrespondenceSet<D>> {
    CorrespondenceSet::try_from_pairs(sources.iter().copied().zip(targets.iter().copied()))
}
