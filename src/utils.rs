//! Small numerical helpers shared across the crate.

use nalgebra::{DMatrix, SMatrix, SymmetricEigen};

/// Median of `values`, reordering them in place. `None` for an empty slice.
pub fn median(values: &mut [f64]) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    values.sort_by(f64::total_cmp);
    if n % 2 == 1 {
        Some(values[n / 2])
    } else {
        Some(0.5 * (values[n / 2 - 1] + values[n / 2]))
    }
}

/// Copy a fixed-size matrix into a dynamic one for decompositions.
pub(crate) fn to_dynamic<const R: usize, const C: usize>(m: &SMatrix<f64, R, C>) -> DMatrix<f64> {
    DMatrix::from_iterator(R, C, m.iter().cloned())
}

pub(crate) fn to_static<const R: usize, const C: usize>(m: &DMatrix<f64>) -> SMatrix<f64, R, C> {
    SMatrix::<f64, R, C>::from_iterator(m.iter().cloned())
}

/// Eigen decomposition of a symmetric positive semi-definite matrix with the
/// numerical rank taken relative to the largest eigenvalue.
pub(crate) struct SpdDecomposition {
    eigen: SymmetricEigen<f64, nalgebra::Dyn>,
    pub rank: usize,
}

/// Eigenvalues below `RANK_TOLERANCE * largest` count as zero.
pub(crate) const RANK_TOLERANCE: f64 = 1e-10;

impl SpdDecomposition {
    pub fn new(m: DMatrix<f64>) -> Self {
        Self::with_floor(m, 0.0)
    }

    /// Like [`new`](Self::new), but eigenvalues not above `floor` also count
    /// as zero.
    pub fn with_floor(m: DMatrix<f64>, floor: f64) -> Self {
        let eigen = SymmetricEigen::new(m);
        let largest = eigen.eigenvalues.iter().cloned().fold(0.0_f64, f64::max);
        let cutoff = (RANK_TOLERANCE * largest).max(floor);
        let rank = if largest > 0.0 {
            eigen.eigenvalues.iter().filter(|&&l| l > cutoff).count()
        } else {
            0
        };
        Self { eigen, rank }
    }

    /// Inverse through the eigen basis. Only meaningful when full rank.
    pub fn inverse(&self) -> DMatrix<f64> {
        let inv_values = self.eigen.eigenvalues.map(|l| 1.0 / l);
        let q = &self.eigen.eigenvectors;
        q * DMatrix::from_diagonal(&inv_values) * q.transpose()
    }
}
