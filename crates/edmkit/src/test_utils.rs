//! Shared fixtures for unit tests.

use nalgebra::DMatrix;
use rand::prelude::*;

use crate::edm::{ObservationMask, PointSet, SquaredDistanceMatrix};

/// `n` equally spaced points on a line through `R^2`, with unit spacing.
///
/// With all pairs up to `reach` apart observed, the missing distances of a
/// chain are pinned by the triangle inequality, so trace maximisation
/// recovers them exactly.
pub(crate) fn chain_points(n: usize) -> PointSet {
    let dir = [0.6, 0.8];
    PointSet::new(DMatrix::from_fn(2, n, |r, c| dir[r] * c as f64 + 0.5 * r as f64))
}

/// Pairs `(i, j)` with `|i - j| <= reach` observed.
pub(crate) fn band_mask(n: usize, reach: usize) -> ObservationMask {
    ObservationMask::from_pairs(n, |i, j| j - i <= reach)
}

/// Random orthogonal matrix with determinant `+1` (Gram-Schmidt on a random
/// square matrix, last column flipped if needed).
pub(crate) fn random_rotation(dim: usize, seed: u64) -> DMatrix<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let a = DMatrix::from_fn(dim, dim, |_, _| rng.gen_range(-1.0..1.0));
    let mut q = a.qr().q();
    if q.determinant() < 0.0 {
        let mut last = q.column_mut(dim - 1);
        last *= -1.0;
    }
    q
}

/// Symmetric perturbation with zero diagonal; negative results are clamped
/// so the output is still a valid distance matrix.
pub(crate) fn perturb(d: &SquaredDistanceMatrix, sigma: f64, seed: u64) -> SquaredDistanceMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = d.len();
    let mut m = d.as_matrix().clone();
    for i in 0..n {
        for j in (i + 1)..n {
            let v = (m[(i, j)] + sigma * (rng.gen::<f64>() - 0.5)).max(0.0);
            m[(i, j)] = v;
            m[(j, i)] = v;
        }
    }
    SquaredDistanceMatrix::new(m).expect("perturbed matrix stays valid")
}
