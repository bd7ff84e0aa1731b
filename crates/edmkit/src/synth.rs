//! Seeded synthetic configurations and observation masks.

use nalgebra::DMatrix;
use rand::prelude::*;

use crate::edm::{ObservationMask, PointSet};
use crate::error::{invalid_argument, Result};

/// `n` points drawn uniformly from the unit cube `[0, 1)^dim`.
pub fn random_points(dim: usize, n: usize, seed: u64) -> PointSet {
    let mut rng = StdRng::seed_from_u64(seed);
    PointSet::new(DMatrix::from_fn(dim, n, |_, _| rng.gen::<f64>()))
}

/// Symmetric mask hiding exactly `round(missing_fraction · n(n−1)/2)`
/// off-diagonal pairs, chosen uniformly at random. The diagonal stays observed.
pub fn random_mask(n: usize, missing_fraction: f64, seed: u64) -> Result<ObservationMask> {
    if !(0.0..=1.0).contains(&missing_fraction) {
        return Err(invalid_argument(
            "missing_fraction",
            format!("must lie in [0, 1], got {}", missing_fraction),
        ));
    }
    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .collect();
    let hidden = (missing_fraction * pairs.len() as f64).round() as usize;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut mask = DMatrix::from_element(n, n, true);
    for idx in sample_indices(&mut rng, pairs.len(), hidden) {
        let (i, j) = pairs[idx];
        mask[(i, j)] = false;
        mask[(j, i)] = false;
    }
    ObservationMask::new(mask)
}

/// `k` distinct indices from `0..n` by a partial Fisher–Yates shuffle.
fn sample_indices(rng: &mut impl Rng, n: usize, k: usize) -> Vec<usize> {
    let k = k.min(n);
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}
