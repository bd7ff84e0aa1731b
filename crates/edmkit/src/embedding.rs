//! Classical multidimensional scaling.
//!
//! Coordinates are read off the leading eigenpairs of a centred Gram matrix:
//! `X = diag(√λ₁..√λ_dim) · [v₁ .. v_dim]ᵀ`. The result is defined only up to
//! an orthogonal transform and a translation.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::edm::{gram_from_edm, PointSet, SquaredDistanceMatrix};
use crate::error::{invalid_argument, EdmError, Result};
use crate::spectral::{SpectralBackend, SpectralDecomposition};

/// Handling of negative eigenvalues among the retained components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Replace negative eigenvalues by zero (with a warning) instead of failing.
    pub clamp_negative_eigenvalues: bool,
    /// Negatives no larger than `negative_tolerance * max |value|` count as
    /// rounding noise and are zeroed without a warning.
    pub negative_tolerance: f64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            clamp_negative_eigenvalues: false,
            negative_tolerance: 1e-9,
        }
    }
}

/// Embed from a cached eigendecomposition of a centred Gram matrix.
pub fn embed_from_decomposition(
    decomposition: &SpectralDecomposition,
    dim: usize,
    config: &EmbeddingConfig,
) -> Result<PointSet> {
    if dim == 0 || dim > decomposition.len() {
        return Err(invalid_argument(
            "dim",
            format!(
                "must be in 1..={} for a decomposition with {} components, got {}",
                decomposition.len(),
                decomposition.len(),
                dim
            ),
        ));
    }

    let values = decomposition.values();
    let largest = values.amax();
    let noise_floor = config.negative_tolerance.max(0.0) * largest;

    let mut scales = Vec::with_capacity(dim);
    for (index, &eigenvalue) in values.iter().take(dim).enumerate() {
        if eigenvalue >= 0.0 {
            scales.push(eigenvalue.sqrt());
            continue;
        }
        if -eigenvalue > noise_floor {
            if !config.clamp_negative_eigenvalues {
                return Err(EdmError::Embedding { index, eigenvalue });
            }
            tracing::warn!(
                "clamping negative eigenvalue #{} ({:.3e}) to zero; the input is not a {}-dimensional EDM",
                index,
                eigenvalue,
                dim
            );
        }
        scales.push(0.0);
    }

    let vectors = decomposition.right();
    let n = vectors.nrows();
    let coords = DMatrix::from_fn(dim, n, |k, j| scales[k] * vectors[(j, k)]);
    Ok(PointSet::new(coords))
}

/// Embed a full squared-distance matrix: double centering, eigendecomposition,
/// then [`embed_from_decomposition`].
///
/// Distances are divided by their largest entry before decomposing and the
/// coordinates scaled back by its square root, so inputs close to the float
/// limit stay finite. Reported eigenvalues are in the caller's units.
pub fn embed_edm(
    d: &SquaredDistanceMatrix,
    dim: usize,
    config: &EmbeddingConfig,
    spectral: &dyn SpectralBackend,
) -> Result<PointSet> {
    let scale = d.as_matrix().amax();
    let scale = if scale > 0.0 { scale } else { 1.0 };
    let gram = gram_from_edm(&(d.as_matrix() / scale));
    let decomposition = spectral.symmetric_eigen(&gram)?;
    tracing::debug!(
        "embedding {} points into {} dimensions, leading eigenvalues {:?} (scale {:.3e})",
        d.len(),
        dim,
        decomposition.values().iter().take(dim + 1).collect::<Vec<_>>(),
        scale
    );
    let unit = embed_from_decomposition(&decomposition, dim, config).map_err(|e| match e {
        EdmError::Embedding { index, eigenvalue } => EdmError::Embedding {
            index,
            eigenvalue: eigenvalue * scale,
        },
        other => other,
    })?;
    Ok(PointSet::new(unit.into_inner() * scale.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edm::RigidTransform;
    use crate::spectral::NalgebraSpectral;
    use crate::synth::random_points;
    use crate::test_utils::random_rotation;
    use approx::assert_relative_eq;

    #[test]
    fn embedding_preserves_distances() {
        let pts = random_points(3, 9, 5);
        let d = pts.squared_distances();
        let x = embed_edm(&d, 3, &EmbeddingConfig::default(), &NalgebraSpectral::default())
            .expect("valid EDM");
        assert_eq!((x.dim(), x.len()), (3, 9));
        assert_relative_eq!(
            x.squared_distances().as_matrix(),
            d.as_matrix(),
            epsilon = 1e-9,
            max_relative = 1e-9
        );
    }

    #[test]
    fn embedding_is_centred() {
        let pts = random_points(2, 6, 17);
        let x = embed_edm(
            &pts.squared_distances(),
            2,
            &EmbeddingConfig::default(),
            &NalgebraSpectral::default(),
        )
        .expect("valid EDM");
        assert!(x.centroid().norm() < 1e-10);
    }

    #[test]
    fn rigid_motion_does_not_change_the_embedding_distances() {
        let pts = random_points(2, 7, 23);
        let moved = RigidTransform {
            rotation: random_rotation(2, 4),
            translation: nalgebra::DVector::from_vec(vec![3.0, -1.5]),
        }
        .apply(&pts)
        .expect("same dimension");
        let cfg = EmbeddingConfig::default();
        let spectral = NalgebraSpectral::default();
        let a = embed_edm(&pts.squared_distances(), 2, &cfg, &spectral).expect("valid");
        let b = embed_edm(&moved.squared_distances(), 2, &cfg, &spectral).expect("valid");
        assert_relative_eq!(
            a.squared_distances().as_matrix(),
            b.squared_distances().as_matrix(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn distances_near_the_float_limit_embed_finitely() {
        // Points 0, L/2, L on a line with L² = 1e308.
        let d = SquaredDistanceMatrix::new(DMatrix::from_row_slice(
            3,
            3,
            &[0.0, 0.25e308, 1e308, 0.25e308, 0.0, 0.25e308, 1e308, 0.25e308, 0.0],
        ))
        .expect("structurally valid");
        let x = embed_edm(&d, 1, &EmbeddingConfig::default(), &NalgebraSpectral::default())
            .expect("valid EDM");
        assert!(x.coords().iter().all(|v| v.is_finite()));
        let span = (x.coords()[(0, 0)] - x.coords()[(0, 2)]).abs();
        assert_relative_eq!(span, 1e154, max_relative = 1e-9);
    }

    fn non_euclidean() -> SquaredDistanceMatrix {
        // Violates the triangle inequality: d(0,2) = 10 > d(0,1) + d(1,2) = 2.
        SquaredDistanceMatrix::new(DMatrix::from_row_slice(
            3,
            3,
            &[0.0, 1.0, 100.0, 1.0, 0.0, 1.0, 100.0, 1.0, 0.0],
        ))
        .expect("structurally valid")
    }

    #[test]
    fn negative_eigenvalue_fails_by_default() {
        let err = embed_edm(
            &non_euclidean(),
            3,
            &EmbeddingConfig::default(),
            &NalgebraSpectral::default(),
        )
        .unwrap_err();
        match err {
            EdmError::Embedding { index, eigenvalue } => {
                assert_eq!(index, 2);
                assert_relative_eq!(eigenvalue, -16.0, epsilon = 1e-9);
                assert!(eigenvalue < 0.0);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn negative_eigenvalue_is_clamped_on_request() {
        let cfg = EmbeddingConfig {
            clamp_negative_eigenvalues: true,
            ..EmbeddingConfig::default()
        };
        let x = embed_edm(&non_euclidean(), 3, &cfg, &NalgebraSpectral::default())
            .expect("clamped");
        assert!(x.coords().row(2).iter().all(|v| *v == 0.0));
        assert!(x.coords().row(0).norm() > 0.0);
    }

    #[test]
    fn dimension_out_of_range_is_rejected() {
        let d = random_points(2, 4, 1).squared_distances();
        let cfg = EmbeddingConfig::default();
        let spectral = NalgebraSpectral::default();
        assert!(matches!(
            embed_edm(&d, 0, &cfg, &spectral),
            Err(EdmError::InvalidArgument { arg: "dim", .. })
        ));
        assert!(embed_edm(&d, 5, &cfg, &spectral).is_err());
        assert!(embed_edm(&d, 4, &cfg, &spectral).is_ok());
    }
}
