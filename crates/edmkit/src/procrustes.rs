//! Orthogonal Procrustes alignment (Kabsch).
//!
//! Finds `(R, t)` minimising `Σ_j ‖R x_j + t − y_j‖²` over orthogonal `R`:
//! with centred sets `Xc`, `Yc` and `Xc Ycᵀ = U Σ Vᵀ`, `R = V Uᵀ` and
//! `t = m_Y − R m_X`. `R` may be a reflection unless
//! [`ProcrustesConfig::allow_reflection`] is off, in which case the direction
//! of the smallest singular value is flipped to force `det(R) = +1`.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::edm::{PointSet, RigidTransform};
use crate::error::{invalid_argument, EdmError, Result};
use crate::spectral::SpectralBackend;

/// Alignment options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcrustesConfig {
    /// Accept `det(R) = −1` solutions.
    pub allow_reflection: bool,
}

impl Default for ProcrustesConfig {
    fn default() -> Self {
        Self {
            allow_reflection: true,
        }
    }
}

/// Optimal transform together with the aligned source and its residual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    /// `(R, t)` mapping source onto target.
    pub transform: RigidTransform,
    /// `R X + t`.
    pub aligned: PointSet,
    /// `‖R X + t − Y‖²_F`.
    pub residual: f64,
}

/// Align `source` onto `target`; both must have the same `dim × n` shape
/// with `dim >= 1`.
pub fn align(
    source: &PointSet,
    target: &PointSet,
    config: &ProcrustesConfig,
    spectral: &dyn SpectralBackend,
) -> Result<Alignment> {
    if source.coords().shape() != target.coords().shape() {
        return Err(EdmError::DimensionMismatch {
            expected: target.coords().shape(),
            got: source.coords().shape(),
        });
    }
    let dim = source.dim();
    if dim == 0 {
        return Err(invalid_argument("dim", "point sets must have at least one coordinate"));
    }

    let cross = source.centered() * target.centered().transpose();
    let svd = spectral.svd(&cross)?;
    let u = svd.left();
    let mut v: DMatrix<f64> = svd.right().clone();
    let mut rotation = &v * u.transpose();

    if !config.allow_reflection && rotation.determinant() < 0.0 {
        let mut last = v.column_mut(dim - 1);
        last *= -1.0;
        rotation = &v * u.transpose();
        tracing::debug!("Procrustes: flipped weakest direction to avoid a reflection");
    }

    let translation = target.centroid() - &rotation * source.centroid();
    let transform = RigidTransform {
        rotation,
        translation,
    };
    let aligned = transform.apply(source)?;
    let residual = aligned.squared_residual(target)?;

    Ok(Alignment {
        transform,
        aligned,
        residual,
    })
}
