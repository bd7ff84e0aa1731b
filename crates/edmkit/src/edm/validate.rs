//! Shape, symmetry and diagonal checks for distance matrices and masks.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Tolerances for [`validate_edm`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Allowed `|D_ij - D_ji|`, relative to `max(1, max |D_ij|)`.
    pub symmetry_tolerance: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            symmetry_tolerance: 1e-9,
        }
    }
}

/// Check that `d` is square, finite, symmetric within tolerance,
/// non-negative and has an exactly zero diagonal.
pub fn validate_edm(d: &DMatrix<f64>, config: &ValidationConfig) -> Result<(), ValidationError> {
    check_square(d.nrows(), d.ncols())?;
    let n = d.nrows();

    let mut scale = 1.0f64;
    for row in 0..n {
        for col in 0..n {
            let v = d[(row, col)];
            if !v.is_finite() {
                return Err(ValidationError::NonFinite { row, col });
            }
            scale = scale.max(v.abs());
        }
    }
    let tol = config.symmetry_tolerance.max(0.0) * scale;

    for i in 0..n {
        let v = d[(i, i)];
        if v != 0.0 {
            return Err(ValidationError::NonZeroDiagonal { index: i, value: v });
        }
    }

    for row in 0..n {
        for col in (row + 1)..n {
            let deviation = (d[(row, col)] - d[(col, row)]).abs();
            if deviation > tol {
                return Err(ValidationError::Asymmetric {
                    row,
                    col,
                    deviation,
                });
            }
        }
    }

    for row in 0..n {
        for col in 0..n {
            let value = d[(row, col)];
            if value < 0.0 {
                return Err(ValidationError::NegativeEntry { row, col, value });
            }
        }
    }

    Ok(())
}

/// Check that `mask` is square, symmetric and fully observed on the diagonal.
pub fn validate_mask(mask: &DMatrix<bool>) -> Result<(), ValidationError> {
    check_square(mask.nrows(), mask.ncols())?;
    let n = mask.nrows();

    for i in 0..n {
        if !mask[(i, i)] {
            return Err(ValidationError::MaskDiagonalUnobserved { index: i });
        }
    }
    for row in 0..n {
        for col in (row + 1)..n {
            if mask[(row, col)] != mask[(col, row)] {
                return Err(ValidationError::MaskAsymmetric { row, col });
            }
        }
    }
    Ok(())
}

/// Validate a distance matrix together with its observation mask.
pub fn validate_pair(
    d: &DMatrix<f64>,
    mask: &DMatrix<bool>,
    config: &ValidationConfig,
) -> Result<(), ValidationError> {
    validate_edm(d, config)?;
    if mask.shape() != d.shape() {
        return Err(ValidationError::MaskShape {
            expected: d.shape(),
            got: mask.shape(),
        });
    }
    validate_mask(mask)
}

fn check_square(rows: usize, cols: usize) -> Result<(), ValidationError> {
    if rows == 0 {
        return Err(ValidationError::Empty);
    }
    if rows != cols {
        return Err(ValidationError::NotSquare { rows, cols });
    }
    Ok(())
}
