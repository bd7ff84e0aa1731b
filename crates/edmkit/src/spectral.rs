//! Eigen/singular value decompositions with a fixed descending order.
//!
//! Every rank truncation downstream (embedding, denoising) takes the leading
//! entries of [`SpectralDecomposition::values`], so the order is part of the
//! contract: values are sorted descending with a stable sort, ties keeping the
//! order produced by the underlying dense solver.

use nalgebra::linalg::SymmetricEigen;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{EdmError, Result};

/// `M ≈ left · diag(values) · rightᵀ` with `values` sorted descending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralDecomposition {
    values: DVector<f64>,
    left: DMatrix<f64>,
    right: DMatrix<f64>,
}

impl SpectralDecomposition {
    /// Sort `values` descending and permute the vector columns alongside.
    pub fn new(values: DVector<f64>, left: DMatrix<f64>, right: DMatrix<f64>) -> Result<Self> {
        let k = values.len();
        if left.ncols() != k || right.ncols() != k {
            // Column counts of (left, right) against the number of values.
            return Err(EdmError::DimensionMismatch {
                expected: (k, k),
                got: (left.ncols(), right.ncols()),
            });
        }
        let order = descending_order(values.as_slice());
        Ok(Self {
            values: DVector::from_fn(k, |i, _| values[order[i]]),
            left: left.select_columns(order.iter()),
            right: right.select_columns(order.iter()),
        })
    }

    /// Number of retained components.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no components are retained.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Eigen/singular values, descending.
    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }

    /// Left vectors, one per column.
    pub fn left(&self) -> &DMatrix<f64> {
        &self.left
    }

    /// Right vectors, one per column.
    pub fn right(&self) -> &DMatrix<f64> {
        &self.right
    }

    /// Size of the decomposed matrix, `(rows, cols)`.
    pub fn source_shape(&self) -> (usize, usize) {
        (self.left.nrows(), self.right.nrows())
    }

    /// Leading `rank` components (all of them if `rank >= len`).
    pub fn truncated(&self, rank: usize) -> Self {
        let r = rank.min(self.len());
        Self {
            values: self.values.rows(0, r).into_owned(),
            left: self.left.columns(0, r).into_owned(),
            right: self.right.columns(0, r).into_owned(),
        }
    }

    /// `left · diag(values) · rightᵀ`.
    pub fn recompose(&self) -> DMatrix<f64> {
        let mut scaled = self.left.clone();
        for (mut col, &v) in scaled.column_iter_mut().zip(self.values.iter()) {
            col *= v;
        }
        scaled * self.right.transpose()
    }
}

/// Indices that sort `values` descending; stable, so ties keep input order.
pub fn descending_order(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    order
}

/// Dense decomposition capability shared by every component.
pub trait SpectralBackend: Send + Sync {
    /// Eigendecomposition of a symmetric matrix (`left == right`). The input
    /// is symmetrised before decomposition.
    fn symmetric_eigen(&self, m: &DMatrix<f64>) -> Result<SpectralDecomposition>;

    /// Thin singular value decomposition of any real matrix.
    fn svd(&self, m: &DMatrix<f64>) -> Result<SpectralDecomposition>;
}

/// [`SpectralBackend`] on nalgebra's dense solvers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NalgebraSpectral {
    /// Convergence threshold passed to the iterative QR/bidiagonal solvers.
    pub eps: f64,
    /// Iteration cap for the dense solvers; `0` means unlimited.
    pub max_iters: usize,
}

impl Default for NalgebraSpectral {
    fn default() -> Self {
        Self {
            eps: f64::EPSILON,
            max_iters: 0,
        }
    }
}

impl SpectralBackend for NalgebraSpectral {
    fn symmetric_eigen(&self, m: &DMatrix<f64>) -> Result<SpectralDecomposition> {
        if !m.is_square() {
            return Err(EdmError::DimensionMismatch {
                expected: (m.nrows(), m.nrows()),
                got: m.shape(),
            });
        }
        let sym = m * 0.5 + m.transpose() * 0.5;
        let eig = SymmetricEigen::try_new(sym, self.eps, self.max_iters).ok_or(
            EdmError::Decomposition {
                what: "symmetric eigendecomposition",
            },
        )?;
        let vectors = eig.eigenvectors;
        SpectralDecomposition::new(eig.eigenvalues, vectors.clone(), vectors)
    }

    fn svd(&self, m: &DMatrix<f64>) -> Result<SpectralDecomposition> {
        let failed = EdmError::Decomposition {
            what: "singular value decomposition",
        };
        let svd = m
            .clone()
            .try_svd(true, true, self.eps, self.max_iters)
            .ok_or_else(|| failed.clone())?;
        let u = svd.u.ok_or_else(|| failed.clone())?;
        let v_t = svd.v_t.ok_or(failed)?;
        SpectralDecomposition::new(svd.singular_values, u, v_t.transpose())
    }
}
