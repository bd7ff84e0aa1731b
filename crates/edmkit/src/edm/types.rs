//! Value types flowing through the pipeline.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::gram::{edm_from_coords, project_structure};
use super::validate::{validate_edm, validate_mask, ValidationConfig};
use crate::error::{EdmError, Result, ValidationError};

// ── SquaredDistanceMatrix ──────────────────────────────────────────────────

/// Dense `n × n` matrix of squared Euclidean distances.
///
/// Inputs are validated on construction (symmetric, non-negative, zero
/// diagonal). Matrices produced by completion or denoising are projected
/// onto the structural invariants (exact symmetry, zero diagonal) but are
/// not re-validated for non-negativity; call [`Self::validate`] when a
/// strict distance matrix is required.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SquaredDistanceMatrix {
    matrix: DMatrix<f64>,
}

impl SquaredDistanceMatrix {
    /// Validate with default tolerances.
    pub fn new(matrix: DMatrix<f64>) -> Result<Self> {
        Self::with_config(matrix, &ValidationConfig::default())
    }

    /// Validate with explicit tolerances.
    pub fn with_config(matrix: DMatrix<f64>, config: &ValidationConfig) -> Result<Self> {
        validate_edm(&matrix, config)?;
        Ok(Self { matrix })
    }

    /// Exact squared distances of a point set.
    pub fn from_points(points: &PointSet) -> Self {
        Self {
            matrix: edm_from_coords(points.coords()),
        }
    }

    /// Wrap a computed matrix after symmetrising it and zeroing its diagonal.
    pub(crate) fn from_projected(matrix: &DMatrix<f64>, clamp_negatives: bool) -> Self {
        Self {
            matrix: project_structure(matrix, clamp_negatives),
        }
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    /// True for a `0 × 0` matrix (never produced by the public constructors).
    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }

    /// Entry `(i, j)`.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.matrix[(i, j)]
    }

    /// Borrow the underlying matrix.
    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Take the underlying matrix.
    pub fn into_inner(self) -> DMatrix<f64> {
        self.matrix
    }

    /// `W ⊙ D`: unobserved entries set to zero.
    pub fn masked(&self, mask: &ObservationMask) -> Result<DMatrix<f64>> {
        mask.check_len(self.len())?;
        Ok(self.matrix.component_mul(&mask.weights()))
    }

    /// Re-run the full validator.
    pub fn validate(&self, config: &ValidationConfig) -> Result<()> {
        validate_edm(&self.matrix, config).map_err(EdmError::from)
    }
}

// ── ObservationMask ────────────────────────────────────────────────────────

/// Symmetric boolean mask of observed entries; the diagonal is always observed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationMask {
    mask: DMatrix<bool>,
}

impl ObservationMask {
    /// Validate and wrap a boolean matrix.
    pub fn new(mask: DMatrix<bool>) -> Result<Self> {
        validate_mask(&mask)?;
        Ok(Self { mask })
    }

    /// Every entry observed.
    pub fn full(n: usize) -> Self {
        Self {
            mask: DMatrix::from_element(n, n, true),
        }
    }

    /// Build from a predicate evaluated on pairs `i < j`; symmetric by construction.
    pub fn from_pairs(n: usize, observed: impl Fn(usize, usize) -> bool) -> Self {
        let mut mask = DMatrix::from_element(n, n, true);
        for i in 0..n {
            for j in (i + 1)..n {
                let o = observed(i, j);
                mask[(i, j)] = o;
                mask[(j, i)] = o;
            }
        }
        Self { mask }
    }

    /// Build from a 0/1 weight matrix; any non-zero entry counts as observed.
    pub fn from_weights(weights: &DMatrix<f64>) -> Result<Self> {
        Self::new(weights.map(|w| w != 0.0))
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.mask.nrows()
    }

    /// True for a `0 × 0` mask.
    pub fn is_empty(&self) -> bool {
        self.mask.is_empty()
    }

    /// Whether entry `(i, j)` is observed.
    pub fn is_observed(&self, i: usize, j: usize) -> bool {
        self.mask[(i, j)]
    }

    /// Borrow the boolean matrix.
    pub fn as_matrix(&self) -> &DMatrix<bool> {
        &self.mask
    }

    /// Mask as 0/1 weights.
    pub fn weights(&self) -> DMatrix<f64> {
        self.mask.map(|o| if o { 1.0 } else { 0.0 })
    }

    /// Observed off-diagonal pairs `(i, j)` with `i < j`.
    pub fn observed_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let n = self.len();
        (0..n)
            .flat_map(move |i| ((i + 1)..n).map(move |j| (i, j)))
            .filter(move |&(i, j)| self.mask[(i, j)])
    }

    /// Number of unobserved off-diagonal pairs.
    pub fn missing_pairs(&self) -> usize {
        let n = self.len();
        n * n.saturating_sub(1) / 2 - self.observed_pairs().count()
    }

    pub(crate) fn check_len(&self, n: usize) -> Result<()> {
        if self.len() != n {
            return Err(ValidationError::MaskShape {
                expected: (n, n),
                got: self.mask.shape(),
            }
            .into());
        }
        Ok(())
    }
}

// ── PointSet ───────────────────────────────────────────────────────────────

/// `dim × n` coordinates, one point per column.
///
/// Any orthogonal transform plus translation of a point set has the same
/// distance matrix; use [`crate::procrustes::align`] to fix a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSet {
    coords: DMatrix<f64>,
}

impl PointSet {
    /// Wrap a `dim × n` coordinate matrix.
    pub fn new(coords: DMatrix<f64>) -> Self {
        Self { coords }
    }

    /// Build from points given as rows (`n` points of `dim` coordinates each).
    pub fn from_rows<const D: usize>(points: &[[f64; D]]) -> Self {
        Self {
            coords: DMatrix::from_fn(D, points.len(), |r, c| points[c][r]),
        }
    }

    /// Embedding dimension.
    pub fn dim(&self) -> usize {
        self.coords.nrows()
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.coords.ncols()
    }

    /// True when there are no points.
    pub fn is_empty(&self) -> bool {
        self.coords.ncols() == 0
    }

    /// Borrow the coordinate matrix.
    pub fn coords(&self) -> &DMatrix<f64> {
        &self.coords
    }

    /// Take the coordinate matrix.
    pub fn into_inner(self) -> DMatrix<f64> {
        self.coords
    }

    /// Point `j` as a column vector.
    pub fn point(&self, j: usize) -> DVector<f64> {
        self.coords.column(j).into_owned()
    }

    /// Mean of the points.
    pub fn centroid(&self) -> DVector<f64> {
        if self.is_empty() {
            return DVector::zeros(self.dim());
        }
        self.coords.column_mean()
    }

    /// Coordinates with the centroid subtracted from every column.
    pub fn centered(&self) -> DMatrix<f64> {
        let c = self.centroid();
        DMatrix::from_fn(self.dim(), self.len(), |r, j| self.coords[(r, j)] - c[r])
    }

    /// Subset of points in the given order.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(crate::error::invalid_argument(
                "indices",
                format!("index {} out of range for {} points", bad, self.len()),
            ));
        }
        Ok(Self {
            coords: DMatrix::from_fn(self.dim(), indices.len(), |r, c| {
                self.coords[(r, indices[c])]
            }),
        })
    }

    /// Exact squared-distance matrix of these points.
    pub fn squared_distances(&self) -> SquaredDistanceMatrix {
        SquaredDistanceMatrix::from_points(self)
    }

    /// Sum of squared coordinate differences to `other`.
    pub fn squared_residual(&self, other: &PointSet) -> Result<f64> {
        if self.coords.shape() != other.coords.shape() {
            return Err(EdmError::DimensionMismatch {
                expected: self.coords.shape(),
                got: other.coords.shape(),
            });
        }
        Ok((&self.coords - &other.coords).norm_squared())
    }
}

// ── RigidTransform ─────────────────────────────────────────────────────────

/// `y = R x + t` with orthogonal `R` (reflections allowed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    /// Orthogonal `dim × dim` matrix.
    pub rotation: DMatrix<f64>,
    /// Translation applied after rotation.
    pub translation: DVector<f64>,
}

impl RigidTransform {
    /// Identity in `dim` dimensions.
    pub fn identity(dim: usize) -> Self {
        Self {
            rotation: DMatrix::identity(dim, dim),
            translation: DVector::zeros(dim),
        }
    }

    /// Dimension the transform acts on.
    pub fn dim(&self) -> usize {
        self.translation.len()
    }

    /// `det(R)`: `+1` for a proper rotation, `-1` for a reflection.
    pub fn determinant(&self) -> f64 {
        self.rotation.determinant()
    }

    /// Whether `R` includes a reflection.
    pub fn is_reflection(&self) -> bool {
        self.determinant() < 0.0
    }

    /// Map every point of `points` into the target frame.
    pub fn apply(&self, points: &PointSet) -> Result<PointSet> {
        if points.dim() != self.dim() {
            return Err(EdmError::DimensionMismatch {
                expected: (self.dim(), points.len()),
                got: (points.dim(), points.len()),
            });
        }
        let mut coords = &self.rotation * points.coords();
        for mut col in coords.column_iter_mut() {
            col += &self.translation;
        }
        Ok(PointSet::new(coords))
    }
}
