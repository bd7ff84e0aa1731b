//! The completion SDP in operator form.
//!
//! ```text
//! maximize    trace(G) − λ ‖W ⊙ (K(V G Vᵀ) − D)‖_F
//! subject to  G ⪰ 0,  G ∈ S^{n-1}
//! ```
//!
//! where `K(B)_ij = B_ii + B_jj − 2 B_ij` and `V` is the centering basis.
//! `A(G) = W ⊙ K(V G Vᵀ)` is the linear data map used by solvers, and
//! [`CompletionProblem::adjoint`] is its adjoint under the Frobenius product.

use nalgebra::DMatrix;

use crate::edm::{centering_basis, edm_from_gram, ObservationMask, SquaredDistanceMatrix};
use crate::error::{invalid_argument, Result};

/// Data of one completion instance.
#[derive(Debug, Clone)]
pub struct CompletionProblem {
    basis: DMatrix<f64>,
    weights: DMatrix<f64>,
    target: DMatrix<f64>,
    lambda: f64,
}

impl CompletionProblem {
    /// Assemble the problem for `d` observed on `mask` with trade-off `lambda`.
    pub fn new(d: &SquaredDistanceMatrix, mask: &ObservationMask, lambda: f64) -> Result<Self> {
        if !(lambda.is_finite() && lambda > 0.0) {
            return Err(invalid_argument(
                "lambda",
                format!("must be positive and finite, got {}", lambda),
            ));
        }
        let n = d.len();
        if n < 2 {
            return Err(invalid_argument(
                "d",
                format!("completion needs at least 2 points, got {}", n),
            ));
        }
        let target = d.masked(mask)?;
        Ok(Self {
            basis: centering_basis(n),
            weights: mask.weights(),
            target,
            lambda,
        })
    }

    /// Number of points `n`.
    pub fn n(&self) -> usize {
        self.basis.nrows()
    }

    /// Side of the decision matrix, `n - 1`.
    pub fn reduced_dim(&self) -> usize {
        self.basis.ncols()
    }

    /// Fidelity weight λ.
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// `W ⊙ D`.
    pub fn target(&self) -> &DMatrix<f64> {
        &self.target
    }

    /// 0/1 observation weights.
    pub fn weights(&self) -> &DMatrix<f64> {
        &self.weights
    }

    /// Centering basis `V`, `n × (n-1)`.
    pub fn basis(&self) -> &DMatrix<f64> {
        &self.basis
    }

    /// Implied Gram matrix `B = V G Vᵀ`.
    pub fn gram(&self, g: &DMatrix<f64>) -> DMatrix<f64> {
        &self.basis * g * self.basis.transpose()
    }

    /// Implied squared distances `K(V G Vᵀ)`.
    pub fn implied_edm(&self, g: &DMatrix<f64>) -> DMatrix<f64> {
        edm_from_gram(&self.gram(g))
    }

    /// `A(G) = W ⊙ K(V G Vᵀ)`.
    pub fn apply(&self, g: &DMatrix<f64>) -> DMatrix<f64> {
        self.implied_edm(g).component_mul(&self.weights)
    }

    /// `Aᵀ(Y) = Vᵀ (Diag((S + Sᵀ) 1) − (S + Sᵀ)) V` with `S = W ⊙ Y`.
    pub fn adjoint(&self, y: &DMatrix<f64>) -> DMatrix<f64> {
        let s = y.component_mul(&self.weights);
        let sym = &s + s.transpose();
        let n = sym.nrows();
        let mut k = -sym.clone();
        for i in 0..n {
            k[(i, i)] += sym.row(i).sum();
        }
        self.basis.transpose() * k * &self.basis
    }

    /// `‖W ⊙ (K(V G Vᵀ) − D)‖_F`.
    pub fn fidelity(&self, g: &DMatrix<f64>) -> f64 {
        (self.apply(g) - &self.target).norm()
    }

    /// `trace(G) − λ · fidelity(G)`, the maximised objective.
    pub fn objective(&self, g: &DMatrix<f64>) -> f64 {
        g.trace() - self.lambda * self.fidelity(g)
    }

    /// Same problem with the observed distances divided by `factor`.
    pub(crate) fn rescaled(&self, factor: f64) -> Self {
        Self {
            basis: self.basis.clone(),
            weights: self.weights.clone(),
            target: &self.target / factor,
            lambda: self.lambda,
        }
    }
}
