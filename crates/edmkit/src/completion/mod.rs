//! Distance-matrix completion by semidefinite relaxation.
//!
//! Missing entries are filled by maximising the trace of a centred Gram
//! matrix (a convex surrogate that spreads the configuration and favours a
//! low effective rank) against a masked Frobenius fidelity term weighted by
//! λ. The conic solve is an injected [`SdpSolver`]; a non-optimal status is a
//! soft failure: the completed matrix is still built from the returned
//! iterate and the status travels in [`Completion::diagnostics`].

mod admm;
mod problem;

pub use admm::{AdmmSdpSolver, AdmmSettings, SdpSolution, SdpSolver};
pub use problem::CompletionProblem;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::edm::{edm_from_gram, ObservationMask, SquaredDistanceMatrix};
use crate::error::Result;
use crate::solver::{CancelToken, SolveBudget, SolveGuard, SolverDiagnostics};
use crate::spectral::{NalgebraSpectral, SpectralBackend, SpectralDecomposition};

/// Configuration of the completion engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Fidelity weight λ > 0; larger values follow the observed entries more closely.
    pub lambda: f64,
    /// Settings of the default ADMM solver.
    pub solver: AdmmSettings,
    /// Iteration and wall-clock budget of one solve.
    pub budget: SolveBudget,
    /// Clamp rounding-level negative distances of the completed matrix to zero.
    pub clamp_rounding_negatives: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            lambda: 2.0,
            solver: AdmmSettings::default(),
            budget: SolveBudget::default(),
            clamp_rounding_negatives: true,
        }
    }
}

/// Output of [`complete_edm`].
#[derive(Debug, Clone)]
pub struct Completion {
    /// Completed squared-distance matrix (symmetric, zero diagonal).
    pub completed: SquaredDistanceMatrix,
    /// Centred Gram matrix `B = V G* Vᵀ`.
    pub gram: DMatrix<f64>,
    /// Eigendecomposition of `B`, reusable by [`crate::embedding`].
    pub decomposition: SpectralDecomposition,
    /// Solver status and objective.
    pub diagnostics: SolverDiagnostics,
}

impl Completion {
    /// Whether the solver stopped short of optimality.
    pub fn is_degraded(&self) -> bool {
        self.diagnostics.is_degraded()
    }
}

/// Complete `d` observed on `mask` with the default backend and solver.
pub fn complete_edm(
    d: &SquaredDistanceMatrix,
    mask: &ObservationMask,
    config: &CompletionConfig,
) -> Result<Completion> {
    complete_edm_with(
        d,
        mask,
        config,
        &NalgebraSpectral::default(),
        &AdmmSdpSolver::new(config.solver),
        None,
    )
}

/// Complete `d` observed on `mask` with injected capabilities.
///
/// Unobserved entries of `d` are ignored. Observed entries are matched only
/// softly: the output is not guaranteed to reproduce them exactly.
pub fn complete_edm_with(
    d: &SquaredDistanceMatrix,
    mask: &ObservationMask,
    config: &CompletionConfig,
    spectral: &dyn SpectralBackend,
    solver: &dyn SdpSolver,
    cancel: Option<&CancelToken>,
) -> Result<Completion> {
    let problem = CompletionProblem::new(d, mask, config.lambda)?;
    tracing::debug!(
        "completing {}x{} distance matrix with {} missing pairs, lambda={}",
        d.len(),
        d.len(),
        mask.missing_pairs(),
        config.lambda
    );

    let guard = SolveGuard::new(&config.budget, cancel);
    let solution = solver.solve(&problem, &guard);
    let diagnostics = solution.diagnostics;
    if diagnostics.is_degraded() {
        tracing::warn!(
            "completion solver returned status {} (objective {:.6e}); using best available iterate",
            diagnostics.status,
            diagnostics.objective
        );
    }

    let gram = problem.gram(&solution.decision);
    let completed =
        SquaredDistanceMatrix::from_projected(&edm_from_gram(&gram), config.clamp_rounding_negatives);
    let decomposition = spectral.symmetric_eigen(&gram)?;

    Ok(Completion {
        completed,
        gram,
        decomposition,
        diagnostics,
    })
}

#[cfg(test)]
mod tests;
