//! Low-rank denoising of fully observed distance matrices.
//!
//! A squared-distance matrix of points in `R^dim` has rank at most `dim + 2`
//! (the Gram part contributes `dim`, the two norm terms `‖x_i‖² 1ᵀ` and
//! `1 ‖x_j‖²ᵀ` one each). Denoising truncates to that rank:
//!
//! - [`NoiseModel::Gaussian`] (`p = 2`): SVD truncation of `D` itself.
//! - [`NoiseModel::Sparse`] (`p = 1`): robust split `D = L + S` with `L ≥ 0`
//!   first, then SVD truncation of `L`.

mod pcp;

pub use pcp::{PcpAdmmDecomposer, PcpSettings, RobustDecomposer, RobustSolution};

use serde::{Deserialize, Serialize};

use crate::edm::SquaredDistanceMatrix;
use crate::error::{invalid_argument, EdmError, Result};
use crate::solver::{CancelToken, SolveBudget, SolveGuard, SolverDiagnostics};
use crate::spectral::{NalgebraSpectral, SpectralBackend};

/// Noise assumption of the denoiser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseModel {
    /// Dense, small errors: plain rank truncation (`p = 2`).
    #[default]
    Gaussian,
    /// Few, large errors: robust low-rank/sparse split first (`p = 1`).
    Sparse,
}

impl NoiseModel {
    /// Map the norm selector `p` (1 or 2) to a model.
    pub fn from_p(p: i64) -> Result<Self> {
        match p {
            2 => Ok(Self::Gaussian),
            1 => Ok(Self::Sparse),
            other => Err(invalid_argument(
                "p",
                format!("noise model must be 1 (sparse) or 2 (gaussian), got {}", other),
            )),
        }
    }

    /// The norm selector of this model.
    pub fn p(self) -> u8 {
        match self {
            Self::Gaussian => 2,
            Self::Sparse => 1,
        }
    }
}

impl TryFrom<i64> for NoiseModel {
    type Error = EdmError;

    fn try_from(p: i64) -> Result<Self> {
        Self::from_p(p)
    }
}

/// Configuration of the denoiser.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseConfig {
    /// Noise assumption.
    pub noise_model: NoiseModel,
    /// Extra rank kept on top of `dim`.
    pub rank_margin: usize,
    /// Settings of the default robust decomposer.
    pub robust: PcpSettings,
    /// Budget of the robust decomposition.
    pub budget: SolveBudget,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            noise_model: NoiseModel::Gaussian,
            rank_margin: 2,
            robust: PcpSettings::default(),
            budget: SolveBudget::default(),
        }
    }
}

/// Output of [`denoise_edm`].
#[derive(Debug, Clone)]
pub struct Denoised {
    /// Denoised matrix: symmetric with zero diagonal, not re-validated.
    pub matrix: SquaredDistanceMatrix,
    /// Robust decomposition diagnostics (`None` for the Gaussian model).
    pub diagnostics: Option<SolverDiagnostics>,
}

impl Denoised {
    /// Whether the robust decomposition stopped short of optimality.
    pub fn is_degraded(&self) -> bool {
        self.diagnostics
            .as_ref()
            .is_some_and(SolverDiagnostics::is_degraded)
    }
}

/// Denoise `d` towards a `dim`-dimensional configuration with the default
/// backend and decomposer.
pub fn denoise_edm(
    d: &SquaredDistanceMatrix,
    dim: usize,
    config: &DenoiseConfig,
) -> Result<Denoised> {
    denoise_edm_with(
        d,
        dim,
        config,
        &NalgebraSpectral::default(),
        &PcpAdmmDecomposer::new(config.robust),
        None,
    )
}

/// Denoise with injected capabilities.
pub fn denoise_edm_with(
    d: &SquaredDistanceMatrix,
    dim: usize,
    config: &DenoiseConfig,
    spectral: &dyn SpectralBackend,
    robust: &dyn RobustDecomposer,
    cancel: Option<&CancelToken>,
) -> Result<Denoised> {
    if dim == 0 {
        return Err(invalid_argument("dim", "must be at least 1"));
    }
    let rank = dim.saturating_add(config.rank_margin);

    let (source, diagnostics) = match config.noise_model {
        NoiseModel::Gaussian => (d.as_matrix().clone(), None),
        NoiseModel::Sparse => {
            let guard = SolveGuard::new(&config.budget, cancel);
            let split = robust.decompose(d.as_matrix(), &guard);
            if split.diagnostics.is_degraded() {
                tracing::warn!(
                    "robust decomposition returned status {} (objective {:.6e}); using best available split",
                    split.diagnostics.status,
                    split.diagnostics.objective
                );
            }
            (split.low_rank, Some(split.diagnostics))
        }
    };

    let truncated = spectral.svd(&source)?.truncated(rank).recompose();
    tracing::debug!(
        "denoised {} points to rank {} (p = {})",
        d.len(),
        rank,
        config.noise_model.p()
    );

    Ok(Denoised {
        matrix: SquaredDistanceMatrix::from_projected(&truncated, false),
        diagnostics,
    })
}
