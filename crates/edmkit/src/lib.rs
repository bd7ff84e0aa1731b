//! edmkit: Euclidean distance matrix toolkit.
//!
//! Recovers point configurations from partial or noisy pairwise squared
//! distances. The stages are:
//!
//! 1. **Validate** – shape, symmetry, non-negativity and diagonal checks.
//! 2. **Complete** – fill unobserved distances by a trace-maximising
//!    semidefinite program with a masked Frobenius fidelity term.
//! 3. **Denoise** – rank-`dim + 2` truncation, optionally after a robust
//!    low-rank/sparse split for outlier-heavy data.
//! 4. **Embed** – classical multidimensional scaling.
//! 5. **Align** – orthogonal Procrustes onto known anchor coordinates.
//!
//! # Public API
//! - [`EdmPipeline`] and [`EdmConfig`] as primary entry points
//! - one free function per stage ([`completion::complete_edm`],
//!   [`denoise::denoise_edm`], [`embedding::embed_edm`],
//!   [`procrustes::align`]) for callers that bring their own capabilities
//! - capability traits ([`SpectralBackend`], [`SdpSolver`],
//!   [`RobustDecomposer`]) with nalgebra-backed defaults
//!
//! Iterative solvers never fail hard: a non-optimal finish is returned as
//! data in [`SolverDiagnostics`] next to the best available result.

pub mod completion;
mod config;
pub mod denoise;
pub mod edm;
pub mod embedding;
mod error;
mod pipeline;
pub mod posterior;
pub mod procrustes;
mod solver;
mod spectral;
pub mod synth;

#[cfg(test)]
pub(crate) mod test_utils;

pub use completion::{
    AdmmSdpSolver, AdmmSettings, Completion, CompletionConfig, CompletionProblem, SdpSolution,
    SdpSolver,
};
pub use config::EdmConfig;
pub use denoise::{
    DenoiseConfig, Denoised, NoiseModel, PcpAdmmDecomposer, PcpSettings, RobustDecomposer,
    RobustSolution,
};
pub use edm::{ObservationMask, PointSet, RigidTransform, SquaredDistanceMatrix, ValidationConfig};
pub use embedding::EmbeddingConfig;
pub use error::{EdmError, Result, ValidationError};
pub use pipeline::{EdmPipeline, Localization};
pub use posterior::{
    DistanceObservation, EstimationStrategy, PosteriorEstimate, PosteriorEstimator,
    PosteriorRequest,
};
pub use procrustes::{Alignment, ProcrustesConfig};
pub use solver::{CancelToken, SolveBudget, SolveGuard, SolveStatus, SolverDiagnostics};
pub use spectral::{descending_order, NalgebraSpectral, SpectralBackend, SpectralDecomposition};
