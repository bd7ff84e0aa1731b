//! High-level API.
//!
//! [`EdmPipeline`] owns an [`EdmConfig`] plus the injected numerical
//! capabilities and exposes every stage (validation, completion, embedding,
//! denoising, alignment) as well as anchor-based localization, which chains
//! completion, embedding and alignment.
//!
//! Capabilities that are not injected are built from the current config on
//! each call, so edits through [`EdmPipeline::config_mut`] take effect
//! immediately.

use std::collections::HashSet;
use std::path::Path;

use nalgebra::DMatrix;

use crate::completion::{complete_edm_with, AdmmSdpSolver, Completion, SdpSolver};
use crate::config::EdmConfig;
use crate::denoise::{denoise_edm_with, Denoised, PcpAdmmDecomposer, RobustDecomposer};
use crate::edm::{ObservationMask, PointSet, SquaredDistanceMatrix};
use crate::embedding::{embed_edm, embed_from_decomposition};
use crate::error::{invalid_argument, EdmError, Result};
use crate::posterior::{observations_from_edm, PosteriorRequest};
use crate::procrustes::{align, Alignment};
use crate::solver::CancelToken;
use crate::spectral::{NalgebraSpectral, SpectralBackend};

/// Output of [`EdmPipeline::localize`].
#[derive(Debug, Clone)]
pub struct Localization {
    /// All points in the anchor frame.
    pub points: PointSet,
    /// Fit of the embedded anchors onto their known coordinates.
    pub anchor_fit: Alignment,
    /// The completion the embedding was read from.
    pub completion: Completion,
}

impl Localization {
    /// Whether the completion solver stopped short of optimality.
    pub fn is_degraded(&self) -> bool {
        self.completion.is_degraded()
    }
}

/// Primary entry point.
///
/// Create once, run on many matrices. Every method is a pure function of its
/// inputs and the pipeline's configuration, so one pipeline can be shared
/// across threads.
///
/// # Examples
///
/// ```
/// use edmkit::{synth, EdmPipeline};
///
/// let truth = synth::random_points(2, 6, 7);
/// let d = truth.squared_distances();
/// let pipeline = EdmPipeline::new();
///
/// let x = pipeline.embed(&d, 2).unwrap();
/// let fit = pipeline.align(&x, &truth).unwrap();
/// assert!(fit.residual < 1e-12);
/// ```
pub struct EdmPipeline {
    config: EdmConfig,
    spectral: Box<dyn SpectralBackend>,
    sdp_solver: Option<Box<dyn SdpSolver>>,
    robust: Option<Box<dyn RobustDecomposer>>,
}

impl Default for EdmPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EdmPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdmPipeline")
            .field("config", &self.config)
            .field("custom_sdp_solver", &self.sdp_solver.is_some())
            .field("custom_robust_decomposer", &self.robust.is_some())
            .finish_non_exhaustive()
    }
}

impl EdmPipeline {
    /// Pipeline with default configuration and nalgebra-backed capabilities.
    pub fn new() -> Self {
        Self::with_config(EdmConfig::default())
    }

    /// Create with full config control.
    pub fn with_config(config: EdmConfig) -> Self {
        Self {
            config,
            spectral: Box::new(NalgebraSpectral::default()),
            sdp_solver: None,
            robust: None,
        }
    }

    /// Load a JSON config and create a pipeline in one step.
    pub fn from_config_json_file(
        path: &Path,
    ) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::with_config(EdmConfig::from_json_file(path)?))
    }

    /// Replace the eigen/SVD backend used by every stage.
    pub fn with_spectral_backend(mut self, spectral: Box<dyn SpectralBackend>) -> Self {
        self.spectral = spectral;
        self
    }

    /// Replace the conic solver used by completion.
    pub fn with_sdp_solver(mut self, solver: Box<dyn SdpSolver>) -> Self {
        self.sdp_solver = Some(solver);
        self
    }

    /// Replace the low-rank/sparse decomposer used by the `p = 1` denoiser.
    pub fn with_robust_decomposer(mut self, robust: Box<dyn RobustDecomposer>) -> Self {
        self.robust = Some(robust);
        self
    }

    /// Access the current configuration.
    pub fn config(&self) -> &EdmConfig {
        &self.config
    }

    /// Mutable access to configuration for post-construction tuning.
    pub fn config_mut(&mut self) -> &mut EdmConfig {
        &mut self.config
    }

    /// Validate a raw matrix with the configured tolerances.
    pub fn distance_matrix(&self, matrix: DMatrix<f64>) -> Result<SquaredDistanceMatrix> {
        SquaredDistanceMatrix::with_config(matrix, &self.config.validation)
    }

    /// Complete the unobserved entries of `d`.
    pub fn complete(
        &self,
        d: &SquaredDistanceMatrix,
        mask: &ObservationMask,
    ) -> Result<Completion> {
        self.run_completion(d, mask, None)
    }

    /// [`Self::complete`] with a cancellation token.
    pub fn complete_with_cancel(
        &self,
        d: &SquaredDistanceMatrix,
        mask: &ObservationMask,
        cancel: &CancelToken,
    ) -> Result<Completion> {
        self.run_completion(d, mask, Some(cancel))
    }

    /// Classical MDS of a full distance matrix.
    pub fn embed(&self, d: &SquaredDistanceMatrix, dim: usize) -> Result<PointSet> {
        embed_edm(d, dim, &self.config.embedding, self.spectral.as_ref())
    }

    /// Classical MDS from the decomposition cached by a completion.
    pub fn embed_completion(&self, completion: &Completion, dim: usize) -> Result<PointSet> {
        embed_from_decomposition(&completion.decomposition, dim, &self.config.embedding)
    }

    /// Denoise `d` towards a `dim`-dimensional configuration.
    pub fn denoise(&self, d: &SquaredDistanceMatrix, dim: usize) -> Result<Denoised> {
        self.run_denoise(d, dim, None)
    }

    /// [`Self::denoise`] with a cancellation token.
    pub fn denoise_with_cancel(
        &self,
        d: &SquaredDistanceMatrix,
        dim: usize,
        cancel: &CancelToken,
    ) -> Result<Denoised> {
        self.run_denoise(d, dim, Some(cancel))
    }

    /// Rigidly align `source` onto `target`.
    pub fn align(&self, source: &PointSet, target: &PointSet) -> Result<Alignment> {
        align(source, target, &self.config.procrustes, self.spectral.as_ref())
    }

    /// Recover coordinates in the frame of known anchor points.
    ///
    /// `anchor_coords` holds the known positions of `anchors` (in that order)
    /// as a `dim × anchors.len()` point set.
    pub fn localize(
        &self,
        d: &SquaredDistanceMatrix,
        mask: &ObservationMask,
        dim: usize,
        anchors: &[usize],
        anchor_coords: &PointSet,
    ) -> Result<Localization> {
        check_anchors(d.len(), dim, anchors, anchor_coords)?;

        let completion = self.complete(d, mask)?;
        let embedded = self.embed_completion(&completion, dim)?;
        let anchor_fit = self.align(&embedded.select(anchors)?, anchor_coords)?;
        let points = anchor_fit.transform.apply(&embedded)?;
        tracing::info!(
            "localized {} points from {} anchors (anchor residual {:.3e}, completion status {})",
            points.len(),
            anchors.len(),
            anchor_fit.residual,
            completion.diagnostics.status
        );

        Ok(Localization {
            points,
            anchor_fit,
            completion,
        })
    }

    /// Package noisy coordinates and the observed distances of `d` for a
    /// posterior estimator, using the configured strategy.
    pub fn posterior_request(
        &self,
        noisy: PointSet,
        d: &SquaredDistanceMatrix,
        mask: &ObservationMask,
        location_sigma: f64,
        distance_sigma: f64,
    ) -> Result<PosteriorRequest> {
        if noisy.len() != d.len() {
            return Err(EdmError::DimensionMismatch {
                expected: (noisy.dim(), d.len()),
                got: (noisy.dim(), noisy.len()),
            });
        }
        PosteriorRequest::new(
            noisy,
            observations_from_edm(d, mask)?,
            location_sigma,
            distance_sigma,
            self.config.posterior,
        )
    }

    fn run_completion(
        &self,
        d: &SquaredDistanceMatrix,
        mask: &ObservationMask,
        cancel: Option<&CancelToken>,
    ) -> Result<Completion> {
        let cfg = &self.config.completion;
        match &self.sdp_solver {
            Some(solver) => {
                complete_edm_with(d, mask, cfg, self.spectral.as_ref(), solver.as_ref(), cancel)
            }
            None => {
                let solver = AdmmSdpSolver::new(cfg.solver);
                complete_edm_with(d, mask, cfg, self.spectral.as_ref(), &solver, cancel)
            }
        }
    }

    fn run_denoise(
        &self,
        d: &SquaredDistanceMatrix,
        dim: usize,
        cancel: Option<&CancelToken>,
    ) -> Result<Denoised> {
        let cfg = &self.config.denoise;
        match &self.robust {
            Some(robust) => {
                denoise_edm_with(d, dim, cfg, self.spectral.as_ref(), robust.as_ref(), cancel)
            }
            None => {
                let robust = PcpAdmmDecomposer::new(cfg.robust);
                denoise_edm_with(d, dim, cfg, self.spectral.as_ref(), &robust, cancel)
            }
        }
    }
}

fn check_anchors(n: usize, dim: usize, anchors: &[usize], anchor_coords: &PointSet) -> Result<()> {
    if anchors.is_empty() {
        return Err(invalid_argument("anchors", "at least one anchor is required"));
    }
    let mut seen = HashSet::with_capacity(anchors.len());
    for &a in anchors {
        if a >= n {
            return Err(invalid_argument(
                "anchors",
                format!("index {} out of range for {} points", a, n),
            ));
        }
        if !seen.insert(a) {
            return Err(invalid_argument("anchors", format!("index {} appears twice", a)));
        }
    }
    let expected = (dim, anchors.len());
    if anchor_coords.coords().shape() != expected {
        return Err(EdmError::DimensionMismatch {
            expected,
            got: anchor_coords.coords().shape(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests;
