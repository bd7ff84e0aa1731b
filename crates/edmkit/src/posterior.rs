//! Boundary types for a posterior location estimator.
//!
//! Refining noisy coordinates against measured (non-squared) distances is
//! left to an external collaborator that implements [`PosteriorEstimator`].
//! This module only fixes what goes in and what comes out; no estimator is
//! shipped here.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::edm::{ObservationMask, PointSet, SquaredDistanceMatrix};
use crate::error::{invalid_argument, Result};
use crate::solver::{CancelToken, SolverDiagnostics};

/// One measured distance between points `i` and `j`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceObservation {
    /// First point index.
    pub i: usize,
    /// Second point index.
    pub j: usize,
    /// Euclidean (not squared) distance.
    pub distance: f64,
}

/// Non-squared distances of every observed pair `i < j`.
pub fn observations_from_edm(
    d: &SquaredDistanceMatrix,
    mask: &ObservationMask,
) -> Result<Vec<DistanceObservation>> {
    let masked = d.masked(mask)?;
    Ok(mask
        .observed_pairs()
        .map(|(i, j)| DistanceObservation {
            i,
            j,
            distance: masked[(i, j)].max(0.0).sqrt(),
        })
        .collect())
}

/// How the collaborator should summarise the posterior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimationStrategy {
    /// Full posterior sampling.
    Sample {
        /// Retained draws per chain.
        draws: usize,
        /// Warm-up draws per chain.
        tune: usize,
        /// Independent chains.
        chains: usize,
    },
    /// Maximum a posteriori point estimate with a Laplace covariance.
    PointEstimate {
        /// Optimiser iteration cap.
        max_iters: usize,
    },
}

impl Default for EstimationStrategy {
    fn default() -> Self {
        Self::Sample {
            draws: 1000,
            tune: 1000,
            chains: 4,
        }
    }
}

/// Validated input to a [`PosteriorEstimator`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PosteriorRequest {
    points: PointSet,
    observations: Vec<DistanceObservation>,
    location_sigma: f64,
    distance_sigma: f64,
    strategy: EstimationStrategy,
}

impl PosteriorRequest {
    /// Check indices, distances and noise scales.
    pub fn new(
        points: PointSet,
        observations: Vec<DistanceObservation>,
        location_sigma: f64,
        distance_sigma: f64,
        strategy: EstimationStrategy,
    ) -> Result<Self> {
        for (name, sigma) in [
            ("location_sigma", location_sigma),
            ("distance_sigma", distance_sigma),
        ] {
            if !(sigma.is_finite() && sigma > 0.0) {
                return Err(invalid_argument(
                    name,
                    format!("must be positive and finite, got {}", sigma),
                ));
            }
        }
        let n = points.len();
        for obs in &observations {
            if obs.i >= n || obs.j >= n || obs.i == obs.j {
                return Err(invalid_argument(
                    "observations",
                    format!("pair ({}, {}) is not valid for {} points", obs.i, obs.j, n),
                ));
            }
            if !(obs.distance.is_finite() && obs.distance >= 0.0) {
                return Err(invalid_argument(
                    "observations",
                    format!("distance {} for pair ({}, {})", obs.distance, obs.i, obs.j),
                ));
            }
        }
        let strategy_ok = match strategy {
            EstimationStrategy::Sample { draws, chains, .. } => draws > 0 && chains > 0,
            EstimationStrategy::PointEstimate { max_iters } => max_iters > 0,
        };
        if !strategy_ok {
            return Err(invalid_argument(
                "strategy",
                format!("{:?} requests no work", strategy),
            ));
        }
        Ok(Self {
            points,
            observations,
            location_sigma,
            distance_sigma,
            strategy,
        })
    }

    /// Noisy starting coordinates, `dim × n`.
    pub fn points(&self) -> &PointSet {
        &self.points
    }

    /// Measured distances.
    pub fn observations(&self) -> &[DistanceObservation] {
        &self.observations
    }

    /// Standard deviation of the prior on each coordinate.
    pub fn location_sigma(&self) -> f64 {
        self.location_sigma
    }

    /// Standard deviation of each distance measurement.
    pub fn distance_sigma(&self) -> f64 {
        self.distance_sigma
    }

    /// How the estimator should summarise the posterior.
    pub fn strategy(&self) -> EstimationStrategy {
        self.strategy
    }

    /// `measured − predicted` distance per observation for a candidate configuration.
    pub fn residuals(&self, candidate: &PointSet) -> Result<Vec<f64>> {
        if candidate.coords().shape() != self.points.coords().shape() {
            return Err(crate::EdmError::DimensionMismatch {
                expected: self.points.coords().shape(),
                got: candidate.coords().shape(),
            });
        }
        Ok(self
            .observations
            .iter()
            .map(|o| o.distance - (candidate.point(o.i) - candidate.point(o.j)).norm())
            .collect())
    }
}

/// Mean and standard deviation of a scalar posterior marginal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Posterior mean.
    pub mean: f64,
    /// Posterior standard deviation.
    pub sd: f64,
}

/// Convergence diagnostics of a sampler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplerDiagnostics {
    /// Largest split-R̂ over all parameters.
    pub max_r_hat: f64,
    /// Divergent transitions across all chains.
    pub divergences: usize,
    /// Smallest bulk effective sample size.
    pub min_ess: f64,
}

/// Output of a [`PosteriorEstimator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PosteriorEstimate {
    /// Summary of posterior draws.
    Samples {
        /// Per-coordinate marginals, `dim × n`.
        coordinates: Vec<Vec<Summary>>,
        /// Per-observation marginals of the distance residual.
        residuals: Vec<Summary>,
        /// Sampler convergence checks.
        diagnostics: SamplerDiagnostics,
    },
    /// Point estimate with covariance of the flattened (column-major) coordinates.
    Point {
        /// Point estimate, `dim × n`.
        points: PointSet,
        /// `(dim·n) × (dim·n)` covariance.
        covariance: DMatrix<f64>,
        /// Optimiser status.
        diagnostics: SolverDiagnostics,
    },
}

/// External posterior estimation capability.
pub trait PosteriorEstimator: Send + Sync {
    /// Run the estimator; long runs should poll `cancel`.
    fn estimate(
        &self,
        request: &PosteriorRequest,
        cancel: Option<&CancelToken>,
    ) -> Result<PosteriorEstimate>;
}
