//! Top-level configuration.
//!
//! Every field has a documented default; JSON files may set any subset.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::completion::CompletionConfig;
use crate::denoise::DenoiseConfig;
use crate::edm::ValidationConfig;
use crate::embedding::EmbeddingConfig;
use crate::error::{invalid_argument, Result};
use crate::posterior::EstimationStrategy;
use crate::procrustes::ProcrustesConfig;

/// Defaults for every component of [`crate::EdmPipeline`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdmConfig {
    /// Input validation tolerances.
    pub validation: ValidationConfig,
    /// SDP completion (λ = 2 by default).
    pub completion: CompletionConfig,
    /// Classical MDS negative-eigenvalue policy (fail by default).
    pub embedding: EmbeddingConfig,
    /// Denoiser (Gaussian noise model, rank margin 2 by default).
    pub denoise: DenoiseConfig,
    /// Procrustes alignment (reflections allowed by default).
    pub procrustes: ProcrustesConfig,
    /// Strategy handed to a posterior estimator (sampling by default).
    pub posterior: EstimationStrategy,
}

impl EdmConfig {
    /// Parse a (possibly partial) JSON document.
    pub fn from_json_str(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a (possibly partial) JSON file.
    pub fn from_json_file(path: &Path) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Check parameter domains that the type system cannot express.
    pub fn validate(&self) -> Result<()> {
        let lambda = self.completion.lambda;
        if !(lambda.is_finite() && lambda > 0.0) {
            return Err(invalid_argument(
                "completion.lambda",
                format!("must be positive and finite, got {}", lambda),
            ));
        }
        if !non_negative(self.validation.symmetry_tolerance) {
            return Err(invalid_argument(
                "validation.symmetry_tolerance",
                "must be non-negative",
            ));
        }
        if !non_negative(self.embedding.negative_tolerance) {
            return Err(invalid_argument(
                "embedding.negative_tolerance",
                "must be non-negative",
            ));
        }
        if let Some(mu) = self.denoise.robust.mu {
            if !(mu.is_finite() && mu > 0.0) {
                return Err(invalid_argument(
                    "denoise.robust.mu",
                    format!("must be positive and finite, got {}", mu),
                ));
            }
        }
        if self.denoise.robust.rho_growth < 1.0 {
            return Err(invalid_argument(
                "denoise.robust.rho_growth",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

fn non_negative(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}
