//! Distance-matrix data model and the maps between its representations.
//!
//! - [`SquaredDistanceMatrix`], [`ObservationMask`], [`PointSet`] and
//!   [`RigidTransform`] value types.
//! - Validator for matrix/mask invariants.
//! - Double centering, the Gram-to-distance map and the reduced centering
//!   basis used by the completion engine.

mod gram;
mod types;
mod validate;

pub use gram::{centering_basis, edm_from_coords, edm_from_gram, gram_from_edm, relative_error};
pub use types::{ObservationMask, PointSet, RigidTransform, SquaredDistanceMatrix};
pub use validate::{validate_edm, validate_mask, validate_pair, ValidationConfig};

/// `‖W ⊙ (a - b)‖_F / ‖W ⊙ b‖_F`.
pub fn masked_relative_error(
    a: &SquaredDistanceMatrix,
    b: &SquaredDistanceMatrix,
    mask: &ObservationMask,
) -> crate::Result<f64> {
    Ok(relative_error(&a.masked(mask)?, &b.masked(mask)?))
}
