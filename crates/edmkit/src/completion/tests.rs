use super::*;
use crate::edm::{masked_relative_error, relative_error, PointSet};
use crate::error::{EdmError, ValidationError};
use crate::solver::SolveStatus;
use crate::synth::{random_mask, random_points};
use crate::test_utils::{band_mask, chain_points, perturb};

fn config(lambda: f64) -> CompletionConfig {
    CompletionConfig {
        lambda,
        ..CompletionConfig::default()
    }
}

fn assert_structural(d: &SquaredDistanceMatrix) {
    let m = d.as_matrix();
    for i in 0..d.len() {
        assert_eq!(m[(i, i)], 0.0);
        for j in 0..d.len() {
            assert_eq!(m[(i, j)], m[(j, i)]);
        }
    }
}

#[test]
fn full_mask_recovers_exact_distances() {
    let pts = PointSet::from_rows(&[
        [0.0, 0.0],
        [1.0, 0.2],
        [0.3, 1.1],
        [-0.7, 0.4],
        [0.9, -0.8],
        [-0.2, -0.6],
    ]);
    let d = pts.squared_distances();
    let out = complete_edm(&d, &ObservationMask::full(6), &config(2.0)).expect("completion");

    assert_structural(&out.completed);
    let err = relative_error(out.completed.as_matrix(), d.as_matrix());
    assert!(err < 1e-3, "relative error {err:.3e}");
}

#[test]
fn chain_with_missing_pairs_is_recovered() {
    let d = chain_points(8).squared_distances();
    let mask = band_mask(8, 3);
    assert_eq!(mask.missing_pairs(), 10);

    let out = complete_edm(&d, &mask, &config(5.0)).expect("completion");
    assert_structural(&out.completed);
    let err = relative_error(out.completed.as_matrix(), d.as_matrix());
    assert!(err < 0.1, "relative error {err:.3e}, status {}", out.diagnostics.status);
    for (i, j) in mask.observed_pairs() {
        assert!((out.completed.get(i, j) - d.get(i, j)).abs() < 0.05 * (1.0 + d.get(i, j)));
    }
}

/// Five random planar points with 30% of the pairs hidden. Trace maximisation
/// is free to lift such a sparse configuration out of the plane, so the
/// completion is checked against its own objective and structure rather than
/// against the ground truth; accuracy is asserted on the chain above, whose
/// missing pairs are pinned by the observed band.
#[test]
fn random_planar_configurations_complete_to_valid_matrices() {
    for seed in 1..=5u64 {
        let d = random_points(2, 5, seed).squared_distances();
        let mask = random_mask(5, 0.3, seed + 100).expect("valid fraction");
        assert_eq!(mask.missing_pairs(), 3);

        let out = complete_edm(&d, &mask, &config(5.0)).expect("completion");
        assert_structural(&out.completed);
        assert!(out.completed.as_matrix().iter().all(|&v| v >= 0.0 && v.is_finite()));
        assert_eq!(out.decomposition.source_shape(), (5, 5));

        if out.diagnostics.status == SolveStatus::Optimal {
            let problem = CompletionProblem::new(&d, &mask, 5.0).expect("valid problem");
            let basis = problem.basis();
            let truth = basis.transpose() * crate::edm::gram_from_edm(d.as_matrix()) * basis;
            let truth_objective = problem.objective(&truth);
            let tol = 1e-3 * (1.0 + truth_objective.abs());
            assert!(
                out.diagnostics.objective >= truth_objective - tol,
                "seed {seed}: objective {} below ground truth {truth_objective}",
                out.diagnostics.objective
            );
        }
    }
}

#[test]
fn gram_and_decomposition_describe_the_completion() {
    let d = chain_points(6).squared_distances();
    let out = complete_edm(&d, &band_mask(6, 2), &config(5.0)).expect("completion");

    assert!(out.gram.row_sum().norm() < 1e-8 * (1.0 + out.gram.norm()));
    let values = out.decomposition.values();
    for k in 1..values.len() {
        assert!(values[k - 1] >= values[k]);
    }
    let floor = -1e-8 * (1.0 + values[0].abs());
    assert!(values.iter().all(|&v| v >= floor));
    assert_eq!(out.decomposition.source_shape(), (6, 6));
}

#[test]
fn fidelity_does_not_grow_with_lambda() {
    let truth = chain_points(8).squared_distances();
    let noisy = perturb(&truth, 2.0, 11);
    let mask = band_mask(8, 3);

    let errors: Vec<f64> = [2.0, 4.0, 8.0, 16.0]
        .iter()
        .map(|&lambda| {
            let out = complete_edm(&noisy, &mask, &config(lambda)).expect("completion");
            masked_relative_error(&out.completed, &noisy, &mask).expect("same shape")
        })
        .collect();

    for w in errors.windows(2) {
        assert!(w[1] <= w[0] + 1e-4, "fidelity errors {errors:?}");
    }
}

#[test]
fn small_lambda_reports_degraded_status() {
    let d = chain_points(6).squared_distances();
    let cfg = CompletionConfig {
        lambda: 0.05,
        budget: SolveBudget {
            max_iters: 500,
            time_limit_ms: None,
        },
        ..CompletionConfig::default()
    };
    let out = complete_edm(&d, &band_mask(6, 2), &cfg).expect("soft failure");
    assert!(out.is_degraded());
    assert_ne!(out.diagnostics.status, SolveStatus::Optimal);
    assert_structural(&out.completed);
}

#[test]
fn zero_time_budget_times_out() {
    let d = chain_points(5).squared_distances();
    let cfg = CompletionConfig {
        budget: SolveBudget {
            max_iters: 1_000,
            time_limit_ms: Some(0),
        },
        ..CompletionConfig::default()
    };
    let out = complete_edm(&d, &ObservationMask::full(5), &cfg).expect("soft failure");
    assert_eq!(out.diagnostics.status, SolveStatus::TimedOut);
    assert_eq!(out.diagnostics.iterations, 0);
    assert_eq!(out.completed.len(), 5);
}

#[test]
fn cancelled_token_stops_the_solve() {
    let d = chain_points(5).squared_distances();
    let cfg = CompletionConfig::default();
    let token = CancelToken::new();
    token.cancel();
    let out = complete_edm_with(
        &d,
        &ObservationMask::full(5),
        &cfg,
        &NalgebraSpectral::default(),
        &AdmmSdpSolver::new(cfg.solver),
        Some(&token),
    )
    .expect("soft failure");
    assert_eq!(out.diagnostics.status, SolveStatus::Cancelled);
}

#[test]
fn mask_of_wrong_size_is_rejected() {
    let d = chain_points(5).squared_distances();
    let err = complete_edm(&d, &ObservationMask::full(4), &config(2.0)).unwrap_err();
    assert!(matches!(
        err,
        EdmError::Validation(ValidationError::MaskShape { .. })
    ));
}

#[test]
fn non_positive_lambda_is_rejected() {
    let d = chain_points(4).squared_distances();
    let err = complete_edm(&d, &ObservationMask::full(4), &config(-1.0)).unwrap_err();
    assert!(matches!(err, EdmError::InvalidArgument { arg: "lambda", .. }));
}
