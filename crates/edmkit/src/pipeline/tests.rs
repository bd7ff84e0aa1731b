use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::*;
use crate::completion::{CompletionProblem, SdpSolution};
use crate::denoise::NoiseModel;
use crate::edm::relative_error;
use crate::solver::{SolveGuard, SolveStatus, SolverDiagnostics};
use crate::spectral::SpectralDecomposition;
use crate::synth::{random_mask, random_points};
use crate::test_utils::{band_mask, chain_points};
use approx::assert_relative_eq;

fn max_abs_diff(a: &PointSet, b: &PointSet) -> f64 {
    (a.coords() - b.coords()).amax()
}

#[test]
fn embed_then_align_recovers_random_configurations() {
    let pipeline = EdmPipeline::new();
    for (dim, n, seed) in [(1, 3, 1), (2, 4, 2), (2, 12, 3), (3, 5, 4), (3, 20, 5)] {
        let truth = random_points(dim, n, seed);
        let x = pipeline.embed(&truth.squared_distances(), dim).expect("valid EDM");
        let fit = pipeline.align(&x, &truth).expect("same shape");
        let rel = (fit.aligned.coords() - truth.coords()).norm() / truth.centered().norm();
        assert!(rel < 1e-6, "dim {dim}, n {n}: relative residual {rel:.3e}");
    }
}

#[test]
fn full_mask_completion_matches_input() {
    let truth = random_points(2, 7, 12).squared_distances();
    let out = EdmPipeline::new()
        .complete(&truth, &ObservationMask::full(7))
        .expect("completion");
    assert!(relative_error(out.completed.as_matrix(), truth.as_matrix()) < 1e-3);
}

#[test]
fn localize_chain_from_anchors() {
    let n = 8;
    let truth = chain_points(n);
    let d = truth.squared_distances();
    let anchors = [0, 3, 7];
    let anchor_coords = truth.select(&anchors).expect("in range");

    let mut pipeline = EdmPipeline::new();
    pipeline.config_mut().completion.lambda = 5.0;
    let loc = pipeline
        .localize(&d, &band_mask(n, 3), 2, &anchors, &anchor_coords)
        .expect("localize");

    assert_eq!((loc.points.dim(), loc.points.len()), (2, n));
    let err = max_abs_diff(&loc.points, &truth);
    assert!(err < 0.1, "max coordinate error {err:.3e}");
}

#[test]
fn localize_random_configuration_with_full_mask() {
    let truth = random_points(2, 9, 33);
    let anchors = [1, 4, 6, 8];
    let anchor_coords = truth.select(&anchors).expect("in range");
    let loc = EdmPipeline::new()
        .localize(
            &truth.squared_distances(),
            &ObservationMask::full(9),
            2,
            &anchors,
            &anchor_coords,
        )
        .expect("localize");
    let err = max_abs_diff(&loc.points, &truth);
    assert!(err < 1e-2, "max coordinate error {err:.3e}");
    assert!(loc.anchor_fit.residual < 1e-4);
}

#[test]
fn localize_rejects_bad_anchors_before_solving() {
    let truth = random_points(2, 5, 1);
    let d = truth.squared_distances();
    let mask = ObservationMask::full(5);
    let pipeline = EdmPipeline::new().with_sdp_solver(Box::new(Unreachable));

    let coords = |k: usize| PointSet::new(DMatrix::zeros(2, k));
    let cases: Vec<(Vec<usize>, PointSet)> = vec![
        (vec![], coords(0)),
        (vec![0, 5], coords(2)),
        (vec![1, 1], coords(2)),
        (vec![0, 1, 2], coords(2)),
    ];
    for (anchors, anchor_coords) in cases {
        let err = pipeline
            .localize(&d, &mask, 2, &anchors, &anchor_coords)
            .unwrap_err();
        assert!(
            matches!(
                err,
                EdmError::InvalidArgument { arg: "anchors", .. } | EdmError::DimensionMismatch { .. }
            ),
            "anchors {anchors:?}: {err}"
        );
    }
}

#[test]
fn random_mask_completion_keeps_structure() {
    let truth = random_points(2, 6, 8).squared_distances();
    let mask = random_mask(6, 0.2, 9).expect("valid fraction");
    assert_eq!(mask.missing_pairs(), 3);

    let out = EdmPipeline::new().complete(&truth, &mask).expect("completion");
    let m = out.completed.as_matrix();
    for i in 0..6 {
        assert_eq!(m[(i, i)], 0.0);
        for j in 0..6 {
            assert_eq!(m[(i, j)], m[(j, i)]);
            assert!(m[(i, j)] >= 0.0);
        }
    }
}

#[test]
fn denoise_uses_configured_noise_model() {
    let d = random_points(2, 10, 4).squared_distances();
    let mut pipeline = EdmPipeline::new();
    assert!(pipeline.denoise(&d, 2).expect("gaussian").diagnostics.is_none());

    pipeline.config_mut().denoise.noise_model = NoiseModel::Sparse;
    let out = pipeline.denoise(&d, 2).expect("sparse");
    assert!(out.diagnostics.is_some());
    assert_eq!(out.matrix.len(), 10);

    let token = CancelToken::new();
    token.cancel();
    assert!(pipeline
        .denoise_with_cancel(&d, 2, &token)
        .expect("soft failure")
        .is_degraded());
}

#[test]
fn cancelled_completion_is_reported_not_raised() {
    let d = chain_points(5).squared_distances();
    let token = CancelToken::new();
    token.cancel();
    let out = EdmPipeline::new()
        .complete_with_cancel(&d, &ObservationMask::full(5), &token)
        .expect("soft failure");
    assert_eq!(out.diagnostics.status, SolveStatus::Cancelled);
}

#[test]
fn validation_uses_configured_tolerance() {
    let mut m = random_points(2, 4, 2).squared_distances().into_inner();
    m[(0, 1)] += 1e-6;
    let mut pipeline = EdmPipeline::new();
    assert!(matches!(
        pipeline.distance_matrix(m.clone()),
        Err(EdmError::Validation(crate::ValidationError::Asymmetric { .. }))
    ));
    pipeline.config_mut().validation.symmetry_tolerance = 1e-4;
    assert!(pipeline.distance_matrix(m).is_ok());
}

#[test]
fn posterior_request_carries_observed_distances() {
    let truth = PointSet::from_rows(&[[0.0, 0.0], [3.0, 0.0], [0.0, 4.0]]);
    let d = truth.squared_distances();
    let req = EdmPipeline::new()
        .posterior_request(truth.clone(), &d, &ObservationMask::full(3), 0.1, 0.05)
        .expect("valid request");
    assert_eq!(req.observations().len(), 3);
    assert_relative_eq!(req.observations()[2].distance, 5.0);
    assert_eq!(req.strategy(), EdmConfig::default().posterior);
    assert!(req.residuals(&truth).expect("same shape").iter().all(|r| r.abs() < 1e-12));

    let short = PointSet::from_rows(&[[0.0, 0.0], [1.0, 0.0]]);
    assert!(EdmPipeline::new()
        .posterior_request(short, &d, &ObservationMask::full(3), 0.1, 0.05)
        .is_err());
}

// ── Injected capabilities ──────────────────────────────────────────────────

struct CountingSpectral {
    inner: NalgebraSpectral,
    calls: Arc<AtomicUsize>,
}

impl SpectralBackend for CountingSpectral {
    fn symmetric_eigen(&self, m: &DMatrix<f64>) -> Result<SpectralDecomposition> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.symmetric_eigen(m)
    }

    fn svd(&self, m: &DMatrix<f64>) -> Result<SpectralDecomposition> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.svd(m)
    }
}

/// Returns the zero decision with a fixed status.
struct FixedStatus(SolveStatus);

impl SdpSolver for FixedStatus {
    fn solve(&self, problem: &CompletionProblem, guard: &SolveGuard<'_>) -> SdpSolution {
        let m = problem.reduced_dim();
        let decision = DMatrix::zeros(m, m);
        SdpSolution {
            diagnostics: SolverDiagnostics {
                status: self.0,
                objective: problem.objective(&decision),
                iterations: 1,
                primal_residual: f64::NAN,
                dual_residual: f64::NAN,
                elapsed: guard.elapsed(),
            },
            decision,
        }
    }
}

struct Unreachable;

impl SdpSolver for Unreachable {
    fn solve(&self, _problem: &CompletionProblem, _guard: &SolveGuard<'_>) -> SdpSolution {
        panic!("solver must not run for invalid input");
    }
}

#[test]
fn injected_spectral_backend_serves_every_stage() {
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = EdmPipeline::new().with_spectral_backend(Box::new(CountingSpectral {
        inner: NalgebraSpectral::default(),
        calls: Arc::clone(&calls),
    }));
    let truth = random_points(2, 5, 3);
    let x = pipeline.embed(&truth.squared_distances(), 2).expect("embed");
    pipeline.align(&x, &truth).expect("align");
    pipeline.denoise(&truth.squared_distances(), 2).expect("denoise");
    assert_eq!(calls.load(Ordering::Relaxed), 3);
}

#[test]
fn degraded_solver_status_reaches_the_caller() {
    let pipeline = EdmPipeline::new().with_sdp_solver(Box::new(FixedStatus(SolveStatus::Diverged)));
    let d = chain_points(4).squared_distances();
    let out = pipeline
        .complete(&d, &ObservationMask::full(4))
        .expect("soft failure");
    assert!(out.is_degraded());
    assert_eq!(out.diagnostics.status, SolveStatus::Diverged);
    assert_eq!(out.completed.as_matrix(), &DMatrix::zeros(4, 4));
    assert_relative_eq!(out.diagnostics.objective, -2.0 * d.as_matrix().norm());
}

#[test]
fn pipeline_debug_lists_injections() {
    let pipeline = EdmPipeline::new().with_sdp_solver(Box::new(FixedStatus(SolveStatus::Optimal)));
    let text = format!("{pipeline:?}");
    assert!(text.contains("custom_sdp_solver: true"));
    assert!(text.contains("custom_robust_decomposer: false"));
}
