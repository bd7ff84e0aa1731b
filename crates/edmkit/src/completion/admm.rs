//! ADMM solver for the completion SDP.
//!
//! Splitting (scaled form), with `b = W ⊙ D`:
//!
//! ```text
//! minimize  −trace(G) + λ‖R‖_F + I_{⪰0}(Z)
//! s.t.      G − Z = 0,   A(G) − R = b
//! ```
//!
//! - G-step: `(I + AᵀA) G = Z − U + Aᵀ(R + b − Y) + I/ρ`, solved matrix-free
//!   by conjugate gradients (the operator does not depend on ρ).
//! - Z-step: eigenvalue clipping onto the PSD cone.
//! - R-step: block soft-thresholding with radius `λ/ρ`.
//!
//! Observed distances are divided by their largest magnitude before solving;
//! the problem is positively homogeneous so the solution scales back exactly.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use super::problem::CompletionProblem;
use crate::solver::{SolveGuard, SolveStatus, SolverDiagnostics};
use crate::spectral::{NalgebraSpectral, SpectralBackend};

const REBALANCE_EVERY: usize = 25;

/// Tuning knobs of [`AdmmSdpSolver`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmmSettings {
    /// Initial penalty parameter ρ.
    pub rho: f64,
    /// Absolute residual tolerance (normalised units).
    pub eps_abs: f64,
    /// Relative residual tolerance.
    pub eps_rel: f64,
    /// Rebalance ρ when primal and dual residuals drift apart.
    pub adaptive_rho: bool,
    /// Relative tolerance of the inner conjugate-gradient solve.
    pub cg_tolerance: f64,
    /// Iteration cap of the inner conjugate-gradient solve.
    pub cg_max_iters: usize,
    /// Normalised trace above which the problem is declared unbounded.
    pub divergence_bound: f64,
}

impl Default for AdmmSettings {
    fn default() -> Self {
        Self {
            rho: 1.0,
            eps_abs: 1e-8,
            eps_rel: 1e-7,
            adaptive_rho: true,
            cg_tolerance: 1e-12,
            cg_max_iters: 500,
            divergence_bound: 1e8,
        }
    }
}

/// Optimal (or best available) decision matrix plus solver diagnostics.
#[derive(Debug, Clone)]
pub struct SdpSolution {
    /// Decision matrix `G*`, `(n-1) × (n-1)`, positive semidefinite.
    pub decision: DMatrix<f64>,
    /// Status, objective and residuals of the solve.
    pub diagnostics: SolverDiagnostics,
}

/// Conic solver capability consumed by the completion engine.
pub trait SdpSolver: Send + Sync {
    /// Solve `problem`, polling `guard` for timeout/cancellation. Always
    /// returns the best available iterate; non-optimal termination is
    /// reported through the diagnostics status.
    fn solve(&self, problem: &CompletionProblem, guard: &SolveGuard<'_>) -> SdpSolution;
}

/// Default [`SdpSolver`]: ADMM with residual balancing.
#[derive(Debug, Clone, Default)]
pub struct AdmmSdpSolver {
    settings: AdmmSettings,
    spectral: NalgebraSpectral,
}

impl AdmmSdpSolver {
    /// Solver with the given settings.
    pub fn new(settings: AdmmSettings) -> Self {
        Self {
            settings,
            spectral: NalgebraSpectral::default(),
        }
    }

    /// Current settings.
    pub fn settings(&self) -> &AdmmSettings {
        &self.settings
    }

    /// Eigenvalue clipping onto the PSD cone.
    fn project_psd(&self, m: &DMatrix<f64>) -> Option<DMatrix<f64>> {
        let dec = self.spectral.symmetric_eigen(m).ok()?;
        let v = dec.left();
        let mut scaled = v.clone();
        for (mut col, &ev) in scaled.column_iter_mut().zip(dec.values().iter()) {
            col *= ev.max(0.0);
        }
        Some(scaled * v.transpose())
    }
}

struct AdmmState {
    g: DMatrix<f64>,
    z: DMatrix<f64>,
    u: DMatrix<f64>,
    r: DMatrix<f64>,
    y: DMatrix<f64>,
    rho: f64,
}

impl SdpSolver for AdmmSdpSolver {
    fn solve(&self, problem: &CompletionProblem, guard: &SolveGuard<'_>) -> SdpSolution {
        let cfg = &self.settings;
        let m = problem.reduced_dim();
        let n = problem.n();

        let scale = problem.target().amax();
        let scale = if scale > 0.0 { scale } else { 1.0 };
        let work = problem.rescaled(scale);
        let b = work.target();
        let identity = DMatrix::<f64>::identity(m, m);

        let mut st = AdmmState {
            g: DMatrix::zeros(m, m),
            z: DMatrix::zeros(m, m),
            u: DMatrix::zeros(m, m),
            r: DMatrix::zeros(n, n),
            y: DMatrix::zeros(n, n),
            rho: cfg.rho.max(f64::MIN_POSITIVE),
        };
        let lambda = work.lambda();
        let normal_op = |x: &DMatrix<f64>| x + work.adjoint(&work.apply(x));

        let mut status = SolveStatus::MaxIterations;
        let mut iterations = 0usize;
        let mut r_prim = f64::INFINITY;
        let mut r_dual = f64::INFINITY;

        for iter in 0..guard.max_iters() {
            if let Some(s) = guard.interrupted() {
                status = s;
                break;
            }
            iterations = iter + 1;

            // G-step
            let rhs = &st.z - &st.u + work.adjoint(&(&st.r + b - &st.y)) + &identity / st.rho;
            st.g = conjugate_gradient(
                &normal_op,
                &rhs,
                st.g.clone(),
                cfg.cg_tolerance,
                cfg.cg_max_iters,
            );

            // Z-step
            let z_prev = std::mem::replace(&mut st.z, DMatrix::zeros(m, m));
            let Some(z) = self.project_psd(&(&st.g + &st.u)) else {
                st.z = z_prev;
                status = SolveStatus::NumericalFailure;
                break;
            };
            st.z = z;

            // R-step
            let ag = work.apply(&st.g);
            let t = &ag - b + &st.y;
            let r_prev = std::mem::replace(&mut st.r, block_shrink(&t, lambda / st.rho));

            // Dual updates
            let prim_gz = &st.g - &st.z;
            let prim_ar = &ag - &st.r - b;
            st.u += &prim_gz;
            st.y += &prim_ar;

            r_prim = (prim_gz.norm_squared() + prim_ar.norm_squared()).sqrt();
            let dz = &st.z - &z_prev;
            let dr = &st.r - &r_prev;
            r_dual = st.rho * (&dz + work.adjoint(&dr)).norm();

            let p_scale = (st.g.norm_squared() + ag.norm_squared())
                .sqrt()
                .max((st.z.norm_squared() + st.r.norm_squared()).sqrt())
                .max(b.norm());
            let d_scale = st.rho * (&st.u + work.adjoint(&st.y)).norm();
            let eps_pri = cfg.eps_abs * ((m * m + n * n) as f64).sqrt() + cfg.eps_rel * p_scale;
            let eps_dual = cfg.eps_abs * (m as f64) + cfg.eps_rel * d_scale;

            if r_prim <= eps_pri && r_dual <= eps_dual {
                status = SolveStatus::Optimal;
                break;
            }
            if !st.z.trace().is_finite() || st.z.trace() > cfg.divergence_bound {
                status = SolveStatus::Diverged;
                break;
            }

            if cfg.adaptive_rho && iterations % REBALANCE_EVERY == 0 {
                rebalance(&mut st, r_prim, r_dual);
            }
        }

        let decision = st.z * scale;
        let objective = problem.objective(&decision);
        tracing::debug!(
            "ADMM completion finished after {} iterations: status={}, objective={:.6e}, r_prim={:.2e}, r_dual={:.2e}",
            iterations,
            status,
            objective,
            r_prim,
            r_dual
        );

        SdpSolution {
            decision,
            diagnostics: SolverDiagnostics {
                status,
                objective,
                iterations,
                primal_residual: r_prim,
                dual_residual: r_dual,
                elapsed: guard.elapsed(),
            },
        }
    }
}

/// Residual balancing (Boyd et al., §3.4.1) with μ = 10, τ = 2.
fn rebalance(st: &mut AdmmState, r_prim: f64, r_dual: f64) {
    const MU: f64 = 10.0;
    const TAU: f64 = 2.0;
    if r_prim > MU * r_dual {
        st.rho *= TAU;
        st.u /= TAU;
        st.y /= TAU;
    } else if r_dual > MU * r_prim {
        st.rho /= TAU;
        st.u *= TAU;
        st.y *= TAU;
    }
}

/// Proximal operator of `radius · ‖·‖_F`.
fn block_shrink(t: &DMatrix<f64>, radius: f64) -> DMatrix<f64> {
    let norm = t.norm();
    if norm <= radius {
        DMatrix::zeros(t.nrows(), t.ncols())
    } else {
        t * (1.0 - radius / norm)
    }
}

/// Conjugate gradients for a symmetric positive definite operator on matrices
/// under the Frobenius inner product.
pub(crate) fn conjugate_gradient(
    op: &impl Fn(&DMatrix<f64>) -> DMatrix<f64>,
    rhs: &DMatrix<f64>,
    x0: DMatrix<f64>,
    tolerance: f64,
    max_iters: usize,
) -> DMatrix<f64> {
    let mut x = x0;
    let target = tolerance * rhs.norm();
    let mut r = rhs - op(&x);
    let mut rs = r.norm_squared();
    if rs.sqrt() <= target {
        return x;
    }
    let mut p = r.clone();
    for _ in 0..max_iters {
        let ap = op(&p);
        let curvature = p.dot(&ap);
        if curvature <= 0.0 || !curvature.is_finite() {
            break;
        }
        let alpha = rs / curvature;
        x += &p * alpha;
        r -= &ap * alpha;
        let rs_next = r.norm_squared();
        if rs_next.sqrt() <= target {
            break;
        }
        p = &r + &p * (rs_next / rs);
        rs = rs_next;
    }
    x
}
