//! Solve control shared by the iterative solvers: status, diagnostics,
//! iteration/time budgets and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Termination status of an iterative solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Residuals dropped below the configured tolerances.
    Optimal,
    /// Iteration budget exhausted before convergence.
    MaxIterations,
    /// Wall-clock budget exhausted.
    TimedOut,
    /// Cancelled through a [`CancelToken`].
    Cancelled,
    /// Iterates grew without bound (the problem looks unbounded for this λ).
    Diverged,
    /// An inner dense decomposition failed to converge.
    NumericalFailure,
}

impl SolveStatus {
    /// Anything but [`SolveStatus::Optimal`].
    pub fn is_degraded(self) -> bool {
        self != Self::Optimal
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Optimal => "optimal",
            Self::MaxIterations => "max_iterations",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
            Self::Diverged => "diverged",
            Self::NumericalFailure => "numerical_failure",
        };
        f.write_str(s)
    }
}

/// Diagnostic record returned next to every solver-backed result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverDiagnostics {
    /// Termination status.
    pub status: SolveStatus,
    /// Objective value of the returned iterate, in the caller's units.
    pub objective: f64,
    /// Iterations performed.
    pub iterations: usize,
    /// Final primal residual (normalised).
    pub primal_residual: f64,
    /// Final dual residual (normalised).
    pub dual_residual: f64,
    /// Wall-clock time spent in the solver.
    pub elapsed: Duration,
}

impl SolverDiagnostics {
    /// True when the solver did not reach its tolerances.
    pub fn is_degraded(&self) -> bool {
        self.status.is_degraded()
    }
}

/// Iteration and wall-clock limits for one solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveBudget {
    /// Maximum outer iterations.
    pub max_iters: usize,
    /// Optional wall-clock limit in milliseconds.
    pub time_limit_ms: Option<u64>,
}

impl Default for SolveBudget {
    fn default() -> Self {
        Self {
            max_iters: 10_000,
            time_limit_ms: Some(30_000),
        }
    }
}

/// Cooperative cancellation flag shared between a caller and a running solve.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, not-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Running solves stop at their next iteration.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-call guard polled by solvers once per iteration.
#[derive(Debug)]
pub struct SolveGuard<'a> {
    started: Instant,
    deadline: Option<Instant>,
    max_iters: usize,
    cancel: Option<&'a CancelToken>,
}

impl<'a> SolveGuard<'a> {
    /// Start the clock for `budget`.
    pub fn new(budget: &SolveBudget, cancel: Option<&'a CancelToken>) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: budget
                .time_limit_ms
                .map(|ms| started + Duration::from_millis(ms)),
            max_iters: budget.max_iters,
            cancel,
        }
    }

    /// Guard without time limit or token.
    pub fn unbounded(max_iters: usize) -> Self {
        Self {
            started: Instant::now(),
            deadline: None,
            max_iters,
            cancel: None,
        }
    }

    /// Iteration cap.
    pub fn max_iters(&self) -> usize {
        self.max_iters
    }

    /// Time since the guard was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// `Some(status)` when the solve must stop now.
    pub fn interrupted(&self) -> Option<SolveStatus> {
        if self.cancel.is_some_and(CancelToken::is_cancelled) {
            return Some(SolveStatus::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(SolveStatus::TimedOut),
            _ => None,
        }
    }
}
