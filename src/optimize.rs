//! Bounded maximisation of the copula log-likelihoods.
//!
//! Thin wrappers around argmin solvers: golden-section search for the
//! one-parameter families and Nelder-Mead for the joint Student-t fit. The
//! solvers minimise, so every objective is negated on the way in and any
//! non-finite value (NaN or either infinity) becomes a `+inf` cost.

use argmin::core::{CostFunction, Executor, State, TerminationReason, TerminationStatus};
use argmin::solver::goldensectionsearch::GoldenSectionSearch;
use argmin::solver::neldermead::NelderMead;

/// Result of a scalar search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarOptimum {
    pub x: f64,
    pub value: f64,
    pub iterations: u64,
}

/// Result of a multi-parameter search.
#[derive(Debug, Clone, PartialEq)]
pub struct Optimum {
    pub params: Vec<f64>,
    pub value: f64,
    pub iterations: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptimizeError {
    InvalidBracket { lo: f64, hi: f64 },
    InvalidStart(String),
    NotConverged { iterations: u64 },
    NonFiniteObjective,
    Solver(String),
}

impl std::fmt::Display for OptimizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBracket { lo, hi } => write!(f, "invalid search interval [{lo}, {hi}]"),
            Self::InvalidStart(msg) => write!(f, "invalid starting point: {msg}"),
            Self::NotConverged { iterations } => write!(f, "no convergence after {iterations} iterations"),
            Self::NonFiniteObjective => write!(f, "objective is not finite anywhere on the search path"),
            Self::Solver(msg) => write!(f, "solver failed: {msg}"),
        }
    }
}

impl From<argmin::core::Error> for OptimizeError {
    fn from(e: argmin::core::Error) -> Self {
        OptimizeError::Solver(e.to_string())
    }
}

fn to_cost(value: f64) -> f64 {
    if value.is_finite() { -value } else { f64::INFINITY }
}

fn converged(status: &TerminationStatus) -> bool {
    matches!(
        status,
        TerminationStatus::Terminated(TerminationReason::SolverConverged)
            | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
    )
}

fn clamp_params(params: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    params.iter().zip(bounds).map(|(&x, &(lo, hi))| x.clamp(lo, hi)).collect()
}

/// The golden-section tolerance is relative to `|x|`, so the solver sees a
/// coordinate shifted to start at 1 and never approaches zero.
struct ShiftedScalar<F> {
    f: F,
    lo: f64,
}

impl<F: Fn(f64) -> f64> CostFunction for ShiftedScalar<F> {
    type Param = f64;
    type Output = f64;

    fn cost(&self, y: &f64) -> Result<f64, argmin::core::Error> {
        Ok(to_cost((self.f)(self.lo + y - 1.0)))
    }
}

/// Golden-section search for the maximum of `f` on `[lo, hi]`.
///
/// `f` should be unimodal on the interval; for the copula log-likelihoods in
/// one parameter that holds in practice.
pub fn maximize_scalar<F>(f: F, lo: f64, hi: f64, tol: f64, max_iter: u64) -> Result<ScalarOptimum, OptimizeError>
where
    F: Fn(f64) -> f64,
{
    if !(lo.is_finite() && hi.is_finite() && lo < hi) {
        return Err(OptimizeError::InvalidBracket { lo, hi });
    }
    let top = hi - lo + 1.0;
    let solver = GoldenSectionSearch::new(1.0, top)?.with_tolerance(tol)?;
    let res = Executor::new(ShiftedScalar { f, lo }, solver)
        .configure(|state| state.param(0.5 * (1.0 + top)).max_iters(max_iter))
        .run()?;

    let state = res.state();
    let iterations = state.get_iter();
    if !converged(state.get_termination_status()) {
        return Err(OptimizeError::NotConverged { iterations });
    }
    let cost = state.get_best_cost();
    let y = state.get_best_param().copied().ok_or(OptimizeError::NonFiniteObjective)?;
    if !cost.is_finite() {
        return Err(OptimizeError::NonFiniteObjective);
    }
    Ok(ScalarOptimum { x: (lo + y - 1.0).clamp(lo, hi), value: -cost, iterations })
}

struct BoxedObjective<'a, F> {
    f: F,
    bounds: &'a [(f64, f64)],
}

impl<F: Fn(&[f64]) -> f64> CostFunction for BoxedObjective<'_, F> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Vec<f64>) -> Result<f64, argmin::core::Error> {
        Ok(to_cost((self.f)(&clamp_params(params, self.bounds))))
    }
}

/// Nelder-Mead maximum of `f` over a box.
///
/// The initial simplex is `start` plus one vertex per coordinate displaced by
/// `step`. Points outside the box are clamped before evaluation and so is the
/// reported optimum.
pub fn maximize_bounded<F>(
    f: F,
    start: &[f64],
    step: &[f64],
    bounds: &[(f64, f64)],
    tol: f64,
    max_iter: u64,
) -> Result<Optimum, OptimizeError>
where
    F: Fn(&[f64]) -> f64,
{
    if start.len() != bounds.len() || step.len() != bounds.len() {
        return Err(OptimizeError::InvalidStart(format!(
            "{} start values and {} steps for {} bounds",
            start.len(),
            step.len(),
            bounds.len()
        )));
    }
    if let Some(&(lo, hi)) = bounds.iter().find(|(lo, hi)| !(lo.is_finite() && hi.is_finite() && lo < hi)) {
        return Err(OptimizeError::InvalidBracket { lo, hi });
    }
    if step.iter().any(|s| !s.is_finite() || *s == 0.0) {
        return Err(OptimizeError::InvalidStart("simplex steps must be finite and non-zero".into()));
    }

    let origin = clamp_params(start, bounds);
    let mut simplex = vec![origin.clone()];
    for (i, s) in step.iter().enumerate() {
        let mut vertex = origin.clone();
        vertex[i] += s;
        simplex.push(vertex);
    }

    let solver = NelderMead::new(simplex).with_sd_tolerance(tol)?;
    let res = Executor::new(BoxedObjective { f, bounds }, solver)
        .configure(|state| state.max_iters(max_iter))
        .run()?;

    let state = res.state();
    let iterations = state.get_iter();
    if !converged(state.get_termination_status()) {
        return Err(OptimizeError::NotConverged { iterations });
    }
    let cost = state.get_best_cost();
    let best = state.get_best_param().ok_or(OptimizeError::NonFiniteObjective)?;
    if !cost.is_finite() {
        return Err(OptimizeError::NonFiniteObjective);
    }
    Ok(Optimum { params: clamp_params(best, bounds), value: -cost, iterations })
}
