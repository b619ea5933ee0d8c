//! Parametric bivariate copula families.
//!
//! Every family is a small struct implementing [`BivariateCopula`]; the
//! [`Copula`] enum tags a fitted model with its family so that the fit loop,
//! ranking and simulation can treat all five uniformly.

mod clayton;
mod frank;
mod gaussian;
mod gumbel;
mod student_t;

use rand::Rng;
use rand_distr::{Distribution, Open01};
use serde::{Deserialize, Serialize};

pub use clayton::ClaytonCopula;
pub use frank::FrankCopula;
pub use gaussian::GaussianCopula;
pub use gumbel::GumbelCopula;
pub use student_t::StudentTCopula;

use crate::dependence::kendall_tau;
use crate::error::{Error, Result};
use crate::optimize::{Optimum, ScalarOptimum, maximize_bounded, maximize_scalar};
use crate::types::{UniformPair, unzip_pairs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Family {
    Gaussian,
    StudentT,
    Clayton,
    Gumbel,
    Frank,
}

impl Family {
    pub const ALL: [Family; 5] =
        [Family::Gaussian, Family::StudentT, Family::Clayton, Family::Gumbel, Family::Frank];

    pub fn name(self) -> &'static str {
        match self {
            Family::Gaussian => "Gaussian",
            Family::StudentT => "StudentT",
            Family::Clayton => "Clayton",
            Family::Gumbel => "Gumbel",
            Family::Frank => "Frank",
        }
    }

    /// Free parameters counted by the information criteria.
    pub fn parameter_count(self) -> usize {
        match self {
            Family::StudentT => 2,
            _ => 1,
        }
    }

    pub fn fit(self, obs: &[UniformPair]) -> Result<Copula> {
        Ok(match self {
            Family::Gaussian => Copula::Gaussian(GaussianCopula::fit(obs)?),
            Family::StudentT => Copula::StudentT(StudentTCopula::fit(obs)?),
            Family::Clayton => Copula::Clayton(ClaytonCopula::fit(obs)?),
            Family::Gumbel => Copula::Gumbel(GumbelCopula::fit(obs)?),
            Family::Frank => Copula::Frank(FrankCopula::fit(obs)?),
        })
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Lower and upper tail-dependence coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TailDependence {
    pub lower: f64,
    pub upper: f64,
}

impl TailDependence {
    pub const NONE: TailDependence = TailDependence { lower: 0.0, upper: 0.0 };
}

/// Capabilities shared by every family.
pub trait BivariateCopula: Sized {
    const FAMILY: Family;

    /// Maximum-likelihood fit to pseudo-observations.
    fn fit(obs: &[UniformPair]) -> Result<Self>;

    /// Log of the copula density at an interior point.
    fn log_density(&self, u: f64, v: f64) -> f64;

    fn log_likelihood(&self, obs: &[UniformPair]) -> f64 {
        obs.iter().map(|p| self.log_density(p.u, p.v)).sum()
    }

    fn parameters(&self) -> Vec<f64>;

    fn parameter_count(&self) -> usize {
        Self::FAMILY.parameter_count()
    }

    /// Draw `n` pairs, each strictly inside the unit square.
    fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<UniformPair>>;

    /// Kendall's tau implied by the parameters.
    fn kendall_tau(&self) -> f64;

    fn tail_dependence(&self) -> TailDependence;
}

/// A fitted model of any family.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "family")]
pub enum Copula {
    Gaussian(GaussianCopula),
    StudentT(StudentTCopula),
    Clayton(ClaytonCopula),
    Gumbel(GumbelCopula),
    Frank(FrankCopula),
}

macro_rules! dispatch {
    ($self:expr, $c:ident => $body:expr) => {
        match $self {
            Copula::Gaussian($c) => $body,
            Copula::StudentT($c) => $body,
            Copula::Clayton($c) => $body,
            Copula::Gumbel($c) => $body,
            Copula::Frank($c) => $body,
        }
    };
}

impl Copula {
    pub fn family(&self) -> Family {
        match self {
            Copula::Gaussian(_) => Family::Gaussian,
            Copula::StudentT(_) => Family::StudentT,
            Copula::Clayton(_) => Family::Clayton,
            Copula::Gumbel(_) => Family::Gumbel,
            Copula::Frank(_) => Family::Frank,
        }
    }

    pub fn log_density(&self, u: f64, v: f64) -> f64 {
        dispatch!(self, c => c.log_density(u, v))
    }

    pub fn log_likelihood(&self, obs: &[UniformPair]) -> f64 {
        dispatch!(self, c => c.log_likelihood(obs))
    }

    pub fn parameters(&self) -> Vec<f64> {
        dispatch!(self, c => c.parameters())
    }

    pub fn parameter_count(&self) -> usize {
        dispatch!(self, c => c.parameter_count())
    }

    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<UniformPair>> {
        dispatch!(self, c => c.sample(n, rng))
    }

    pub fn kendall_tau(&self) -> f64 {
        dispatch!(self, c => c.kendall_tau())
    }

    pub fn tail_dependence(&self) -> TailDependence {
        dispatch!(self, c => c.tail_dependence())
    }
}

const SEARCH_TOL: f64 = 1e-8;
const SEARCH_MAX_ITER: u64 = 200;
const SIMPLEX_TOL: f64 = 1e-9;
const SIMPLEX_MAX_ITER: u64 = 2_000;

/// Checks common to every family. Returns the sample Kendall tau of (u, v).
pub(crate) fn validate_fit_input(family: Family, obs: &[UniformPair]) -> Result<f64> {
    if obs.len() < 2 {
        return Err(Error::fit(family, format!("need at least 2 observations, found {}", obs.len())));
    }
    if let Some(p) = obs.iter().find(|p| !p.is_interior()) {
        return Err(Error::fit(family, format!("observation ({}, {}) outside the open unit square", p.u, p.v)));
    }
    let (u, v) = unzip_pairs(obs);
    kendall_tau(&u, &v).map_err(|e| Error::fit(family, e.to_string()))
}

/// Golden-section search of a log-likelihood, reporting failures against `family`.
pub(crate) fn search<F>(family: Family, f: F, lo: f64, hi: f64) -> Result<ScalarOptimum>
where
    F: Fn(f64) -> f64,
{
    maximize_scalar(f, lo, hi, SEARCH_TOL, SEARCH_MAX_ITER).map_err(|e| Error::fit(family, e.to_string()))
}

/// Joint simplex search of a multi-parameter log-likelihood over a box.
pub(crate) fn search_joint<F>(family: Family, f: F, start: &[f64], step: &[f64], bounds: &[(f64, f64)]) -> Result<Optimum>
where
    F: Fn(&[f64]) -> f64,
{
    maximize_bounded(f, start, step, bounds, SIMPLEX_TOL, SIMPLEX_MAX_ITER).map_err(|e| Error::fit(family, e.to_string()))
}

/// An optimum pinned to the end of the admissible range is not an interior MLE.
pub(crate) fn reject_edge(family: Family, x: f64, edge: f64, what: &str) -> Result<()> {
    if (x - edge).abs() <= 1e-6 * (1.0 + edge.abs()) {
        return Err(Error::fit(family, format!("{what} reached the bound {edge} of its admissible range")));
    }
    Ok(())
}

pub(crate) fn open01<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    Open01.sample(rng)
}
