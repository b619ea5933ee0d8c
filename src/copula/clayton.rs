use rand::Rng;
use serde::Serialize;

use super::{BivariateCopula, Family, TailDependence, open01, reject_edge, search, validate_fit_input};
use crate::error::{Error, Result};
use crate::math::log1pexp;
use crate::types::UniformPair;

const THETA_MIN: f64 = 1e-4;
const THETA_MAX: f64 = 100.0;

/// Lower-tail dependent Archimedean family, `theta > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClaytonCopula {
    pub theta: f64,
}

impl ClaytonCopula {
    pub fn new(theta: f64) -> Result<Self> {
        if !(theta.is_finite() && theta > 0.0) {
            return Err(Error::InvalidParameter(format!("Clayton theta must be > 0, got {theta}")));
        }
        Ok(Self { theta })
    }
}

/// `ln(u^-theta + v^-theta - 1)` without overflowing for small u, v.
fn log_generator_sum(theta: f64, ln_u: f64, ln_v: f64) -> f64 {
    let a = -theta * ln_u;
    let b = -theta * ln_v;
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    hi + ((lo - hi).exp() - (-hi).exp()).ln_1p()
}

impl BivariateCopula for ClaytonCopula {
    const FAMILY: Family = Family::Clayton;

    fn fit(obs: &[UniformPair]) -> Result<Self> {
        let tau = validate_fit_input(Self::FAMILY, obs)?;
        if tau <= 0.0 {
            return Err(Error::fit(
                Self::FAMILY,
                format!("requires positive dependence, sample Kendall tau is {tau:.4}"),
            ));
        }
        let ll = |s: f64| ClaytonCopula { theta: s.exp() }.log_likelihood(obs);
        let opt = search(Self::FAMILY, ll, THETA_MIN.ln(), THETA_MAX.ln())?;
        reject_edge(Self::FAMILY, opt.x, THETA_MAX.ln(), "log theta")?;
        Self::new(opt.x.exp())
    }

    fn log_density(&self, u: f64, v: f64) -> f64 {
        let t = self.theta;
        let (ln_u, ln_v) = (u.ln(), v.ln());
        (1.0 + t).ln() - (1.0 + t) * (ln_u + ln_v) - (2.0 + 1.0 / t) * log_generator_sum(t, ln_u, ln_v)
    }

    fn parameters(&self) -> Vec<f64> {
        vec![self.theta]
    }

    /// Conditional inversion of `C(v | u)`, evaluated in log space.
    fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<UniformPair>> {
        let t = self.theta;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let u = open01(rng);
            let w = open01(rng);
            let z = -t * u.ln() + (-t / (1.0 + t) * w.ln()).exp_m1().ln();
            let v = (-log1pexp(z) / t).exp();
            out.push(UniformPair::clamped(u, v));
        }
        Ok(out)
    }

    fn kendall_tau(&self) -> f64 {
        self.theta / (self.theta + 2.0)
    }

    fn tail_dependence(&self) -> TailDependence {
        TailDependence { lower: 2f64.powf(-1.0 / self.theta), upper: 0.0 }
    }
}
