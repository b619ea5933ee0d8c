use std::f64::consts::PI;

use rand::Rng;
use rand_distr::{Distribution, Exp1};
use serde::Serialize;

use super::{BivariateCopula, Family, TailDependence, open01, reject_edge, search, validate_fit_input};
use crate::error::{Error, Result};
use crate::math::log_add_exp;
use crate::types::UniformPair;

const THETA_MAX: f64 = 100.0;
/// Search runs over `s` with `theta = 1 + exp(s)`.
const S_MIN: f64 = -13.815_510_557_964_274; // ln(1e-6)

/// Upper-tail dependent extreme-value family, `theta >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GumbelCopula {
    pub theta: f64,
}

impl GumbelCopula {
    pub fn new(theta: f64) -> Result<Self> {
        if !(theta.is_finite() && theta >= 1.0) {
            return Err(Error::InvalidParameter(format!("Gumbel theta must be >= 1, got {theta}")));
        }
        Ok(Self { theta })
    }

    /// Positive alpha-stable draw with Laplace transform `exp(-t^alpha)`.
    fn stable_frailty<R: Rng + ?Sized>(alpha: f64, rng: &mut R) -> f64 {
        let phi = PI * open01(rng);
        let w: f64 = Exp1.sample(rng);
        let a = (alpha * phi).sin() / phi.sin().powf(1.0 / alpha);
        let b = (((1.0 - alpha) * phi).sin() / w).powf((1.0 - alpha) / alpha);
        a * b
    }
}

impl BivariateCopula for GumbelCopula {
    const FAMILY: Family = Family::Gumbel;

    fn fit(obs: &[UniformPair]) -> Result<Self> {
        let tau = validate_fit_input(Self::FAMILY, obs)?;
        if tau < 0.0 {
            return Err(Error::fit(
                Self::FAMILY,
                format!("requires non-negative dependence, sample Kendall tau is {tau:.4}"),
            ));
        }
        let ll = |s: f64| GumbelCopula { theta: 1.0 + s.exp() }.log_likelihood(obs);
        let s_max = (THETA_MAX - 1.0).ln();
        let opt = search(Self::FAMILY, ll, S_MIN, s_max)?;
        reject_edge(Self::FAMILY, opt.x, s_max, "log(theta - 1)")?;
        Self::new(1.0 + opt.x.exp())
    }

    fn log_density(&self, u: f64, v: f64) -> f64 {
        let t = self.theta;
        let (lu, lv) = (-u.ln(), -v.ln());
        let (ln_lu, ln_lv) = (lu.ln(), lv.ln());
        let ln_a = log_add_exp(t * ln_lu, t * ln_lv);
        let w = (ln_a / t).exp();
        -w + lu + lv + (t - 1.0) * (ln_lu + ln_lv) + (1.0 / t - 2.0) * ln_a + (w + t - 1.0).ln()
    }

    fn parameters(&self) -> Vec<f64> {
        vec![self.theta]
    }

    /// Marshall-Olkin: `u = exp(-(E1 / S)^(1/theta))` with a positive stable frailty `S`.
    fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<UniformPair>> {
        let alpha = 1.0 / self.theta;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let s = if alpha < 1.0 { Self::stable_frailty(alpha, rng) } else { 1.0 };
            let e1: f64 = Exp1.sample(rng);
            let e2: f64 = Exp1.sample(rng);
            let u = (-(e1 / s).powf(alpha)).exp();
            let v = (-(e2 / s).powf(alpha)).exp();
            out.push(UniformPair::clamped(u, v));
        }
        Ok(out)
    }

    fn kendall_tau(&self) -> f64 {
        1.0 - 1.0 / self.theta
    }

    fn tail_dependence(&self) -> TailDependence {
        TailDependence { lower: 0.0, upper: 2.0 - 2f64.powf(1.0 / self.theta) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copula::Copula;
    use crate::copula::test_support::*;

    #[test]
    fn theta_one_is_independence() {
        let c = GumbelCopula::new(1.0).unwrap();
        for (u, v) in [(0.1, 0.9), (0.5, 0.5), (0.99, 0.02)] {
            assert!(c.log_density(u, v).abs() < 1e-12);
        }
    }

    #[test]
    fn log_density_matches_closed_form() {
        let c = GumbelCopula::new(2.0).unwrap();
        let (u, v) = (0.3f64, 0.6f64);
        let (lu, lv) = (-u.ln(), -v.ln());
        let a = lu.powi(2) + lv.powi(2);
        let cdf = (-a.sqrt()).exp();
        let direct = cdf / (u * v) * (lu * lv) * a.powf(-1.0) * (1.0 + a.powf(-0.5));
        assert!((c.log_density(u, v) - direct.ln()).abs() < 1e-12);
    }

    #[test]
    fn density_integrates_to_one() {
        assert_density_integrates_to_one(&Copula::Gumbel(GumbelCopula::new(1.5).unwrap()));
    }

    #[test]
    fn sampled_tau_matches_implied() {
        assert_sampled_tau(&Copula::Gumbel(GumbelCopula::new(2.5).unwrap()), 0.04);
    }

    #[test]
    fn rejects_theta_below_one() {
        assert!(GumbelCopula::new(0.9).is_err());
    }
}
