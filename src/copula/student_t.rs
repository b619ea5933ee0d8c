use rand::Rng;
use rand_distr::{ChiSquared, Distribution, StandardNormal};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::function::gamma::ln_gamma;

use super::gaussian::{RHO_BOUND, check_rho};
use super::{BivariateCopula, Family, TailDependence, reject_edge, search_joint, validate_fit_input};
use crate::error::{Error, Result};
use crate::types::UniformPair;

const NU_MIN: f64 = 1.0;
const NU_MAX: f64 = 100.0;
const NU_START: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StudentTCopula {
    pub rho: f64,
    /// Degrees of freedom.
    pub nu: f64,
}

fn t_dist(nu: f64) -> Result<StudentsT> {
    StudentsT::new(0.0, 1.0, nu).map_err(|e| Error::InvalidParameter(format!("degrees of freedom {nu}: {e}")))
}

fn t_scores(obs: &[UniformPair], nu: f64) -> Result<Vec<(f64, f64)>> {
    let t = t_dist(nu)?;
    Ok(obs.iter().map(|p| (t.inverse_cdf(p.u), t.inverse_cdf(p.v))).collect())
}

/// Log density given the t scores of (u, v).
fn log_density_scores(rho: f64, nu: f64, x: f64, y: f64) -> f64 {
    let q = 1.0 - rho * rho;
    let norm = ln_gamma((nu + 2.0) / 2.0) + ln_gamma(nu / 2.0) - 2.0 * ln_gamma((nu + 1.0) / 2.0);
    let joint = (1.0 + (x * x + y * y - 2.0 * rho * x * y) / (nu * q)).ln();
    let margins = (1.0 + x * x / nu).ln() + (1.0 + y * y / nu).ln();
    norm - 0.5 * q.ln() - 0.5 * (nu + 2.0) * joint + 0.5 * (nu + 1.0) * margins
}

fn log_likelihood_scores(rho: f64, nu: f64, scores: &[(f64, f64)]) -> f64 {
    scores.iter().map(|&(x, y)| log_density_scores(rho, nu, x, y)).sum()
}

impl StudentTCopula {
    pub fn new(rho: f64, nu: f64) -> Result<Self> {
        check_rho(rho)?;
        if !(NU_MIN..=NU_MAX).contains(&nu) {
            return Err(Error::InvalidParameter(format!("nu must lie in [{NU_MIN}, {NU_MAX}], got {nu}")));
        }
        Ok(Self { rho, nu })
    }
}

impl BivariateCopula for StudentTCopula {
    const FAMILY: Family = Family::StudentT;

    /// Joint maximisation over `(rho, ln nu)` from the Kendall-tau inversion
    /// `rho = sin(pi * tau / 2)` and `nu = 4`.
    fn fit(obs: &[UniformPair]) -> Result<Self> {
        let tau = validate_fit_input(Self::FAMILY, obs)?;
        let rho0 = (std::f64::consts::FRAC_PI_2 * tau).sin().clamp(-0.95, 0.95);
        let ll = |p: &[f64]| {
            let nu = p[1].exp();
            match t_scores(obs, nu) {
                Ok(scores) => log_likelihood_scores(p[0], nu, &scores),
                Err(_) => f64::NEG_INFINITY,
            }
        };
        let step = [if rho0 > 0.0 { -0.05 } else { 0.05 }, 0.5];
        let bounds = [(-RHO_BOUND, RHO_BOUND), (NU_MIN.ln(), NU_MAX.ln())];
        let opt = search_joint(Self::FAMILY, ll, &[rho0, NU_START.ln()], &step, &bounds)?;
        let (rho, nu) = (opt.params[0], opt.params[1].exp().clamp(NU_MIN, NU_MAX));
        reject_edge(Self::FAMILY, rho, RHO_BOUND, "correlation")?;
        reject_edge(Self::FAMILY, rho, -RHO_BOUND, "correlation")?;
        Self::new(rho, nu)
    }

    fn log_density(&self, u: f64, v: f64) -> f64 {
        match t_dist(self.nu) {
            Ok(t) => log_density_scores(self.rho, self.nu, t.inverse_cdf(u), t.inverse_cdf(v)),
            Err(_) => f64::NAN,
        }
    }

    fn log_likelihood(&self, obs: &[UniformPair]) -> f64 {
        match t_scores(obs, self.nu) {
            Ok(scores) => log_likelihood_scores(self.rho, self.nu, &scores),
            Err(_) => f64::NAN,
        }
    }

    fn parameters(&self) -> Vec<f64> {
        vec![self.rho, self.nu]
    }

    fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<UniformPair>> {
        let t = t_dist(self.nu)?;
        let chi2 = ChiSquared::new(self.nu)
            .map_err(|e| Error::InvalidParameter(format!("chi-square with {} dof: {e}", self.nu)))?;
        let s = (1.0 - self.rho * self.rho).sqrt();
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let z1: f64 = StandardNormal.sample(rng);
            let z2: f64 = StandardNormal.sample(rng);
            let w = (self.nu / chi2.sample(rng)).sqrt();
            out.push(UniformPair::clamped(t.cdf(z1 * w), t.cdf((self.rho * z1 + s * z2) * w)));
        }
        Ok(out)
    }

    fn kendall_tau(&self) -> f64 {
        2.0 / std::f64::consts::PI * self.rho.asin()
    }

    /// Symmetric: `2 t_{nu+1}(-sqrt((nu + 1)(1 - rho) / (1 + rho)))`.
    fn tail_dependence(&self) -> TailDependence {
        let arg = -((self.nu + 1.0) * (1.0 - self.rho) / (1.0 + self.rho)).sqrt();
        let lambda = t_dist(self.nu + 1.0).map(|t| 2.0 * t.cdf(arg)).unwrap_or(0.0);
        TailDependence { lower: lambda, upper: lambda }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copula::test_support::*;
    use crate::copula::{Copula, GaussianCopula};

    #[test]
    fn large_nu_approaches_gaussian() {
        let t = StudentTCopula::new(0.5, 100.0).unwrap();
        let g = GaussianCopula::new(0.5).unwrap();
        for (u, v) in [(0.3, 0.4), (0.5, 0.5), (0.8, 0.7)] {
            assert!((t.log_density(u, v) - g.log_density(u, v)).abs() < 0.02);
        }
    }

    #[test]
    fn density_integrates_to_one() {
        assert_density_integrates_to_one(&Copula::StudentT(StudentTCopula::new(0.3, 8.0).unwrap()));
    }

    #[test]
    fn sampled_tau_matches_implied() {
        assert_sampled_tau(&Copula::StudentT(StudentTCopula::new(0.5, 4.0).unwrap()), 0.04);
    }

    #[test]
    fn tail_dependence_is_symmetric_and_positive() {
        let td = StudentTCopula::new(0.5, 4.0).unwrap().tail_dependence();
        assert_eq!(td.lower, td.upper);
        assert!(td.lower > 0.1 && td.lower < 0.5);
    }

    #[test]
    fn reports_two_parameters() {
        let c = StudentTCopula::new(0.2, 6.0).unwrap();
        assert_eq!(c.parameter_count(), 2);
        assert_eq!(c.parameters(), vec![0.2, 6.0]);
    }

    #[test]
    fn joint_fit_recovers_correlation_and_heavy_tails() {
        let truth = StudentTCopula::new(0.5, 3.0).unwrap();
        let obs = ranked_sample(&Copula::StudentT(truth), 1_500);
        let fitted = StudentTCopula::fit(&obs).unwrap();
        assert!((fitted.rho - 0.5).abs() < 0.06, "rho {}", fitted.rho);
        assert!(fitted.nu > 1.5 && fitted.nu < 8.0, "nu {}", fitted.nu);
    }

    #[test]
    fn joint_fit_is_no_worse_than_any_fixed_nu() {
        let obs = ranked_sample(&Copula::StudentT(StudentTCopula::new(0.7, 5.0).unwrap()), 600);
        let fitted = StudentTCopula::fit(&obs).unwrap();
        let best = fitted.log_likelihood(&obs);
        for nu in [2.0, 5.0, 20.0] {
            let fixed = StudentTCopula::new(fitted.rho, nu).unwrap().log_likelihood(&obs);
            assert!(best >= fixed - 1e-3, "nu {nu}: {fixed} beats joint optimum {best}");
        }
    }

    #[test]
    fn rejects_degrees_of_freedom_outside_range() {
        assert!(StudentTCopula::new(0.2, 0.5).is_err());
        assert!(StudentTCopula::new(0.2, 500.0).is_err());
    }
}
