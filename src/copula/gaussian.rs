use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

use super::{BivariateCopula, Family, TailDependence, reject_edge, search, validate_fit_input};
use crate::error::{Error, Result};
use crate::types::UniformPair;

/// Largest admissible |rho| for the elliptical families.
pub(crate) const RHO_BOUND: f64 = 0.9999;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GaussianCopula {
    pub rho: f64,
}

pub(crate) fn standard_normal() -> Normal {
    Normal::new(0.0, 1.0).expect("unit normal parameters are valid")
}

pub(crate) fn check_rho(rho: f64) -> Result<()> {
    if !rho.is_finite() || rho.abs() > RHO_BOUND {
        return Err(Error::InvalidParameter(format!("rho must lie in [-{RHO_BOUND}, {RHO_BOUND}], got {rho}")));
    }
    Ok(())
}

/// Log density in terms of the normal scores `x = Φ⁻¹(u)`, `y = Φ⁻¹(v)`.
fn log_density_scores(rho: f64, x: f64, y: f64) -> f64 {
    let r2 = rho * rho;
    let q = 1.0 - r2;
    -0.5 * q.ln() - (r2 * (x * x + y * y) - 2.0 * rho * x * y) / (2.0 * q)
}

impl GaussianCopula {
    pub fn new(rho: f64) -> Result<Self> {
        check_rho(rho)?;
        Ok(Self { rho })
    }
}

impl BivariateCopula for GaussianCopula {
    const FAMILY: Family = Family::Gaussian;

    fn fit(obs: &[UniformPair]) -> Result<Self> {
        validate_fit_input(Self::FAMILY, obs)?;
        let normal = standard_normal();
        let scores: Vec<(f64, f64)> =
            obs.iter().map(|p| (normal.inverse_cdf(p.u), normal.inverse_cdf(p.v))).collect();

        let ll = |rho: f64| scores.iter().map(|&(x, y)| log_density_scores(rho, x, y)).sum::<f64>();
        let opt = search(Self::FAMILY, ll, -RHO_BOUND, RHO_BOUND)?;
        reject_edge(Self::FAMILY, opt.x, RHO_BOUND, "correlation")?;
        reject_edge(Self::FAMILY, opt.x, -RHO_BOUND, "correlation")?;
        Self::new(opt.x)
    }

    fn log_density(&self, u: f64, v: f64) -> f64 {
        let normal = standard_normal();
        log_density_scores(self.rho, normal.inverse_cdf(u), normal.inverse_cdf(v))
    }

    fn log_likelihood(&self, obs: &[UniformPair]) -> f64 {
        let normal = standard_normal();
        obs.iter()
            .map(|p| log_density_scores(self.rho, normal.inverse_cdf(p.u), normal.inverse_cdf(p.v)))
            .sum()
    }

    fn parameters(&self) -> Vec<f64> {
        vec![self.rho]
    }

    fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<UniformPair>> {
        let normal = standard_normal();
        let s = (1.0 - self.rho * self.rho).sqrt();
        Ok((0..n)
            .map(|_| {
                let z1: f64 = StandardNormal.sample(rng);
                let z2: f64 = StandardNormal.sample(rng);
                UniformPair::clamped(normal.cdf(z1), normal.cdf(self.rho * z1 + s * z2))
            })
            .collect())
    }

    fn kendall_tau(&self) -> f64 {
        2.0 / std::f64::consts::PI * self.rho.asin()
    }

    fn tail_dependence(&self) -> TailDependence {
        TailDependence::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copula::Copula;
    use crate::copula::test_support::*;

    #[test]
    fn zero_correlation_is_independence() {
        let c = GaussianCopula::new(0.0).unwrap();
        assert!(c.log_density(0.2, 0.9).abs() < 1e-12);
    }

    #[test]
    fn density_integrates_to_one() {
        assert_density_integrates_to_one(&Copula::Gaussian(GaussianCopula::new(0.5).unwrap()));
    }

    #[test]
    fn sampled_tau_matches_implied() {
        assert_sampled_tau(&Copula::Gaussian(GaussianCopula::new(-0.4).unwrap()), 0.04);
    }

    #[test]
    fn negative_dependence_is_fitted() {
        let obs = ranked_sample(&Copula::Gaussian(GaussianCopula::new(-0.7).unwrap()), 500);
        let fit = GaussianCopula::fit(&obs).unwrap();
        assert!((fit.rho + 0.7).abs() < 0.08, "rho {}", fit.rho);
    }

    #[test]
    fn out_of_range_rho_is_invalid() {
        assert!(GaussianCopula::new(1.0).is_err());
        assert!(GaussianCopula::new(f64::NAN).is_err());
    }
}
