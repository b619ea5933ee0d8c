use rand::Rng;
use serde::Serialize;

use super::{BivariateCopula, Family, TailDependence, open01, reject_edge, search, validate_fit_input};
use crate::error::{Error, Result};
use crate::math::{debye1, log_add_exp};
use crate::types::UniformPair;

const THETA_BOUND: f64 = 150.0;

/// Radially symmetric Archimedean family; any non-zero `theta`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrankCopula {
    pub theta: f64,
}

impl FrankCopula {
    pub fn new(theta: f64) -> Result<Self> {
        if !theta.is_finite() || theta == 0.0 || theta.abs() > THETA_BOUND {
            return Err(Error::InvalidParameter(format!(
                "Frank theta must be non-zero with |theta| <= {THETA_BOUND}, got {theta}"
            )));
        }
        Ok(Self { theta })
    }
}

/// Log density for any theta, with the independence limit at 0.
///
/// `c_theta(u, v) = c_{-theta}(u, 1 - v)`, so only positive theta is
/// evaluated. The denominator `e^{-tu} + e^{-tv} - e^{-t(u+v)} - e^{-t}` is
/// split into two non-negative terms and summed in log space; the direct
/// difference cancels to zero near the diagonal once theta is large.
fn log_density_theta(t: f64, u: f64, v: f64) -> f64 {
    if t.abs() < 1e-10 {
        return 0.0;
    }
    let (t, v) = if t < 0.0 { (-t, 1.0 - v) } else { (t, v) };
    // e^{-tu} (1 - e^{-tv}) + e^{-tv} (1 - e^{-t(1-v)})
    let first = -t * u + (-(-t * v).exp_m1()).ln();
    let second = -t * v + (-(-t * (1.0 - v)).exp_m1()).ln();
    t.ln() + (-(-t).exp_m1()).ln() - t * (u + v) - 2.0 * log_add_exp(first, second)
}

impl BivariateCopula for FrankCopula {
    const FAMILY: Family = Family::Frank;

    fn fit(obs: &[UniformPair]) -> Result<Self> {
        validate_fit_input(Self::FAMILY, obs)?;
        let ll = |t: f64| obs.iter().map(|p| log_density_theta(t, p.u, p.v)).sum::<f64>();
        let opt = search(Self::FAMILY, ll, -THETA_BOUND, THETA_BOUND)?;
        reject_edge(Self::FAMILY, opt.x, THETA_BOUND, "theta")?;
        reject_edge(Self::FAMILY, opt.x, -THETA_BOUND, "theta")?;
        Self::new(opt.x).map_err(|e| Error::fit(Self::FAMILY, e.to_string()))
    }

    fn log_density(&self, u: f64, v: f64) -> f64 {
        log_density_theta(self.theta, u, v)
    }

    fn parameters(&self) -> Vec<f64> {
        vec![self.theta]
    }

    /// Conditional inversion of `C(v | u)`.
    fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<UniformPair>> {
        let t = self.theta;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let u = open01(rng);
            let w = open01(rng);
            let ratio = w * (-t).exp_m1() / (w + (1.0 - w) * (-t * u).exp());
            let v = -ratio.ln_1p() / t;
            out.push(UniformPair::clamped(u, v));
        }
        Ok(out)
    }

    /// `1 - 4 / theta * (1 - D1(theta))`.
    fn kendall_tau(&self) -> f64 {
        1.0 - 4.0 / self.theta * (1.0 - debye1(self.theta))
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
    fn log_density_matches_closed_form() {
        let t = 4.0f64;
        let (u, v) = (0.3f64, 0.6f64);
        let num = t * (1.0 - (-t).exp()) * (-t * (u + v)).exp();
        let den = ((1.0 - (-t).exp()) - (1.0 - (-t * u).exp()) * (1.0 - (-t * v).exp())).powi(2);
        let c = FrankCopula::new(t).unwrap();
        assert!((c.log_density(u, v) - (num / den).ln()).abs() < 1e-12);
    }

    #[test]
    fn negative_theta_density_is_finite_and_integrates() {
        let c = Copula::Frank(FrankCopula::new(-5.0).unwrap());
        assert!(c.log_density(0.01, 0.99).is_finite());
        assert_density_integrates_to_one(&c);
    }

    #[test]
    fn sampled_tau_matches_implied() {
        assert_sampled_tau(&Copula::Frank(FrankCopula::new(8.0).unwrap()), 0.04);
        assert_sampled_tau(&Copula::Frank(FrankCopula::new(-4.0).unwrap()), 0.04);
    }

    #[test]
    fn implied_tau_is_odd_in_theta() {
        let pos = FrankCopula::new(5.0).unwrap().kendall_tau();
        let neg = FrankCopula::new(-5.0).unwrap().kendall_tau();
        assert!((pos + neg).abs() < 1e-9);
        assert!(pos > 0.4 && pos < 0.5);
    }

    #[test]
    fn strong_dependence_density_on_the_diagonal() {
        // Reference values from the closed form in extended precision.
        let cases = [(40.0, 2.709_119_202_824_436), (80.0, 3.135_864_113_874_554)];
        for (theta, expected) in cases {
            let c = FrankCopula::new(theta).unwrap();
            let got = c.log_density(0.975, 0.975);
            assert!((got - expected).abs() < 1e-9, "theta {theta}: {got} vs {expected}");
            let mirrored = FrankCopula::new(-theta).unwrap().log_density(0.975, 0.025);
            assert!((mirrored - expected).abs() < 1e-9, "theta -{theta}: {mirrored}");
        }
    }

    #[test]
    fn density_is_finite_across_the_parameter_range() {
        for theta in [-150.0, -60.0, -1e-3, 1e-3, 60.0, 150.0] {
            let c = FrankCopula::new(theta).unwrap();
            for (u, v) in [(0.001, 0.001), (0.5, 0.5), (0.999, 0.999), (0.001, 0.999), (0.3, 0.7)] {
                assert!(c.log_density(u, v).is_finite(), "theta {theta} at ({u}, {v})");
            }
        }
    }

    #[test]
    fn fits_strongly_dependent_sample() {
        let truth = Copula::Frank(FrankCopula::new(30.0).unwrap());
        let obs = ranked_sample(&truth, 800);
        let fitted = FrankCopula::fit(&obs).unwrap();
        assert!(fitted.log_likelihood(&obs).is_finite());
        assert!(
            (fitted.kendall_tau() - truth.kendall_tau()).abs() < 0.04,
            "fitted theta {} tau {} vs {}",
            fitted.theta,
            fitted.kendall_tau(),
            truth.kendall_tau()
        );
    }

    #[test]
    fn zero_theta_is_not_a_valid_model() {
        assert!(FrankCopula::new(0.0).is_err());
    }
}
