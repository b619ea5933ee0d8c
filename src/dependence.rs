//! Classical dependence measures on the raw (x, y) sample.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::marginals::average_ranks;

fn check_pair(x: &[f64], y: &[f64], context: &'static str) -> Result<()> {
    if x.len() != y.len() {
        return Err(Error::InvalidParameter(format!(
            "{context}: coordinate lengths differ ({} vs {})",
            x.len(),
            y.len()
        )));
    }
    if x.len() < 2 {
        return Err(Error::InsufficientData { needed: 2, found: x.len(), context });
    }
    Ok(())
}

/// Pearson product-moment correlation.
pub fn pearson_r(x: &[f64], y: &[f64]) -> Result<f64> {
    check_pair(x, y, "Pearson correlation")?;
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return Err(Error::Degenerate("Pearson correlation of a constant variable".to_string()));
    }
    Ok((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Spearman's rho: Pearson correlation of the average ranks.
pub fn spearman_rho(x: &[f64], y: &[f64]) -> Result<f64> {
    check_pair(x, y, "Spearman correlation")?;
    pearson_r(&average_ranks(x), &average_ranks(y))
}

/// Kendall's tau-b, which corrects the denominator for ties in either variable.
pub fn kendall_tau(x: &[f64], y: &[f64]) -> Result<f64> {
    check_pair(x, y, "Kendall tau")?;
    let n = x.len();
    let (mut concordant, mut discordant) = (0i64, 0i64);
    let (mut ties_x, mut ties_y) = (0i64, 0i64);
    for i in 0..n {
        for j in (i + 1)..n {
            let dx = x[i] - x[j];
            let dy = y[i] - y[j];
            if dx == 0.0 {
                ties_x += 1;
            }
            if dy == 0.0 {
                ties_y += 1;
            }
            let s = dx * dy;
            if s > 0.0 {
                concordant += 1;
            } else if s < 0.0 {
                discordant += 1;
            }
        }
    }
    let n0 = (n * (n - 1) / 2) as i64;
    let denom = ((n0 - ties_x) as f64 * (n0 - ties_y) as f64).sqrt();
    if denom == 0.0 {
        return Err(Error::Degenerate("Kendall tau of a constant variable".to_string()));
    }
    Ok(((concordant - discordant) as f64 / denom).clamp(-1.0, 1.0))
}

/// The three measures reported for the raw sample. A measure that is
/// undefined for the data (constant variable) is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DependenceMetrics {
    pub kendall_tau: Option<f64>,
    pub spearman_rho: Option<f64>,
    pub pearson_r: Option<f64>,
}

impl DependenceMetrics {
    /// Fails only when fewer than two points are available.
    pub fn compute(x: &[f64], y: &[f64]) -> Result<Self> {
        check_pair(x, y, "dependence metrics")?;
        let optional = |name: &str, r: Result<f64>| match r {
            Ok(v) => Ok(Some(v)),
            Err(Error::Degenerate(reason)) => {
                tracing::warn!(metric = name, %reason, "dependence metric undefined");
                Ok(None)
            }
            Err(e) => Err(e),
        };
        Ok(Self {
            kendall_tau: optional("kendall_tau", kendall_tau(x, y))?,
            spearman_rho: optional("spearman_rho", spearman_rho(x, y))?,
            pearson_r: optional("pearson_r", pearson_r(x, y))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn perfect_monotone_relation() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y: Vec<f64> = x.iter().map(|v: &f64| v.exp()).collect();
        assert!(close(kendall_tau(&x, &y).unwrap(), 1.0));
        assert!(close(spearman_rho(&x, &y).unwrap(), 1.0));
        assert!(pearson_r(&x, &y).unwrap() < 1.0);
    }

    #[test]
    fn reversed_order_is_minus_one() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [8.0, 6.0, 4.0, 2.0];
        assert!(close(kendall_tau(&x, &y).unwrap(), -1.0));
        assert!(close(spearman_rho(&x, &y).unwrap(), -1.0));
        assert!(close(pearson_r(&x, &y).unwrap(), -1.0));
    }

    #[test]
    fn kendall_tau_b_with_ties() {
        // C = 4, D = 0, ties_x = 1, ties_y = 1, n0 = 6: tau_b = 4 / sqrt(5 * 5).
        let x = [1.0, 2.0, 2.0, 3.0];
        let y = [1.0, 2.0, 3.0, 3.0];
        assert!(close(kendall_tau(&x, &y).unwrap(), 0.8));
    }

    #[test]
    fn pearson_known_value() {
        let x = [1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 2.0];
        assert!(close(pearson_r(&x, &y).unwrap(), 0.5));
    }

    #[test]
    fn fewer_than_two_points_is_insufficient() {
        for f in [kendall_tau, spearman_rho, pearson_r] {
            assert!(matches!(f(&[1.0], &[2.0]), Err(Error::InsufficientData { needed: 2, found: 1, .. })));
        }
        assert!(DependenceMetrics::compute(&[], &[]).is_err());
    }

    #[test]
    fn constant_variable_yields_undefined_metrics() {
        let m = DependenceMetrics::compute(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]).unwrap();
        assert_eq!(m.kendall_tau, None);
        assert_eq!(m.spearman_rho, None);
        assert_eq!(m.pearson_r, None);
    }

    proptest! {
        #[test]
        fn metrics_stay_in_unit_range(
            pts in prop::collection::vec((-1e3f64..1e3, -1e3f64..1e3), 3..60)
        ) {
            let (x, y): (Vec<f64>, Vec<f64>) = pts.into_iter().unzip();
            let m = DependenceMetrics::compute(&x, &y).unwrap();
            for v in [m.kendall_tau, m.spearman_rho, m.pearson_r].into_iter().flatten() {
                prop_assert!((-1.0..=1.0).contains(&v));
            }
        }

        #[test]
        fn rank_measures_ignore_monotone_rescaling(
            pts in prop::collection::vec((0.0f64..1e3, 0.0f64..1e3), 3..60)
        ) {
            let (x, y): (Vec<f64>, Vec<f64>) = pts.into_iter().unzip();
            let x2: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
            let a = kendall_tau(&x, &y);
            let b = kendall_tau(&x2, &y);
            if let (Ok(a), Ok(b)) = (a, b) {
                prop_assert!((a - b).abs() < 1e-12);
            }
        }
    }
}
