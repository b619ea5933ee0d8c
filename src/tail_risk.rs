//! Derived loss statistics consumed by dashboards: annual totals, a lognormal
//! Monte Carlo of annual loss, the empirical exceedance curve and a
//! province-by-province correlation matrix of annual losses.
//!
//! Only strictly positive losses enter any of these statistics.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use rand_distr::{Distribution, LogNormal};
use serde::Serialize;

use crate::config::MonteCarloConfig;
use crate::dependence::pearson_r;
use crate::error::{Error, Result};
use crate::loader::CleanRecord;
use crate::math::quantile_sorted;
use crate::types::Year;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnnualTotal {
    pub year: Year,
    pub total: f64,
}

/// Sum of positive losses per year, ascending by year. Rows without a year are ignored.
pub fn annual_totals(records: &[CleanRecord]) -> Vec<AnnualTotal> {
    let mut by_year: BTreeMap<Year, f64> = BTreeMap::new();
    for r in records.iter().filter(|r| r.loss > 0.0) {
        if let Some(year) = r.year {
            *by_year.entry(year).or_insert(0.0) += r.loss;
        }
    }
    by_year.into_iter().map(|(year, total)| AnnualTotal { year, total }).collect()
}

/// Zero-location lognormal: `ln X ~ N(mu, sigma^2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LognormalFit {
    pub mu: f64,
    pub sigma: f64,
}

impl LognormalFit {
    /// Maximum likelihood: mean and population standard deviation of `ln x`.
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::InsufficientData { needed: 1, found: 0, context: "lognormal fit" });
        }
        if let Some(bad) = values.iter().find(|v| !(v.is_finite() && **v > 0.0)) {
            return Err(Error::InvalidParameter(format!("lognormal fit needs positive values, got {bad}")));
        }
        let n = values.len() as f64;
        let logs: Vec<f64> = values.iter().map(|v| v.ln()).collect();
        let mu = logs.iter().sum::<f64>() / n;
        let sigma = (logs.iter().map(|l| (l - mu).powi(2)).sum::<f64>() / n).sqrt();
        Ok(Self { mu, sigma })
    }

    pub fn median(&self) -> f64 {
        self.mu.exp()
    }

    pub fn simulate<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<f64>> {
        let dist = LogNormal::new(self.mu, self.sigma)
            .map_err(|e| Error::InvalidParameter(format!("lognormal({}, {}): {e}", self.mu, self.sigma)))?;
        Ok((0..n).map(|_| dist.sample(rng)).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuantileValue {
    pub p: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonteCarloSummary {
    pub fit: LognormalFit,
    pub simulations: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub quantiles: Vec<QuantileValue>,
}

/// Fit the lognormal to `annual` and summarise `config.simulations` draws.
pub fn monte_carlo<R: Rng + ?Sized>(annual: &[f64], config: &MonteCarloConfig, rng: &mut R) -> Result<MonteCarloSummary> {
    if config.simulations == 0 {
        return Err(Error::InvalidParameter("Monte Carlo needs at least one simulation".into()));
    }
    let fit = LognormalFit::fit(annual)?;
    let mut sims = fit.simulate(config.simulations, rng)?;
    sims.sort_by(f64::total_cmp);
    let n = sims.len() as f64;
    let mean = sims.iter().sum::<f64>() / n;
    let std_dev = if sims.len() > 1 {
        (sims.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        0.0
    };
    let quantiles = config
        .quantiles
        .iter()
        .filter_map(|&p| quantile_sorted(&sims, p).map(|value| QuantileValue { p, value }))
        .collect();
    Ok(MonteCarloSummary { fit, simulations: sims.len(), mean, std_dev, quantiles })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExceedancePoint {
    pub loss: f64,
    /// Empirical `P(X > loss)`.
    pub probability: f64,
}

/// Sorted positive losses paired with `(n - i) / n`, `i` the 0-based position.
pub fn exceedance_curve(losses: &[f64]) -> Vec<ExceedancePoint> {
    let mut sorted: Vec<f64> = losses.iter().copied().filter(|x| *x > 0.0).collect();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, loss)| ExceedancePoint { loss, probability: (n - i as f64) / n })
        .collect()
}

/// Pearson correlation of annual losses between every pair of provinces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvinceCorrelation {
    pub provinces: Vec<String>,
    pub years: Vec<Year>,
    /// `matrix[i][j]` is `None` where the correlation is undefined.
    pub matrix: Vec<Vec<Option<f64>>>,
}

impl ProvinceCorrelation {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.provinces.iter().position(|p| p == a)?;
        let j = self.provinces.iter().position(|p| p == b)?;
        self.matrix[i][j]
    }
}

/// Pivot positive losses to year x province (missing cells are 0) and correlate columns.
pub fn province_correlation(records: &[CleanRecord]) -> ProvinceCorrelation {
    let mut cells: BTreeMap<(Year, &str), f64> = BTreeMap::new();
    let mut years = BTreeSet::new();
    let mut provinces = BTreeSet::new();
    for r in records.iter().filter(|r| r.loss > 0.0) {
        if let Some(year) = r.year {
            *cells.entry((year, r.province.as_str())).or_insert(0.0) += r.loss;
            years.insert(year);
            provinces.insert(r.province.as_str());
        }
    }
    let columns: Vec<Vec<f64>> = provinces
        .iter()
        .map(|&p| years.iter().map(|&y| cells.get(&(y, p)).copied().unwrap_or(0.0)).collect())
        .collect();
    let matrix = columns
        .iter()
        .map(|a| columns.iter().map(|b| pearson_r(a, b).ok()).collect())
        .collect();
    ProvinceCorrelation {
        provinces: provinces.into_iter().map(str::to_string).collect(),
        years: years.into_iter().collect(),
        matrix,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TailRiskReport {
    pub positive_losses: usize,
    pub annual_totals: Vec<AnnualTotal>,
    /// `None` when no record carries a year.
    pub monte_carlo: Option<MonteCarloSummary>,
    pub exceedance: Vec<ExceedancePoint>,
    pub province_correlation: ProvinceCorrelation,
}

pub fn tail_risk_report<R: Rng + ?Sized>(
    records: &[CleanRecord],
    config: &MonteCarloConfig,
    rng: &mut R,
) -> Result<TailRiskReport> {
    let losses: Vec<f64> = records.iter().map(|r| r.loss).filter(|x| *x > 0.0).collect();
    let annual = annual_totals(records);
    let totals: Vec<f64> = annual.iter().map(|a| a.total).collect();
    let monte_carlo = if totals.is_empty() {
        tracing::warn!("no dated positive losses; Monte Carlo skipped");
        None
    } else {
        Some(monte_carlo(&totals, config, rng)?)
    };
    tracing::info!(positive_losses = losses.len(), years = annual.len(), "tail-risk statistics computed");
    Ok(TailRiskReport {
        positive_losses: losses.len(),
        exceedance: exceedance_curve(&losses),
        province_correlation: province_correlation(records),
        annual_totals: annual,
        monte_carlo,
    })
}
