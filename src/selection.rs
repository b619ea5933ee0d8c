//! Fit every requested family, score by information criteria, and pick the best.

use std::cmp::Ordering;

use serde::Serialize;

use crate::copula::{Copula, Family, TailDependence};
use crate::error::{Error, Result};
use crate::types::UniformPair;

/// A successfully fitted family with its scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FittedModel {
    pub family: Family,
    pub copula: Copula,
    pub parameters: Vec<f64>,
    pub log_likelihood: f64,
    pub parameter_count: usize,
    pub aic: f64,
    pub bic: f64,
    /// Kendall's tau implied by the fitted parameters.
    pub implied_tau: f64,
    pub tail_dependence: TailDependence,
}

impl FittedModel {
    pub fn new(copula: Copula, obs: &[UniformPair]) -> Result<Self> {
        let family = copula.family();
        let log_likelihood = copula.log_likelihood(obs);
        if !log_likelihood.is_finite() {
            return Err(Error::fit(family, format!("log-likelihood is not finite ({log_likelihood})")));
        }
        let k = copula.parameter_count();
        Ok(Self {
            family,
            parameters: copula.parameters(),
            log_likelihood,
            parameter_count: k,
            aic: aic(log_likelihood, k),
            bic: bic(log_likelihood, k, obs.len()),
            implied_tau: copula.kendall_tau(),
            tail_dependence: copula.tail_dependence(),
            copula,
        })
    }
}

/// Per-family result of the fit loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FitOutcome {
    Fitted(FittedModel),
    Failed { family: Family, reason: String },
}

impl FitOutcome {
    pub fn family(&self) -> Family {
        match self {
            FitOutcome::Fitted(m) => m.family,
            FitOutcome::Failed { family, .. } => *family,
        }
    }

    pub fn fitted(&self) -> Option<&FittedModel> {
        match self {
            FitOutcome::Fitted(m) => Some(m),
            FitOutcome::Failed { .. } => None,
        }
    }
}

/// `-2 ll + 2k`.
pub fn aic(log_likelihood: f64, k: usize) -> f64 {
    -2.0 * log_likelihood + 2.0 * k as f64
}

/// `-2 ll + k ln n`.
pub fn bic(log_likelihood: f64, k: usize, n: usize) -> f64 {
    -2.0 * log_likelihood + k as f64 * (n as f64).ln()
}

/// Attempt every family. A failing family becomes [`FitOutcome::Failed`] and
/// never stops the others.
pub fn fit_families(obs: &[UniformPair], families: &[Family]) -> Vec<FitOutcome> {
    families
        .iter()
        .map(|&family| match family.fit(obs).and_then(|c| FittedModel::new(c, obs)) {
            Ok(model) => {
                tracing::debug!(
                    family = %family,
                    ll = model.log_likelihood,
                    aic = model.aic,
                    params = ?model.parameters,
                    "copula fitted"
                );
                FitOutcome::Fitted(model)
            }
            Err(e) => {
                let reason = match e {
                    Error::CopulaFit { reason, .. } => reason,
                    other => other.to_string(),
                };
                tracing::warn!(family = %family, %reason, "copula fit failed; family excluded");
                FitOutcome::Failed { family, reason }
            }
        })
        .collect()
}

/// One row of the AIC ranking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankEntry {
    pub family: Family,
    pub aic: f64,
}

/// Fitted models sorted by ascending AIC, ties broken by family name.
pub fn rank_by_aic(outcomes: &[FitOutcome]) -> Vec<&FittedModel> {
    let mut fitted: Vec<&FittedModel> = outcomes.iter().filter_map(FitOutcome::fitted).collect();
    fitted.sort_by(|a, b| {
        a.aic
            .partial_cmp(&b.aic)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.family.name().cmp(b.family.name()))
    });
    fitted
}

/// Lowest-AIC model. [`Error::NoModelFitted`] when every family failed.
pub fn select_best(outcomes: &[FitOutcome]) -> Result<&FittedModel> {
    rank_by_aic(outcomes)
        .into_iter()
        .next()
        .ok_or(Error::NoModelFitted { attempted: outcomes.len() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copula::test_support::ranked_sample;
    use crate::copula::{ClaytonCopula, FrankCopula, GaussianCopula, GumbelCopula};

    fn fitted(copula: Copula, ll: f64) -> FitOutcome {
        let k = copula.parameter_count();
        FitOutcome::Fitted(FittedModel {
            family: copula.family(),
            parameters: copula.parameters(),
            log_likelihood: ll,
            parameter_count: k,
            aic: aic(ll, k),
            bic: bic(ll, k, 10),
            implied_tau: copula.kendall_tau(),
            tail_dependence: copula.tail_dependence(),
            copula,
        })
    }

    #[test]
    fn aic_formula() {
        assert_eq!(aic(10.0, 1), -18.0);
        assert_eq!(aic(10.0, 2), -16.0);
    }

    #[test]
    fn ranking_is_ascending_and_skips_failures() {
        let outcomes = vec![
            fitted(Copula::Gaussian(GaussianCopula::new(0.3).unwrap()), 5.0),
            FitOutcome::Failed { family: Family::StudentT, reason: "boom".into() },
            fitted(Copula::Gumbel(GumbelCopula::new(1.5).unwrap()), 9.0),
            fitted(Copula::Clayton(ClaytonCopula::new(1.0).unwrap()), 2.0),
        ];
        let ranked: Vec<Family> = rank_by_aic(&outcomes).iter().map(|m| m.family).collect();
        assert_eq!(ranked, vec![Family::Gumbel, Family::Gaussian, Family::Clayton]);
        assert_eq!(select_best(&outcomes).unwrap().family, Family::Gumbel);
    }

    #[test]
    fn ties_break_by_family_name_regardless_of_input_order() {
        let a = fitted(Copula::Gumbel(GumbelCopula::new(1.5).unwrap()), 4.0);
        let b = fitted(Copula::Frank(FrankCopula::new(3.0).unwrap()), 4.0);
        let forward = vec![a.clone(), b.clone()];
        let backward = vec![b, a];
        assert_eq!(select_best(&forward).unwrap().family, Family::Frank);
        assert_eq!(select_best(&backward).unwrap().family, Family::Frank);
    }

    #[test]
    fn selection_is_stable_across_reruns() {
        let obs = ranked_sample(&Copula::Clayton(ClaytonCopula::new(2.0).unwrap()), 200);
        let outcomes = fit_families(&obs, &Family::ALL);
        let first = select_best(&outcomes).unwrap().family;
        for _ in 0..3 {
            assert_eq!(select_best(&outcomes).unwrap().family, first);
            assert_eq!(select_best(&fit_families(&obs, &Family::ALL)).unwrap().family, first);
        }
    }

    #[test]
    fn all_failures_raise_no_model_fitted() {
        let constant: Vec<UniformPair> = (0..8).map(|_| UniformPair::new(0.5, 0.5)).collect();
        let outcomes = fit_families(&constant, &Family::ALL);
        assert_eq!(outcomes.len(), 5);
        assert!(outcomes.iter().all(|o| o.fitted().is_none()));
        assert!(matches!(select_best(&outcomes), Err(Error::NoModelFitted { attempted: 5 })));
    }

    #[test]
    fn negative_dependence_excludes_archimedean_positive_families() {
        let obs = ranked_sample(&Copula::Gaussian(GaussianCopula::new(-0.6).unwrap()), 300);
        let outcomes = fit_families(&obs, &Family::ALL);
        let failed: Vec<Family> =
            outcomes.iter().filter(|o| o.fitted().is_none()).map(FitOutcome::family).collect();
        assert_eq!(failed, vec![Family::Clayton, Family::Gumbel]);
        let best = select_best(&outcomes).unwrap();
        assert!(matches!(best.family, Family::Gaussian | Family::StudentT | Family::Frank));
    }

    #[test]
    fn lower_tail_data_prefers_clayton_over_gumbel() {
        let obs = ranked_sample(&Copula::Clayton(ClaytonCopula::new(3.0).unwrap()), 600);
        let outcomes = fit_families(&obs, &Family::ALL);
        let aic_of = |f: Family| outcomes.iter().find_map(|o| o.fitted().filter(|m| m.family == f)).unwrap().aic;
        assert!(aic_of(Family::Clayton) < aic_of(Family::Gumbel));
    }
}
