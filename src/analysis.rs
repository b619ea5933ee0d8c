use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::copula::Family;
use crate::dependence::DependenceMetrics;
use crate::error::{Error, Result};
use crate::gof::{CdfGrid, GoodnessOfFit, goodness_of_fit};
use crate::loader::{AggregatedPair, CleanTable};
use crate::marginals::pseudo_observations;
use crate::math::quantile_sorted;
use crate::selection::{FitOutcome, RankEntry, fit_families, rank_by_aic, select_best};
use crate::types::UniformPair;

/// Row bookkeeping from the cleaning step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RowCounts {
    pub read: usize,
    pub kept: usize,
    pub dropped: usize,
}

/// The selected model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestModel {
    pub family: Family,
    pub parameters: Vec<f64>,
    pub aic: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GofSummary {
    pub statistic: f64,
    pub subdivisions: usize,
    pub threshold: Option<f64>,
    pub exceeds_threshold: Option<bool>,
}

/// Everything an external plotting collaborator needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotData {
    pub pseudo_observations: Vec<UniformPair>,
    pub simulated: Vec<UniformPair>,
    pub empirical_cdf: CdfGrid,
    pub simulated_cdf: CdfGrid,
}

/// The model-dependent sections (`best`, `goodness_of_fit`, `plot`) are
/// `None` when no family could be fitted; the rest of the report is still
/// filled in so that the failure reasons can be shown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub rows: RowCounts,
    pub pairs: usize,
    pub dependence: DependenceMetrics,
    /// One entry per attempted family, in configuration order.
    pub fits: Vec<FitOutcome>,
    pub ranking: Vec<RankEntry>,
    pub best: Option<BestModel>,
    pub goodness_of_fit: Option<GofSummary>,
    pub plot: Option<PlotData>,
}

impl AnalysisReport {
    pub fn succeeded(&self) -> usize {
        self.fits.iter().filter(|f| f.fitted().is_some()).count()
    }

    pub fn attempted(&self) -> usize {
        self.fits.len()
    }

    /// The selected model, or [`Error::NoModelFitted`] when every family failed.
    pub fn require_best(&self) -> Result<&BestModel> {
        self.best.as_ref().ok_or(Error::NoModelFitted { attempted: self.attempted() })
    }
}

/// Seeded source when `seed` is given, OS entropy otherwise.
pub fn rng_from_seed(seed: Option<u64>) -> ChaCha20Rng {
    match seed {
        Some(s) => ChaCha20Rng::seed_from_u64(s),
        None => ChaCha20Rng::from_os_rng(),
    }
}

/// Run the dependence analysis on the aggregated pairs.
///
/// `rng` drives both the second-variable noise and the simulation from the
/// selected model, so a seeded source makes the whole report reproducible.
pub fn analyse<R: Rng + ?Sized>(
    table: &CleanTable,
    pairs: &[AggregatedPair],
    config: &AnalysisConfig,
    rng: &mut R,
) -> Result<AnalysisReport> {
    if pairs.len() < 2 {
        return Err(Error::InsufficientData { needed: 2, found: pairs.len(), context: "aggregated pairs" });
    }
    let sample = config.sample_strategy.construct(pairs, rng)?;
    let dependence = DependenceMetrics::compute(&sample.x, &sample.y)?;
    tracing::info!(
        pairs = sample.len(),
        kendall_tau = ?dependence.kendall_tau,
        spearman_rho = ?dependence.spearman_rho,
        pearson_r = ?dependence.pearson_r,
        "dependence metrics"
    );

    let obs = pseudo_observations(&sample.x, &sample.y)?;
    let fits = fit_families(&obs, &config.families);
    let ranking: Vec<RankEntry> =
        rank_by_aic(&fits).into_iter().map(|m| RankEntry { family: m.family, aic: m.aic }).collect();
    tracing::info!(succeeded = ranking.len(), attempted = fits.len(), "copula families fitted");

    let rows = RowCounts { read: table.rows_read, kept: table.rows_kept(), dropped: table.rows_dropped() };

    if ranking.is_empty() {
        tracing::warn!(attempted = fits.len(), "no copula family could be fitted");
        return Ok(AnalysisReport {
            rows,
            pairs: pairs.len(),
            dependence,
            fits,
            ranking,
            best: None,
            goodness_of_fit: None,
            plot: None,
        });
    }
    let best_model = select_best(&fits)?;
    tracing::info!(family = %best_model.family, aic = best_model.aic, params = ?best_model.parameters, "best model");
    let best = BestModel {
        family: best_model.family,
        parameters: best_model.parameters.clone(),
        aic: best_model.aic,
    };

    let simulated = best_model.copula.sample(obs.len(), rng)?;
    let GoodnessOfFit { statistic, subdivisions, threshold, exceeds_threshold, empirical, simulated: simulated_cdf } =
        goodness_of_fit(&obs, &simulated, config.gof_grid, config.gof_warn_threshold)?;
    tracing::info!(statistic, subdivisions, "goodness of fit");

    Ok(AnalysisReport {
        rows,
        pairs: pairs.len(),
        dependence,
        fits,
        ranking,
        best: Some(best),
        goodness_of_fit: Some(GofSummary { statistic, subdivisions, threshold, exceeds_threshold }),
        plot: Some(PlotData { pseudo_observations: obs, simulated, empirical_cdf: empirical, simulated_cdf }),
    })
}

/// Distribution statistics for a continuous metric across replicates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistStats {
    pub n: usize,
    pub min: f64,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

pub fn percentile_stats(values: &mut [f64]) -> Option<DistStats> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let n = values.len();
    let q = |p: f64| quantile_sorted(values, p).unwrap_or(f64::NAN);

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = if n > 1 {
        values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        0.0
    };

    Some(DistStats {
        n,
        min: values[0],
        p5: q(0.05),
        p25: q(0.25),
        p50: q(0.50),
        p75: q(0.75),
        p95: q(0.95),
        max: values[n - 1],
        mean,
        std_dev: variance.sqrt(),
    })
}

/// Outcome of repeating the analysis over consecutive seeds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicateSummary {
    pub start_seed: u64,
    pub runs: usize,
    /// Replicates whose analysis returned an error or fitted no model.
    pub failed: usize,
    /// How often each family was selected.
    pub best_counts: BTreeMap<Family, usize>,
    pub gof_statistic: Option<DistStats>,
    pub kendall_tau: Option<DistStats>,
}

impl ReplicateSummary {
    /// Seed of the final replicate, wrapping like the seeds themselves.
    pub fn last_seed(&self) -> u64 {
        self.start_seed.wrapping_add((self.runs as u64).saturating_sub(1))
    }
}

/// Repeat [`analyse`] for `runs` consecutive seeds from `start_seed`
/// (wrapping at `u64::MAX`), one `ChaCha20Rng` per replicate. A replicate
/// with no fitted model counts as failed.
pub fn analyse_replicates(
    table: &CleanTable,
    pairs: &[AggregatedPair],
    config: &AnalysisConfig,
    start_seed: u64,
    runs: u64,
) -> ReplicateSummary {
    let results: Vec<Result<AnalysisReport>> = (0..runs)
        .into_par_iter()
        .map(|i| {
            let mut rng = ChaCha20Rng::seed_from_u64(start_seed.wrapping_add(i));
            analyse(table, pairs, config, &mut rng)
        })
        .collect();

    let mut best_counts = BTreeMap::new();
    let mut gof = Vec::new();
    let mut tau = Vec::new();
    let mut failed = 0;
    for (i, result) in results.into_iter().enumerate() {
        let seed = start_seed.wrapping_add(i as u64);
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(seed, error = %e, "replicate failed");
                failed += 1;
                continue;
            }
        };
        let (Some(best), Some(fit)) = (&report.best, &report.goodness_of_fit) else {
            tracing::warn!(seed, attempted = report.attempted(), "replicate fitted no copula family");
            failed += 1;
            continue;
        };
        *best_counts.entry(best.family).or_insert(0) += 1;
        gof.push(fit.statistic);
        if let Some(t) = report.dependence.kendall_tau {
            tau.push(t);
        }
    }

    ReplicateSummary {
        start_seed,
        runs: runs as usize,
        failed,
        best_counts,
        gof_statistic: percentile_stats(&mut gof),
        kendall_tau: percentile_stats(&mut tau),
    }
}
