use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use crloss::analysis::{self, AnalysisReport, DistStats, ReplicateSummary};
use crloss::config::AnalysisConfig;
use crloss::loader::{self, AggregatedPair};
use crloss::selection::FitOutcome;

#[derive(Parser)]
#[command(name = "crloss")]
#[command(about = "Copula dependence analysis of aggregated disaster losses")]
#[command(version)]
struct Cli {
    /// Raw loss table (CSV)
    #[arg(short, long)]
    input: PathBuf,

    /// JSON file overlaying the default configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for noise injection and simulation (OS entropy when absent)
    #[arg(long)]
    seed: Option<u64>,

    /// Goodness-of-fit grid subdivisions per axis
    #[arg(long)]
    grid: Option<usize>,

    /// Aggregated (category, province) table destination
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the full analysis report as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write pseudo-observations, simulated sample and CDF grids as JSON
    #[arg(long)]
    plot_data: Option<PathBuf>,

    /// Repeat the analysis over N consecutive seeds
    #[arg(long)]
    runs: Option<u64>,

    #[arg(short, long)]
    quiet: bool,

    #[arg(long, default_value = "warn")]
    log_level: tracing::Level,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::from_json_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => AnalysisConfig::canonical(),
    };
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if let Some(k) = cli.grid {
        config.gof_grid = k;
    }

    let table = loader::load_path(&cli.input, &config.columns, config.delimiter_byte()?)
        .with_context(|| format!("failed to load {}", cli.input.display()))?;
    let pairs = loader::aggregate(&table.records);

    let output = cli.output.clone().unwrap_or_else(|| PathBuf::from(&config.aggregated_output));
    loader::write_aggregated_path(&pairs, &output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    if let Some(n) = cli.runs {
        let start_seed = config.seed.unwrap_or(0);
        let summary = analysis::analyse_replicates(&table, &pairs, &config, start_seed, n);
        if !cli.quiet {
            print_replicates(&summary);
        }
        if let Some(path) = &cli.report {
            write_json(path, &summary)?;
        }
        return Ok(());
    }

    let mut rng = analysis::rng_from_seed(config.seed);
    let report = analysis::analyse(&table, &pairs, &config, &mut rng).context("copula analysis failed")?;

    if !cli.quiet {
        print_report(&report, &pairs, &output);
    }
    if let Some(path) = &cli.report {
        write_json(path, &report)?;
    }
    if let (Some(path), Some(plot)) = (&cli.plot_data, &report.plot) {
        write_json(path, plot)?;
    }
    // Everything above is still written when no family fits; the run then fails.
    report.require_best().context("copula analysis failed")?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "undefined".to_string(), |x| format!("{x:.4}"))
}

fn fmt_params(params: &[f64]) -> String {
    params.iter().map(|p| format!("{p:.4}")).collect::<Vec<_>>().join(", ")
}

fn print_report(report: &AnalysisReport, pairs: &[AggregatedPair], output: &Path) {
    println!("=== Input ===");
    println!("  Rows read:        {}", report.rows.read);
    println!("  Rows kept:        {}", report.rows.kept);
    println!("  Rows dropped:     {}", report.rows.dropped);
    println!("  Aggregated pairs: {} -> {}", pairs.len(), output.display());

    println!("\n=== Dependence ===");
    println!("  Kendall tau:  {}", fmt_opt(report.dependence.kendall_tau));
    println!("  Spearman rho: {}", fmt_opt(report.dependence.spearman_rho));
    println!("  Pearson r:    {}", fmt_opt(report.dependence.pearson_r));

    println!("\n=== Copula fits ({}/{} succeeded) ===", report.succeeded(), report.attempted());
    println!(
        "{:<9} | {:>12} | {:>12} | {:>12} | {:>8} | {:>8} | {:>8} | params",
        "Family", "logLik", "AIC", "BIC", "tau", "lambdaL", "lambdaU"
    );
    println!("{}", "-".repeat(96));
    for outcome in &report.fits {
        match outcome {
            FitOutcome::Fitted(m) => println!(
                "{:<9} | {:>12.4} | {:>12.4} | {:>12.4} | {:>8.4} | {:>8.4} | {:>8.4} | {}",
                m.family.name(),
                m.log_likelihood,
                m.aic,
                m.bic,
                m.implied_tau,
                m.tail_dependence.lower,
                m.tail_dependence.upper,
                fmt_params(&m.parameters),
            ),
            FitOutcome::Failed { family, reason } => println!("{:<9} | FAILED: {reason}", family.name()),
        }
    }

    println!("\n=== AIC ranking ===");
    for (i, entry) in report.ranking.iter().enumerate() {
        println!("  {:>2}. {:<9} {:>12.4}", i + 1, entry.family.name(), entry.aic);
    }
    let Some(best) = &report.best else {
        println!("  Best: none (no family could be fitted)");
        return;
    };
    println!("  Best: {} ({})", best.family, fmt_params(&best.parameters));

    let Some(gof) = &report.goodness_of_fit else {
        return;
    };
    println!("\n=== Goodness of fit ===");
    println!("  Grid:      {0}x{0} subdivisions", gof.subdivisions);
    println!("  Statistic: {:.6}", gof.statistic);
    if let (Some(t), Some(exceeds)) = (gof.threshold, gof.exceeds_threshold) {
        println!("  Threshold: {t:.6} ({})", if exceeds { "POOR FIT" } else { "ok" });
    }
}

fn print_dist_row(label: &str, ds: &DistStats) {
    println!(
        "{:<10} | {:>9.5} | {:>9.5} | {:>9.5} | {:>9.5} | {:>9.5} | {:>9.5} | {:>9.5} | {:>9.5} | {:>9.5}",
        label, ds.min, ds.p5, ds.p25, ds.p50, ds.p75, ds.p95, ds.max, ds.mean, ds.std_dev,
    );
}

fn print_replicates(summary: &ReplicateSummary) {
    println!(
        "=== Multi-Run Distribution (N={} runs, seeds {}..={}) ===",
        summary.runs,
        summary.start_seed,
        summary.last_seed()
    );
    if summary.failed > 0 {
        println!("  {} run(s) failed", summary.failed);
    }

    println!("\n--- Best family ---");
    for (family, count) in &summary.best_counts {
        println!("  {:<9} {:>5}", family.name(), count);
    }

    println!("\n--- Statistics ---");
    println!(
        "{:<10} | {:>9} | {:>9} | {:>9} | {:>9} | {:>9} | {:>9} | {:>9} | {:>9} | {:>9}",
        "Metric", "min", "p5", "p25", "p50", "p75", "p95", "max", "mean", "stddev"
    );
    if let Some(ds) = &summary.gof_statistic {
        print_dist_row("GoF", ds);
    }
    if let Some(ds) = &summary.kendall_tau {
        print_dist_row("Kendall", ds);
    }
}
