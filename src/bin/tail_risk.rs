use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crloss::config::AnalysisConfig;
use crloss::loader;
use crloss::tail_risk::tail_risk_report;

/// Dashboard statistics: annual totals, lognormal Monte Carlo, exceedance
/// curve and province correlations. JSON on stdout, summary on stderr.
#[derive(Parser)]
#[command(name = "tail_risk")]
#[command(version)]
struct Cli {
    #[arg(short, long)]
    input: PathBuf,

    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of simulated annual losses
    #[arg(long)]
    simulations: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

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
    if let Some(n) = cli.simulations {
        config.monte_carlo.simulations = n;
    }
    if let Some(seed) = cli.seed {
        config.monte_carlo.seed = seed;
    }

    let table = loader::load_path(&cli.input, &config.columns, config.delimiter_byte()?)
        .with_context(|| format!("failed to load {}", cli.input.display()))?;
    let mut rng = ChaCha20Rng::seed_from_u64(config.monte_carlo.seed);
    let report = tail_risk_report(&table.records, &config.monte_carlo, &mut rng)?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    eprintln!(
        "tail_risk: {} positive losses over {} years, {} provinces",
        report.positive_losses,
        report.annual_totals.len(),
        report.province_correlation.provinces.len()
    );
    if let Some(mc) = &report.monte_carlo {
        eprintln!(
            "  lognormal mu={:.4} sigma={:.4}  simulations={}  mean={:.3e}  std={:.3e}",
            mc.fit.mu, mc.fit.sigma, mc.simulations, mc.mean, mc.std_dev
        );
        for q in &mc.quantiles {
            eprintln!("  p{:<6.1} {:.3e}", q.p * 100.0, q.value);
        }
    }
    Ok(())
}
