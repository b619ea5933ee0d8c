
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crloss::analysis::analyse;
use crloss::config::AnalysisConfig;
use crloss::copula::Family;
use crloss::gof::{empirical_cdf_grid, goodness_of_fit};

use fixtures::{LARGE, MEDIUM, SMALL, aggregated_pairs, clean_table, pseudo_obs};

// ── Group 1: fit — per-family MLE across sample sizes ───────────────────────

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    for scenario in [&SMALL, &MEDIUM, &LARGE] {
        let obs = pseudo_obs(scenario.pairs, 42);
        group.throughput(Throughput::Elements(scenario.pairs as u64));
        for family in Family::ALL {
            group.bench_with_input(
                BenchmarkId::new(family.name(), scenario.name),
                &obs,
                |b, obs| b.iter(|| family.fit(obs)),
            );
        }
    }
    group.finish();
}

// ── Group 2: gof — CDF grid evaluation ───────────────────────────────────────

fn bench_gof(c: &mut Criterion) {
    let mut group = c.benchmark_group("gof");
    for scenario in [&SMALL, &MEDIUM, &LARGE] {
        let observed = pseudo_obs(scenario.pairs, 1);
        let simulated = pseudo_obs(scenario.pairs, 2);
        group.throughput(Throughput::Elements(scenario.pairs as u64));
        group.bench_with_input(BenchmarkId::new("grid_20", scenario.name), &observed, |b, obs| {
            b.iter(|| empirical_cdf_grid(obs, 20))
        });
        group.bench_with_input(
            BenchmarkId::new("statistic_20", scenario.name),
            &(observed, simulated),
            |b, (obs, sim)| b.iter(|| goodness_of_fit(obs, sim, 20, None)),
        );
    }
    group.finish();
}

// ── Group 3: pipeline — aggregated pairs to report ───────────────────────────

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    let config = AnalysisConfig::canonical();
    for scenario in [&SMALL, &MEDIUM] {
        let pairs = aggregated_pairs(scenario.pairs);
        let table = clean_table(&pairs);
        group.bench_function(BenchmarkId::from_parameter(scenario.name), |b| {
            b.iter(|| analyse(&table, &pairs, &config, &mut ChaCha20Rng::seed_from_u64(42)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fit, bench_gof, bench_pipeline);
criterion_main!(benches);
