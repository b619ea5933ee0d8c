//! Construction of the continuous (x, y) pair the copulas are fitted to.
//!
//! The aggregated table only carries one measured quantity per key, so the
//! second coordinate is produced by a replaceable [`SampleStrategy`].

use std::collections::BTreeMap;

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::loader::AggregatedPair;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SampleStrategy {
    /// `y = ln(1 + total) + N(0, (noise_fraction * sd(ln(1 + total)))^2)`.
    LogNoise { noise_fraction: f64 },
    /// `y` = 1-based ordinal code of the category, in sorted key order.
    CategoryCode,
    /// `y` = 1-based ordinal code of the province, in sorted key order.
    ProvinceCode,
}

/// N points `(x_i, y_i)`, one per aggregated pair, with `x_i` the total loss.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BivariateSample {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl BivariateSample {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Sample standard deviation (n - 1 denominator).
fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
}

fn ordinal_codes<'a>(keys: impl Iterator<Item = &'a str> + Clone) -> Vec<f64> {
    let mut codes: BTreeMap<&str, f64> = BTreeMap::new();
    for k in keys.clone() {
        codes.insert(k, 0.0);
    }
    for (i, code) in codes.values_mut().enumerate() {
        *code = (i + 1) as f64;
    }
    keys.map(|k| codes[k]).collect()
}

impl SampleStrategy {
    /// Build the sample. `rng` is only drawn from by `LogNoise`.
    pub fn construct<R: Rng + ?Sized>(&self, pairs: &[AggregatedPair], rng: &mut R) -> Result<BivariateSample> {
        let x: Vec<f64> = pairs.iter().map(|p| p.total_loss).collect();
        let y = match *self {
            SampleStrategy::LogNoise { noise_fraction } => {
                if !(noise_fraction.is_finite() && noise_fraction >= 0.0) {
                    return Err(Error::InvalidParameter(format!(
                        "noise fraction must be finite and >= 0, got {noise_fraction}"
                    )));
                }
                let logged: Vec<f64> = x.iter().map(|t| t.ln_1p()).collect();
                let scale = noise_fraction * sample_std(&logged);
                let noise = Normal::new(0.0, scale)
                    .map_err(|e| Error::InvalidParameter(format!("noise scale {scale}: {e}")))?;
                logged.into_iter().map(|l| l + noise.sample(rng)).collect()
            }
            SampleStrategy::CategoryCode => ordinal_codes(pairs.iter().map(|p| p.category.as_str())),
            SampleStrategy::ProvinceCode => ordinal_codes(pairs.iter().map(|p| p.province.as_str())),
        };
        Ok(BivariateSample { x, y })
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    fn pairs() -> Vec<AggregatedPair> {
        [("A", "X", 10.0), ("A", "Y", 2_000.0), ("B", "X", 35.0), ("C", "Z", 400_000.0)]
            .into_iter()
            .map(|(c, p, t)| AggregatedPair { category: c.into(), province: p.into(), total_loss: t })
            .collect()
    }

    #[test]
    fn x_is_total_loss_and_lengths_match() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let s = SampleStrategy::LogNoise { noise_fraction: 0.1 }.construct(&pairs(), &mut rng).unwrap();
        assert_eq!(s.len(), 4);
        assert_eq!(s.x, vec![10.0, 2_000.0, 35.0, 400_000.0]);
        assert_eq!(s.y.len(), 4);
    }

    #[test]
    fn same_seed_same_noise() {
        let strategy = SampleStrategy::LogNoise { noise_fraction: 0.1 };
        let a = strategy.construct(&pairs(), &mut ChaCha20Rng::seed_from_u64(7)).unwrap();
        let b = strategy.construct(&pairs(), &mut ChaCha20Rng::seed_from_u64(7)).unwrap();
        let c = strategy.construct(&pairs(), &mut ChaCha20Rng::seed_from_u64(8)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.y, c.y);
    }

    #[test]
    fn zero_noise_is_plain_log1p() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let s = SampleStrategy::LogNoise { noise_fraction: 0.0 }.construct(&pairs(), &mut rng).unwrap();
        for (x, y) in s.x.iter().zip(&s.y) {
            assert!((x.ln_1p() - y).abs() < 1e-12);
        }
    }

    #[test]
    fn noise_is_small_relative_to_log_spread() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let s = SampleStrategy::LogNoise { noise_fraction: 0.1 }.construct(&pairs(), &mut rng).unwrap();
        let sd = sample_std(&s.x.iter().map(|x| x.ln_1p()).collect::<Vec<_>>());
        for (x, y) in s.x.iter().zip(&s.y) {
            assert!((x.ln_1p() - y).abs() < 0.5 * sd);
        }
    }

    #[test]
    fn ordinal_codes_follow_sorted_keys() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let s = SampleStrategy::ProvinceCode.construct(&pairs(), &mut rng).unwrap();
        assert_eq!(s.y, vec![1.0, 2.0, 1.0, 3.0]);
        let s = SampleStrategy::CategoryCode.construct(&pairs(), &mut rng).unwrap();
        assert_eq!(s.y, vec![1.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn negative_noise_fraction_is_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        assert!(SampleStrategy::LogNoise { noise_fraction: -1.0 }.construct(&pairs(), &mut rng).is_err());
    }
}
