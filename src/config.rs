use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::copula::Family;
use crate::error::{Error, Result};
use crate::sample::SampleStrategy;

/// Header names of the input table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub category: String,
    pub province: String,
    pub loss: String,
    /// Only the tail-risk statistics use the year; the copula pipeline ignores it.
    pub year: Option<String>,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            category: "CATEGORÍA".to_string(),
            province: "PROVINCIA".to_string(),
            loss: "TOTAL POR TIPOLOGÍA".to_string(),
            year: Some("AÑO".to_string()),
        }
    }
}

/// Lognormal annual-loss simulation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub simulations: usize,
    pub seed: u64,
    pub quantiles: Vec<f64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self { simulations: 10_000, seed: 0, quantiles: vec![0.95, 0.99, 0.999] }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub columns: ColumnConfig,
    pub delimiter: char,
    pub sample_strategy: SampleStrategy,
    /// Families attempted, in report order.
    pub families: Vec<Family>,
    /// Number of equal subdivisions per axis of the goodness-of-fit grid.
    pub gof_grid: usize,
    /// Statistic above which the fit is flagged as poor. `None` disables the check.
    pub gof_warn_threshold: Option<f64>,
    /// `None` draws the seed from OS entropy.
    pub seed: Option<u64>,
    pub monte_carlo: MonteCarloConfig,
    pub aggregated_output: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::canonical()
    }
}

impl AnalysisConfig {
    pub fn canonical() -> Self {
        AnalysisConfig {
            columns: ColumnConfig::default(),
            delimiter: ',',
            sample_strategy: SampleStrategy::LogNoise { noise_fraction: 0.1 },
            families: Family::ALL.to_vec(),
            gof_grid: 20,
            gof_warn_threshold: None,
            seed: None,
            monte_carlo: MonteCarloConfig::default(),
            aggregated_output: "datos_agrupados_categoria_provincia.csv".to_string(),
        }
    }

    /// Read a JSON overlay; keys it omits keep their canonical values.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// The CSV reader takes a single byte delimiter, so only ASCII is accepted.
    pub fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.delimiter).ok().filter(u8::is_ascii).ok_or_else(|| {
            Error::InvalidParameter(format!("delimiter {:?} is not a single ASCII character", self.delimiter))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_attempts_all_five_families() {
        let config = AnalysisConfig::canonical();
        assert_eq!(config.families.len(), 5);
        assert_eq!(config.gof_grid, 20);
        assert!(config.seed.is_none());
    }

    #[test]
    fn partial_json_overlays_canonical_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{ "seed": 7, "columns": { "loss": "total" } }"#).unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.columns.loss, "total");
        assert_eq!(config.columns.category, "CATEGORÍA");
        assert_eq!(config.gof_grid, 20);
        assert_eq!(config.sample_strategy, SampleStrategy::LogNoise { noise_fraction: 0.1 });
    }

    #[test]
    fn semicolon_delimiter_round_trips_to_byte() {
        let config = AnalysisConfig { delimiter: ';', ..AnalysisConfig::canonical() };
        assert_eq!(config.delimiter_byte().unwrap(), b';');
    }

    #[test]
    fn non_ascii_delimiter_is_rejected() {
        for delimiter in ['§', '·', '\u{2502}'] {
            let config = AnalysisConfig { delimiter, ..AnalysisConfig::canonical() };
            assert!(matches!(config.delimiter_byte(), Err(Error::InvalidParameter(_))), "{delimiter:?}");
        }
    }

    #[test]
    fn non_ascii_delimiter_in_json_fails_at_use() {
        let config: AnalysisConfig = serde_json::from_str(r#"{ "delimiter": "¦" }"#).unwrap();
        assert!(config.delimiter_byte().is_err());
    }
}
