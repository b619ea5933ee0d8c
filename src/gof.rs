//! Goodness of fit: compare the empirical joint CDF of the observed
//! pseudo-observations with that of a sample simulated from the selected model.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::types::UniformPair;

/// Joint CDF values on a `(k + 1) x (k + 1)` grid over the closed unit square.
///
/// `values[i][j]` is `F(i / k, j / k)`, rows indexed by `u`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CdfGrid {
    pub subdivisions: usize,
    pub values: Vec<Vec<f64>>,
}

impl CdfGrid {
    /// The `k + 1` equally spaced grid coordinates `0, 1/k, .., 1`.
    pub fn axis(subdivisions: usize) -> Vec<f64> {
        (0..=subdivisions).map(|i| i as f64 / subdivisions as f64).collect()
    }

    fn cells(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().flatten().copied()
    }
}

/// Fraction of `sample` with `u <= gu` and `v <= gv` at every grid point.
pub fn empirical_cdf_grid(sample: &[UniformPair], subdivisions: usize) -> Result<CdfGrid> {
    if subdivisions == 0 {
        return Err(Error::InvalidParameter("grid needs at least one subdivision".into()));
    }
    if sample.is_empty() {
        return Err(Error::InsufficientData { needed: 1, found: 0, context: "empirical CDF grid" });
    }
    let axis = CdfGrid::axis(subdivisions);
    let n = sample.len() as f64;
    let values = axis
        .iter()
        .map(|&gu| {
            axis.iter()
                .map(|&gv| sample.iter().filter(|p| p.u <= gu && p.v <= gv).count() as f64 / n)
                .collect()
        })
        .collect();
    Ok(CdfGrid { subdivisions, values })
}

/// Mean squared difference over all grid points.
pub fn mean_squared_discrepancy(a: &CdfGrid, b: &CdfGrid) -> Result<f64> {
    if a.subdivisions != b.subdivisions {
        return Err(Error::InvalidParameter(format!(
            "grid sizes differ: {} vs {}",
            a.subdivisions, b.subdivisions
        )));
    }
    let points = ((a.subdivisions + 1) * (a.subdivisions + 1)) as f64;
    Ok(a.cells().zip(b.cells()).map(|(x, y)| (x - y).powi(2)).sum::<f64>() / points)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoodnessOfFit {
    /// Lower is better; 0 means the two CDF grids coincide.
    pub statistic: f64,
    pub subdivisions: usize,
    pub threshold: Option<f64>,
    /// `Some(true)` when a threshold is configured and the statistic exceeds it.
    pub exceeds_threshold: Option<bool>,
    pub empirical: CdfGrid,
    pub simulated: CdfGrid,
}

/// Evaluate both grids and the discrepancy between them.
pub fn goodness_of_fit(
    observed: &[UniformPair],
    simulated: &[UniformPair],
    subdivisions: usize,
    threshold: Option<f64>,
) -> Result<GoodnessOfFit> {
    let empirical = empirical_cdf_grid(observed, subdivisions)?;
    let simulated = empirical_cdf_grid(simulated, subdivisions)?;
    let statistic = mean_squared_discrepancy(&empirical, &simulated)?;
    let exceeds_threshold = threshold.map(|t| statistic > t);
    if exceeds_threshold == Some(true) {
        tracing::warn!(statistic, threshold = ?threshold, "goodness-of-fit statistic above threshold; poor fit");
    }
    Ok(GoodnessOfFit { statistic, subdivisions, threshold, exceeds_threshold, empirical, simulated })
}
