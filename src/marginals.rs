//! Rank-based empirical probability integral transform.

use crate::error::{Error, Result};
use crate::types::UniformPair;

/// 1-based ranks; tied values share the mean of the positions they occupy.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end (0-based) hold equal values: ranks start+1..=end.
        let avg = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = avg;
        }
        start = end;
    }
    ranks
}

/// Map each value to `(rank - 0.5) / n`, which lies strictly inside (0, 1).
pub fn ecdf_transform(values: &[f64]) -> Result<Vec<f64>> {
    if values.is_empty() {
        return Err(Error::InsufficientData { needed: 1, found: 0, context: "empirical transform" });
    }
    if let Some(bad) = values.iter().find(|x| !x.is_finite()) {
        return Err(Error::Degenerate(format!("non-finite value {bad} in empirical transform")));
    }
    let n = values.len() as f64;
    Ok(average_ranks(values).into_iter().map(|r| (r - 0.5) / n).collect())
}

/// Transform both coordinates independently into pseudo-observations.
pub fn pseudo_observations(x: &[f64], y: &[f64]) -> Result<Vec<UniformPair>> {
    if x.len() != y.len() {
        return Err(Error::InvalidParameter(format!(
            "coordinate lengths differ: {} vs {}",
            x.len(),
            y.len()
        )));
    }
    let u = ecdf_transform(x)?;
    let v = ecdf_transform(y)?;
    Ok(u.into_iter().zip(v).map(|(u, v)| UniformPair::new(u, v)).collect())
}
