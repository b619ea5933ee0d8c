use serde::{Deserialize, Serialize};

/// Calendar year of a disaster record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Year(pub i32);

/// A point on the unit square. Pseudo-observations and copula draws both use
/// this; every coordinate produced by the crate lies strictly inside (0, 1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniformPair {
    pub u: f64,
    pub v: f64,
}

impl UniformPair {
    /// Smallest distance kept between a simulated coordinate and 0 or 1.
    pub const EDGE: f64 = 1e-12;

    pub fn new(u: f64, v: f64) -> Self {
        Self { u, v }
    }

    /// Pull both coordinates into `[EDGE, 1 - EDGE]`.
    pub fn clamped(u: f64, v: f64) -> Self {
        Self {
            u: u.clamp(Self::EDGE, 1.0 - Self::EDGE),
            v: v.clamp(Self::EDGE, 1.0 - Self::EDGE),
        }
    }

    pub fn is_interior(&self) -> bool {
        self.u > 0.0 && self.u < 1.0 && self.v > 0.0 && self.v < 1.0
    }
}

/// Split a slice of pairs into its two coordinate vectors.
pub fn unzip_pairs(pairs: &[UniformPair]) -> (Vec<f64>, Vec<f64>) {
    pairs.iter().map(|p| (p.u, p.v)).unzip()
}
