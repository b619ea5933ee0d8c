//! Copula-based dependence analysis of aggregated natural-disaster losses.
//!
//! The pipeline reads a raw loss table, aggregates losses per
//! (category, province), builds a bivariate sample, maps it to
//! pseudo-observations, fits five copula families, selects one by AIC and
//! checks it against a simulated sample.

pub mod analysis;
pub mod config;
pub mod copula;
pub mod dependence;
pub mod error;
pub mod gof;
pub mod loader;
pub mod marginals;
pub mod math;
pub mod optimize;
pub mod sample;
pub mod selection;
pub mod tail_risk;
pub mod types;

pub use error::{Error, Result};
