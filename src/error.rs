use thiserror::Error;

use crate::copula::Family;

#[derive(Error, Debug)]
pub enum Error {
    /// A required input column is absent from the header row.
    #[error("required column {column:?} not found in input")]
    MissingColumn { column: String },

    /// Fewer valid observations than the operation needs.
    #[error("{context}: need at least {needed} observations, found {found}")]
    InsufficientData { needed: usize, found: usize, context: &'static str },

    /// The statistic is undefined for this data (e.g. a constant variable).
    #[error("degenerate data: {0}")]
    Degenerate(String),

    /// One copula family could not be fitted. Recovered by the fit loop.
    #[error("{family} copula fit failed: {reason}")]
    CopulaFit { family: Family, reason: String },

    /// Every attempted family failed to fit.
    #[error("no copula family could be fitted ({attempted} attempted)")]
    NoModelFitted { attempted: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn fit(family: Family, reason: impl Into<String>) -> Self {
        Error::CopulaFit { family, reason: reason.into() }
    }
}
