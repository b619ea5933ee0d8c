//! Input side of the pipeline: read the raw disaster table, coerce and clean
//! the loss column, and aggregate losses per (category, province).

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ColumnConfig;
use crate::error::{Error, Result};
use crate::types::Year;

/// One row of the source table, restricted to the fields the analysis reads.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub category: Option<String>,
    pub province: Option<String>,
    /// `None` when the cell is empty or not a finite number.
    pub loss_amount: Option<f64>,
    pub year: Option<Year>,
}

/// A row that survived cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanRecord {
    pub category: String,
    pub province: String,
    pub loss: f64,
    pub year: Option<Year>,
}

#[derive(Debug, Clone, Default)]
pub struct CleanTable {
    pub records: Vec<CleanRecord>,
    pub rows_read: usize,
}

impl CleanTable {
    pub fn rows_kept(&self) -> usize {
        self.records.len()
    }

    pub fn rows_dropped(&self) -> usize {
        self.rows_read - self.records.len()
    }
}

/// Total loss of one (category, province) combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPair {
    pub category: String,
    pub province: String,
    pub total_loss: f64,
}

/// Numeric coercion of a loss cell: anything that is not a finite number is missing.
pub fn parse_loss(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|x| x.is_finite())
}

/// Spreadsheet exports write integral years as `2010` or `2010.0`.
pub fn parse_year(cell: &str) -> Option<Year> {
    let trimmed = cell.trim();
    if let Ok(y) = trimmed.parse::<i32>() {
        return Some(Year(y));
    }
    let y = trimmed.parse::<f64>().ok()?;
    if y.is_finite() && y.fract() == 0.0 && y.abs() < i32::MAX as f64 {
        Some(Year(y as i32))
    } else {
        None
    }
}

fn non_empty(cell: Option<&str>) -> Option<String> {
    cell.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Cells are decoded leniently: exports from older spreadsheet tools are
/// often Latin-1, and an invalid byte becomes U+FFFD instead of aborting the read.
fn decode(cell: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(cell)
}

/// Read every data row of a delimited table.
///
/// Fails with [`Error::MissingColumn`] when the category, province or loss
/// header is absent. A configured year column that is absent is ignored.
pub fn read_records<R: Read>(reader: R, columns: &ColumnConfig, delimiter: u8) -> Result<Vec<RawRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);
    let headers: Vec<String> = rdr.byte_headers()?.iter().map(|h| decode(h).into_owned()).collect();

    let position = |name: &str| headers.iter().position(|h| h.trim() == name.trim());
    let required = |name: &str| {
        position(name).ok_or_else(|| Error::MissingColumn { column: name.to_string() })
    };
    let category_idx = required(&columns.category)?;
    let province_idx = required(&columns.province)?;
    let loss_idx = required(&columns.loss)?;
    let year_idx = columns.year.as_deref().and_then(position);
    if columns.year.is_some() && year_idx.is_none() {
        tracing::debug!(column = ?columns.year, "year column not present; tail-risk statistics unavailable");
    }

    let mut out = Vec::new();
    for row in rdr.byte_records() {
        let row = row?;
        let cell = |i: usize| row.get(i).map(decode);
        out.push(RawRecord {
            category: non_empty(cell(category_idx).as_deref()),
            province: non_empty(cell(province_idx).as_deref()),
            loss_amount: cell(loss_idx).as_deref().and_then(parse_loss),
            year: year_idx.and_then(cell).as_deref().and_then(parse_year),
        });
    }
    Ok(out)
}

/// Drop rows with a missing category, province or loss. Negative losses are
/// treated as invalid as well, since aggregated totals are non-negative.
pub fn clean(raw: Vec<RawRecord>) -> CleanTable {
    let rows_read = raw.len();
    let records: Vec<CleanRecord> = raw
        .into_iter()
        .filter_map(|r| match (r.category, r.province, r.loss_amount) {
            (Some(category), Some(province), Some(loss)) if loss >= 0.0 => {
                Some(CleanRecord { category, province, loss, year: r.year })
            }
            _ => None,
        })
        .collect();
    tracing::info!(rows_read, rows_kept = records.len(), "cleaned input table");
    CleanTable { records, rows_read }
}

/// Sum losses per (category, province). Exactly one pair per observed key.
///
/// Output happens to be sorted by key; callers must not rely on that.
pub fn aggregate(records: &[CleanRecord]) -> Vec<AggregatedPair> {
    let mut totals: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    for r in records {
        *totals.entry((r.category.as_str(), r.province.as_str())).or_insert(0.0) += r.loss;
    }
    let pairs: Vec<AggregatedPair> = totals
        .into_iter()
        .map(|((category, province), total_loss)| AggregatedPair {
            category: category.to_string(),
            province: province.to_string(),
            total_loss,
        })
        .collect();
    tracing::info!(pairs = pairs.len(), "aggregated losses by category and province");
    pairs
}

pub fn load_path(path: &Path, columns: &ColumnConfig, delimiter: u8) -> Result<CleanTable> {
    let file = File::open(path)?;
    let raw = read_records(BufReader::new(file), columns, delimiter)?;
    Ok(clean(raw))
}

/// Write the aggregated table as CSV with a `category,province,total_loss` header.
pub fn write_aggregated<W: Write>(pairs: &[AggregatedPair], writer: W) -> Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    for pair in pairs {
        w.serialize(pair)?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_aggregated_path(pairs: &[AggregatedPair], path: &Path) -> Result<()> {
    let file = File::create(path)?;
    write_aggregated(pairs, BufWriter::new(file))
}
