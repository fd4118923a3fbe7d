//! Date-indexed price tables read from CSV.
//!
//! Expected shape: a header row naming a date column (`Date` by default) and
//! one column per asset, then one row per observation.
//!
//! ```text
//! Date,AAA,BBB
//! 2024-01-02,101.5,48.2
//! 2024-01-03,102.1,48.0
//! ```
//!
//! Blank or unparsable price cells are kept as gaps; they only fail a request
//! that selects their column.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::str::FromStr;

use super::price_series::PriceSeries;
use crate::error::AllocatorError;
use crate::AllocatorResult;

/// How to interpret the CSV layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvPriceOptions {
    /// Header of the date index column.
    pub date_column: String,
    /// chrono format string for the date column.
    pub date_format: String,
}

impl Default for CsvPriceOptions {
    fn default() -> Self {
        CsvPriceOptions {
            date_column: "Date".to_string(),
            date_format: "%Y-%m-%d".to_string(),
        }
    }
}

/// Load a price table from a CSV file on disk.
pub fn load_price_csv(path: impl AsRef<Path>, options: &CsvPriceOptions) -> AllocatorResult<PriceSeries> {
    let path = path.as_ref();
    let source_name = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|e| AllocatorError::DataUnavailable {
        source_name: source_name.clone(),
        reason: e.to_string(),
    })?;
    read_price_csv(file, &source_name, options)
}

/// Read a price table from any CSV reader. `source_name` is used in errors.
pub fn read_price_csv<R: io::Read>(
    reader: R,
    source_name: &str,
    options: &CsvPriceOptions,
) -> AllocatorResult<PriceSeries> {
    let unavailable = |reason: String| AllocatorError::DataUnavailable {
        source_name: source_name.to_string(),
        reason,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().map_err(|e| unavailable(e.to_string()))?.clone();
    let date_idx = headers
        .iter()
        .position(|h| h == options.date_column)
        .ok_or_else(|| unavailable(format!("no '{}' column in header", options.date_column)))?;

    let asset_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != date_idx)
        .map(|(i, h)| (i, h.to_string()))
        .collect();

    let mut dates = Vec::new();
    let mut rows = Vec::new();

    for (line, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| unavailable(e.to_string()))?;

        let raw_date = record.get(date_idx).unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw_date, &options.date_format).map_err(|e| {
            AllocatorError::invalid_parameter(
                format!("{}[row {}]", options.date_column, line + 1),
                format!("cannot parse date '{}': {}", raw_date, e),
            )
        })?;

        let row: Vec<Option<Decimal>> = asset_cols
            .iter()
            .map(|(i, asset)| {
                let raw = record.get(*i).unwrap_or_default();
                let price = parse_price(raw);
                if price.is_none() && !raw.is_empty() {
                    tracing::debug!(asset = %asset, date = %date, raw, "unparsable price cell");
                }
                price
            })
            .collect();

        dates.push(date);
        rows.push(row);
    }

    tracing::debug!(
        source = source_name,
        assets = asset_cols.len(),
        observations = dates.len(),
        "loaded price table"
    );

    PriceSeries::with_gaps(asset_cols.into_iter().map(|(_, a)| a).collect(), dates, rows)
}

/// Plain or scientific notation; blank and unparsable cells are gaps.
fn parse_price(raw: &str) -> Option<Decimal> {
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}
