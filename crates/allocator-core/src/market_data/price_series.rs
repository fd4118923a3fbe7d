use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;

use crate::error::AllocatorError;
use crate::AllocatorResult;

/// Date-indexed table of prices, one column per asset.
///
/// Rows are ordered by strictly increasing date. The table is immutable once
/// built; restricting it to a subset of assets produces a new table.
///
/// A cell may be absent (blank or unparsable in the source). Absent cells
/// only become an error once their column is selected or read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    assets: Vec<String>,
    dates: Vec<NaiveDate>,
    /// Row-major: `rows[t][j]` is the price of `assets[j]` on `dates[t]`.
    rows: Vec<Vec<Option<Decimal>>>,
}

impl PriceSeries {
    pub fn new(
        assets: Vec<String>,
        dates: Vec<NaiveDate>,
        rows: Vec<Vec<Decimal>>,
    ) -> AllocatorResult<Self> {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Some).collect())
            .collect();
        Self::with_gaps(assets, dates, rows)
    }

    /// Build a table where `None` marks a missing or malformed price.
    pub fn with_gaps(
        assets: Vec<String>,
        dates: Vec<NaiveDate>,
        rows: Vec<Vec<Option<Decimal>>>,
    ) -> AllocatorResult<Self> {
        let mut seen = HashSet::with_capacity(assets.len());
        for asset in &assets {
            if !seen.insert(asset.as_str()) {
                return Err(AllocatorError::invalid_parameter(
                    "assets",
                    format!("duplicate column '{}'", asset),
                ));
            }
        }

        if dates.len() != rows.len() {
            return Err(AllocatorError::invalid_parameter(
                "rows",
                format!("{} dates but {} price rows", dates.len(), rows.len()),
            ));
        }

        for (t, row) in rows.iter().enumerate() {
            if row.len() != assets.len() {
                return Err(AllocatorError::invalid_parameter(
                    format!("rows[{}]", t),
                    format!("expected {} prices, got {}", assets.len(), row.len()),
                ));
            }
        }

        for pair in dates.windows(2) {
            if pair[1] <= pair[0] {
                return Err(AllocatorError::invalid_parameter(
                    "dates",
                    format!("dates must be strictly increasing ({} follows {})", pair[1], pair[0]),
                ));
            }
        }

        Ok(PriceSeries {
            assets,
            dates,
            rows,
        })
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Number of observations (dates).
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Prices of one asset in date order, or `None` if `index` is out of
    /// range or the column has a missing price.
    pub fn column(&self, index: usize) -> Option<Vec<Decimal>> {
        self.prices_of(index).ok()
    }

    pub fn column_by_name(&self, asset: &str) -> AllocatorResult<Vec<Decimal>> {
        let index = self.index_of(asset)?;
        self.prices_of(index)
    }

    /// Complete price column for `assets[index]`.
    pub(crate) fn prices_of(&self, index: usize) -> AllocatorResult<Vec<Decimal>> {
        let asset = self.assets.get(index).ok_or_else(|| {
            AllocatorError::invalid_parameter(
                "index",
                format!("column {} out of range for {} assets", index, self.assets.len()),
            )
        })?;
        self.rows
            .iter()
            .zip(self.dates.iter())
            .map(|(row, date)| {
                row.get(index).copied().flatten().ok_or_else(|| {
                    AllocatorError::invalid_parameter(
                        format!("{}[{}]", asset, date),
                        "missing or malformed price",
                    )
                })
            })
            .collect()
    }

    fn index_of(&self, asset: &str) -> AllocatorResult<usize> {
        self.assets
            .iter()
            .position(|a| a == asset)
            .ok_or_else(|| AllocatorError::MissingAsset(asset.to_string()))
    }

    /// Restrict the table to `requested`, in the requested order.
    pub fn select(&self, requested: &[String]) -> AllocatorResult<PriceSeries> {
        if requested.is_empty() {
            return Err(AllocatorError::invalid_parameter(
                "assets",
                "at least one asset is required",
            ));
        }

        let mut seen = HashSet::with_capacity(requested.len());
        for asset in requested {
            if !seen.insert(asset.as_str()) {
                return Err(AllocatorError::invalid_parameter(
                    "assets",
                    format!("asset '{}' requested more than once", asset),
                ));
            }
        }

        let indices = requested
            .iter()
            .map(|asset| self.index_of(asset))
            .collect::<AllocatorResult<Vec<usize>>>()?;

        // Columns not requested may have gaps; requested ones must be complete.
        let columns = indices
            .iter()
            .map(|&j| self.prices_of(j))
            .collect::<AllocatorResult<Vec<Vec<Decimal>>>>()?;

        let rows = (0..self.dates.len())
            .map(|t| columns.iter().map(|column| Some(column[t])).collect())
            .collect();

        Ok(PriceSeries {
            assets: requested.to_vec(),
            dates: self.dates.clone(),
            rows,
        })
    }
}
