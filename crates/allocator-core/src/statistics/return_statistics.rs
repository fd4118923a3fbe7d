use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::AllocatorError;
use crate::market_data::PriceSeries;
use crate::types::{Rate, TRADING_DAYS_PER_YEAR};
use crate::AllocatorResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Annualised expected returns and covariance for an ordered asset list.
///
/// Always square and consistently sized: `expected_returns.len()` equals the
/// number of rows and columns of `covariance`, which equals `assets.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ReturnStatisticsData")]
pub struct ReturnStatistics {
    assets: Vec<String>,
    expected_returns: Vec<Rate>,
    covariance: Vec<Vec<Decimal>>,
    /// Price observations behind the estimate, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    observations: Option<usize>,
}

/// Unvalidated wire form of [`ReturnStatistics`].
#[derive(Debug, Clone, Deserialize)]
struct ReturnStatisticsData {
    assets: Vec<String>,
    expected_returns: Vec<Rate>,
    covariance: Vec<Vec<Decimal>>,
    #[serde(default)]
    observations: Option<usize>,
}

impl TryFrom<ReturnStatisticsData> for ReturnStatistics {
    type Error = AllocatorError;

    fn try_from(data: ReturnStatisticsData) -> Result<Self, Self::Error> {
        let mut stats = ReturnStatistics::new(data.assets, data.expected_returns, data.covariance)?;
        stats.observations = data.observations;
        Ok(stats)
    }
}

impl ReturnStatistics {
    pub fn new(
        assets: Vec<String>,
        expected_returns: Vec<Rate>,
        covariance: Vec<Vec<Decimal>>,
    ) -> AllocatorResult<Self> {
        validate(&assets, &expected_returns, &covariance)?;
        Ok(ReturnStatistics {
            assets,
            expected_returns,
            covariance,
            observations: None,
        })
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn expected_returns(&self) -> &[Rate] {
        &self.expected_returns
    }

    pub fn covariance(&self) -> &[Vec<Decimal>] {
        &self.covariance
    }

    pub fn observations(&self) -> Option<usize> {
        self.observations
    }

    pub fn num_assets(&self) -> usize {
        self.assets.len()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Estimate annualised return statistics for `assets` from a price table.
///
/// Expected return is the mean simple period return times 252; covariance is
/// the sample covariance (divisor `m - 1`) of period returns times 252.
pub fn estimate_return_statistics(
    prices: &PriceSeries,
    assets: &[String],
) -> AllocatorResult<ReturnStatistics> {
    let selected = prices.select(assets)?;
    let returns = period_returns(&selected)?;
    let annualisation = Decimal::from(TRADING_DAYS_PER_YEAR);

    let period_means = returns
        .iter()
        .zip(selected.assets())
        .map(|(r, asset)| {
            mean(r).ok_or_else(|| {
                let reason = if r.is_empty() {
                    format!("is undefined with {} price observation(s)", selected.len())
                } else {
                    "overflows decimal range".to_string()
                };
                AllocatorError::InvalidStatistics(format!("expected return of {} {}", asset, reason))
            })
        })
        .collect::<AllocatorResult<Vec<Decimal>>>()?;

    let overflow = |what: String| {
        AllocatorError::InvalidStatistics(format!("{} overflows decimal range", what))
    };

    let n = returns.len();
    let mut covariance = vec![vec![Decimal::ZERO; n]; n];
    for i in 0..n {
        for j in i..n {
            let (a, b) = (&selected.assets()[i], &selected.assets()[j]);
            let c = sample_covariance(&returns[i], period_means[i], &returns[j], period_means[j])
                .map_err(|e| match e {
                    CovarianceError::TooFewReturns => AllocatorError::InvalidStatistics(format!(
                        "covariance of {} and {} is undefined with {} price observation(s)",
                        a,
                        b,
                        selected.len()
                    )),
                    CovarianceError::Overflow => overflow(format!("covariance of {} and {}", a, b)),
                })?
                .checked_mul(annualisation)
                .ok_or_else(|| overflow(format!("annualised covariance of {} and {}", a, b)))?;
            covariance[i][j] = c;
            covariance[j][i] = c;
        }
    }
    let means = period_means
        .iter()
        .zip(selected.assets())
        .map(|(m, asset)| {
            m.checked_mul(annualisation)
                .ok_or_else(|| overflow(format!("annualised expected return of {}", asset)))
        })
        .collect::<AllocatorResult<Vec<Rate>>>()?;

    tracing::debug!(
        assets = n,
        observations = selected.len(),
        "estimated return statistics"
    );

    let mut stats = ReturnStatistics::new(selected.assets().to_vec(), means, covariance)?;
    stats.observations = Some(selected.len());
    Ok(stats)
}

/// Simple period-over-period returns `p_t / p_{t-1} - 1`, one vector per asset.
pub fn period_returns(prices: &PriceSeries) -> AllocatorResult<Vec<Vec<Decimal>>> {
    let dates = prices.dates();
    prices
        .assets()
        .iter()
        .enumerate()
        .map(|(j, asset)| {
            let column = prices.prices_of(j)?;
            column
                .windows(2)
                .enumerate()
                .map(|(t, pair)| {
                    pair[1]
                        .checked_div(pair[0])
                        .and_then(|ratio| ratio.checked_sub(Decimal::ONE))
                        .ok_or_else(|| {
                            let reason = if pair[0].is_zero() {
                                "prior price is zero"
                            } else {
                                "ratio overflows decimal range"
                            };
                            AllocatorError::InvalidStatistics(format!(
                                "return of {} on {} is undefined: {}",
                                asset,
                                dates[t + 1],
                                reason
                            ))
                        })
                })
                .collect::<AllocatorResult<Vec<Decimal>>>()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[allow(clippy::needless_range_loop)]
fn validate(assets: &[String], mu: &[Rate], cov: &[Vec<Decimal>]) -> AllocatorResult<()> {
    let n = assets.len();
    if n == 0 {
        return Err(AllocatorError::invalid_parameter(
            "assets",
            "at least one asset is required",
        ));
    }

    let mut seen = HashSet::with_capacity(n);
    for asset in assets {
        if !seen.insert(asset.as_str()) {
            return Err(AllocatorError::invalid_parameter(
                "assets",
                format!("asset '{}' listed more than once", asset),
            ));
        }
    }

    if mu.len() != n {
        return Err(AllocatorError::InvalidStatistics(format!(
            "expected {} returns but got {}",
            n,
            mu.len()
        )));
    }

    if cov.len() != n {
        return Err(AllocatorError::InvalidStatistics(format!(
            "expected {}x{} covariance matrix but got {} rows",
            n,
            n,
            cov.len()
        )));
    }
    for (i, row) in cov.iter().enumerate() {
        if row.len() != n {
            return Err(AllocatorError::InvalidStatistics(format!(
                "covariance row {} has {} columns, expected {}",
                i,
                row.len(),
                n
            )));
        }
    }

    let tolerance = dec!(0.0000001);
    for i in 0..n {
        if cov[i][i] < Decimal::ZERO {
            return Err(AllocatorError::InvalidStatistics(format!(
                "negative variance {} for {}",
                cov[i][i], assets[i]
            )));
        }
        for j in (i + 1)..n {
            let asymmetric = cov[i][j]
                .checked_sub(cov[j][i])
                .map_or(true, |d| d.abs() > tolerance);
            if asymmetric {
                return Err(AllocatorError::InvalidStatistics(format!(
                    "covariance not symmetric: [{},{}]={} != [{},{}]={}",
                    i, j, cov[i][j], j, i, cov[j][i]
                )));
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Arithmetic mean; `None` when empty or when the sum overflows.
fn mean(values: &[Decimal]) -> Option<Decimal> {
    let sum = values
        .iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))?;
    sum.checked_div(Decimal::from(values.len() as i64))
}

enum CovarianceError {
    TooFewReturns,
    Overflow,
}

fn sample_covariance(
    a: &[Decimal],
    mean_a: Decimal,
    b: &[Decimal],
    mean_b: Decimal,
) -> Result<Decimal, CovarianceError> {
    let m = a.len().min(b.len());
    if m < 2 {
        return Err(CovarianceError::TooFewReturns);
    }
    let acc = a
        .iter()
        .zip(b.iter())
        .try_fold(Decimal::ZERO, |acc, (x, y)| {
            let dx = x.checked_sub(mean_a)?;
            let dy = y.checked_sub(mean_b)?;
            acc.checked_add(dx.checked_mul(dy)?)
        })
        .ok_or(CovarianceError::Overflow)?;
    acc.checked_div(Decimal::from((m - 1) as i64))
        .ok_or(CovarianceError::Overflow)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
