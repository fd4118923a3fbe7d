use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::objective::{
    adjusted_return, dispersion_penalty, gross_return, volatility, AllocationObjective, SmoothObjective,
};
use super::solver::{minimize, SolverSettings, WeightBounds};
use crate::error::AllocatorError;
use crate::market_data::PriceSeries;
use crate::statistics::{estimate_return_statistics, ReturnStatistics};
use crate::types::{with_metadata, ComputationOutput, Money, Rate, RiskTolerance, TransactionCost, TRADING_DAYS_PER_YEAR};
use crate::AllocatorResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Everything the solver needs for one allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRequest {
    /// Annualised return statistics for the assets to allocate across.
    pub statistics: ReturnStatistics,
    /// Proportional cost on gross exposure (0.001 = 0.1%).
    pub transaction_cost: TransactionCost,
    /// 1 maximises adjusted return, 0 minimises volatility.
    pub risk_tolerance: RiskTolerance,
    /// Capital to split across assets, if amounts are wanted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capital: Option<Money>,
    #[serde(default)]
    pub solver: SolverSettings,
}

/// Request parameters when statistics are estimated from prices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationParameters {
    pub transaction_cost: TransactionCost,
    pub risk_tolerance: RiskTolerance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capital: Option<Money>,
    #[serde(default)]
    pub solver: SolverSettings,
}

/// One asset's share of the optimal portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetAllocation {
    pub asset: String,
    pub weight: Decimal,
    /// weight x capital, when capital was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocated_amount: Option<Money>,
    /// Annualised expected return of the asset on its own.
    pub asset_expected_return: Rate,
    /// Weight times expected return.
    pub contribution_to_return: Rate,
}

/// Optimal allocation and its realised return/risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Weights in the order of the requested assets.
    pub allocations: Vec<AssetAllocation>,
    /// Expected return after the transaction-cost deduction.
    pub expected_return: Rate,
    /// Expected return before the transaction-cost deduction.
    pub gross_return: Rate,
    /// Portfolio standard deviation.
    pub expected_volatility: Rate,
    pub dispersion_penalty: Decimal,
    /// Minimised objective value.
    pub objective_value: Decimal,
    /// Herfindahl-Hirschman index of weights.
    pub hhi_concentration: Decimal,
    pub iterations: u32,
}

impl OptimizationResult {
    pub fn weights(&self) -> Vec<Decimal> {
        self.allocations.iter().map(|a| a.weight).collect()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Find the long-only, fully invested weights minimising
/// `-(rt * adjusted_return - (1 - rt) * volatility) + dispersion_penalty`.
///
/// Starts from equal weights. A single asset is allocated in full without
/// running the solver.
pub fn optimize_allocation(
    request: &OptimizationRequest,
) -> AllocatorResult<ComputationOutput<OptimizationResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_request(request)?;

    let stats = &request.statistics;
    let n = stats.num_assets();
    let tc = request.transaction_cost;
    let rt = request.risk_tolerance;
    let objective = AllocationObjective::new(stats, tc, rt);

    let (weights, objective_value, iterations, ended_at_min_step) = if n == 1 {
        let weights = vec![Decimal::ONE];
        let value = objective
            .value(&weights)
            .ok_or_else(|| overflow("objective", 0))?;
        (weights, value, 0, false)
    } else {
        let initial = vec![Decimal::ONE / Decimal::from(n as i64); n];
        let bounds = vec![WeightBounds::LONG_ONLY; n];
        let outcome = minimize(&objective, &initial, &bounds, &request.solver)?;
        (
            outcome.weights,
            outcome.objective_value,
            outcome.iterations,
            outcome.ended_at_min_step,
        )
    };

    check_feasible(&weights, iterations)?;

    // --- Realised measures from the final weights ---
    let mu = stats.expected_returns();
    let port_ret = adjusted_return(&weights, mu, tc.value())
        .ok_or_else(|| overflow("adjusted return", iterations))?;
    let port_gross = gross_return(&weights, mu).ok_or_else(|| overflow("gross return", iterations))?;
    let port_vol = volatility(&weights, stats.covariance())
        .ok_or_else(|| overflow("volatility", iterations))?;
    let penalty = dispersion_penalty(&weights).ok_or_else(|| overflow("dispersion penalty", iterations))?;
    let rt_value = rt.value();
    let hhi_concentration: Decimal = weights.iter().map(|w| *w * *w).sum();

    let allocations: Vec<AssetAllocation> = stats
        .assets()
        .iter()
        .zip(weights.iter().zip(mu.iter()))
        .map(|(asset, (w, m))| AssetAllocation {
            asset: asset.clone(),
            weight: *w,
            allocated_amount: request.capital.map(|c| c * *w),
            asset_expected_return: *m,
            contribution_to_return: *w * *m,
        })
        .collect();

    // --- Warnings ---
    if n > 1 {
        for a in &allocations {
            if a.weight > dec!(0.40) {
                warnings.push(format!(
                    "Concentrated position: {} has weight {:.4}",
                    a.asset, a.weight
                ));
            }
        }
    }
    if port_vol > dec!(0.30) {
        warnings.push(format!("High portfolio volatility: {:.4}", port_vol));
    }
    if ended_at_min_step {
        warnings.push(format!(
            "Solver's last accepted step was at the line-search minimum ({}); weights may be short of the optimum",
            request.solver.min_step
        ));
    }
    if let Some(obs) = stats.observations() {
        if obs < TRADING_DAYS_PER_YEAR as usize {
            warnings.push(format!(
                "Statistics estimated from {} price observations, less than one trading year",
                obs
            ));
        }
    }

    let output = OptimizationResult {
        allocations,
        expected_return: port_ret,
        gross_return: port_gross,
        expected_volatility: port_vol,
        dispersion_penalty: penalty,
        objective_value,
        hhi_concentration,
        iterations,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Mean-variance allocation with dispersion penalty (projected gradient)",
        &serde_json::json!({
            "n_assets": n,
            "transaction_cost": tc.value().to_string(),
            "risk_tolerance": rt_value.to_string(),
            "long_only": true,
            "starting_point": "equal_weight",
            "max_iterations": request.solver.max_iterations,
            "tolerance": request.solver.tolerance.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Estimate statistics for `assets` from `prices` and optimise the allocation.
pub fn optimize_from_prices(
    prices: &PriceSeries,
    assets: &[String],
    parameters: &AllocationParameters,
) -> AllocatorResult<ComputationOutput<OptimizationResult>> {
    let statistics = estimate_return_statistics(prices, assets)?;
    let request = OptimizationRequest {
        statistics,
        transaction_cost: parameters.transaction_cost,
        risk_tolerance: parameters.risk_tolerance,
        capital: parameters.capital,
        solver: parameters.solver.clone(),
    };
    optimize_allocation(&request)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn overflow(what: &str, iterations: u32) -> AllocatorError {
    AllocatorError::optimization_failed(format!("Numerical overflow evaluating {}", what), iterations)
}

fn validate_request(request: &OptimizationRequest) -> AllocatorResult<()> {
    if request.statistics.num_assets() == 0 {
        return Err(AllocatorError::invalid_parameter(
            "assets",
            "at least one asset is required",
        ));
    }
    if let Some(capital) = request.capital {
        if capital < Decimal::ZERO {
            return Err(AllocatorError::invalid_parameter(
                "capital",
                format!("must be non-negative, got {}", capital),
            ));
        }
    }
    request.solver.validate()
}

/// Reject results that break the budget or box constraints.
fn check_feasible(weights: &[Decimal], iterations: u32) -> AllocatorResult<()> {
    let total: Decimal = weights.iter().sum();
    if (total - Decimal::ONE).abs() > dec!(0.000001) {
        return Err(AllocatorError::optimization_failed(
            format!("Weights sum to {} at termination", total),
            iterations,
        ));
    }
    let slack = dec!(0.000000001);
    if let Some(w) = weights
        .iter()
        .find(|w| **w < -slack || **w > Decimal::ONE + slack)
    {
        return Err(AllocatorError::optimization_failed(
            format!("Weight {} outside [0, 1] at termination", w),
            iterations,
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
