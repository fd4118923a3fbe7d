use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use allocator_core::allocation::{
    optimize_allocation, optimize_from_prices, AllocationParameters, OptimizationRequest,
    SolverSettings,
};
use allocator_core::market_data::csv_source::{load_price_csv, CsvPriceOptions};
use allocator_core::{RiskTolerance, TransactionCost};

use crate::input;

/// Arguments for optimizing an allocation from a price CSV
#[derive(Args)]
pub struct OptimizeArgs {
    /// Date-indexed CSV of prices, one column per asset
    #[arg(long, default_value = "stock_data.csv")]
    pub prices: String,

    /// Comma-separated asset identifiers (e.g. "AAPL,MSFT,GOOG")
    #[arg(long, value_delimiter = ',', required = true)]
    pub assets: Vec<String>,

    /// Transaction cost in percent of gross exposure (e.g. 0.1 for 0.1%)
    #[arg(long, default_value = "0")]
    pub transaction_cost: Decimal,

    /// Risk tolerance on a 0-100 scale (100 = maximise return, 0 = minimise volatility)
    #[arg(long, default_value = "50")]
    pub risk_tolerance: Decimal,

    /// Capital to split across assets
    #[arg(long)]
    pub capital: Option<Decimal>,

    #[command(flatten)]
    pub csv: CsvArgs,

    #[command(flatten)]
    pub solver: SolverArgs,
}

/// Arguments for solving a prepared JSON request
#[derive(Args)]
pub struct SolveArgs {
    /// JSON file holding statistics, transaction_cost and risk_tolerance (fractions)
    #[arg(long)]
    pub input: Option<String>,
}

/// CSV layout overrides
#[derive(Args)]
pub struct CsvArgs {
    /// Header of the date column
    #[arg(long, default_value = "Date")]
    pub date_column: String,

    /// chrono format of the date column
    #[arg(long, default_value = "%Y-%m-%d")]
    pub date_format: String,
}

impl CsvArgs {
    pub fn options(&self) -> CsvPriceOptions {
        CsvPriceOptions {
            date_column: self.date_column.clone(),
            date_format: self.date_format.clone(),
        }
    }
}

/// Solver overrides
#[derive(Args)]
pub struct SolverArgs {
    /// Maximum solver iterations
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Convergence tolerance on the largest weight change per iteration
    #[arg(long)]
    pub tolerance: Option<Decimal>,
}

impl SolverArgs {
    fn settings(&self) -> SolverSettings {
        let defaults = SolverSettings::default();
        SolverSettings {
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            tolerance: self.tolerance.unwrap_or(defaults.tolerance),
            ..defaults
        }
    }
}

pub fn run_optimize(args: OptimizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let parameters = AllocationParameters {
        transaction_cost: TransactionCost::from_percent(args.transaction_cost)?,
        risk_tolerance: RiskTolerance::from_percent(args.risk_tolerance)?,
        capital: args.capital,
        solver: args.solver.settings(),
    };
    let assets = clean_assets(&args.assets);
    let prices = load_price_csv(&args.prices, &args.csv.options())?;
    let result = optimize_from_prices(&prices, &assets, &parameters)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_solve(args: SolveArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: OptimizationRequest = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(request) = input::stdin::read_stdin()? {
        request
    } else {
        return Err("--input <file.json> or stdin required for solve".into());
    };
    let result = optimize_allocation(&request)?;
    Ok(serde_json::to_value(result)?)
}

/// Trim whitespace around identifiers; order and spelling are otherwise kept.
pub fn clean_assets(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect()
}
