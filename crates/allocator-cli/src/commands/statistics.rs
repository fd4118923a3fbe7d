use clap::Args;
use serde_json::Value;

use allocator_core::market_data::csv_source::load_price_csv;
use allocator_core::statistics::estimate_return_statistics;

use super::allocation::{clean_assets, CsvArgs};

/// Arguments for estimating return statistics
#[derive(Args)]
pub struct StatisticsArgs {
    /// Date-indexed CSV of prices, one column per asset
    #[arg(long, default_value = "stock_data.csv")]
    pub prices: String,

    /// Comma-separated asset identifiers
    #[arg(long, value_delimiter = ',', required = true)]
    pub assets: Vec<String>,

    #[command(flatten)]
    pub csv: CsvArgs,
}

pub fn run_statistics(args: StatisticsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let prices = load_price_csv(&args.prices, &args.csv.options())?;
    let stats = estimate_return_statistics(&prices, &clean_assets(&args.assets))?;
    Ok(serde_json::json!({ "result": stats }))
}
