mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::allocation::{OptimizeArgs, SolveArgs};
use commands::statistics::StatisticsArgs;

/// Mean-variance capital allocation from historical prices
#[derive(Parser)]
#[command(
    name = "palloc",
    version,
    about = "Mean-variance capital allocation from historical prices",
    long_about = "A CLI for splitting capital across assets with decimal precision. \
                  Estimates annualised return statistics from a date-indexed price CSV \
                  and solves for long-only weights that trade expected return net of \
                  transaction costs against volatility, with a dispersion penalty."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log solver progress to stderr (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize an allocation from a price CSV
    Optimize(OptimizeArgs),
    /// Estimate annualised expected returns and covariance from a price CSV
    Statistics(StatisticsArgs),
    /// Solve a prepared JSON request (statistics + parameters)
    Solve(SolveArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Optimize(args) => commands::allocation::run_optimize(args),
        Commands::Statistics(args) => commands::statistics::run_statistics(args),
        Commands::Solve(args) => commands::allocation::run_solve(args),
        Commands::Version => {
            println!("palloc {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
