pub mod return_statistics;

pub use return_statistics::{estimate_return_statistics, period_returns, ReturnStatistics};
