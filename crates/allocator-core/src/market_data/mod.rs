#[cfg(feature = "csv_source")]
pub mod csv_source;
pub mod price_series;

pub use price_series::PriceSeries;
