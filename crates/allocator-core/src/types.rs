use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::AllocatorError;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Trading days used to annualise daily statistics.
pub const TRADING_DAYS_PER_YEAR: u32 = 252;

/// Fraction in [0, 1] trading adjusted return (1) against volatility (0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct RiskTolerance(Decimal);

impl RiskTolerance {
    pub fn new(value: Decimal) -> Result<Self, AllocatorError> {
        if value < Decimal::ZERO || value > Decimal::ONE {
            return Err(AllocatorError::invalid_parameter(
                "risk_tolerance",
                format!("must be between 0 and 1, got {}", value),
            ));
        }
        Ok(RiskTolerance(value))
    }

    /// Build from the 0-100 slider scale.
    pub fn from_percent(percent: Decimal) -> Result<Self, AllocatorError> {
        if percent < Decimal::ZERO || percent > dec!(100) {
            return Err(AllocatorError::invalid_parameter(
                "risk_tolerance",
                format!("must be between 0 and 100, got {}", percent),
            ));
        }
        Self::new(percent / dec!(100))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for RiskTolerance {
    type Error = AllocatorError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        RiskTolerance::new(value)
    }
}

impl From<RiskTolerance> for Decimal {
    fn from(value: RiskTolerance) -> Self {
        value.0
    }
}

/// Proportional transaction cost charged on gross exposure, as a fraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct TransactionCost(Decimal);

impl TransactionCost {
    pub fn new(value: Decimal) -> Result<Self, AllocatorError> {
        if value < Decimal::ZERO || value > Decimal::ONE {
            return Err(AllocatorError::invalid_parameter(
                "transaction_cost",
                format!("must be between 0 and 1, got {}", value),
            ));
        }
        Ok(TransactionCost(value))
    }

    /// Build from a percentage (0.1 = 0.1%).
    pub fn from_percent(percent: Decimal) -> Result<Self, AllocatorError> {
        Self::new(percent / dec!(100))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for TransactionCost {
    type Error = AllocatorError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        TransactionCost::new(value)
    }
}

impl From<TransactionCost> for Decimal {
    fn from(value: TransactionCost) -> Self {
        value.0
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
