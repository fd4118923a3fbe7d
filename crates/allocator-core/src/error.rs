use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocatorError {
    #[error("Price data unavailable: {source_name} — {reason}")]
    DataUnavailable { source_name: String, reason: String },

    #[error("Asset {0} is not present in the price data")]
    MissingAsset(String),

    #[error("Invalid parameter: {field} — {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("Invalid statistics: {0}")]
    InvalidStatistics(String),

    #[error("Optimization failed after {iterations} iterations: {message}")]
    OptimizationFailed { message: String, iterations: u32 },
}

impl AllocatorError {
    pub(crate) fn invalid_parameter(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AllocatorError::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn optimization_failed(message: impl Into<String>, iterations: u32) -> Self {
        AllocatorError::OptimizationFailed {
            message: message.into(),
            iterations,
        }
    }
}
