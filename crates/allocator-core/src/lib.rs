pub mod error;
pub mod market_data;
pub mod types;

#[cfg(feature = "statistics")]
pub mod statistics;

#[cfg(feature = "allocation")]
pub mod allocation;

pub use error::AllocatorError;
pub use types::*;

/// Standard result type for all allocator operations
pub type AllocatorResult<T> = Result<T, AllocatorError>;
