pub mod objective;
pub mod optimizer;
pub mod solver;

pub use optimizer::{
    optimize_allocation, optimize_from_prices, AllocationParameters, AssetAllocation,
    OptimizationRequest, OptimizationResult,
};
pub use solver::{SolverSettings, WeightBounds};
