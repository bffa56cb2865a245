pub mod error;
pub mod solver;
pub mod time_value;
pub mod types;

#[cfg(feature = "fixed_income")]
pub mod fixed_income;

#[cfg(feature = "lending")]
pub mod lending;

#[cfg(feature = "accounting")]
pub mod accounting;

#[cfg(feature = "capital_budgeting")]
pub mod capital_budgeting;

pub use error::FinCalcError;
pub use types::*;

/// Standard result type for all fincalc operations
pub type FinCalcResult<T> = Result<T, FinCalcError>;
