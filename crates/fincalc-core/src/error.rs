use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FinCalcError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Out of domain in {context}: {reason}")]
    OutOfDomain { context: String, reason: String },

    #[error("Financial impossibility: {0}")]
    FinancialImpossibility(String),

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("No sign change: {function} found no root in [{lower}, {upper}]; a root may not exist or may lie outside the search range")]
    NoSignChange {
        function: String,
        lower: Decimal,
        upper: Decimal,
    },

    #[error("Ambiguous result: {function} has {sign_changes} sign changes, so more than one root may exist")]
    AmbiguousRoots { function: String, sign_changes: usize },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl FinCalcError {
    /// Overflow of a compound or discount factor.
    pub(crate) fn overflow(context: impl Into<String>) -> Self {
        FinCalcError::OutOfDomain {
            context: context.into(),
            reason: "arithmetic overflow".into(),
        }
    }
}

impl From<serde_json::Error> for FinCalcError {
    fn from(e: serde_json::Error) -> Self {
        FinCalcError::SerializationError(e.to_string())
    }
}
