use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::FinCalcError;
use crate::FinCalcResult;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Used inside the formulas only.
pub type Rate = Decimal;

/// Rates expressed as percentages (5.0 = 5%). Used at the API boundary only.
pub type Percent = Decimal;

/// Year fractions or counts
pub type Years = Decimal;

const HUNDRED: Decimal = dec!(100);

/// Whether periodic payments fall at the end (ordinary) or the start (due)
/// of each period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnuityTiming {
    #[default]
    Ordinary,
    Due,
}

impl AnnuityTiming {
    pub fn is_due(self) -> bool {
        matches!(self, AnnuityTiming::Due)
    }
}

/// Payment frequency and timing for a TVM problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFrequency {
    /// Compounding and payment periods per year (1 = annual, 12 = monthly)
    #[serde(default = "default_periods_per_year")]
    pub periods_per_year: u32,
    #[serde(default)]
    pub timing: AnnuityTiming,
}

impl Default for PaymentFrequency {
    fn default() -> Self {
        Self {
            periods_per_year: default_periods_per_year(),
            timing: AnnuityTiming::Ordinary,
        }
    }
}

impl PaymentFrequency {
    pub fn new(periods_per_year: u32, timing: AnnuityTiming) -> Self {
        Self {
            periods_per_year,
            timing,
        }
    }

    pub fn annual() -> Self {
        Self::new(1, AnnuityTiming::Ordinary)
    }

    pub fn monthly() -> Self {
        Self::new(12, AnnuityTiming::Ordinary)
    }
}

pub(crate) fn default_periods_per_year() -> u32 {
    12
}

/// Convert an annual nominal percentage into the per-period decimal rate.
///
/// This and [`annual_rate_pct`] are the only places percent and decimal
/// rates meet; every formula downstream works on the periodic decimal.
pub fn periodic_rate(annual_rate_pct: Percent, periods_per_year: u32) -> FinCalcResult<Rate> {
    if periods_per_year == 0 {
        return Err(FinCalcError::InvalidInput {
            field: "periods_per_year".into(),
            reason: "Periods per year must be > 0".into(),
        });
    }
    let rate = annual_rate_pct / HUNDRED / Decimal::from(periods_per_year);
    if rate <= dec!(-1) {
        return Err(FinCalcError::InvalidInput {
            field: "annual_rate_pct".into(),
            reason: "Periodic rate must be greater than -100%".into(),
        });
    }
    Ok(rate)
}

/// Convert a per-period decimal rate back into an annual nominal percentage.
pub fn annual_rate_pct(periodic: Rate, periods_per_year: u32) -> FinCalcResult<Percent> {
    to_percent(
        periodic
            .checked_mul(Decimal::from(periods_per_year))
            .ok_or_else(|| FinCalcError::overflow("annual rate"))?,
    )
}

/// Express a decimal rate as a percentage (no annualisation).
pub fn to_percent(rate: Rate) -> FinCalcResult<Percent> {
    rate.checked_mul(HUNDRED)
        .ok_or_else(|| FinCalcError::overflow("percentage"))
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
