use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::macrs::MacrsClass;
use crate::error::FinCalcError;
use crate::time_value::mul;
use crate::types::*;
use crate::FinCalcResult;

/// Longest useful life accepted, in years.
pub const MAX_USEFUL_LIFE: u32 = 100;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How cost is allocated over the asset's life.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DepreciationMethod {
    StraightLine,
    /// Fixed rate of multiplier / life applied to the declining book value
    DecliningBalance {
        #[serde(default = "default_multiplier")]
        multiplier: Decimal,
        /// Take straight-line over the remaining life once it is larger
        #[serde(default)]
        switch_to_straight_line: bool,
    },
    SumOfYearsDigits,
    /// Table rates on full cost; salvage and useful life are ignored
    Macrs {
        #[serde(default)]
        class: Option<MacrsClass>,
    },
}

fn default_multiplier() -> Decimal {
    dec!(2)
}

impl DepreciationMethod {
    pub fn label(&self) -> String {
        match self {
            DepreciationMethod::StraightLine => "Straight-line".into(),
            DepreciationMethod::DecliningBalance {
                multiplier,
                switch_to_straight_line,
            } => {
                let pct = multiplier
                    .checked_mul(dec!(100))
                    .map_or(*multiplier, |pct| pct.normalize());
                if *switch_to_straight_line {
                    format!("{pct}% declining balance, switching to straight-line")
                } else {
                    format!("{pct}% declining balance")
                }
            }
            DepreciationMethod::SumOfYearsDigits => "Sum-of-years'-digits".into(),
            DepreciationMethod::Macrs { class } => match class {
                Some(c) => format!("MACRS GDS {}-year, half-year convention", c.recovery_period()),
                None => "MACRS".into(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepreciationInput {
    pub cost: Money,
    #[serde(default)]
    pub salvage_value: Money,
    /// Useful life in whole years
    #[serde(default)]
    pub useful_life: u32,
    pub method: DepreciationMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepreciationEntry {
    pub year: u32,
    pub depreciation: Money,
    pub cumulative_depreciation: Money,
    pub book_value: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepreciationOutput {
    pub method: String,
    /// Cost less salvage (full cost under MACRS)
    pub depreciable_base: Money,
    pub entries: Vec<DepreciationEntry>,
    pub total_depreciation: Money,
    pub final_book_value: Money,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Produce the year-by-year depreciation schedule for an asset.
pub fn depreciation_schedule(
    input: &DepreciationInput,
) -> FinCalcResult<ComputationOutput<DepreciationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;

    let (depreciable_base, charges) = match input.method {
        DepreciationMethod::StraightLine => (
            input.cost - input.salvage_value,
            straight_line(input.cost, input.salvage_value, input.useful_life),
        ),
        DepreciationMethod::DecliningBalance {
            multiplier,
            switch_to_straight_line,
        } => (
            input.cost - input.salvage_value,
            declining_balance(
                input.cost,
                input.salvage_value,
                input.useful_life,
                multiplier,
                switch_to_straight_line,
            )?,
        ),
        DepreciationMethod::SumOfYearsDigits => (
            input.cost - input.salvage_value,
            sum_of_years_digits(input.cost, input.salvage_value, input.useful_life)?,
        ),
        DepreciationMethod::Macrs { class } => {
            let class = class.ok_or_else(missing_macrs_class)?;
            if !input.salvage_value.is_zero() {
                warnings.push("Salvage value is ignored under MACRS".into());
            }
            (input.cost, macrs(input.cost, class)?)
        }
    };

    let mut entries = Vec::with_capacity(charges.len());
    let mut cumulative = Decimal::ZERO;
    for (i, depreciation) in charges.into_iter().enumerate() {
        cumulative += depreciation;
        entries.push(DepreciationEntry {
            year: i as u32 + 1,
            depreciation,
            cumulative_depreciation: cumulative,
            book_value: input.cost - cumulative,
        });
    }

    if entries.iter().any(|e| e.depreciation.is_zero()) {
        warnings.push("Asset is fully depreciated before the end of its life".into());
    }

    let output = DepreciationOutput {
        method: input.method.label(),
        depreciable_base,
        total_depreciation: cumulative,
        final_book_value: input.cost - cumulative,
        entries,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        &format!("Depreciation schedule ({})", output.method),
        input,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Methods
// ---------------------------------------------------------------------------

fn straight_line(cost: Money, salvage: Money, life: u32) -> Vec<Money> {
    let base = cost - salvage;
    let annual = base / Decimal::from(life);
    let mut charges = Vec::new();
    let mut taken = Decimal::ZERO;
    for year in 1..=life {
        let charge = if year == life { base - taken } else { annual };
        taken += charge;
        charges.push(charge);
    }
    charges
}

/// Each year is capped at book − salvage; the last year writes book value
/// down to salvage. A year that reaches salvage early leaves nothing for
/// the years after it.
fn declining_balance(
    cost: Money,
    salvage: Money,
    life: u32,
    multiplier: Decimal,
    switch_to_straight_line: bool,
) -> FinCalcResult<Vec<Money>> {
    let rate = multiplier / Decimal::from(life);
    let mut charges = Vec::new();
    let mut book = cost;
    for year in 1..=life {
        let remaining = book - salvage;
        let mut charge = mul(book, rate, "declining balance charge")?;
        if switch_to_straight_line {
            let straight = remaining / Decimal::from(life - year + 1);
            charge = charge.max(straight);
        }
        let charge = if year == life {
            remaining
        } else {
            charge.min(remaining)
        };
        book -= charge;
        charges.push(charge);
    }
    Ok(charges)
}

fn sum_of_years_digits(cost: Money, salvage: Money, life: u32) -> FinCalcResult<Vec<Money>> {
    let base = cost - salvage;
    let digits = Decimal::from(life) * Decimal::from(life + 1) / dec!(2);
    let mut charges = Vec::new();
    let mut taken = Decimal::ZERO;
    for year in 1..=life {
        let charge = if year == life {
            base - taken
        } else {
            mul(base, Decimal::from(life - year + 1), "sum-of-years'-digits charge")? / digits
        };
        taken += charge;
        charges.push(charge);
    }
    Ok(charges)
}

fn macrs(cost: Money, class: MacrsClass) -> FinCalcResult<Vec<Money>> {
    class
        .rates()
        .iter()
        .map(|pct| mul(cost, *pct, "MACRS charge").map(|charge| charge / dec!(100)))
        .collect()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn missing_macrs_class() -> FinCalcError {
    FinCalcError::InvalidInput {
        field: "method.class".into(),
        reason: "MACRS requires a property class (3, 5, 7, 10, 15 or 20 year)".into(),
    }
}

fn validate_input(input: &DepreciationInput) -> FinCalcResult<()> {
    if input.cost <= Decimal::ZERO {
        return Err(FinCalcError::InvalidInput {
            field: "cost".into(),
            reason: "Cost must be positive".into(),
        });
    }

    match input.method {
        DepreciationMethod::Macrs { class } => {
            class.ok_or_else(missing_macrs_class)?;
            return Ok(());
        }
        DepreciationMethod::DecliningBalance { multiplier, .. } if multiplier <= Decimal::ZERO => {
            return Err(FinCalcError::InvalidInput {
                field: "method.multiplier".into(),
                reason: "Multiplier must be positive".into(),
            });
        }
        _ => {}
    }

    if input.useful_life == 0 {
        return Err(FinCalcError::InvalidInput {
            field: "useful_life".into(),
            reason: "Useful life must be at least one year".into(),
        });
    }
    if input.useful_life > MAX_USEFUL_LIFE {
        return Err(FinCalcError::InvalidInput {
            field: "useful_life".into(),
            reason: format!("Useful life cannot exceed {MAX_USEFUL_LIFE} years"),
        });
    }
    if input.salvage_value < Decimal::ZERO || input.salvage_value > input.cost {
        return Err(FinCalcError::InvalidInput {
            field: "salvage_value".into(),
            reason: "Salvage value must be between zero and cost".into(),
        });
    }
    Ok(())
}
