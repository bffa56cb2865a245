//! Plain-vanilla bond pricing and yield to maturity.
//!
//! Bonds are bullet instruments priced on a coupon date: no accrued interest,
//! no odd first or last periods. The term must be a whole number of coupon
//! periods.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::FinCalcError;
use crate::solver::{self, Solution, SolverConfig};
use crate::time_value::{self, add, div, mul};
use crate::types::*;
use crate::FinCalcResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Prices within half a cent of face are reported as par.
const PAR_TOLERANCE: Money = dec!(0.005);

/// 100 years of monthly coupons.
const MAX_COUPON_PERIODS: u32 = 1200;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A fixed-coupon bullet bond.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bond {
    /// Par / face value (typically 1000)
    pub face_value: Money,
    /// Annual coupon rate as a percentage (5.0 = 5%)
    pub coupon_rate_pct: Percent,
    pub years_to_maturity: Years,
    /// Coupons per year: 1 = annual, 2 = semi-annual, 4 = quarterly, 12 = monthly
    #[serde(default = "default_coupon_frequency")]
    pub payments_per_year: u32,
}

fn default_coupon_frequency() -> u32 {
    2
}

/// Where a price sits relative to face value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceStatus {
    Premium,
    Par,
    Discount,
}

impl PriceStatus {
    fn classify(price: Money, face_value: Money) -> Self {
        let gap = price - face_value;
        if gap.abs() < PAR_TOLERANCE {
            PriceStatus::Par
        } else if gap > Decimal::ZERO {
            PriceStatus::Premium
        } else {
            PriceStatus::Discount
        }
    }
}

/// Request for [`price_bond`] as read by the CLI and bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondPriceInput {
    #[serde(flatten)]
    pub bond: Bond,
    /// Annual market yield as a percentage
    pub market_rate_pct: Percent,
}

/// Request for [`solve_bond_yield`] as read by the CLI and bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondYieldInput {
    #[serde(flatten)]
    pub bond: Bond,
    /// Observed price
    pub price: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver: Option<SolverConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondPriceOutput {
    pub price: Money,
    /// Coupon paid each period
    pub coupon_payment: Money,
    pub pv_coupons: Money,
    pub pv_face: Money,
    /// Annual coupon / price, as a percentage
    pub current_yield_pct: Percent,
    pub status: PriceStatus,
    /// Weighted-average time of cash flows, in years
    pub macaulay_duration: Decimal,
    /// Macaulay duration / (1 + periodic yield)
    pub modified_duration: Decimal,
    pub periodic_yield: Rate,
    pub total_periods: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondYieldOutput {
    /// Nominal annual yield to maturity as a percentage
    pub ytm_pct: Percent,
    pub periodic_yield: Rate,
    pub effective_annual_yield_pct: Percent,
    pub current_yield_pct: Percent,
    pub status: PriceStatus,
    pub solution: Solution,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Price a bond at an annual market yield (percent).
///
/// Price is the PV of the coupon annuity plus the PV of face, both
/// discounted at the periodic yield.
pub fn price_bond(
    bond: &Bond,
    market_rate_pct: Percent,
) -> FinCalcResult<ComputationOutput<BondPriceOutput>> {
    let start = Instant::now();
    let warnings: Vec<String> = Vec::new();

    let periods = validate_bond(bond)?;
    let periodic_yield = periodic_rate(market_rate_pct, bond.payments_per_year)?;
    let coupon = coupon_payment(bond)?;

    let price = price_at(bond, coupon, periods, periodic_yield)?;
    let pv_face = mul(
        bond.face_value,
        time_value::discount_factor(periodic_yield, Decimal::from(periods))?,
        "bond face PV",
    )?;

    let macaulay_duration = macaulay_duration(
        coupon,
        bond.face_value,
        periodic_yield,
        periods,
        bond.payments_per_year,
        price,
    )?;
    let modified_duration = div(
        macaulay_duration,
        add(Decimal::ONE, periodic_yield, "modified duration")?,
        "modified duration",
    )?;

    let output = BondPriceOutput {
        price,
        coupon_payment: coupon,
        pv_coupons: price - pv_face,
        pv_face,
        current_yield_pct: current_yield_pct(bond, price)?,
        status: PriceStatus::classify(price, bond.face_value),
        macaulay_duration,
        modified_duration,
        periodic_yield,
        total_periods: periods,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "bond": bond,
        "market_rate_pct": market_rate_pct.to_string(),
        "settlement": "on a coupon date (no accrued interest)",
    });

    Ok(with_metadata(
        "Bond price as PV of coupons plus PV of face",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

/// Solve the yield to maturity implied by an observed price.
pub fn solve_bond_yield(
    bond: &Bond,
    price: Money,
) -> FinCalcResult<ComputationOutput<BondYieldOutput>> {
    solve_bond_yield_with_config(bond, price, &SolverConfig::default())
}

/// [`solve_bond_yield`] with explicit solver settings.
pub fn solve_bond_yield_with_config(
    bond: &Bond,
    price: Money,
    config: &SolverConfig,
) -> FinCalcResult<ComputationOutput<BondYieldOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let periods = validate_bond(bond)?;
    config.validate()?;
    if price <= Decimal::ZERO {
        return Err(FinCalcError::ConvergenceFailure {
            function: "bond yield".into(),
            iterations: 0,
            last_delta: price,
        });
    }

    let coupon = coupon_payment(bond)?;
    let guess = approximate_ytm(bond, coupon, periods, price)?;
    debug!(guess = %guess, price = %price, "solving bond yield");

    let solution = solver::find_root(
        "bond yield",
        |y| Ok(price_at(bond, coupon, periods, y)? - price),
        guess,
        &config.for_rates(),
    )?;
    let periodic_yield = solution.root;

    if periodic_yield < Decimal::ZERO {
        warnings.push("Yield to maturity is negative".into());
    }

    let output = BondYieldOutput {
        ytm_pct: annual_rate_pct(periodic_yield, bond.payments_per_year)?,
        periodic_yield,
        effective_annual_yield_pct: to_percent(time_value::effective_annual_rate(
            periodic_yield,
            bond.payments_per_year,
        )?)?,
        current_yield_pct: current_yield_pct(bond, price)?,
        status: PriceStatus::classify(price, bond.face_value),
        solution,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "bond": bond,
        "price": price.to_string(),
        "solver": config,
    });

    Ok(with_metadata(
        "Yield to maturity by Newton-Raphson with bisection fallback",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Validate the bond and return its whole number of coupon periods.
fn validate_bond(bond: &Bond) -> FinCalcResult<u32> {
    if bond.face_value <= Decimal::ZERO {
        return Err(FinCalcError::InvalidInput {
            field: "face_value".into(),
            reason: "Face value must be positive.".into(),
        });
    }
    if bond.coupon_rate_pct < Decimal::ZERO {
        return Err(FinCalcError::InvalidInput {
            field: "coupon_rate_pct".into(),
            reason: "Coupon rate must be non-negative.".into(),
        });
    }
    if bond.years_to_maturity <= Decimal::ZERO {
        return Err(FinCalcError::InvalidInput {
            field: "years_to_maturity".into(),
            reason: "Years to maturity must be positive.".into(),
        });
    }
    if bond.payments_per_year == 0 {
        return Err(FinCalcError::InvalidInput {
            field: "payments_per_year".into(),
            reason: "Payments per year must be > 0.".into(),
        });
    }

    let periods = mul(
        bond.years_to_maturity,
        Decimal::from(bond.payments_per_year),
        "coupon periods",
    )?;
    if !periods.fract().is_zero() {
        return Err(FinCalcError::InvalidInput {
            field: "years_to_maturity".into(),
            reason: format!(
                "Term covers {periods} coupon periods; odd periods are not supported"
            ),
        });
    }
    match periods.to_u32() {
        Some(n) if n <= MAX_COUPON_PERIODS => Ok(n),
        _ => Err(FinCalcError::InvalidInput {
            field: "years_to_maturity".into(),
            reason: format!(
                "Term covers {periods} coupon periods; at most {MAX_COUPON_PERIODS} are supported"
            ),
        }),
    }
}

fn annual_coupon(bond: &Bond) -> FinCalcResult<Money> {
    Ok(mul(bond.face_value, bond.coupon_rate_pct, "annual coupon")? / dec!(100))
}

fn coupon_payment(bond: &Bond) -> FinCalcResult<Money> {
    div(annual_coupon(bond)?, Decimal::from(bond.payments_per_year), "coupon payment")
}

/// Bond price at a periodic yield. `time_value::pv` returns what the buyer
/// pays, so its sign is flipped.
fn price_at(bond: &Bond, coupon: Money, periods: u32, periodic_yield: Rate) -> FinCalcResult<Money> {
    let pv = time_value::pv(
        periodic_yield,
        Decimal::from(periods),
        coupon,
        bond.face_value,
        AnnuityTiming::Ordinary,
    )?;
    Ok(-pv)
}

/// (C + (F − P)/n) / ((F + P)/2), per period. Falls back to the periodic
/// coupon rate when the approximation is unusable.
fn approximate_ytm(bond: &Bond, coupon: Money, periods: u32, price: Money) -> FinCalcResult<Rate> {
    let fallback = periodic_rate(bond.coupon_rate_pct, bond.payments_per_year)?;
    let midpoint = bond.face_value / dec!(2) + price / dec!(2);
    let seed = bond
        .face_value
        .checked_sub(price)
        .and_then(|gap| gap.checked_div(Decimal::from(periods)))
        .and_then(|accretion| coupon.checked_add(accretion))
        .and_then(|numerator| numerator.checked_div(midpoint));
    match seed {
        Some(seed) if seed > dec!(-1) => Ok(seed),
        _ => Ok(fallback),
    }
}

fn current_yield_pct(bond: &Bond, price: Money) -> FinCalcResult<Percent> {
    to_percent(div(annual_coupon(bond)?, price, "current yield")?)
}

/// Σ t·PV(CFₜ) / price with t in years, discount factors built iteratively.
fn macaulay_duration(
    coupon: Money,
    face_value: Money,
    periodic_yield: Rate,
    periods: u32,
    payments_per_year: u32,
    price: Money,
) -> FinCalcResult<Decimal> {
    let one_plus_y = add(Decimal::ONE, periodic_yield, "Macaulay duration")?;
    let freq = Decimal::from(payments_per_year);
    let mut weighted_sum = Decimal::ZERO;
    let mut df = Decimal::ONE;

    for t in 1..=periods {
        df = div(df, one_plus_y, "Macaulay duration")?;
        let cf = if t == periods {
            add(coupon, face_value, "Macaulay duration")?
        } else {
            coupon
        };
        let discounted = mul(cf, df, "Macaulay duration")?;
        let weight = mul(Decimal::from(t) / freq, discounted, "Macaulay duration")?;
        weighted_sum = add(weighted_sum, weight, "Macaulay duration")?;
    }

    div(weighted_sum, price, "Macaulay duration: bond price")
}
