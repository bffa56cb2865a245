//! Time value of money: PV, FV, PMT, rate and term.
//!
//! Cash-flow sign convention: money received is positive, money paid out is
//! negative. Every primitive satisfies
//!
//! ```text
//! PV·(1+r)^n + PMT·(1 + r·τ)·A(r, n) + FV = 0,    A(r, n) = ((1+r)^n − 1) / r
//! ```
//!
//! where τ is 1 for an annuity-due and 0 for an ordinary annuity, and
//! A(0, n) = n. Rates here are periodic decimals and `nper` is a period count;
//! [`solve_tvm`] is the entry point that takes annual percentages and years.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::FinCalcError;
use crate::solver::{self, Solution, SolverConfig};
use crate::types::*;
use crate::FinCalcResult;

/// Fallback seed for the rate solver when the heuristic is undefined.
const DEFAULT_RATE_GUESS: Rate = dec!(0.01);
const MIN_RATE_GUESS: Rate = dec!(0.0001);
const MAX_RATE_GUESS: Rate = dec!(1);

// ---------------------------------------------------------------------------
// Checked arithmetic
// ---------------------------------------------------------------------------

pub(crate) fn mul(a: Decimal, b: Decimal, context: &str) -> FinCalcResult<Decimal> {
    a.checked_mul(b)
        .ok_or_else(|| FinCalcError::overflow(context))
}

pub(crate) fn div(a: Decimal, b: Decimal, context: &str) -> FinCalcResult<Decimal> {
    if b.is_zero() {
        return Err(FinCalcError::DivisionByZero {
            context: context.into(),
        });
    }
    a.checked_div(b)
        .ok_or_else(|| FinCalcError::overflow(context))
}

pub(crate) fn add(a: Decimal, b: Decimal, context: &str) -> FinCalcResult<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| FinCalcError::overflow(context))
}

pub(crate) fn sub(a: Decimal, b: Decimal, context: &str) -> FinCalcResult<Decimal> {
    a.checked_sub(b)
        .ok_or_else(|| FinCalcError::overflow(context))
}

// ---------------------------------------------------------------------------
// Discounting primitives
// ---------------------------------------------------------------------------

/// (1 + rate)^periods. Integer period counts use exact repeated
/// multiplication; fractional counts go through exp/ln.
pub fn compound_factor(rate: Rate, periods: Decimal) -> FinCalcResult<Decimal> {
    let base = add(Decimal::ONE, rate, "compound factor")?;
    if base <= Decimal::ZERO {
        return Err(FinCalcError::OutOfDomain {
            context: "compound factor".into(),
            reason: format!("rate {rate} must be greater than -100%"),
        });
    }
    if periods.is_zero() || rate.is_zero() {
        return Ok(Decimal::ONE);
    }

    if periods.fract().is_zero() {
        let n = periods
            .abs()
            .to_u64()
            .ok_or_else(|| FinCalcError::overflow("compound factor"))?;
        let grown = base
            .checked_powu(n)
            .ok_or_else(|| FinCalcError::overflow("compound factor"))?;
        if periods < Decimal::ZERO {
            div(Decimal::ONE, grown, "compound factor")
        } else {
            Ok(grown)
        }
    } else {
        base.checked_ln()
            .and_then(|ln| ln.checked_mul(periods))
            .and_then(|x| x.checked_exp())
            .ok_or_else(|| FinCalcError::overflow("compound factor"))
    }
}

/// 1 / (1 + rate)^periods
pub fn discount_factor(rate: Rate, periods: Decimal) -> FinCalcResult<Decimal> {
    div(Decimal::ONE, compound_factor(rate, periods)?, "discount factor")
}

/// Future value of one unit paid at the end of each period:
/// ((1+r)^n − 1)/r, or n when r is zero.
pub fn annuity_factor(rate: Rate, periods: Decimal) -> FinCalcResult<Decimal> {
    let growth = compound_factor(rate, periods)?;
    annuity_from_growth(rate, periods, growth)
}

fn annuity_from_growth(rate: Rate, periods: Decimal, growth: Decimal) -> FinCalcResult<Decimal> {
    if rate.is_zero() {
        return Ok(periods);
    }
    div(growth - Decimal::ONE, rate, "annuity factor")
}

/// 1 + r for annuity-due payments, 1 otherwise.
fn timing_factor(rate: Rate, timing: AnnuityTiming) -> FinCalcResult<Decimal> {
    if timing.is_due() {
        add(Decimal::ONE, rate, "annuity-due factor")
    } else {
        Ok(Decimal::ONE)
    }
}

/// Payment scaled by the annuity-due factor.
fn timed_payment(
    pmt: Money,
    rate: Rate,
    timing: AnnuityTiming,
    context: &str,
) -> FinCalcResult<Money> {
    mul(pmt, timing_factor(rate, timing)?, context)
}

/// (1 + r)^k − 1: the effective rate over `periods_per_year` compounding
/// periods.
pub fn effective_annual_rate(periodic: Rate, periods_per_year: u32) -> FinCalcResult<Rate> {
    Ok(compound_factor(periodic, Decimal::from(periods_per_year))? - Decimal::ONE)
}

// ---------------------------------------------------------------------------
// Closed-form solvers
// ---------------------------------------------------------------------------

/// Present Value
pub fn pv(
    rate: Rate,
    nper: Decimal,
    pmt: Money,
    fv: Money,
    timing: AnnuityTiming,
) -> FinCalcResult<Money> {
    if rate.is_zero() {
        return Ok(-add(fv, mul(pmt, nper, "PV")?, "PV")?);
    }

    let growth = compound_factor(rate, nper)?;
    let annuity = annuity_from_growth(rate, nper, growth)?;
    let payments = mul(timed_payment(pmt, rate, timing, "PV")?, annuity, "PV")?;
    Ok(-div(add(payments, fv, "PV")?, growth, "PV factor")?)
}

/// Future Value
pub fn fv(
    rate: Rate,
    nper: Decimal,
    pmt: Money,
    present_value: Money,
    timing: AnnuityTiming,
) -> FinCalcResult<Money> {
    if rate.is_zero() {
        return Ok(-add(present_value, mul(pmt, nper, "FV")?, "FV")?);
    }

    let growth = compound_factor(rate, nper)?;
    let annuity = annuity_from_growth(rate, nper, growth)?;
    let grown = mul(present_value, growth, "FV")?;
    let payments = mul(timed_payment(pmt, rate, timing, "FV")?, annuity, "FV")?;
    Ok(-add(grown, payments, "FV")?)
}

/// Payment (PMT)
pub fn pmt(
    rate: Rate,
    nper: Decimal,
    present_value: Money,
    future_value: Money,
    timing: AnnuityTiming,
) -> FinCalcResult<Money> {
    if nper <= Decimal::ZERO {
        return Err(FinCalcError::InvalidInput {
            field: "nper".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }

    if rate.is_zero() {
        return div(-add(present_value, future_value, "PMT")?, nper, "PMT");
    }

    let growth = compound_factor(rate, nper)?;
    let annuity = mul(
        annuity_from_growth(rate, nper, growth)?,
        timing_factor(rate, timing)?,
        "PMT annuity factor",
    )?;
    let target = add(mul(present_value, growth, "PMT")?, future_value, "PMT")?;
    Ok(-div(target, annuity, "PMT annuity factor")?)
}

/// Number of periods (NPER)
pub fn nper(
    rate: Rate,
    pmt: Money,
    present_value: Money,
    future_value: Money,
    timing: AnnuityTiming,
) -> FinCalcResult<Decimal> {
    let periods = if rate.is_zero() {
        let target = add(present_value, future_value, "NPER")?;
        div(-target, pmt, "NPER with zero rate and zero payment")?
    } else {
        if rate <= dec!(-1) {
            return Err(FinCalcError::OutOfDomain {
                context: "NPER".into(),
                reason: "rate must be greater than -100%".into(),
            });
        }
        let timed = timed_payment(pmt, rate, timing, "NPER")?;
        let numerator = sub(timed, mul(future_value, rate, "NPER")?, "NPER")?;
        let denominator = add(timed, mul(present_value, rate, "NPER")?, "NPER")?;
        let ratio = div(numerator, denominator, "NPER")?;
        if ratio <= Decimal::ZERO {
            return Err(FinCalcError::OutOfDomain {
                context: "NPER".into(),
                reason: "logarithm of a non-positive value; the payment never reaches the target"
                    .into(),
            });
        }
        let log_ratio = ratio
            .checked_ln()
            .ok_or_else(|| FinCalcError::overflow("NPER"))?;
        let log_base = add(Decimal::ONE, rate, "NPER")?
            .checked_ln()
            .ok_or_else(|| FinCalcError::overflow("NPER"))?;
        div(log_ratio, log_base, "NPER log base")?
    };

    if periods < Decimal::ZERO {
        return Err(FinCalcError::FinancialImpossibility(format!(
            "Solved number of periods is negative ({periods}); check the signs of PV, PMT and FV"
        )));
    }
    Ok(periods)
}

// ---------------------------------------------------------------------------
// Iterative rate solver
// ---------------------------------------------------------------------------

/// Signed TVM balance; zero at the periodic rate that ties PV, PMT and FV.
///
/// Positive rates use the balance discounted to the start of the term,
/// `PV + PMT·(1 + r·τ)·(1 − v^n)/r + FV·v^n` with `v = 1/(1+r)`, which stays
/// bounded however large r gets. Negative rates keep the compounded form,
/// whose growth factor is below one. Both forms agree at r = 0 and differ
/// by the positive factor (1+r)^n elsewhere, so they share roots and signs.
fn tvm_residual(
    rate: Rate,
    nper: Decimal,
    pmt: Money,
    present_value: Money,
    future_value: Money,
    timing: AnnuityTiming,
) -> FinCalcResult<Decimal> {
    const CONTEXT: &str = "RATE residual";
    let timed = timed_payment(pmt, rate, timing, CONTEXT)?;

    if rate <= Decimal::ZERO {
        let growth = compound_factor(rate, nper)?;
        let annuity = annuity_from_growth(rate, nper, growth)?;
        let grown = mul(present_value, growth, CONTEXT)?;
        let payments = mul(timed, annuity, CONTEXT)?;
        return add(add(grown, payments, CONTEXT)?, future_value, CONTEXT);
    }

    let discount = decayed_discount_factor(rate, nper)?;
    let annuity = div(Decimal::ONE - discount, rate, CONTEXT)?;
    let payments = mul(timed, annuity, CONTEXT)?;
    let face = mul(future_value, discount, CONTEXT)?;
    add(add(present_value, payments, CONTEXT)?, face, CONTEXT)
}

/// (1+r)^−n for r > 0, computed as a power of 1/(1+r) so it shrinks toward
/// zero instead of overflowing.
fn decayed_discount_factor(rate: Rate, periods: Decimal) -> FinCalcResult<Decimal> {
    let one_plus_r = add(Decimal::ONE, rate, "discount factor")?;
    let base = div(Decimal::ONE, one_plus_r, "discount factor")?;
    let decayed = if periods.fract().is_zero() {
        let n = periods
            .to_u64()
            .ok_or_else(|| FinCalcError::overflow("discount factor"))?;
        base.checked_powu(n)
    } else {
        base.checked_ln()
            .and_then(|ln| ln.checked_mul(periods))
            .and_then(|x| x.checked_exp())
    };
    // base < 1, so a failed power is an underflow
    Ok(decayed.unwrap_or(Decimal::ZERO))
}

/// Arithmetic-mean seed: net interest spread evenly over the term, relative
/// to a rough average balance.
fn rate_seed(nper: Decimal, pmt: Money, present_value: Money, future_value: Money) -> Rate {
    let total_paid = pmt.checked_mul(nper);
    let net = total_paid
        .and_then(|paid| present_value.checked_add(paid))
        .and_then(|x| x.checked_add(future_value));
    let scale = total_paid
        .map(|paid| paid.abs() / dec!(4))
        .and_then(|x| x.checked_add(present_value.abs() / dec!(2)))
        .and_then(|x| x.checked_add(future_value.abs() / dec!(2)));

    match (net, scale) {
        (Some(net), Some(scale)) if !scale.is_zero() && !nper.is_zero() => nper
            .checked_mul(scale)
            .and_then(|weight| net.abs().checked_div(weight))
            .map_or(DEFAULT_RATE_GUESS, |seed| seed.clamp(MIN_RATE_GUESS, MAX_RATE_GUESS)),
        _ => DEFAULT_RATE_GUESS,
    }
}

/// Periodic interest rate (RATE).
///
/// Degenerate cases are solved exactly: a zero net flow means a zero rate,
/// and a zero payment reduces to r = (−FV/PV)^(1/n) − 1. Everything else
/// goes through the root finder on the TVM residual over r > −1.
pub fn rate(
    nper: Decimal,
    pmt: Money,
    present_value: Money,
    future_value: Money,
    timing: AnnuityTiming,
    config: &SolverConfig,
) -> FinCalcResult<Solution> {
    if nper <= Decimal::ZERO {
        return Err(FinCalcError::InvalidInput {
            field: "nper".into(),
            reason: "Rate is undetermined without at least one period".into(),
        });
    }

    let total_paid = mul(pmt, nper, "RATE")?;
    if add(add(present_value, total_paid, "RATE")?, future_value, "RATE")?.is_zero() {
        return Ok(Solution::closed_form(Decimal::ZERO));
    }

    if pmt.is_zero() {
        if present_value.is_zero() {
            return Err(FinCalcError::OutOfDomain {
                context: "RATE".into(),
                reason: "PV and PMT are both zero".into(),
            });
        }
        let ratio = div(-future_value, present_value, "RATE")?;
        if ratio <= Decimal::ZERO {
            return Err(FinCalcError::OutOfDomain {
                context: "RATE".into(),
                reason: "PV and FV must have opposite signs when there is no payment".into(),
            });
        }
        let growth = ratio
            .checked_ln()
            .and_then(|ln| ln.checked_div(nper))
            .and_then(|x| x.checked_exp())
            .ok_or_else(|| FinCalcError::overflow("RATE"))?;
        return Ok(Solution::closed_form(growth - Decimal::ONE));
    }

    let guess = rate_seed(nper, pmt, present_value, future_value);
    debug!(guess = %guess, "solving TVM rate");
    solver::find_root(
        "RATE",
        |r| tvm_residual(r, nper, pmt, present_value, future_value, timing),
        guess,
        &config.for_rates(),
    )
}

// ---------------------------------------------------------------------------
// Request-level API
// ---------------------------------------------------------------------------

/// The TVM variable to solve for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TvmVariable {
    PresentValue,
    FutureValue,
    Payment,
    Rate,
    Years,
}

impl TvmVariable {
    /// Input field that carries this variable.
    pub fn field(self) -> &'static str {
        match self {
            TvmVariable::PresentValue => "present_value",
            TvmVariable::FutureValue => "future_value",
            TvmVariable::Payment => "payment",
            TvmVariable::Rate => "annual_rate_pct",
            TvmVariable::Years => "years",
        }
    }
}

/// Input for a TVM solve. Exactly one of the five values must be absent,
/// and it must be the `solve_for` variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvmInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub present_value: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub future_value: Option<Money>,
    /// Payment per period
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<Money>,
    /// Annual nominal rate as a percentage (6.0 = 6%)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_rate_pct: Option<Percent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years: Option<Years>,
    #[serde(default)]
    pub frequency: PaymentFrequency,
    pub solve_for: TvmVariable,
    /// Overrides for the rate solver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver: Option<SolverConfig>,
}

/// Output of a TVM solve: the solved value plus the completed problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvmOutput {
    pub solved_for: TvmVariable,
    /// The solved value in boundary units (annual % for rate, years for term)
    pub value: Decimal,
    pub present_value: Money,
    pub future_value: Money,
    pub payment: Money,
    pub annual_rate_pct: Percent,
    pub years: Years,
    pub periodic_rate: Rate,
    pub total_periods: Decimal,
    pub effective_annual_rate_pct: Percent,
    /// payment × total_periods
    pub total_payments: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<Solution>,
}

/// Solve a TVM problem for its single unknown.
pub fn solve_tvm(input: &TvmInput) -> FinCalcResult<ComputationOutput<TvmOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_tvm_input(input)?;

    let periods_per_year = input.frequency.periods_per_year;
    let timing = input.frequency.timing;
    let config = input.solver.unwrap_or_default();

    let mut present = input.present_value.unwrap_or_default();
    let mut future = input.future_value.unwrap_or_default();
    let mut payment = input.payment.unwrap_or_default();
    let mut periodic = match input.annual_rate_pct {
        Some(pct) => periodic_rate(pct, periods_per_year)?,
        None => Decimal::ZERO,
    };
    let mut periods = input
        .years
        .map(|y| mul(y, Decimal::from(periods_per_year), "total periods"))
        .transpose()?
        .unwrap_or_default();
    let mut solution = None;

    match input.solve_for {
        TvmVariable::PresentValue => present = pv(periodic, periods, payment, future, timing)?,
        TvmVariable::FutureValue => future = fv(periodic, periods, payment, present, timing)?,
        TvmVariable::Payment => payment = pmt(periodic, periods, present, future, timing)?,
        TvmVariable::Rate => {
            let solved = rate(periods, payment, present, future, timing, &config)?;
            periodic = solved.root;
            solution = Some(solved);
        }
        TvmVariable::Years => periods = nper(periodic, payment, present, future, timing)?,
    }

    let annual_pct = annual_rate_pct(periodic, periods_per_year)?;
    let years = periods / Decimal::from(periods_per_year);

    if input.solve_for == TvmVariable::Years && !periods.fract().is_zero() {
        warnings.push(format!(
            "Solved term of {periods} periods is not a whole number; the final payment is partial"
        ));
    }
    if periodic < Decimal::ZERO {
        warnings.push("Rate is negative".into());
    }

    let value = match input.solve_for {
        TvmVariable::PresentValue => present,
        TvmVariable::FutureValue => future,
        TvmVariable::Payment => payment,
        TvmVariable::Rate => annual_pct,
        TvmVariable::Years => years,
    };

    let output = TvmOutput {
        solved_for: input.solve_for,
        value,
        present_value: present,
        future_value: future,
        payment,
        annual_rate_pct: annual_pct,
        years,
        periodic_rate: periodic,
        total_periods: periods,
        effective_annual_rate_pct: to_percent(effective_annual_rate(periodic, periods_per_year)?)?,
        total_payments: mul(payment, periods, "total payments")?,
        solution,
    };

    let methodology = if input.solve_for == TvmVariable::Rate {
        "Time value of money — rate by Newton-Raphson with bisection fallback"
    } else {
        "Time value of money — closed form"
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(methodology, input, warnings, elapsed, output))
}

fn validate_tvm_input(input: &TvmInput) -> FinCalcResult<()> {
    let slots = [
        (TvmVariable::PresentValue, input.present_value.is_some()),
        (TvmVariable::FutureValue, input.future_value.is_some()),
        (TvmVariable::Payment, input.payment.is_some()),
        (TvmVariable::Rate, input.annual_rate_pct.is_some()),
        (TvmVariable::Years, input.years.is_some()),
    ];
    let unknown: Vec<TvmVariable> = slots
        .iter()
        .filter(|(_, known)| !known)
        .map(|(var, _)| *var)
        .collect();

    if unknown.len() != 1 {
        return Err(FinCalcError::InvalidInput {
            field: "solve_for".into(),
            reason: format!(
                "Exactly one of present_value, future_value, payment, annual_rate_pct, years must be unknown; found {}",
                unknown.len()
            ),
        });
    }
    if unknown[0] != input.solve_for {
        return Err(FinCalcError::InvalidInput {
            field: input.solve_for.field().into(),
            reason: format!(
                "Value must be left unset when solving for it; {} is missing instead",
                unknown[0].field()
            ),
        });
    }
    if input.frequency.periods_per_year == 0 {
        return Err(FinCalcError::InvalidInput {
            field: "frequency.periods_per_year".into(),
            reason: "Periods per year must be > 0".into(),
        });
    }
    if let Some(years) = input.years {
        if years < Decimal::ZERO {
            return Err(FinCalcError::InvalidInput {
                field: "years".into(),
                reason: "Term cannot be negative".into(),
            });
        }
    }
    if let Some(config) = &input.solver {
        config.validate()?;
    }
    Ok(())
}
