//! NPV, IRR and payback analysis for periodic cash-flow series.
//!
//! Index 0 is the initial flow (usually the negative outlay) and each later
//! index is one period further out. Rates are percentages at the boundary.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::error::FinCalcError;
use crate::solver::{self, Solution, SolverConfig};
use crate::time_value::{add, div, mul, sub};
use crate::types::*;
use crate::FinCalcResult;

pub const DEFAULT_IRR_GUESS_PCT: Percent = dec!(10);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for a full cash-flow analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlowInput {
    pub cash_flows: Vec<Money>,
    /// Discount rate for NPV, profitability index and discounted payback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_rate_pct: Option<Percent>,
    /// IRR seed (default 10%)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub irr_guess_pct: Option<Percent>,
    /// Fail with `AmbiguousRoots` instead of flagging multiple sign changes
    #[serde(default)]
    pub require_unique_irr: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver: Option<SolverConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrrResult {
    /// Periodic IRR as a percentage
    pub irr_pct: Percent,
    pub sign_changes: usize,
    /// More than one sign change: other roots may exist
    pub multiple_roots_possible: bool,
    pub solution: Solution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlowOutput {
    pub npv: Option<Money>,
    pub irr: Option<IrrResult>,
    pub sign_changes: usize,
    /// PV of flows after period 0 over the initial outlay
    pub profitability_index: Option<Decimal>,
    /// Periods until cumulative flows turn non-negative
    pub payback_period: Option<Decimal>,
    pub discounted_payback_period: Option<Decimal>,
    pub total_inflows: Money,
    /// Sum of negative flows, as a positive amount
    pub total_outflows: Money,
    pub net_cash_flow: Money,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Net present value at a periodic rate given in percent.
pub fn npv(cash_flows: &[Money], rate_pct: Percent) -> FinCalcResult<Money> {
    if cash_flows.is_empty() {
        return Err(FinCalcError::InsufficientData(
            "NPV needs at least one cash flow".into(),
        ));
    }
    let rate = to_rate(rate_pct)?;
    npv_at(cash_flows, rate)
}

/// Internal rate of return seeded at 10%.
pub fn irr(cash_flows: &[Money]) -> FinCalcResult<IrrResult> {
    irr_with_guess(cash_flows, DEFAULT_IRR_GUESS_PCT, &SolverConfig::default())
}

/// Internal rate of return from an explicit seed.
///
/// With several sign changes the first root reached from the seed is
/// returned and `multiple_roots_possible` is set.
pub fn irr_with_guess(
    cash_flows: &[Money],
    guess_pct: Percent,
    config: &SolverConfig,
) -> FinCalcResult<IrrResult> {
    if cash_flows.len() < 2 {
        return Err(FinCalcError::InsufficientData(
            "IRR needs at least two cash flows".into(),
        ));
    }
    config.validate()?;

    let sign_changes = count_sign_changes(cash_flows);
    if sign_changes == 0 {
        return Err(FinCalcError::NoSignChange {
            function: "IRR".into(),
            lower: dec!(-1),
            upper: Decimal::MAX,
        });
    }

    let guess = to_rate(guess_pct)?;
    debug!(guess = %guess, sign_changes, "solving IRR");
    let solution = solver::find_root_with_derivative(
        "IRR",
        |r| npv_at(cash_flows, r),
        |r| npv_derivative(cash_flows, r),
        guess,
        &config.for_rates(),
    )?;

    Ok(IrrResult {
        irr_pct: to_percent(solution.root)?,
        sign_changes,
        multiple_roots_possible: sign_changes > 1,
        solution,
    })
}

/// NPV, IRR, profitability index and payback for a cash-flow series.
pub fn analyze_cash_flows(
    input: &CashFlowInput,
) -> FinCalcResult<ComputationOutput<CashFlowOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let flows = &input.cash_flows;

    if flows.is_empty() {
        return Err(FinCalcError::InsufficientData(
            "At least one cash flow is required".into(),
        ));
    }
    let config = input.solver.unwrap_or_default();
    config.validate()?;

    let sign_changes = count_sign_changes(flows);
    if input.require_unique_irr && sign_changes > 1 {
        return Err(FinCalcError::AmbiguousRoots {
            function: "IRR".into(),
            sign_changes,
        });
    }

    // --- NPV and discounted measures ---
    let discount_rate = input.discount_rate_pct.map(to_rate).transpose()?;
    let npv_value = match discount_rate {
        Some(r) => Some(npv_at(flows, r)?),
        None => None,
    };
    let profitability_index = match (discount_rate, npv_value) {
        (Some(_), Some(value)) if flows[0] < Decimal::ZERO => {
            let outlay = -flows[0];
            let gross = add(value, outlay, "profitability index")?;
            Some(div(gross, outlay, "profitability index")?)
        }
        _ => None,
    };
    let discounted_payback_period = match discount_rate {
        Some(r) => {
            let discounted = discounted_flows(flows, r)?;
            let period = payback(&discounted)?;
            if period.is_none() {
                warnings.push("Discounted cash flows never recover the initial outlay".into());
            }
            period
        }
        None => None,
    };

    // --- IRR ---
    let irr_result = if flows.len() >= 2 {
        let guess = input.irr_guess_pct.unwrap_or(DEFAULT_IRR_GUESS_PCT);
        match irr_with_guess(flows, guess, &config) {
            Ok(result) => {
                if result.multiple_roots_possible {
                    warnings.push(format!(
                        "{} sign changes in cash flows; other IRRs may exist",
                        result.sign_changes
                    ));
                }
                Some(result)
            }
            Err(e) => {
                warnings.push(format!("IRR calculation warning: {e}"));
                None
            }
        }
    } else {
        warnings.push("IRR requires at least 2 cash flows".into());
        None
    };

    // --- Payback and totals ---
    let payback_period = payback(flows)?;
    if payback_period.is_none() {
        warnings.push("Cash flows never recover the initial outlay".into());
    }

    let total_inflows = checked_sum(flows.iter().filter(|cf| **cf > Decimal::ZERO), "inflows")?;
    let total_outflows =
        -checked_sum(flows.iter().filter(|cf| **cf < Decimal::ZERO), "outflows")?;

    let output = CashFlowOutput {
        npv: npv_value,
        irr: irr_result,
        sign_changes,
        profitability_index,
        payback_period,
        discounted_payback_period,
        total_inflows,
        total_outflows,
        net_cash_flow: total_inflows - total_outflows,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Discounted cash flow analysis (NPV, IRR, payback)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn to_rate(rate_pct: Percent) -> FinCalcResult<Rate> {
    if rate_pct <= dec!(-100) {
        return Err(FinCalcError::InvalidInput {
            field: "rate_pct".into(),
            reason: "Rate must be greater than -100%".into(),
        });
    }
    Ok(rate_pct / dec!(100))
}

/// Σ CFₜ / (1+r)ᵗ with iteratively built discount factors.
fn npv_at(cash_flows: &[Money], rate: Rate) -> FinCalcResult<Money> {
    let one_plus_r = add(Decimal::ONE, rate, "NPV discount factor")?;
    let mut df = Decimal::ONE;
    let mut total = Decimal::ZERO;
    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            df = div(df, one_plus_r, "NPV discount factor")?;
        }
        total = cf
            .checked_mul(df)
            .and_then(|pv| total.checked_add(pv))
            .ok_or_else(|| FinCalcError::overflow("NPV"))?;
    }
    Ok(total)
}

/// dNPV/dr = Σ −t·CFₜ / (1+r)^(t+1)
fn npv_derivative(cash_flows: &[Money], rate: Rate) -> FinCalcResult<Decimal> {
    let one_plus_r = add(Decimal::ONE, rate, "NPV derivative")?;
    let mut df = div(Decimal::ONE, one_plus_r, "NPV derivative")?;
    let mut total = Decimal::ZERO;
    for (t, cf) in cash_flows.iter().enumerate().skip(1) {
        df = div(df, one_plus_r, "NPV derivative")?;
        let term = cf
            .checked_mul(Decimal::from(t))
            .and_then(|x| x.checked_mul(df))
            .ok_or_else(|| FinCalcError::overflow("NPV derivative"))?;
        total = sub(total, term, "NPV derivative")?;
    }
    Ok(total)
}

fn discounted_flows(cash_flows: &[Money], rate: Rate) -> FinCalcResult<Vec<Money>> {
    let one_plus_r = add(Decimal::ONE, rate, "discounted payback")?;
    let mut df = Decimal::ONE;
    let mut out = Vec::with_capacity(cash_flows.len());
    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            df = div(df, one_plus_r, "discounted payback")?;
        }
        out.push(mul(*cf, df, "discounted payback")?);
    }
    Ok(out)
}

/// Sign changes between consecutive non-zero flows.
fn count_sign_changes(cash_flows: &[Money]) -> usize {
    let mut changes = 0;
    let mut previous: Option<bool> = None;
    for cf in cash_flows.iter().filter(|cf| !cf.is_zero()) {
        let positive = cf.is_sign_positive();
        if let Some(prev) = previous {
            if prev != positive {
                changes += 1;
            }
        }
        previous = Some(positive);
    }
    changes
}

fn checked_sum<'a>(
    mut flows: impl Iterator<Item = &'a Money>,
    context: &str,
) -> FinCalcResult<Money> {
    flows.try_fold(Decimal::ZERO, |total, cf| add(total, *cf, context))
}

/// First point at which the running total stops being negative, linear
/// within the period. `None` if it never does.
fn payback(cash_flows: &[Money]) -> FinCalcResult<Option<Decimal>> {
    let mut cumulative = Decimal::ZERO;
    for (t, cf) in cash_flows.iter().enumerate() {
        let before = cumulative;
        cumulative = add(cumulative, *cf, "payback")?;
        if cumulative >= Decimal::ZERO {
            if t == 0 || before >= Decimal::ZERO {
                return Ok(Some(Decimal::ZERO));
            }
            // cf >= -before here, so the fraction lies in (0, 1]
            let fraction = -before / *cf;
            return Ok(Some(Decimal::from(t - 1) + fraction));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Vec<Decimal> {
        vec![
            dec!(-1000),
            dec!(300),
            dec!(300),
            dec!(300),
            dec!(300),
            dec!(300),
        ]
    }

    #[test]
    fn test_npv_at_ten_percent() {
        let value = npv(&project(), dec!(10)).unwrap();
        assert!((value - dec!(137.24)).abs() < dec!(0.01), "npv was {value}");
    }

    #[test]
    fn test_npv_rejects_total_loss_rate() {
        assert!(matches!(
            npv(&project(), dec!(-100)),
            Err(FinCalcError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_irr_of_level_project() {
        let result = irr(&project()).unwrap();
        assert!(
            (result.irr_pct - dec!(15.24)).abs() < dec!(0.01),
            "irr was {}",
            result.irr_pct
        );
        assert!(!result.multiple_roots_possible);
    }

    #[test]
    fn test_irr_single_period() {
        let result = irr(&[dec!(-100), dec!(110)]).unwrap();
        assert!((result.irr_pct - dec!(10)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_irr_needs_two_flows() {
        assert!(matches!(
            irr(&[dec!(-100)]),
            Err(FinCalcError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_irr_without_sign_change() {
        let err = irr(&[dec!(100), dec!(50), dec!(25)]).unwrap_err();
        assert!(matches!(err, FinCalcError::NoSignChange { .. }));
    }

    #[test]
    fn test_sign_changes_skip_zeros() {
        assert_eq!(count_sign_changes(&[dec!(-1), dec!(0), dec!(2), dec!(-3)]), 2);
        assert_eq!(count_sign_changes(&[dec!(0), dec!(5)]), 0);
    }

    #[test]
    fn test_payback_is_fractional() {
        // -1000 recovered after 3 full periods and 1/3 of the fourth
        let period = payback(&project()).unwrap().unwrap();
        assert!((period - dec!(3.3333333)).abs() < dec!(0.0000001));
    }

    #[test]
    fn test_payback_never_recovered() {
        assert_eq!(payback(&[dec!(-1000), dec!(100), dec!(100)]).unwrap(), None);
    }

    #[test]
    fn test_analyze_level_project() {
        let input = CashFlowInput {
            cash_flows: project(),
            discount_rate_pct: Some(dec!(10)),
            irr_guess_pct: None,
            require_unique_irr: false,
            solver: None,
        };
        let out = analyze_cash_flows(&input).unwrap();
        let result = out.result;
        assert!((result.npv.unwrap() - dec!(137.24)).abs() < dec!(0.01));
        assert!((result.profitability_index.unwrap() - dec!(1.13724)).abs() < dec!(0.00001));
        assert!(result.discounted_payback_period.unwrap() > result.payback_period.unwrap());
        assert_eq!(result.total_inflows, dec!(1500));
        assert_eq!(result.total_outflows, dec!(1000));
        assert_eq!(result.net_cash_flow, dec!(500));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_analyze_turns_irr_failure_into_warning() {
        let input = CashFlowInput {
            cash_flows: vec![dec!(100), dec!(100)],
            discount_rate_pct: Some(dec!(5)),
            irr_guess_pct: None,
            require_unique_irr: false,
            solver: None,
        };
        let out = analyze_cash_flows(&input).unwrap();
        assert!(out.result.irr.is_none());
        assert!(out.warnings.iter().any(|w| w.contains("IRR")));
    }

    #[test]
    fn test_overflowing_flows_are_out_of_domain() {
        let input = CashFlowInput {
            cash_flows: vec![dec!(-1), Decimal::MAX, Decimal::MAX],
            discount_rate_pct: None,
            irr_guess_pct: None,
            require_unique_irr: false,
            solver: None,
        };
        assert!(matches!(
            analyze_cash_flows(&input),
            Err(FinCalcError::OutOfDomain { .. })
        ));
        assert!(matches!(
            npv(&[Decimal::MAX, Decimal::MAX], dec!(-50)),
            Err(FinCalcError::OutOfDomain { .. })
        ));
        let flows = [
            Decimal::ZERO,
            dec!(-50000000000000000000000000000),
            dec!(-20000000000000000000000000000),
        ];
        assert!(matches!(
            npv_derivative(&flows, Decimal::ZERO),
            Err(FinCalcError::OutOfDomain { .. })
        ));
    }

    #[test]
    fn test_analyze_strict_mode_rejects_ambiguous_irr() {
        let input = CashFlowInput {
            cash_flows: vec![dec!(-100), dec!(230), dec!(-132)],
            discount_rate_pct: None,
            irr_guess_pct: None,
            require_unique_irr: true,
            solver: None,
        };
        let err = analyze_cash_flows(&input).unwrap_err();
        assert!(matches!(
            err,
            FinCalcError::AmbiguousRoots { sign_changes: 2, .. }
        ));
    }
}
