use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::FinCalcError;
use crate::time_value::{self, add, mul, sub};
use crate::types::*;
use crate::FinCalcResult;

/// Balances below one cent count as paid off.
const MIN_BALANCE: Money = dec!(0.01);

/// 100 years of monthly payments.
pub const MAX_TOTAL_PERIODS: u32 = 1200;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for a level-payment loan schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationInput {
    /// Amount borrowed
    pub principal: Money,
    /// Annual nominal rate as a percentage (6.0 = 6%)
    pub annual_rate_pct: Percent,
    /// Contractual number of payments
    pub total_periods: u32,
    #[serde(default = "default_periods_per_year")]
    pub payments_per_year: u32,
    /// Additional principal paid every period
    #[serde(default)]
    pub extra_payment: Money,
}

/// One row of an amortization schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationEntry {
    pub period: u32,
    pub payment: Money,
    pub principal: Money,
    pub interest: Money,
    pub remaining_balance: Money,
    pub cumulative_interest: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationOutput {
    /// Level payment before any extra payment
    pub base_payment: Money,
    pub periodic_rate: Rate,
    pub schedule: Vec<AmortizationEntry>,
    /// Periods actually needed to retire the loan
    pub payoff_periods: u32,
    pub payoff_years: Years,
    pub total_paid: Money,
    pub total_interest: Money,
    pub total_principal: Money,
}

/// Effect of an extra periodic payment against the contractual schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraPaymentSavings {
    pub base_payment: Money,
    pub extra_payment: Money,
    pub original_periods: u32,
    pub accelerated_periods: u32,
    pub periods_saved: u32,
    pub years_saved: Years,
    pub original_interest: Money,
    pub accelerated_interest: Money,
    pub interest_saved: Money,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Build the period-by-period schedule for a fixed-rate loan.
///
/// Interest accrues on the opening balance; whatever is left of the payment
/// retires principal. The last contractual period, and any period that would
/// leave less than a cent outstanding, pays off the whole balance so the
/// schedule always closes at zero.
pub fn amortize(input: &AmortizationInput) -> FinCalcResult<ComputationOutput<AmortizationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;
    let output = build_schedule(input)?;

    if input.extra_payment > Decimal::ZERO && output.payoff_periods < input.total_periods {
        warnings.push(format!(
            "Extra payments retire the loan in {} of {} periods",
            output.payoff_periods, input.total_periods
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Level-payment amortization with final-period balance correction",
        input,
        warnings,
        elapsed,
        output,
    ))
}

/// Compare the schedule with and without `extra_payment`.
pub fn extra_payment_savings(
    input: &AmortizationInput,
) -> FinCalcResult<ComputationOutput<ExtraPaymentSavings>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;
    if input.extra_payment.is_zero() {
        warnings.push("No extra payment given; savings are zero".into());
    }

    let original = build_schedule(&AmortizationInput {
        extra_payment: Decimal::ZERO,
        ..input.clone()
    })?;
    let accelerated = build_schedule(input)?;

    let periods_saved = original.payoff_periods - accelerated.payoff_periods;
    let output = ExtraPaymentSavings {
        base_payment: original.base_payment,
        extra_payment: input.extra_payment,
        original_periods: original.payoff_periods,
        accelerated_periods: accelerated.payoff_periods,
        periods_saved,
        years_saved: Decimal::from(periods_saved) / Decimal::from(input.payments_per_year),
        original_interest: original.total_interest,
        accelerated_interest: accelerated.total_interest,
        interest_saved: original.total_interest - accelerated.total_interest,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Amortization with and without extra principal payments",
        input,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_input(input: &AmortizationInput) -> FinCalcResult<()> {
    if input.principal <= Decimal::ZERO {
        return Err(FinCalcError::InvalidInput {
            field: "principal".into(),
            reason: "Principal must be positive".into(),
        });
    }
    if input.annual_rate_pct < Decimal::ZERO {
        return Err(FinCalcError::InvalidInput {
            field: "annual_rate_pct".into(),
            reason: "Rate cannot be negative".into(),
        });
    }
    if input.total_periods == 0 {
        return Err(FinCalcError::InvalidInput {
            field: "total_periods".into(),
            reason: "At least one period is required".into(),
        });
    }
    if input.total_periods > MAX_TOTAL_PERIODS {
        return Err(FinCalcError::InvalidInput {
            field: "total_periods".into(),
            reason: format!("At most {MAX_TOTAL_PERIODS} periods are supported"),
        });
    }
    if input.payments_per_year == 0 {
        return Err(FinCalcError::InvalidInput {
            field: "payments_per_year".into(),
            reason: "Payments per year must be > 0".into(),
        });
    }
    if input.extra_payment < Decimal::ZERO {
        return Err(FinCalcError::InvalidInput {
            field: "extra_payment".into(),
            reason: "Extra payment cannot be negative".into(),
        });
    }
    Ok(())
}

fn build_schedule(input: &AmortizationInput) -> FinCalcResult<AmortizationOutput> {
    let rate = periodic_rate(input.annual_rate_pct, input.payments_per_year)?;
    let base_payment = -time_value::pmt(
        rate,
        Decimal::from(input.total_periods),
        input.principal,
        Decimal::ZERO,
        AnnuityTiming::Ordinary,
    )?;
    let scheduled = add(base_payment, input.extra_payment, "scheduled payment")?;

    let mut schedule = Vec::new();
    let mut balance = input.principal;
    let mut cumulative_interest = Decimal::ZERO;
    let mut total_paid = Decimal::ZERO;

    for period in 1..=input.total_periods {
        let interest = mul(balance, rate, "amortization interest")?;
        let mut principal = sub(scheduled, interest, "amortization principal")?;
        if principal <= Decimal::ZERO {
            return Err(FinCalcError::FinancialImpossibility(format!(
                "Payment of {scheduled} does not cover interest of {interest} in period {period}"
            )));
        }

        // Final-period correction
        if principal > balance
            || period == input.total_periods
            || balance - principal < MIN_BALANCE
        {
            principal = balance;
        }

        let payment = add(principal, interest, "amortization payment")?;
        balance -= principal;
        cumulative_interest = add(cumulative_interest, interest, "cumulative interest")?;
        total_paid = add(total_paid, payment, "total paid")?;

        schedule.push(AmortizationEntry {
            period,
            payment,
            principal,
            interest,
            remaining_balance: balance,
            cumulative_interest,
        });

        if balance < MIN_BALANCE {
            break;
        }
    }

    let payoff_periods = schedule.len() as u32;
    Ok(AmortizationOutput {
        base_payment,
        periodic_rate: rate,
        payoff_periods,
        payoff_years: Decimal::from(payoff_periods) / Decimal::from(input.payments_per_year),
        total_paid,
        total_interest: cumulative_interest,
        total_principal: input.principal - balance,
        schedule,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mortgage() -> AmortizationInput {
        AmortizationInput {
            principal: dec!(200000),
            annual_rate_pct: dec!(6),
            total_periods: 360,
            payments_per_year: 12,
            extra_payment: Decimal::ZERO,
        }
    }

    #[test]
    fn test_thirty_year_mortgage() {
        let out = amortize(&mortgage()).unwrap().result;
        assert!((out.base_payment - dec!(1199.10)).abs() < dec!(0.01));
        assert_eq!(out.payoff_periods, 360);
        assert_eq!(out.schedule.len(), 360);
        assert!(
            (out.total_interest - dec!(231676)).abs() < dec!(1),
            "total interest was {}",
            out.total_interest
        );
    }

    #[test]
    fn test_schedule_invariants() {
        let out = amortize(&mortgage()).unwrap().result;
        let mut previous = dec!(200000);
        for (i, row) in out.schedule.iter().enumerate() {
            assert_eq!(row.period as usize, i + 1);
            assert_eq!(row.principal + row.interest, row.payment);
            assert!(row.remaining_balance <= previous);
            assert!(row.remaining_balance >= Decimal::ZERO);
            previous = row.remaining_balance;
        }
        let principal_sum: Decimal = out.schedule.iter().map(|r| r.principal).sum();
        assert!((principal_sum - dec!(200000)).abs() < dec!(0.0000000001));
        assert_eq!(out.schedule.last().unwrap().remaining_balance, Decimal::ZERO);
    }

    #[test]
    fn test_first_period_split() {
        let out = amortize(&mortgage()).unwrap().result;
        let first = &out.schedule[0];
        assert_eq!(first.interest, dec!(1000));
        assert!((first.principal - dec!(199.10)).abs() < dec!(0.01));
    }

    #[test]
    fn test_zero_rate_loan() {
        let input = AmortizationInput {
            principal: dec!(1200),
            annual_rate_pct: Decimal::ZERO,
            total_periods: 12,
            payments_per_year: 12,
            extra_payment: Decimal::ZERO,
        };
        let out = amortize(&input).unwrap().result;
        assert_eq!(out.base_payment, dec!(100));
        assert_eq!(out.total_interest, Decimal::ZERO);
        assert_eq!(out.total_paid, dec!(1200));
    }

    #[test]
    fn test_extra_payment_shortens_loan() {
        let mut input = mortgage();
        input.extra_payment = dec!(200);
        let out = amortize(&input).unwrap();
        assert!(out.result.payoff_periods < 360);
        assert_eq!(out.warnings.len(), 1);
        assert!((out.result.total_principal - dec!(200000)).abs() < dec!(0.0000000001));
    }

    #[test]
    fn test_extra_payment_savings() {
        let mut input = mortgage();
        input.extra_payment = dec!(200);
        let savings = extra_payment_savings(&input).unwrap().result;
        assert_eq!(savings.original_periods, 360);
        assert_eq!(
            savings.periods_saved,
            savings.original_periods - savings.accelerated_periods
        );
        assert!(savings.interest_saved > dec!(50000));
        assert_eq!(
            savings.years_saved,
            Decimal::from(savings.periods_saved) / dec!(12)
        );
    }

    #[test]
    fn test_no_extra_payment_saves_nothing() {
        let out = extra_payment_savings(&mortgage()).unwrap();
        assert_eq!(out.result.periods_saved, 0);
        assert_eq!(out.result.interest_saved, Decimal::ZERO);
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let mut input = mortgage();
        input.principal = Decimal::ZERO;
        assert!(amortize(&input).is_err());

        let mut input = mortgage();
        input.annual_rate_pct = dec!(-1);
        assert!(amortize(&input).is_err());

        let mut input = mortgage();
        input.total_periods = 0;
        assert!(amortize(&input).is_err());

        let mut input = mortgage();
        input.extra_payment = dec!(-5);
        assert!(amortize(&input).is_err());
    }

    #[test]
    fn test_term_beyond_a_century_of_monthly_payments_rejected() {
        let input = AmortizationInput {
            principal: dec!(1000),
            annual_rate_pct: Decimal::ZERO,
            total_periods: u32::MAX,
            payments_per_year: 12,
            extra_payment: Decimal::ZERO,
        };
        let err = amortize(&input).unwrap_err();
        assert!(matches!(
            err,
            FinCalcError::InvalidInput { ref field, .. } if field == "total_periods"
        ));
        assert!(extra_payment_savings(&input).is_err());

        let longest = AmortizationInput {
            total_periods: MAX_TOTAL_PERIODS,
            ..input
        };
        assert_eq!(amortize(&longest).unwrap().result.payoff_periods, MAX_TOTAL_PERIODS);
    }

    #[test]
    fn test_overflowing_payment_is_out_of_domain() {
        let input = AmortizationInput {
            principal: Decimal::MAX,
            annual_rate_pct: Decimal::ZERO,
            total_periods: 1,
            payments_per_year: 1,
            extra_payment: Decimal::MAX,
        };
        assert!(matches!(
            amortize(&input),
            Err(FinCalcError::OutOfDomain { .. })
        ));
    }

    #[test]
    fn test_single_period_loan() {
        let input = AmortizationInput {
            principal: dec!(1000),
            annual_rate_pct: dec!(12),
            total_periods: 1,
            payments_per_year: 12,
            extra_payment: Decimal::ZERO,
        };
        let out = amortize(&input).unwrap().result;
        assert_eq!(out.schedule.len(), 1);
        assert_eq!(out.schedule[0].interest, dec!(10));
        assert_eq!(out.schedule[0].payment, dec!(1010));
    }
}
