use fincalc_core::solver::{SolveMethod, SolverConfig};
use fincalc_core::time_value::{self, solve_tvm, TvmInput, TvmVariable};
use fincalc_core::{AnnuityTiming, FinCalcError, PaymentFrequency};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Closed-form TVM
// ===========================================================================

fn lump_sum(solve_for: TvmVariable) -> TvmInput {
    TvmInput {
        present_value: Some(dec!(-1000)),
        future_value: None,
        payment: Some(Decimal::ZERO),
        annual_rate_pct: Some(dec!(6)),
        years: Some(dec!(5)),
        frequency: PaymentFrequency::annual(),
        solve_for,
        solver: None,
    }
}

#[test]
fn test_lump_sum_future_value() {
    let out = solve_tvm(&lump_sum(TvmVariable::FutureValue)).unwrap();
    assert!(
        (out.result.value - dec!(1338.23)).abs() < dec!(0.01),
        "FV should be ~1338.23, got {}",
        out.result.value
    );
    assert_eq!(out.result.periodic_rate, dec!(0.06));
    assert_eq!(out.result.total_periods, dec!(5));
}

#[test]
fn test_pv_fv_round_trip() {
    let fv = solve_tvm(&lump_sum(TvmVariable::FutureValue))
        .unwrap()
        .result
        .future_value;

    let mut back = lump_sum(TvmVariable::PresentValue);
    back.present_value = None;
    back.future_value = Some(fv);
    let pv = solve_tvm(&back).unwrap().result.present_value;

    let relative = ((pv - dec!(-1000)) / dec!(1000)).abs();
    assert!(relative < dec!(0.000001), "round trip drifted to {pv}");
}

#[test]
fn test_round_trips_with_payments() {
    let present = dec!(-10000);
    let periods = dec!(48);
    let timings = [AnnuityTiming::Ordinary, AnnuityTiming::Due];
    let rates = [dec!(-0.002), Decimal::ZERO, dec!(0.005), dec!(0.05), dec!(0.12)];
    let payments = [dec!(-150), dec!(250)];

    for timing in timings {
        for rate in rates {
            for payment in payments {
                let fv = time_value::fv(rate, periods, payment, present, timing).unwrap();

                let pv = time_value::pv(rate, periods, payment, fv, timing).unwrap();
                assert!(
                    (pv - present).abs() < dec!(0.0000001),
                    "PV drifted to {pv} at rate {rate}, payment {payment}, {timing:?}"
                );

                let pmt = time_value::pmt(rate, periods, present, fv, timing).unwrap();
                assert!(
                    (pmt - payment).abs() < dec!(0.0000001),
                    "PMT drifted to {pmt} at rate {rate}, payment {payment}, {timing:?}"
                );

                let n = time_value::nper(rate, payment, present, fv, timing).unwrap();
                assert!(
                    (n - periods).abs() < dec!(0.000001),
                    "NPER drifted to {n} at rate {rate}, payment {payment}, {timing:?}"
                );
            }
        }
    }
}

#[test]
fn test_rate_recovered_for_both_timings() {
    let present = dec!(-10000);
    let periods = dec!(48);
    let payment = dec!(-150);

    for timing in [AnnuityTiming::Ordinary, AnnuityTiming::Due] {
        for rate in [dec!(-0.002), Decimal::ZERO, dec!(0.005), dec!(0.05), dec!(0.12)] {
            let fv = time_value::fv(rate, periods, payment, present, timing).unwrap();
            let solved = time_value::rate(
                periods,
                payment,
                present,
                fv,
                timing,
                &SolverConfig::default(),
            )
            .unwrap();
            assert!(
                (solved.root - rate).abs() < dec!(0.00000001),
                "expected {rate} under {timing:?}, solved {}",
                solved.root
            );
        }
    }
}

#[test]
fn test_zero_rate_payment() {
    let input = TvmInput {
        present_value: Some(dec!(1000)),
        future_value: Some(dec!(200)),
        payment: None,
        annual_rate_pct: Some(Decimal::ZERO),
        years: Some(dec!(10)),
        frequency: PaymentFrequency::annual(),
        solve_for: TvmVariable::Payment,
        solver: None,
    };
    let out = solve_tvm(&input).unwrap();
    // -(PV + FV) / n
    assert_eq!(out.result.payment, dec!(-120));
    assert_eq!(out.result.effective_annual_rate_pct, Decimal::ZERO);
}

#[test]
fn test_annuity_due_future_value() {
    let ordinary = time_value::fv(
        dec!(0.05),
        dec!(10),
        dec!(-100),
        Decimal::ZERO,
        AnnuityTiming::Ordinary,
    )
    .unwrap();
    let due = time_value::fv(
        dec!(0.05),
        dec!(10),
        dec!(-100),
        Decimal::ZERO,
        AnnuityTiming::Due,
    )
    .unwrap();
    assert!((ordinary - dec!(1257.79)).abs() < dec!(0.01));
    assert!((due - ordinary * dec!(1.05)).abs() < dec!(0.0000001));
}

// ===========================================================================
// Iterative rate solve
// ===========================================================================

#[test]
fn test_solve_rate_for_savings_plan() {
    let input = TvmInput {
        present_value: Some(Decimal::ZERO),
        future_value: Some(dec!(16387.93)),
        payment: Some(dec!(-100)),
        annual_rate_pct: None,
        years: Some(dec!(10)),
        frequency: PaymentFrequency::monthly(),
        solve_for: TvmVariable::Rate,
        solver: None,
    };
    let out = solve_tvm(&input).unwrap();
    assert!(
        (out.result.annual_rate_pct - dec!(6)).abs() < dec!(0.001),
        "rate was {}",
        out.result.annual_rate_pct
    );
    let solution = out.result.solution.unwrap();
    assert_ne!(solution.method, SolveMethod::ClosedForm);
}

#[test]
fn test_solve_rate_at_high_periodic_rate() {
    // 500 a month for 30 years against 1000 borrowed: about 50% per month
    let input = TvmInput {
        present_value: Some(dec!(1000)),
        future_value: Some(Decimal::ZERO),
        payment: Some(dec!(-500)),
        annual_rate_pct: None,
        years: Some(dec!(30)),
        frequency: PaymentFrequency::monthly(),
        solve_for: TvmVariable::Rate,
        solver: None,
    };
    let out = solve_tvm(&input).unwrap();
    assert!(
        (out.result.periodic_rate - dec!(0.5)).abs() < dec!(0.000001),
        "periodic rate was {}",
        out.result.periodic_rate
    );
    assert!((out.result.annual_rate_pct - dec!(600)).abs() < dec!(0.0001));
}

#[test]
fn test_solve_rate_respects_iteration_cap() {
    let input = TvmInput {
        present_value: Some(dec!(200000)),
        future_value: Some(Decimal::ZERO),
        payment: Some(dec!(-1199.10)),
        annual_rate_pct: None,
        years: Some(dec!(30)),
        frequency: PaymentFrequency::monthly(),
        solve_for: TvmVariable::Rate,
        solver: Some(SolverConfig::default().with_max_iterations(1)),
    };
    match solve_tvm(&input) {
        Err(FinCalcError::ConvergenceFailure { iterations, .. }) => assert_eq!(iterations, 1),
        other => panic!("Expected ConvergenceFailure, got {other:?}"),
    }
}

#[test]
fn test_solve_years_for_loan() {
    let input = TvmInput {
        present_value: Some(dec!(200000)),
        future_value: Some(Decimal::ZERO),
        payment: Some(dec!(-1199.101050)),
        annual_rate_pct: Some(dec!(6)),
        years: None,
        frequency: PaymentFrequency::monthly(),
        solve_for: TvmVariable::Years,
        solver: None,
    };
    let out = solve_tvm(&input).unwrap();
    assert!((out.result.years - dec!(30)).abs() < dec!(0.001));
}

#[test]
fn test_negative_term_is_impossible() {
    // Receiving money now and receiving more later with nothing paid back
    let input = TvmInput {
        present_value: Some(dec!(1000)),
        future_value: Some(dec!(500)),
        payment: Some(dec!(100)),
        annual_rate_pct: Some(dec!(0)),
        years: None,
        frequency: PaymentFrequency::annual(),
        solve_for: TvmVariable::Years,
        solver: None,
    };
    assert!(matches!(
        solve_tvm(&input),
        Err(FinCalcError::FinancialImpossibility(_))
    ));
}

#[test]
fn test_input_from_json() {
    let input: TvmInput = serde_json::from_str(
        r#"{
            "present_value": "-1000",
            "payment": "0",
            "annual_rate_pct": "6",
            "years": "5",
            "frequency": { "periods_per_year": 1 },
            "solve_for": "future_value"
        }"#,
    )
    .unwrap();
    assert_eq!(input.frequency.timing, AnnuityTiming::Ordinary);
    let out = solve_tvm(&input).unwrap();
    assert!((out.result.future_value - dec!(1338.23)).abs() < dec!(0.01));
}
