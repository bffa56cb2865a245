use fincalc_core::capital_budgeting::cash_flows::{
    analyze_cash_flows, irr, irr_with_guess, npv, CashFlowInput,
};
use fincalc_core::solver::SolverConfig;
use fincalc_core::FinCalcError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// NPV / IRR
// ===========================================================================

fn level_project() -> Vec<Decimal> {
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
fn test_level_project_npv_and_irr() {
    let flows = level_project();
    let value = npv(&flows, dec!(10)).unwrap();
    assert!((value - dec!(137.24)).abs() < dec!(0.01), "NPV was {value}");

    let result = irr(&flows).unwrap();
    assert!(
        (result.irr_pct - dec!(15.24)).abs() < dec!(0.01),
        "IRR was {}",
        result.irr_pct
    );
    // NPV at the IRR is zero
    assert!(npv(&flows, result.irr_pct).unwrap().abs() < dec!(0.000001));
}

#[test]
fn test_npv_decreasing_in_rate() {
    let flows = level_project();
    let mut previous = Decimal::MAX;
    for rate in [dec!(-50), dec!(0), dec!(5), dec!(10), dec!(20), dec!(100), dec!(500)] {
        let value = npv(&flows, rate).unwrap();
        assert!(value < previous, "NPV at {rate}% did not fall");
        previous = value;
    }
}

#[test]
fn test_irr_from_several_seeds() {
    let flows = level_project();
    let config = SolverConfig::default();
    for guess in [dec!(-50), dec!(1), dec!(10), dec!(50), dec!(200)] {
        let result = irr_with_guess(&flows, guess, &config).unwrap();
        assert!(
            (result.irr_pct - dec!(15.2382)).abs() < dec!(0.001),
            "seed {guess}% gave {}",
            result.irr_pct
        );
    }
}

#[test]
fn test_multiple_sign_changes_flagged() {
    // Roots at 10% and 20%
    let flows = vec![dec!(-100), dec!(230), dec!(-132)];
    let result = irr_with_guess(&flows, dec!(5), &SolverConfig::default()).unwrap();
    assert_eq!(result.sign_changes, 2);
    assert!(result.multiple_roots_possible);
    let hit_ten = (result.irr_pct - dec!(10)).abs() < dec!(0.0001);
    let hit_twenty = (result.irr_pct - dec!(20)).abs() < dec!(0.0001);
    assert!(hit_ten || hit_twenty, "IRR was {}", result.irr_pct);
}

#[test]
fn test_all_negative_flows_have_no_irr() {
    let flows = vec![dec!(-100), dec!(-50), dec!(-10)];
    assert!(matches!(irr(&flows), Err(FinCalcError::NoSignChange { .. })));
}

// ===========================================================================
// Full analysis
// ===========================================================================

#[test]
fn test_analysis_without_discount_rate() {
    let input = CashFlowInput {
        cash_flows: level_project(),
        discount_rate_pct: None,
        irr_guess_pct: None,
        require_unique_irr: false,
        solver: None,
    };
    let out = analyze_cash_flows(&input).unwrap().result;
    assert!(out.npv.is_none());
    assert!(out.profitability_index.is_none());
    assert!(out.discounted_payback_period.is_none());
    assert!(out.irr.is_some());
    assert_eq!(out.sign_changes, 1);
}

#[test]
fn test_analysis_from_json() {
    let input: CashFlowInput = serde_json::from_str(
        r#"{"cash_flows": ["-100", "230", "-132"], "discount_rate_pct": "15"}"#,
    )
    .unwrap();
    let out = analyze_cash_flows(&input).unwrap();
    assert!(out.result.npv.unwrap() > Decimal::ZERO);
    assert!(out.warnings.iter().any(|w| w.contains("sign changes")));
}
