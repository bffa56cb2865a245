use napi::Result as NapiResult;
use napi_derive::napi;
use serde::Serialize;

use fincalc_core::capital_budgeting::cash_flows::{self, CashFlowInput, DEFAULT_IRR_GUESS_PCT};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Time value of money
// ---------------------------------------------------------------------------

#[napi]
pub fn solve_tvm(input_json: String) -> NapiResult<String> {
    let input: fincalc_core::time_value::TvmInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fincalc_core::time_value::solve_tvm(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Bonds
// ---------------------------------------------------------------------------

#[napi]
pub fn price_bond(input_json: String) -> NapiResult<String> {
    let input: fincalc_core::fixed_income::bonds::BondPriceInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        fincalc_core::fixed_income::bonds::price_bond(&input.bond, input.market_rate_pct)
            .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn solve_bond_yield(input_json: String) -> NapiResult<String> {
    let input: fincalc_core::fixed_income::bonds::BondYieldInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fincalc_core::fixed_income::bonds::solve_bond_yield_with_config(
        &input.bond,
        input.price,
        &input.solver.unwrap_or_default(),
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Lending
// ---------------------------------------------------------------------------

#[napi]
pub fn amortize(input_json: String) -> NapiResult<String> {
    let input: fincalc_core::lending::amortization::AmortizationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        fincalc_core::lending::amortization::amortize(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn extra_payment_savings(input_json: String) -> NapiResult<String> {
    let input: fincalc_core::lending::amortization::AmortizationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fincalc_core::lending::amortization::extra_payment_savings(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Depreciation
// ---------------------------------------------------------------------------

#[napi]
pub fn depreciation_schedule(input_json: String) -> NapiResult<String> {
    let input: fincalc_core::accounting::depreciation::DepreciationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = fincalc_core::accounting::depreciation::depreciation_schedule(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Cash flows
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct NpvResult {
    npv: rust_decimal::Decimal,
}

#[napi]
pub fn npv(input_json: String) -> NapiResult<String> {
    let input: CashFlowInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let rate = input
        .discount_rate_pct
        .ok_or_else(|| to_napi_error("discount_rate_pct is required"))?;
    let npv = cash_flows::npv(&input.cash_flows, rate).map_err(to_napi_error)?;
    serde_json::to_string(&NpvResult { npv }).map_err(to_napi_error)
}

#[napi]
pub fn irr(input_json: String) -> NapiResult<String> {
    let input: CashFlowInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = cash_flows::irr_with_guess(
        &input.cash_flows,
        input.irr_guess_pct.unwrap_or(DEFAULT_IRR_GUESS_PCT),
        &input.solver.unwrap_or_default(),
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn analyze_cash_flows(input_json: String) -> NapiResult<String> {
    let input: CashFlowInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = cash_flows::analyze_cash_flows(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
