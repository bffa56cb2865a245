use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use fincalc_core::capital_budgeting::cash_flows::{self, CashFlowInput, DEFAULT_IRR_GUESS_PCT};

use super::SolverArgs;
use crate::input;

/// Arguments for net present value
#[derive(Args)]
pub struct NpvArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Cash flows, period 0 first (comma-separated, e.g. "-1000,300,300")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub cash_flows: Option<Vec<Decimal>>,

    /// Discount rate per period in percent
    #[arg(long, allow_hyphen_values = true)]
    pub rate: Option<Decimal>,
}

/// Arguments for internal rate of return
#[derive(Args)]
pub struct IrrArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Cash flows, period 0 first (comma-separated)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub cash_flows: Option<Vec<Decimal>>,

    /// Starting guess in percent (default 10)
    #[arg(long, allow_hyphen_values = true)]
    pub guess: Option<Decimal>,

    #[command(flatten)]
    pub solver: SolverArgs,
}

/// Arguments for a full cash-flow analysis
#[derive(Args)]
pub struct CashFlowArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Cash flows, period 0 first (comma-separated)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub cash_flows: Option<Vec<Decimal>>,

    /// Discount rate per period in percent
    #[arg(long, allow_hyphen_values = true)]
    pub rate: Option<Decimal>,

    /// IRR starting guess in percent
    #[arg(long, allow_hyphen_values = true)]
    pub guess: Option<Decimal>,

    /// Fail instead of warning when several IRRs may exist
    #[arg(long)]
    pub require_unique_irr: bool,

    #[command(flatten)]
    pub solver: SolverArgs,
}

fn read_request(
    path: Option<&str>,
    cash_flows: Option<Vec<Decimal>>,
) -> Result<CashFlowInput, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return input::file::read_input(path);
    }
    if let Some(request) = input::stdin::read_stdin()? {
        return Ok(request);
    }
    Ok(CashFlowInput {
        cash_flows: cash_flows.ok_or("--cash-flows is required (or provide --input)")?,
        discount_rate_pct: None,
        irr_guess_pct: None,
        require_unique_irr: false,
        solver: None,
    })
}

pub fn run_npv(args: NpvArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request = read_request(args.input.as_deref(), args.cash_flows)?;
    let rate = args
        .rate
        .or(request.discount_rate_pct)
        .ok_or("--rate is required (or set discount_rate_pct in the input)")?;

    let npv = cash_flows::npv(&request.cash_flows, rate)?;
    Ok(json!({
        "result": { "npv": npv, "rate_pct": rate },
        "methodology": "Net present value with per-period discounting",
        "warnings": [],
    }))
}

pub fn run_irr(args: IrrArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request = read_request(args.input.as_deref(), args.cash_flows)?;
    let guess = args
        .guess
        .or(request.irr_guess_pct)
        .unwrap_or(DEFAULT_IRR_GUESS_PCT);
    let config = args.solver.apply(request.solver).unwrap_or_default();

    let result = cash_flows::irr_with_guess(&request.cash_flows, guess, &config)?;
    let warnings: Vec<String> = if result.multiple_roots_possible {
        vec![format!(
            "{} sign changes in cash flows; other IRRs may exist",
            result.sign_changes
        )]
    } else {
        Vec::new()
    };
    Ok(json!({
        "result": result,
        "methodology": "Internal rate of return by Newton-Raphson with bisection fallback",
        "warnings": warnings,
    }))
}

pub fn run_cash_flows(args: CashFlowArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request = read_request(args.input.as_deref(), args.cash_flows)?;
    if args.rate.is_some() {
        request.discount_rate_pct = args.rate;
    }
    if args.guess.is_some() {
        request.irr_guess_pct = args.guess;
    }
    request.require_unique_irr |= args.require_unique_irr;
    request.solver = args.solver.apply(request.solver);

    let result = cash_flows::analyze_cash_flows(&request)?;
    Ok(serde_json::to_value(result)?)
}
