use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use fincalc_core::lending::amortization::{self, AmortizationInput};

use crate::input;

/// Arguments for loan amortization
#[derive(Args)]
pub struct AmortizeArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Amount borrowed
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Annual nominal rate in percent
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Number of payments
    #[arg(long)]
    pub periods: Option<u32>,

    /// Payments per year
    #[arg(long, default_value_t = 12)]
    pub payments_per_year: u32,

    /// Extra principal paid each period
    #[arg(long, default_value_t = Decimal::ZERO)]
    pub extra: Decimal,
}

fn amortization_input(args: &AmortizeArgs) -> Result<AmortizationInput, Box<dyn std::error::Error>> {
    if let Some(ref path) = args.input {
        return input::file::read_input(path);
    }
    if let Some(request) = input::stdin::read_stdin()? {
        return Ok(request);
    }

    Ok(AmortizationInput {
        principal: args
            .principal
            .ok_or("--principal is required (or provide --input)")?,
        annual_rate_pct: args.rate.ok_or("--rate is required (or provide --input)")?,
        total_periods: args
            .periods
            .ok_or("--periods is required (or provide --input)")?,
        payments_per_year: args.payments_per_year,
        extra_payment: args.extra,
    })
}

pub fn run_amortize(args: AmortizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let loan = amortization_input(&args)?;
    let result = amortization::amortize(&loan)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_extra_payment(args: AmortizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let loan = amortization_input(&args)?;
    let result = amortization::extra_payment_savings(&loan)?;
    Ok(serde_json::to_value(result)?)
}
