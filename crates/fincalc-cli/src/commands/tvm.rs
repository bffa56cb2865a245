use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::Value;

use fincalc_core::time_value::{self, TvmInput, TvmVariable};
use fincalc_core::{AnnuityTiming, PaymentFrequency};

use super::SolverArgs;
use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SolveFor {
    Pv,
    Fv,
    Pmt,
    Rate,
    Years,
}

impl From<SolveFor> for TvmVariable {
    fn from(value: SolveFor) -> Self {
        match value {
            SolveFor::Pv => TvmVariable::PresentValue,
            SolveFor::Fv => TvmVariable::FutureValue,
            SolveFor::Pmt => TvmVariable::Payment,
            SolveFor::Rate => TvmVariable::Rate,
            SolveFor::Years => TvmVariable::Years,
        }
    }
}

/// Arguments for a time-value-of-money solve
#[derive(Args)]
pub struct TvmArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Variable to solve for
    #[arg(long, value_enum)]
    pub solve_for: Option<SolveFor>,

    /// Present value (money received positive, paid negative)
    #[arg(long, allow_hyphen_values = true)]
    pub pv: Option<Decimal>,

    /// Future value
    #[arg(long, allow_hyphen_values = true)]
    pub fv: Option<Decimal>,

    /// Payment per period
    #[arg(long, allow_hyphen_values = true)]
    pub pmt: Option<Decimal>,

    /// Annual nominal rate in percent (e.g. 6 for 6%)
    #[arg(long, allow_hyphen_values = true)]
    pub rate: Option<Decimal>,

    /// Term in years
    #[arg(long)]
    pub years: Option<Decimal>,

    /// Compounding and payment periods per year
    #[arg(long, default_value_t = 12)]
    pub periods_per_year: u32,

    /// Payments at the start of each period (annuity-due)
    #[arg(long)]
    pub due: bool,

    #[command(flatten)]
    pub solver: SolverArgs,
}

pub fn run_tvm(args: TvmArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut tvm_input: TvmInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(request) = input::stdin::read_stdin()? {
        request
    } else {
        let solve_for = args
            .solve_for
            .ok_or("--solve-for is required (or provide --input)")?;
        let timing = if args.due {
            AnnuityTiming::Due
        } else {
            AnnuityTiming::Ordinary
        };

        TvmInput {
            present_value: args.pv,
            future_value: args.fv,
            payment: args.pmt,
            annual_rate_pct: args.rate,
            years: args.years,
            frequency: PaymentFrequency::new(args.periods_per_year, timing),
            solve_for: solve_for.into(),
            solver: None,
        }
    };
    tvm_input.solver = args.solver.apply(tvm_input.solver);

    let result = time_value::solve_tvm(&tvm_input)?;
    Ok(serde_json::to_value(result)?)
}
