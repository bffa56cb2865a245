use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use fincalc_core::accounting::depreciation::{self, DepreciationInput, DepreciationMethod};
use fincalc_core::accounting::macrs::MacrsClass;

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MethodArg {
    StraightLine,
    DecliningBalance,
    SumOfYearsDigits,
    Macrs,
}

/// Arguments for a depreciation schedule
#[derive(Args)]
pub struct DepreciationArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Asset cost
    #[arg(long)]
    pub cost: Option<Decimal>,

    /// Salvage value at the end of the useful life
    #[arg(long, default_value_t = Decimal::ZERO)]
    pub salvage: Decimal,

    /// Useful life in years (ignored for MACRS)
    #[arg(long, default_value_t = 0)]
    pub life: u32,

    #[arg(long, value_enum, default_value = "straight-line")]
    pub method: MethodArg,

    /// Declining-balance multiplier (2 = double declining)
    #[arg(long, default_value_t = dec!(2))]
    pub multiplier: Decimal,

    /// Switch declining balance to straight-line when larger
    #[arg(long)]
    pub switch_to_straight_line: bool,

    /// MACRS property class in years: 3, 5, 7, 10, 15 or 20
    #[arg(long)]
    pub macrs_class: Option<u32>,
}

fn macrs_class(years: u32) -> Result<MacrsClass, Box<dyn std::error::Error>> {
    MacrsClass::ALL
        .into_iter()
        .find(|c| c.recovery_period() == years)
        .ok_or_else(|| format!("No MACRS class for {years} years").into())
}

pub fn run_depreciate(args: DepreciationArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let dep_input: DepreciationInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(request) = input::stdin::read_stdin()? {
        request
    } else {
        let method = match args.method {
            MethodArg::StraightLine => DepreciationMethod::StraightLine,
            MethodArg::DecliningBalance => DepreciationMethod::DecliningBalance {
                multiplier: args.multiplier,
                switch_to_straight_line: args.switch_to_straight_line,
            },
            MethodArg::SumOfYearsDigits => DepreciationMethod::SumOfYearsDigits,
            MethodArg::Macrs => DepreciationMethod::Macrs {
                class: args.macrs_class.map(macrs_class).transpose()?,
            },
        };

        DepreciationInput {
            cost: args.cost.ok_or("--cost is required (or provide --input)")?,
            salvage_value: args.salvage,
            useful_life: args.life,
            method,
        }
    };

    let result = depreciation::depreciation_schedule(&dep_input)?;
    Ok(serde_json::to_value(result)?)
}
