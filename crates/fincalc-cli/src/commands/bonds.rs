use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use fincalc_core::fixed_income::bonds::{self, Bond, BondPriceInput, BondYieldInput};

use super::SolverArgs;
use crate::input;

/// Bond terms shared by the pricing and yield commands
#[derive(Args)]
pub struct BondTermsArgs {
    /// Face value
    #[arg(long, default_value_t = dec!(1000))]
    pub face: Decimal,

    /// Annual coupon rate in percent
    #[arg(long)]
    pub coupon_rate: Option<Decimal>,

    /// Years to maturity
    #[arg(long)]
    pub years: Option<Decimal>,

    /// Coupons per year
    #[arg(long, default_value_t = 2)]
    pub frequency: u32,
}

impl BondTermsArgs {
    fn to_bond(&self) -> Result<Bond, Box<dyn std::error::Error>> {
        Ok(Bond {
            face_value: self.face,
            coupon_rate_pct: self
                .coupon_rate
                .ok_or("--coupon-rate is required (or provide --input)")?,
            years_to_maturity: self
                .years
                .ok_or("--years is required (or provide --input)")?,
            payments_per_year: self.frequency,
        })
    }
}

/// Arguments for bond pricing
#[derive(Args)]
pub struct BondPriceArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    #[command(flatten)]
    pub terms: BondTermsArgs,

    /// Annual market yield in percent
    #[arg(long, allow_hyphen_values = true)]
    pub market_rate: Option<Decimal>,
}

pub fn run_bond_price(args: BondPriceArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let price_input: BondPriceInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(request) = input::stdin::read_stdin()? {
        request
    } else {
        BondPriceInput {
            bond: args.terms.to_bond()?,
            market_rate_pct: args
                .market_rate
                .ok_or("--market-rate is required (or provide --input)")?,
        }
    };

    let result = bonds::price_bond(&price_input.bond, price_input.market_rate_pct)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for bond yield to maturity
#[derive(Args)]
pub struct BondYieldArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    #[command(flatten)]
    pub terms: BondTermsArgs,

    /// Observed price
    #[arg(long)]
    pub price: Option<Decimal>,

    #[command(flatten)]
    pub solver: SolverArgs,
}

pub fn run_bond_yield(args: BondYieldArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let yield_input: BondYieldInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(request) = input::stdin::read_stdin()? {
        request
    } else {
        BondYieldInput {
            bond: args.terms.to_bond()?,
            price: args
                .price
                .ok_or("--price is required (or provide --input)")?,
            solver: None,
        }
    };

    let config = args.solver.apply(yield_input.solver).unwrap_or_default();
    let result =
        bonds::solve_bond_yield_with_config(&yield_input.bond, yield_input.price, &config)?;
    Ok(serde_json::to_value(result)?)
}
