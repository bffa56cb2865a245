mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::bonds::{BondPriceArgs, BondYieldArgs};
use commands::cash_flows::{CashFlowArgs, IrrArgs, NpvArgs};
use commands::depreciation::DepreciationArgs;
use commands::lending::AmortizeArgs;
use commands::tvm::TvmArgs;

/// Personal-finance calculations with decimal precision
#[derive(Parser)]
#[command(
    name = "fincalc",
    version,
    about = "Personal-finance calculations with decimal precision",
    long_about = "Solve time-value-of-money problems, price bonds and solve their yields, \
                  build loan amortization and depreciation schedules, and analyse \
                  investment cash flows (NPV, IRR, payback)."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log solver activity to stderr (FINCALC_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve for one of PV, FV, PMT, rate or term
    Tvm(TvmArgs),
    /// Price a bond at a market yield
    BondPrice(BondPriceArgs),
    /// Solve a bond's yield to maturity from its price
    BondYield(BondYieldArgs),
    /// Build a loan amortization schedule
    Amortize(AmortizeArgs),
    /// Compare a loan with and without extra payments
    ExtraPayment(AmortizeArgs),
    /// Build a depreciation schedule
    Depreciate(DepreciationArgs),
    /// Net present value of a cash-flow series
    Npv(NpvArgs),
    /// Internal rate of return of a cash-flow series
    Irr(IrrArgs),
    /// Full cash-flow analysis (NPV, IRR, payback)
    CashFlows(CashFlowArgs),
    /// Print version information
    Version,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Tvm(_) => "tvm",
            Commands::BondPrice(_) => "bond-price",
            Commands::BondYield(_) => "bond-yield",
            Commands::Amortize(_) => "amortize",
            Commands::ExtraPayment(_) => "extra-payment",
            Commands::Depreciate(_) => "depreciate",
            Commands::Npv(_) => "npv",
            Commands::Irr(_) => "irr",
            Commands::CashFlows(_) => "cash-flows",
            Commands::Version => "version",
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "fincalc=debug,fincalc_core=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_env("FINCALC_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let command = cli.command.name();
    debug!(command, output = ?cli.output, "running command");

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Tvm(args) => commands::tvm::run_tvm(args),
        Commands::BondPrice(args) => commands::bonds::run_bond_price(args),
        Commands::BondYield(args) => commands::bonds::run_bond_yield(args),
        Commands::Amortize(args) => commands::lending::run_amortize(args),
        Commands::ExtraPayment(args) => commands::lending::run_extra_payment(args),
        Commands::Depreciate(args) => commands::depreciation::run_depreciate(args),
        Commands::Npv(args) => commands::cash_flows::run_npv(args),
        Commands::Irr(args) => commands::cash_flows::run_irr(args),
        Commands::CashFlows(args) => commands::cash_flows::run_cash_flows(args),
        Commands::Version => {
            println!("fincalc {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            debug!(command, error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
