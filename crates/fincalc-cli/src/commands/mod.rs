pub mod bonds;
pub mod cash_flows;
pub mod depreciation;
pub mod lending;
pub mod tvm;

use clap::Args;
use fincalc_core::solver::SolverConfig;
use rust_decimal::Decimal;

/// Root-finder overrides shared by the iterative commands
#[derive(Args, Default)]
pub struct SolverArgs {
    /// Maximum solver iterations (default 100)
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Residual tolerance (default 1e-7)
    #[arg(long)]
    pub tolerance: Option<Decimal>,

    /// Step tolerance relative to the root (default 1e-10)
    #[arg(long)]
    pub rel_tolerance: Option<Decimal>,
}

impl SolverArgs {
    /// Layer the flags over a config read from input, if any.
    pub fn apply(&self, base: Option<SolverConfig>) -> Option<SolverConfig> {
        if self.max_iterations.is_none() && self.tolerance.is_none() && self.rel_tolerance.is_none()
        {
            return base;
        }
        let mut config = base.unwrap_or_default();
        if let Some(max) = self.max_iterations {
            config = config.with_max_iterations(max);
        }
        if let Some(tolerance) = self.tolerance {
            config = config.with_abs_tolerance(tolerance);
        }
        if let Some(tolerance) = self.rel_tolerance {
            config = config.with_rel_tolerance(tolerance);
        }
        Some(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_solver_flags_override_input() {
        let args = SolverArgs {
            max_iterations: Some(20),
            tolerance: None,
            rel_tolerance: None,
        };
        let base = SolverConfig::default().with_abs_tolerance(dec!(0.01));
        let config = args.apply(Some(base)).unwrap();
        assert_eq!(config.max_iterations, 20);
        assert_eq!(config.abs_tolerance, dec!(0.01));
    }

    #[test]
    fn test_rel_tolerance_flag_alone_builds_config() {
        let args = SolverArgs {
            rel_tolerance: Some(dec!(0.000001)),
            ..SolverArgs::default()
        };
        let config = args.apply(None).unwrap();
        assert_eq!(config.rel_tolerance, dec!(0.000001));
        assert_eq!(config.abs_tolerance, SolverConfig::default().abs_tolerance);
    }

    #[test]
    fn test_no_flags_keep_input() {
        assert_eq!(SolverArgs::default().apply(None), None);
    }
}
