//! Scalar root finding shared by the TVM rate, bond yield and IRR solvers.
//!
//! Newton-Raphson runs first, using either a closed-form derivative or a
//! central-difference estimate. When Newton stalls (vanishing derivative),
//! leaves the search domain, hits an undefined point, or diverges, the solver
//! brackets a sign change by geometric expansion around the initial guess and
//! bisects with whatever iteration budget is left.
//!
//! Convergence needs both |f(x)| <= `abs_tolerance` and
//! |dx| <= `rel_tolerance * max(|x|, 1)`. Running out of iterations is a
//! [`FinCalcError::ConvergenceFailure`]; finding no sign change at all is a
//! [`FinCalcError::NoSignChange`]. The solver cannot tell "no root exists"
//! apart from "the root is outside the searched range", and the error says so.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::FinCalcError;
use crate::FinCalcResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_ABS_TOLERANCE: Decimal = dec!(0.0000001);
pub const DEFAULT_REL_TOLERANCE: Decimal = dec!(0.0000000001);
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;
pub const DEFAULT_DERIVATIVE_STEP: Decimal = dec!(0.000001);

/// Below this the Newton step is considered undefined.
const MIN_DERIVATIVE: Decimal = dec!(0.000000000000001);

/// Consecutive residual blow-ups tolerated before Newton is abandoned.
const MAX_DIVERGENT_STEPS: u32 = 3;

const MAX_BRACKET_EXPANSIONS: u32 = 60;
const INITIAL_BRACKET_STEP: Decimal = dec!(0.01);
const BRACKET_STEP_SHARE: Decimal = dec!(0.1);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Tolerances, iteration cap and search domain for [`find_root`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Residual tolerance |f(x)|
    pub abs_tolerance: Decimal,
    /// Step tolerance, relative to max(|x|, 1)
    pub rel_tolerance: Decimal,
    /// Cap on Newton plus bisection iterations
    pub max_iterations: u32,
    /// Relative step for the central-difference derivative
    pub derivative_step: Decimal,
    /// Exclusive lower edge of the search domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<Decimal>,
    /// Exclusive upper edge of the search domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<Decimal>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            abs_tolerance: DEFAULT_ABS_TOLERANCE,
            rel_tolerance: DEFAULT_REL_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            derivative_step: DEFAULT_DERIVATIVE_STEP,
            lower_bound: None,
            upper_bound: None,
        }
    }
}

impl SolverConfig {
    #[must_use]
    pub fn with_abs_tolerance(mut self, tolerance: Decimal) -> Self {
        self.abs_tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn with_rel_tolerance(mut self, tolerance: Decimal) -> Self {
        self.rel_tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    #[must_use]
    pub fn with_lower_bound(mut self, bound: Decimal) -> Self {
        self.lower_bound = Some(bound);
        self
    }

    #[must_use]
    pub fn with_upper_bound(mut self, bound: Decimal) -> Self {
        self.upper_bound = Some(bound);
        self
    }

    /// Restrict the domain to rates above -100% unless a tighter lower
    /// bound is already set.
    #[must_use]
    pub fn for_rates(self) -> Self {
        match self.lower_bound {
            Some(lb) if lb >= dec!(-1) => self,
            _ => self.with_lower_bound(dec!(-1)),
        }
    }

    /// Whether `x` lies strictly inside the search domain.
    pub fn contains(&self, x: Decimal) -> bool {
        self.lower_bound.map_or(true, |lb| x > lb) && self.upper_bound.map_or(true, |ub| x < ub)
    }

    pub fn validate(&self) -> FinCalcResult<()> {
        if self.abs_tolerance <= Decimal::ZERO {
            return Err(FinCalcError::InvalidInput {
                field: "solver.abs_tolerance".into(),
                reason: "Tolerance must be positive".into(),
            });
        }
        if self.rel_tolerance <= Decimal::ZERO {
            return Err(FinCalcError::InvalidInput {
                field: "solver.rel_tolerance".into(),
                reason: "Tolerance must be positive".into(),
            });
        }
        if self.max_iterations == 0 {
            return Err(FinCalcError::InvalidInput {
                field: "solver.max_iterations".into(),
                reason: "At least one iteration is required".into(),
            });
        }
        if self.derivative_step <= Decimal::ZERO {
            return Err(FinCalcError::InvalidInput {
                field: "solver.derivative_step".into(),
                reason: "Derivative step must be positive".into(),
            });
        }
        if let (Some(lb), Some(ub)) = (self.lower_bound, self.upper_bound) {
            if lb >= ub {
                return Err(FinCalcError::InvalidInput {
                    field: "solver.lower_bound".into(),
                    reason: "Lower bound must be below upper bound".into(),
                });
            }
        }
        Ok(())
    }
}

/// How a [`Solution`] was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveMethod {
    /// The initial guess already satisfied the tolerance
    InitialGuess,
    /// A degenerate case with an exact formula; no iteration
    ClosedForm,
    NewtonRaphson,
    Bisection,
}

/// A converged root.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub root: Decimal,
    pub iterations: u32,
    /// f(root)
    pub residual: Decimal,
    pub method: SolveMethod,
}

impl Solution {
    pub fn closed_form(root: Decimal) -> Self {
        Self {
            root,
            iterations: 0,
            residual: Decimal::ZERO,
            method: SolveMethod::ClosedForm,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Find a root of `f` starting from `initial_guess`, estimating the
/// derivative by central differences.
///
/// `function` names the caller in errors and log events.
pub fn find_root<F>(
    function: &str,
    f: F,
    initial_guess: Decimal,
    config: &SolverConfig,
) -> FinCalcResult<Solution>
where
    F: Fn(Decimal) -> FinCalcResult<Decimal>,
{
    let derivative = |x: Decimal| central_difference(&f, x, config);
    solve(function, &f, &derivative, initial_guess, config)
}

/// Find a root of `f` using the closed-form derivative `df`.
pub fn find_root_with_derivative<F, D>(
    function: &str,
    f: F,
    df: D,
    initial_guess: Decimal,
    config: &SolverConfig,
) -> FinCalcResult<Solution>
where
    F: Fn(Decimal) -> FinCalcResult<Decimal>,
    D: Fn(Decimal) -> FinCalcResult<Decimal>,
{
    solve(function, &f, &df, initial_guess, config)
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

fn solve<F, D>(
    function: &str,
    f: &F,
    df: &D,
    initial_guess: Decimal,
    config: &SolverConfig,
) -> FinCalcResult<Solution>
where
    F: Fn(Decimal) -> FinCalcResult<Decimal>,
    D: Fn(Decimal) -> FinCalcResult<Decimal>,
{
    config.validate()?;
    if !config.contains(initial_guess) {
        return Err(FinCalcError::InvalidInput {
            field: "initial_guess".into(),
            reason: format!("Initial guess {initial_guess} lies outside the search domain"),
        });
    }

    let f0 = f(initial_guess)?;
    if f0.abs() <= config.abs_tolerance {
        return Ok(Solution {
            root: initial_guess,
            iterations: 0,
            residual: f0,
            method: SolveMethod::InitialGuess,
        });
    }

    let newton_budget = (config.max_iterations / 2).max(1);
    let used = match newton(f, df, initial_guess, f0, newton_budget, config) {
        Newton::Converged(solution) => {
            debug!(
                function,
                iterations = solution.iterations,
                root = %solution.root,
                "Newton-Raphson converged"
            );
            return Ok(solution);
        }
        Newton::Abandoned { iterations, reason } => {
            debug!(
                function,
                iterations, reason, "Newton-Raphson abandoned; falling back to bisection"
            );
            iterations
        }
    };

    let bracket = find_bracket(f, initial_guess, f0, config).map_err(|(lower, upper)| {
        FinCalcError::NoSignChange {
            function: function.to_string(),
            lower,
            upper,
        }
    })?;
    debug!(function, lo = %bracket.lo, hi = %bracket.hi, "root bracketed");

    bisect(function, f, bracket, used, config)
}

// ---------------------------------------------------------------------------
// Newton-Raphson phase
// ---------------------------------------------------------------------------

enum Newton {
    Converged(Solution),
    Abandoned { iterations: u32, reason: &'static str },
}

fn newton<F, D>(
    f: &F,
    df: &D,
    x0: Decimal,
    f0: Decimal,
    budget: u32,
    config: &SolverConfig,
) -> Newton
where
    F: Fn(Decimal) -> FinCalcResult<Decimal>,
    D: Fn(Decimal) -> FinCalcResult<Decimal>,
{
    let mut x = x0;
    let mut fx = f0;
    let mut divergent_steps = 0;

    for iteration in 1..=budget {
        let slope = match df(x) {
            Ok(d) if d.abs() >= MIN_DERIVATIVE => d,
            Ok(_) => {
                return Newton::Abandoned {
                    iterations: iteration,
                    reason: "derivative vanished",
                }
            }
            Err(_) => {
                return Newton::Abandoned {
                    iterations: iteration,
                    reason: "derivative undefined",
                }
            }
        };

        let Some((step, next)) = fx
            .checked_div(slope)
            .and_then(|step| x.checked_sub(step).map(|next| (step, next)))
        else {
            return Newton::Abandoned {
                iterations: iteration,
                reason: "step overflowed",
            };
        };
        if !config.contains(next) {
            return Newton::Abandoned {
                iterations: iteration,
                reason: "step left the search domain",
            };
        }
        let f_next = match f(next) {
            Ok(v) => v,
            Err(_) => {
                return Newton::Abandoned {
                    iterations: iteration,
                    reason: "function undefined at step",
                }
            }
        };
        trace!(iteration, x = %next, residual = %f_next, "newton step");

        let blew_up = fx
            .abs()
            .checked_mul(dec!(2))
            .map_or(false, |limit| f_next.abs() > limit);
        if blew_up {
            divergent_steps += 1;
            if divergent_steps >= MAX_DIVERGENT_STEPS {
                return Newton::Abandoned {
                    iterations: iteration,
                    reason: "diverging",
                };
            }
        } else {
            divergent_steps = 0;
        }

        x = next;
        fx = f_next;

        if fx.abs() <= config.abs_tolerance && step_converged(step.abs(), x, config) {
            return Newton::Converged(Solution {
                root: x,
                iterations: iteration,
                residual: fx,
                method: SolveMethod::NewtonRaphson,
            });
        }
    }

    Newton::Abandoned {
        iterations: budget,
        reason: "iteration budget exhausted",
    }
}

/// |dx| <= rel_tolerance · max(|x|, 1); a limit too large to represent
/// admits any step.
fn step_converged(dx: Decimal, x: Decimal, config: &SolverConfig) -> bool {
    config
        .rel_tolerance
        .checked_mul(x.abs().max(Decimal::ONE))
        .map_or(true, |limit| dx <= limit)
}

/// Central difference, falling back to a one-sided difference when one
/// neighbour lies outside the domain or cannot be evaluated.
fn central_difference<F>(f: &F, x: Decimal, config: &SolverConfig) -> FinCalcResult<Decimal>
where
    F: Fn(Decimal) -> FinCalcResult<Decimal>,
{
    let h = config
        .derivative_step
        .checked_mul(x.abs().max(Decimal::ONE))
        .ok_or_else(|| FinCalcError::overflow("numerical derivative"))?;
    let sample = |point: Option<Decimal>| {
        point
            .filter(|p| config.contains(*p))
            .and_then(|p| f(p).ok())
    };

    let (rise, run) = match (sample(x.checked_add(h)), sample(x.checked_sub(h))) {
        (Some(up), Some(down)) => (up.checked_sub(down), h.checked_mul(dec!(2))),
        (Some(up), None) => (up.checked_sub(f(x)?), Some(h)),
        (None, Some(down)) => (f(x)?.checked_sub(down), Some(h)),
        (None, None) => {
            return Err(FinCalcError::OutOfDomain {
                context: "numerical derivative".into(),
                reason: format!("function undefined on both sides of {x}"),
            })
        }
    };

    rise.zip(run)
        .and_then(|(r, d)| r.checked_div(d))
        .ok_or_else(|| FinCalcError::overflow("numerical derivative"))
}

// ---------------------------------------------------------------------------
// Bracketing and bisection phase
// ---------------------------------------------------------------------------

struct Bracket {
    lo: Decimal,
    hi: Decimal,
    f_lo: Decimal,
    f_hi: Decimal,
}

fn crosses(reference: Decimal, candidate: Decimal) -> bool {
    candidate.is_zero() || (reference < Decimal::ZERO) != (candidate < Decimal::ZERO)
}

/// Expand geometrically outward from `x0` until the function changes sign.
///
/// On failure returns the outermost points that were evaluated.
fn find_bracket<F>(
    f: &F,
    x0: Decimal,
    f0: Decimal,
    config: &SolverConfig,
) -> Result<Bracket, (Decimal, Decimal)>
where
    F: Fn(Decimal) -> FinCalcResult<Decimal>,
{
    let mut step = INITIAL_BRACKET_STEP.max(x0.abs() * BRACKET_STEP_SHARE);
    let (mut lo, mut f_lo) = (x0, f0);
    let (mut hi, mut f_hi) = (x0, f0);
    let mut lo_open = true;
    let mut hi_open = true;

    for _ in 0..MAX_BRACKET_EXPANSIONS {
        if lo_open {
            // approach the edge geometrically instead of crossing it
            let candidate = x0.checked_sub(step).map(|c| match config.lower_bound {
                Some(lb) if c <= lb => lo / dec!(2) + lb / dec!(2),
                _ => c,
            });
            match candidate.map(|c| (c, f(c))) {
                Some((candidate, Ok(v))) if candidate < lo => {
                    if crosses(f_lo, v) {
                        return Ok(Bracket {
                            lo: candidate,
                            hi: lo,
                            f_lo: v,
                            f_hi: f_lo,
                        });
                    }
                    lo = candidate;
                    f_lo = v;
                }
                _ => lo_open = false,
            }
        }

        if hi_open {
            let candidate = x0.checked_add(step).map(|c| match config.upper_bound {
                Some(ub) if c >= ub => hi / dec!(2) + ub / dec!(2),
                _ => c,
            });
            match candidate.map(|c| (c, f(c))) {
                Some((candidate, Ok(v))) if candidate > hi => {
                    if crosses(f_hi, v) {
                        return Ok(Bracket {
                            lo: hi,
                            hi: candidate,
                            f_lo: f_hi,
                            f_hi: v,
                        });
                    }
                    hi = candidate;
                    f_hi = v;
                }
                _ => hi_open = false,
            }
        }

        if !lo_open && !hi_open {
            break;
        }
        match step.checked_mul(dec!(2)) {
            Some(next) => step = next,
            None => break,
        }
    }

    Err((lo, hi))
}

fn bisect<F>(
    function: &str,
    f: &F,
    bracket: Bracket,
    used: u32,
    config: &SolverConfig,
) -> FinCalcResult<Solution>
where
    F: Fn(Decimal) -> FinCalcResult<Decimal>,
{
    let Bracket {
        mut lo,
        mut hi,
        mut f_lo,
        f_hi,
    } = bracket;

    for (root, residual) in [(lo, f_lo), (hi, f_hi)] {
        if residual.is_zero() {
            return Ok(Solution {
                root,
                iterations: used,
                residual,
                method: SolveMethod::Bisection,
            });
        }
    }

    let remaining = config.max_iterations.saturating_sub(used);
    let mut last_residual = f_lo;

    for k in 1..=remaining {
        let mid = lo / dec!(2) + hi / dec!(2);
        let f_mid = f(mid)?;
        last_residual = f_mid;
        let half_width = hi / dec!(2) - lo / dec!(2);
        trace!(iteration = used + k, x = %mid, residual = %f_mid, "bisection step");

        if f_mid.is_zero()
            || (f_mid.abs() <= config.abs_tolerance && step_converged(half_width, mid, config))
        {
            return Ok(Solution {
                root: mid,
                iterations: used + k,
                residual: f_mid,
                method: SolveMethod::Bisection,
            });
        }

        if (f_mid < Decimal::ZERO) == (f_lo < Decimal::ZERO) {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }

    Err(FinCalcError::ConvergenceFailure {
        function: function.to_string(),
        iterations: config.max_iterations,
        last_delta: last_residual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqrt2_error(x: Decimal) -> Decimal {
        (x - dec!(1.4142135623730950488016887242)).abs()
    }

    #[test]
    fn test_newton_with_derivative() {
        let sol = find_root_with_derivative(
            "sqrt2",
            |x| Ok(x * x - dec!(2)),
            |x| Ok(dec!(2) * x),
            dec!(1.5),
            &SolverConfig::default(),
        )
        .unwrap();
        assert_eq!(sol.method, SolveMethod::NewtonRaphson);
        assert!(sqrt2_error(sol.root) < dec!(0.0000000001));
        assert!(sol.iterations < 10);
    }

    #[test]
    fn test_newton_numerical_derivative() {
        let sol = find_root("sqrt2", |x| Ok(x * x - dec!(2)), dec!(1), &SolverConfig::default())
            .unwrap();
        assert_eq!(sol.method, SolveMethod::NewtonRaphson);
        assert!(sqrt2_error(sol.root) < dec!(0.0000000001));
    }

    #[test]
    fn test_newton_with_residuals_near_decimal_max() {
        let scale = dec!(70000000000000000000000000000);
        let sol = find_root_with_derivative(
            "steep",
            |x| {
                (x - Decimal::ONE)
                    .checked_mul(scale)
                    .ok_or_else(|| FinCalcError::overflow("steep"))
            },
            |_| Ok(scale),
            dec!(1.9),
            &SolverConfig::default(),
        )
        .unwrap();
        assert_eq!(sol.root, Decimal::ONE);
    }

    #[test]
    fn test_bracketing_near_decimal_limits_reports_no_sign_change() {
        let err = find_root(
            "flat",
            |_| Ok(Decimal::ONE),
            Decimal::MAX / dec!(2),
            &SolverConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FinCalcError::NoSignChange { .. }), "{err:?}");
    }

    #[test]
    fn test_initial_guess_already_root() {
        let sol = find_root("exact", |x| Ok(x - dec!(3)), dec!(3), &SolverConfig::default())
            .unwrap();
        assert_eq!(sol.iterations, 0);
        assert_eq!(sol.method, SolveMethod::InitialGuess);
        assert_eq!(sol.root, dec!(3));
    }

    #[test]
    fn test_cycling_newton_recovers_by_bisection() {
        // Newton from 0 cycles 0 -> 1 -> 0 on x^3 - 2x + 2
        let f = |x: Decimal| Ok(x * x * x - dec!(2) * x + dec!(2));
        let df = |x: Decimal| Ok(dec!(3) * x * x - dec!(2));
        let sol =
            find_root_with_derivative("cubic", f, df, Decimal::ZERO, &SolverConfig::default())
                .unwrap();
        assert_eq!(sol.method, SolveMethod::Bisection);
        assert!((sol.root - dec!(-1.769292354)).abs() < dec!(0.000001));
        assert!(sol.iterations <= DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn test_step_outside_domain_falls_back() {
        // 1/(1+x) = 0.5 at x = 1; Newton from 5 jumps below -1
        let f = |x: Decimal| Ok(Decimal::ONE / (Decimal::ONE + x) - dec!(0.5));
        let config = SolverConfig::default().for_rates();
        let sol = find_root("reciprocal", f, dec!(5), &config).unwrap();
        assert_eq!(sol.method, SolveMethod::Bisection);
        assert_eq!(sol.root, Decimal::ONE);
    }

    #[test]
    fn test_no_real_root_reports_no_sign_change() {
        let f = |x: Decimal| {
            x.checked_mul(x)
                .map(|sq| sq + Decimal::ONE)
                .ok_or_else(|| FinCalcError::overflow("x^2 + 1"))
        };
        let df = |x: Decimal| Ok(dec!(2) * x);
        let err = find_root_with_derivative("no-root", f, df, Decimal::ONE, &SolverConfig::default())
            .unwrap_err();
        assert!(matches!(err, FinCalcError::NoSignChange { .. }));
    }

    #[test]
    fn test_iteration_cap_is_a_failure() {
        let f = |x: Decimal| Ok(x * x * x - dec!(2) * x + dec!(2));
        let df = |x: Decimal| Ok(dec!(3) * x * x - dec!(2));
        let config = SolverConfig::default().with_max_iterations(4);
        let err = find_root_with_derivative("cubic", f, df, Decimal::ZERO, &config).unwrap_err();
        match err {
            FinCalcError::ConvergenceFailure { iterations, .. } => assert_eq!(iterations, 4),
            other => panic!("expected convergence failure, got {other}"),
        }
    }

    #[test]
    fn test_guess_outside_domain_rejected() {
        let config = SolverConfig::default().for_rates();
        let result = find_root("rate", |x| Ok(x), dec!(-2), &config);
        assert!(matches!(result, Err(FinCalcError::InvalidInput { .. })));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SolverConfig::default().with_abs_tolerance(Decimal::ZERO);
        assert!(find_root("x", |x| Ok(x - Decimal::ONE), Decimal::ZERO, &config).is_err());

        let config = SolverConfig::default()
            .with_lower_bound(dec!(1))
            .with_upper_bound(dec!(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: SolverConfig = serde_json::from_str(r#"{"max_iterations": 40}"#).unwrap();
        assert_eq!(config.max_iterations, 40);
        assert_eq!(config.abs_tolerance, DEFAULT_ABS_TOLERANCE);
        assert!(config.lower_bound.is_none());
    }

    #[test]
    fn test_for_rates_keeps_tighter_bound() {
        let config = SolverConfig::default().with_lower_bound(dec!(-0.5)).for_rates();
        assert_eq!(config.lower_bound, Some(dec!(-0.5)));
        let config = SolverConfig::default().for_rates();
        assert_eq!(config.lower_bound, Some(dec!(-1)));
    }
}
