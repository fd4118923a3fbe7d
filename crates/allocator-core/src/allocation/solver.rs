use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::objective::SmoothObjective;
use crate::error::AllocatorError;
use crate::AllocatorResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Tuning for the projected-gradient minimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Maximum outer iterations before giving up.
    pub max_iterations: u32,
    /// Converged once no weight moves by more than this in one iteration.
    pub tolerance: Decimal,
    /// First trial step of each line search.
    pub initial_step: Decimal,
    /// Line search gives up below this step.
    pub min_step: Decimal,
    /// Sufficient-decrease fraction in the Armijo condition.
    pub armijo_fraction: Decimal,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            max_iterations: 1000,
            tolerance: dec!(0.0000000001),
            initial_step: Decimal::ONE,
            min_step: dec!(0.00000000000000000001),
            armijo_fraction: dec!(0.0001),
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> AllocatorResult<()> {
        if self.max_iterations == 0 {
            return Err(AllocatorError::invalid_parameter(
                "solver.max_iterations",
                "must be positive",
            ));
        }
        if self.tolerance <= Decimal::ZERO {
            return Err(AllocatorError::invalid_parameter(
                "solver.tolerance",
                "must be positive",
            ));
        }
        if self.initial_step <= Decimal::ZERO {
            return Err(AllocatorError::invalid_parameter(
                "solver.initial_step",
                "must be positive",
            ));
        }
        if self.min_step <= Decimal::ZERO || self.min_step >= self.initial_step {
            return Err(AllocatorError::invalid_parameter(
                "solver.min_step",
                "must be positive and below initial_step",
            ));
        }
        if self.armijo_fraction <= Decimal::ZERO || self.armijo_fraction >= Decimal::ONE {
            return Err(AllocatorError::invalid_parameter(
                "solver.armijo_fraction",
                "must be strictly between 0 and 1",
            ));
        }
        Ok(())
    }
}

/// Box bounds for one weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightBounds {
    pub lower: Decimal,
    pub upper: Decimal,
}

impl WeightBounds {
    /// Long-only, no leverage: `0 <= w_i <= 1`.
    pub const LONG_ONLY: WeightBounds = WeightBounds {
        lower: Decimal::ZERO,
        upper: Decimal::ONE,
    };
}

/// Minimizer result on convergence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOutcome {
    pub weights: Vec<Decimal>,
    pub objective_value: Decimal,
    pub iterations: u32,
    /// The last accepted line-search step was the smallest the search allows;
    /// one more halving would have fallen below `min_step`.
    pub ended_at_min_step: bool,
}

// ---------------------------------------------------------------------------
// Minimizer
// ---------------------------------------------------------------------------

/// Minimize `objective` over `{w : sum(w) = 1, lower_i <= w_i <= upper_i}`.
///
/// Projected gradient descent with Armijo backtracking. Each trial point is the
/// exact Euclidean projection of `w - step * grad` onto the feasible set, so
/// every iterate satisfies both the budget and the box constraints.
pub fn minimize<F: SmoothObjective>(
    objective: &F,
    start: &[Decimal],
    bounds: &[WeightBounds],
    settings: &SolverSettings,
) -> AllocatorResult<SolverOutcome> {
    settings.validate()?;
    if start.len() != bounds.len() {
        return Err(AllocatorError::invalid_parameter(
            "start",
            format!("{} starting weights for {} bounds", start.len(), bounds.len()),
        ));
    }

    let mut w = project_at(start, bounds, 0)?;
    let mut f = evaluate(objective, &w, 0)?;
    let mut ended_at_min_step = false;

    tracing::debug!(
        assets = w.len(),
        max_iterations = settings.max_iterations,
        initial_objective = %f,
        "starting projected-gradient solve"
    );

    for iteration in 1..=settings.max_iterations {
        let grad = objective
            .gradient(&w)
            .ok_or_else(|| breakdown("gradient", iteration))?;

        // Stationary when a unit step projects back onto the current point.
        let unit = project_at(&step_along(&w, &grad, Decimal::ONE, iteration)?, bounds, iteration)?;
        if max_abs_diff(&unit, &w) <= settings.tolerance {
            return finish(w, f, iteration, ended_at_min_step);
        }

        let mut step = settings.initial_step;
        let (candidate, f_candidate) = loop {
            let trial = project_at(&step_along(&w, &grad, step, iteration)?, bounds, iteration)?;
            let f_trial = evaluate(objective, &trial, iteration)?;
            let threshold = directional_decrease(&grad, &trial, &w)
                .and_then(|d| settings.armijo_fraction.checked_mul(d))
                .and_then(|d| f.checked_add(d))
                .ok_or_else(|| breakdown("line search", iteration))?;
            if f_trial <= threshold {
                break (trial, f_trial);
            }
            step /= dec!(2);
            if step < settings.min_step {
                return Err(AllocatorError::optimization_failed(
                    "Positive directional derivative in line search",
                    iteration,
                ));
            }
        };
        ended_at_min_step = step / dec!(2) < settings.min_step;

        let delta = max_abs_diff(&candidate, &w);
        tracing::trace!(iteration, step = %step, objective = %f_candidate, delta = %delta, "accepted step");

        w = candidate;
        f = f_candidate;
        if delta <= settings.tolerance {
            return finish(w, f, iteration, ended_at_min_step);
        }
    }

    Err(AllocatorError::optimization_failed(
        format!(
            "Iteration limit reached without convergence (objective {})",
            f.round_dp(10)
        ),
        settings.max_iterations,
    ))
}

fn finish(
    weights: Vec<Decimal>,
    objective_value: Decimal,
    iterations: u32,
    ended_at_min_step: bool,
) -> AllocatorResult<SolverOutcome> {
    tracing::debug!(iterations, objective = %objective_value, ended_at_min_step, "solver converged");
    Ok(SolverOutcome {
        weights,
        objective_value,
        iterations,
        ended_at_min_step,
    })
}

fn evaluate<F: SmoothObjective>(objective: &F, w: &[Decimal], iteration: u32) -> AllocatorResult<Decimal> {
    objective
        .value(w)
        .ok_or_else(|| breakdown("objective", iteration))
}

fn breakdown(what: &str, iteration: u32) -> AllocatorError {
    AllocatorError::optimization_failed(
        format!("Numerical overflow evaluating the {}", what),
        iteration,
    )
}

/// Projection with failures attributed to `iteration`.
fn project_at(v: &[Decimal], bounds: &[WeightBounds], iteration: u32) -> AllocatorResult<Vec<Decimal>> {
    project_onto_capped_simplex(v, bounds).map_err(|e| match e {
        AllocatorError::OptimizationFailed { message, .. } => AllocatorError::OptimizationFailed {
            message,
            iterations: iteration,
        },
        other => other,
    })
}

fn step_along(w: &[Decimal], grad: &[Decimal], step: Decimal, iteration: u32) -> AllocatorResult<Vec<Decimal>> {
    w.iter()
        .zip(grad.iter())
        .map(|(wi, gi)| step.checked_mul(*gi).and_then(|s| wi.checked_sub(s)))
        .collect::<Option<Vec<Decimal>>>()
        .ok_or_else(|| breakdown("gradient step", iteration))
}

/// `grad . (trial - w)`
fn directional_decrease(grad: &[Decimal], trial: &[Decimal], w: &[Decimal]) -> Option<Decimal> {
    grad.iter()
        .zip(trial.iter().zip(w.iter()))
        .try_fold(Decimal::ZERO, |acc, (g, (t, wi))| {
            acc.checked_add(g.checked_mul(t.checked_sub(*wi)?)?)
        })
}

fn max_abs_diff(a: &[Decimal], b: &[Decimal]) -> Decimal {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| x.checked_sub(*y).map_or(Decimal::MAX, |d| d.abs()))
        .fold(Decimal::ZERO, Decimal::max)
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Euclidean projection of `v` onto `{w : sum(w) = 1, lower_i <= w_i <= upper_i}`.
///
/// The projection is `w_i = clamp(v_i - tau, lower_i, upper_i)` for the shift
/// `tau` that makes the weights sum to one. `sum(w(tau))` is piecewise linear
/// and non-increasing in `tau`, with kinks at `v_i - upper_i` and
/// `v_i - lower_i`, so `tau` is found exactly by locating the bracketing kinks
/// and interpolating.
pub fn project_onto_capped_simplex(v: &[Decimal], bounds: &[WeightBounds]) -> AllocatorResult<Vec<Decimal>> {
    if v.is_empty() || v.len() != bounds.len() {
        return Err(AllocatorError::invalid_parameter(
            "bounds",
            format!("{} values for {} bounds", v.len(), bounds.len()),
        ));
    }

    let overflow = || {
        AllocatorError::optimization_failed("Numerical overflow projecting onto the feasible set", 0)
    };

    let lower_sum = bounds
        .iter()
        .try_fold(Decimal::ZERO, |acc, b| acc.checked_add(b.lower))
        .ok_or_else(overflow)?;
    let upper_sum = bounds
        .iter()
        .try_fold(Decimal::ZERO, |acc, b| acc.checked_add(b.upper))
        .ok_or_else(overflow)?;
    if bounds.iter().any(|b| b.lower > b.upper) || lower_sum > Decimal::ONE || upper_sum < Decimal::ONE {
        return Err(AllocatorError::optimization_failed(
            format!(
                "Infeasible bounds: weights cannot sum to 1 within [{}, {}]",
                lower_sum, upper_sum
            ),
            0,
        ));
    }

    // Partial sums lie between those of the bounds, which fit.
    let shifted_sum = |tau: Decimal| -> Decimal {
        v.iter()
            .zip(bounds.iter())
            .map(|(vi, b)| shift(*vi, tau, b))
            .sum()
    };

    let mut kinks = v
        .iter()
        .zip(bounds.iter())
        .map(|(vi, b)| Some([vi.checked_sub(b.upper)?, vi.checked_sub(b.lower)?]))
        .collect::<Option<Vec<[Decimal; 2]>>>()
        .ok_or_else(overflow)?
        .concat();
    kinks.sort();
    kinks.dedup();

    // sum at the first kink is upper_sum >= 1 and at the last is lower_sum <= 1.
    let mut tau = kinks[kinks.len() - 1];
    let mut prev = kinks[0];
    let mut prev_sum = shifted_sum(prev);
    if prev_sum <= Decimal::ONE {
        tau = prev;
    } else {
        for &kink in &kinks[1..] {
            let s = shifted_sum(kink);
            if s <= Decimal::ONE {
                tau = interpolate(prev, prev_sum, kink, s).ok_or_else(overflow)?;
                break;
            }
            prev = kink;
            prev_sum = s;
        }
    }

    Ok(v.iter()
        .zip(bounds.iter())
        .map(|(vi, b)| shift(*vi, tau, b))
        .collect())
}

/// Shift where the piecewise-linear sum crosses 1 between two kinks.
fn interpolate(prev: Decimal, prev_sum: Decimal, kink: Decimal, sum: Decimal) -> Option<Decimal> {
    let excess = prev_sum.checked_sub(Decimal::ONE)?;
    let drop = prev_sum.checked_sub(sum)?;
    let gap = kink.checked_sub(prev)?;
    let offset = match excess.checked_mul(gap) {
        Some(scaled) => scaled.checked_div(drop)?,
        None => excess.checked_div(drop)?.checked_mul(gap)?,
    };
    prev.checked_add(offset)
}

/// `clamp(v - tau)`; a difference beyond the decimal range saturates to a bound.
fn shift(v: Decimal, tau: Decimal, bounds: &WeightBounds) -> Decimal {
    match v.checked_sub(tau) {
        Some(x) => clamp(x, bounds),
        None if v > tau => bounds.upper,
        None => bounds.lower,
    }
}

fn clamp(x: Decimal, bounds: &WeightBounds) -> Decimal {
    x.max(bounds.lower).min(bounds.upper)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
