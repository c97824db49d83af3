//! Value iteration.
//!
//! Solves `x = f(x)` on a subset of states (the *maybe* states left undecided
//! by precomputation) where
//!
//! ```text
//! f(x)[s] = opt_{c in choices(s)} ( r(c) + sum_t P(c, t) * x[t] )
//! ```
//!
//! and `r(c)` is zero for reachability and the expected one-step reward for
//! reward objectives. Discounted objectives scale the successor sum by a
//! factor `γ`. Values outside the subset are fixed and read-only.
//!
//! Both Jacobi and Gauss-Seidel sweeps are supported. Iteration stops when the
//! distance between successive iterates (absolute or relative, see
//! [`StopCriterion`]) drops to half the tolerance, or when the iteration cap is
//! hit. Hitting the cap is not an error here: the [`Solution`] reports
//! `converged = false` together with the best values at cutoff, and the caller
//! decides how to surface it.

use log::{debug, info, warn};

use crate::bitset::StateSet;
use crate::config::{Config, IterationMethod, StopCriterion};
use crate::error::{Error, Result};
use crate::model::Model;
use crate::scheduler::{Resolver, Scheduler};
use crate::types::{Direction, State};

/// What a single Bellman update computes.
#[derive(Debug, Copy, Clone)]
pub enum UpdateRule<'a> {
    /// Weighted sum over successors.
    Reachability,
    /// Weighted sum over successors plus the reward of the choice (indexed by global choice).
    Reward(&'a [f64]),
    /// Like [`UpdateRule::Reward`], with the successor sum multiplied by a discount factor.
    Discounted(&'a [f64], f64),
}

/// Outcome of an iterative solve.
#[derive(Debug, Clone)]
pub struct Solution {
    pub values: Vec<f64>,
    pub iterations: usize,
    /// Distance between the last two iterates.
    pub residual: f64,
    pub converged: bool,
    pub scheduler: Option<Scheduler>,
}

/// Allocates a vector of `len` copies of `fill`, failing fast if memory is short.
pub(crate) fn allocate<T: Clone>(len: usize, fill: T, config: &Config) -> Result<Vec<T>> {
    let requested = len.saturating_mul(std::mem::size_of::<T>());
    if let Some(limit) = config.memory_limit {
        if requested > limit {
            return Err(Error::ResourceExhausted { requested });
        }
    }
    let mut values = Vec::new();
    values
        .try_reserve_exact(len)
        .map_err(|_| Error::ResourceExhausted { requested })?;
    values.resize(len, fill);
    Ok(values)
}

/// Rejects a step bound that would unroll more than `config.max_iterations` updates.
pub(crate) fn check_steps(steps: usize, config: &Config) -> Result<()> {
    if steps > config.max_iterations {
        return Err(Error::InvalidQuery(format!(
            "step bound {} exceeds the iteration cap of {}",
            steps, config.max_iterations
        )));
    }
    Ok(())
}

/// Value of taking global choice `choice` under `values`.
#[inline]
fn choice_value(model: &Model, choice: usize, values: &[f64], rule: UpdateRule<'_>) -> f64 {
    let (reward, factor) = match rule {
        UpdateRule::Reachability => (0.0, 1.0),
        UpdateRule::Reward(rewards) => (rewards[choice], 1.0),
        UpdateRule::Discounted(rewards, factor) => (rewards[choice], factor),
    };
    let mut expectation = model.distribution(choice).expectation(values);
    if factor != 1.0 {
        expectation *= factor;
    }
    if reward == 0.0 {
        expectation
    } else {
        reward + expectation
    }
}

/// One Bellman update of `state`: returns the winning local choice and its value.
#[inline]
pub(crate) fn bellman(
    model: &Model,
    state: State,
    values: &[f64],
    rule: UpdateRule<'_>,
    resolver: &Resolver,
) -> Result<(usize, f64)> {
    let range = model.choice_range(state);
    let (choice, value) = if range.len() == 1 {
        (0, choice_value(model, range.start, values, rule))
    } else {
        resolver
            .best(range.map(|c| choice_value(model, c, values, rule)))
            .unwrap_or((0, 0.0))
    };
    checked(state, value)?;
    Ok((choice, value))
}

#[inline]
fn checked(state: State, value: f64) -> Result<f64> {
    if value.is_nan() || value < 0.0 {
        return Err(Error::NumericalDefect { state, value });
    }
    Ok(value)
}

/// Applies one synchronous update to every state of `states`, reading `src` and writing `dst`.
///
/// States outside `states` are copied unchanged.
pub(crate) fn jacobi_step(
    model: &Model,
    states: &[State],
    src: &[f64],
    dst: &mut [f64],
    rule: UpdateRule<'_>,
    resolver: &Resolver,
) -> Result<()> {
    dst.copy_from_slice(src);
    for &s in states {
        dst[s] = bellman(model, s, src, rule, resolver)?.1;
    }
    Ok(())
}

#[inline]
fn distance(old: f64, new: f64, criterion: StopCriterion) -> f64 {
    if old == new {
        return 0.0;
    }
    if new.is_infinite() || old.is_infinite() {
        return f64::INFINITY;
    }
    let diff = (new - old).abs();
    match criterion {
        StopCriterion::Absolute => diff,
        StopCriterion::Relative if old != 0.0 => diff / old.abs(),
        StopCriterion::Relative => diff,
    }
}

/// Final iterate of [`sweep`].
struct Sweeps {
    values: Vec<f64>,
    iterations: usize,
    residual: f64,
    converged: bool,
}

/// Repeats `update` over `states` until two iterates are within half the tolerance.
fn sweep<F>(states: &[State], mut values: Vec<f64>, config: &Config, mut update: F) -> Result<Sweeps>
where
    F: FnMut(State, &[f64]) -> Result<f64>,
{
    let threshold = config.tolerance / 2.0;
    let mut scratch = match config.method {
        IterationMethod::Jacobi => allocate(values.len(), 0.0, config)?,
        IterationMethod::GaussSeidel => Vec::new(),
    };

    let mut iterations = 0;
    let mut residual = 0.0;
    let mut converged = states.is_empty();
    while !converged && iterations < config.max_iterations {
        iterations += 1;
        residual = 0.0f64;
        match config.method {
            IterationMethod::Jacobi => {
                scratch.copy_from_slice(&values);
                for &s in states {
                    scratch[s] = update(s, &values)?;
                    residual = residual.max(distance(values[s], scratch[s], config.stop_criterion));
                }
                std::mem::swap(&mut values, &mut scratch);
            }
            IterationMethod::GaussSeidel => {
                for &s in states {
                    let value = update(s, &values)?;
                    residual = residual.max(distance(values[s], value, config.stop_criterion));
                    values[s] = value;
                }
            }
        }
        converged = residual <= threshold;
    }
    Ok(Sweeps {
        values,
        iterations,
        residual,
        converged,
    })
}

/// Iterates the Bellman operator on `maybe` until convergence or the iteration cap.
///
/// `values` holds the initial iterate; entries outside `maybe` are never written.
/// For Markov chains `direction` is irrelevant.
pub fn solve(
    model: &Model,
    maybe: &StateSet,
    values: Vec<f64>,
    rule: UpdateRule<'_>,
    direction: Direction,
    config: &Config,
) -> Result<Solution> {
    debug_assert_eq!(values.len(), model.num_states());
    let resolver = Resolver::new(direction, config.tie_break);
    let states: Vec<State> = maybe.iter().collect();
    let Sweeps {
        values,
        iterations,
        residual,
        converged,
    } = sweep(&states, values, config, |s, values| {
        Ok(bellman(model, s, values, rule, &resolver)?.1)
    })?;

    if converged {
        info!(
            "Value iteration on {} states converged after {} iterations (residual {:e})",
            states.len(),
            iterations,
            residual
        );
    } else {
        warn!(
            "Value iteration on {} states stopped at the cap of {} iterations (residual {:e})",
            states.len(),
            iterations,
            residual
        );
    }

    let scheduler = if config.compute_scheduler && model.semantics().is_nondeterministic() {
        let mut scheduler = Scheduler::new(model.num_states());
        for &s in &states {
            let (choice, _) = bellman(model, s, &values, rule, &resolver)?;
            scheduler.set(s, choice);
        }
        Some(scheduler)
    } else {
        None
    };

    Ok(Solution {
        values,
        iterations,
        residual,
        converged,
        scheduler,
    })
}

/// Evaluates the fixed `scheduler` on `maybe`: like [`solve`], but every state
/// only takes the choice the scheduler selects.
pub fn solve_fixed(
    model: &Model,
    maybe: &StateSet,
    values: Vec<f64>,
    rule: UpdateRule<'_>,
    scheduler: &Scheduler,
    config: &Config,
) -> Result<Solution> {
    debug_assert_eq!(values.len(), model.num_states());
    let states: Vec<State> = maybe.iter().collect();
    let Sweeps {
        values,
        iterations,
        residual,
        converged,
    } = sweep(&states, values, config, |s, values| {
        let choice = model.choice_range(s).start + scheduler.choice(s);
        checked(s, choice_value(model, choice, values, rule))
    })?;
    debug!(
        "Scheduler evaluation on {} states: {} iterations (residual {:e}, converged: {})",
        states.len(),
        iterations,
        residual,
        converged
    );
    Ok(Solution {
        values,
        iterations,
        residual,
        converged,
        scheduler: None,
    })
}
