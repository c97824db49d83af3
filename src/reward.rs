//! Expected rewards.
//!
//! The supported shapes are:
//!
//! - **Reachability** `R[F φ]`: expected reward accumulated until `φ` is hit.
//!   States that miss `φ` with positive probability under the optimising
//!   scheduler get `+∞` (for `max` every state outside `Prob1A`, for `min`
//!   every state outside `Prob1E`). For CTMCs the embedded chain is used and
//!   state rewards are rates, so they are scaled by the mean sojourn time.
//!   `max` and Markov chains iterate up from zero. `min` on an MDP first
//!   evaluates a scheduler that reaches `φ` almost surely and iterates down
//!   from its cost, since zero-reward end components admit fixpoints below
//!   the minimum.
//! - **Total** `C`: reward collected over the whole run. A run that ends up
//!   in an end component earning reward forever collects `+∞`.
//! - **Cumulative** `C<=k`: reward collected during the first `k` steps, or
//!   up to time `T` for CTMCs (uniformized integral of the transient reward).
//! - **Discounted** `C<=k, DISCOUNT=γ` and `C, DISCOUNT=γ`: the reward of
//!   step `i` weighted by `γ^i`, for discrete-time models.
//! - **Instantaneous** `I=k`: expected state reward at step `k` or time `T`.
//! - **Long-run** `S`: handled by [`crate::steady`].

use log::debug;

use crate::bitset::StateSet;
use crate::bounded::{self, Transient};
use crate::components;
use crate::config::Config;
use crate::error::Result;
use crate::model::{Model, RewardStructure};
use crate::poisson::PoissonWeights;
use crate::precompute;
use crate::scheduler::{Resolver, Scheduler};
use crate::solver::{self, allocate, check_steps, jacobi_step, Solution, UpdateRule};
use crate::types::{Direction, State};

/// Impulse reward expected when taking global choice `choice`.
fn impulse(model: &Model, structure: &RewardStructure, choice: usize) -> f64 {
    let transitions: f64 = model
        .distribution(choice)
        .transitions()
        .map(|(tr, _, p)| p * structure.transition(tr))
        .sum();
    structure.choice(choice) + transitions
}

/// One-step reward of every global choice: state reward plus expected impulse.
///
/// For CTMCs the state reward is a rate and is multiplied by the mean sojourn time.
pub fn choice_rewards(model: &Model, structure: &RewardStructure, config: &Config) -> Result<Vec<f64>> {
    let mut rewards = allocate(model.num_choices(), 0.0, config)?;
    for s in 0..model.num_states() {
        let state = structure.state(s) / model.exit_rate(s);
        for c in model.choice_range(s) {
            rewards[c] = state + impulse(model, structure, c);
        }
    }
    Ok(rewards)
}

/// Reward rate of every state of a Markov chain.
///
/// For CTMCs impulses are earned at the exit rate; for DTMCs this is the
/// expected reward of one step.
pub fn rate_rewards(model: &Model, structure: &RewardStructure, config: &Config) -> Result<Vec<f64>> {
    let mut rates = allocate(model.num_states(), 0.0, config)?;
    for (s, rate) in rates.iter_mut().enumerate() {
        let c = model.choice_range(s).start;
        *rate = structure.state(s) + model.exit_rate(s) * impulse(model, structure, c);
    }
    Ok(rates)
}

/// `R[F target]`.
pub fn reachability(
    model: &Model,
    structure: &RewardStructure,
    target: &StateSet,
    direction: Direction,
    config: &Config,
) -> Result<Solution> {
    let rewards = choice_rewards(model, structure, config)?;
    reach(model, &rewards, target, direction, config)
}

fn reach(model: &Model, rewards: &[f64], target: &StateSet, direction: Direction, config: &Config) -> Result<Solution> {
    let n = model.num_states();
    let all = StateSet::full(n);
    let minimise = model.semantics().is_nondeterministic() && direction == Direction::Min;
    let finite = if model.semantics().is_nondeterministic() && direction == Direction::Max {
        precompute::prob1a(model, &all, target)
    } else {
        precompute::prob1e(model, &all, target)
    };
    let infinite = finite.complement();
    let maybe = finite.difference(target);

    let mut values = allocate(n, 0.0, config)?;
    for s in &infinite {
        values[s] = f64::INFINITY;
    }
    if !minimise || maybe.is_empty() {
        return solver::solve(model, &maybe, values, UpdateRule::Reward(rewards), direction, config);
    }

    let mut proper = Scheduler::new(n);
    for (s, c) in precompute::progress_choices(model, &finite, target) {
        proper.set(s, c);
    }
    let start = solver::solve_fixed(model, &maybe, values, UpdateRule::Reward(rewards), &proper, config)?;
    let mut solution = solver::solve(model, &maybe, start.values, UpdateRule::Reward(rewards), direction, config)?;
    solution.iterations += start.iterations;
    solution.converged &= start.converged;

    if let Some(scheduler) = solution.scheduler.as_mut() {
        // A free loop ties with the choices that leave it; only the latter may be kept.
        let mut optimal = allocate(model.num_choices(), true, config)?;
        for s in &maybe {
            let value = solution.values[s];
            let slack = config.tolerance * value.max(1.0);
            for c in model.choice_range(s) {
                let q = rewards[c] + model.distribution(c).expectation(&solution.values);
                optimal[c] = q <= value + slack;
            }
        }
        for (s, c) in precompute::progress_choices_among(model, &finite, target, |c| optimal[c]) {
            scheduler.set(s, c);
        }
    }
    Ok(solution)
}

/// `C`: expected reward collected over the whole run.
///
/// A state is `+∞` if the optimising scheduler reaches, with positive
/// probability, an end component where some choice earns reward. For `max`
/// on an MDP these are the maximal end components containing a rewarding
/// choice and every state that can reach one. Otherwise a finite total means
/// ending up almost surely in an end component built from zero-reward choices,
/// so the total is the reachability reward of the union of those components.
pub fn total(model: &Model, structure: &RewardStructure, direction: Direction, config: &Config) -> Result<Solution> {
    let n = model.num_states();
    let all = StateSet::full(n);
    let rewards = choice_rewards(model, structure, config)?;

    if model.semantics().is_nondeterministic() && direction == Direction::Max {
        let mut earning = StateSet::empty(n);
        for component in components::end_components(model, &all, |_| true) {
            let members = StateSet::from_states(n, component.iter().copied());
            let earns = component.iter().any(|&s| {
                model
                    .choice_range(s)
                    .any(|c| rewards[c] > 0.0 && model.distribution(c).all_in(&members))
            });
            if earns {
                earning.union_with(&members);
            }
        }
        let finite = precompute::prob0a(model, &all, &earning);
        debug!(
            "Total reward: {} states reach a rewarding end component",
            n - finite.len()
        );
        let mut values = allocate(n, 0.0, config)?;
        for s in &finite.complement() {
            values[s] = f64::INFINITY;
        }
        return solver::solve(model, &finite, values, UpdateRule::Reward(&rewards), direction, config);
    }

    let mut free = StateSet::empty(n);
    for component in components::end_components(model, &all, |c| rewards[c] == 0.0) {
        free.extend(component);
    }
    debug!("Total reward: {} states in zero-reward end components", free.len());
    reach(model, &rewards, &free, direction, config)
}

/// `C<=k` for discrete-time models.
pub fn cumulative_steps(
    model: &Model,
    structure: &RewardStructure,
    steps: usize,
    direction: Direction,
    config: &Config,
) -> Result<Vec<f64>> {
    discounted_steps(model, structure, steps, 1.0, direction, config)
}

/// `C<=k, DISCOUNT=γ`: `sum_{i<k} γ^i r_i` for discrete-time models.
pub fn discounted_steps(
    model: &Model,
    structure: &RewardStructure,
    steps: usize,
    factor: f64,
    direction: Direction,
    config: &Config,
) -> Result<Vec<f64>> {
    check_steps(steps, config)?;
    let n = model.num_states();
    let mut values = allocate(n, 0.0, config)?;
    if steps == 0 {
        return Ok(values);
    }
    let rewards = choice_rewards(model, structure, config)?;
    let rule = if factor == 1.0 {
        UpdateRule::Reward(&rewards)
    } else {
        UpdateRule::Discounted(&rewards, factor)
    };
    let states: Vec<State> = (0..n).collect();
    let resolver = Resolver::new(direction, config.tie_break);
    let mut scratch = allocate(n, 0.0, config)?;
    for _ in 0..steps {
        jacobi_step(model, &states, &values, &mut scratch, rule, &resolver)?;
        std::mem::swap(&mut values, &mut scratch);
    }
    Ok(values)
}

/// `C, DISCOUNT=γ` with `0 <= γ < 1`, solved as a fixpoint over every state.
pub fn discounted(
    model: &Model,
    structure: &RewardStructure,
    factor: f64,
    direction: Direction,
    config: &Config,
) -> Result<Solution> {
    let n = model.num_states();
    let rewards = choice_rewards(model, structure, config)?;
    let values = allocate(n, 0.0, config)?;
    solver::solve(
        model,
        &StateSet::full(n),
        values,
        UpdateRule::Discounted(&rewards, factor),
        direction,
        config,
    )
}

/// `C<=T` for CTMCs: `sum_i (1 - F(i))/q · P^i r` with `F` the Poisson CDF.
pub fn cumulative_time(model: &Model, structure: &RewardStructure, time: f64, config: &Config) -> Result<Transient> {
    let n = model.num_states();
    let mut result = allocate(n, 0.0, config)?;
    if time == 0.0 {
        return Ok(Transient {
            values: result,
            steps: 0,
            truncation_error: 0.0,
        });
    }
    let rate = bounded::uniformization_rate(model);
    let poisson = PoissonWeights::new(rate * time, config.tolerance);
    let none = StateSet::empty(n);
    let mut current = rate_rewards(model, structure, config)?;
    let mut scratch = allocate(n, 0.0, config)?;
    let mut cdf = 0.0;
    for i in 0..=poisson.right() {
        if i > 0 {
            bounded::uniformized_step(model, &none, rate, &current, &mut scratch);
            std::mem::swap(&mut current, &mut scratch);
        }
        cdf += poisson.weight(i);
        let coefficient = (1.0 - cdf).max(0.0) / rate;
        for (r, &x) in result.iter_mut().zip(&current) {
            *r += coefficient * x;
        }
    }
    Ok(Transient {
        values: result,
        steps: poisson.right(),
        truncation_error: poisson.truncation_error(),
    })
}

/// `I=k` for discrete-time models.
pub fn instantaneous_steps(
    model: &Model,
    structure: &RewardStructure,
    steps: usize,
    direction: Direction,
    config: &Config,
) -> Result<Vec<f64>> {
    check_steps(steps, config)?;
    let n = model.num_states();
    let mut values = allocate(n, 0.0, config)?;
    values.copy_from_slice(structure.state_rewards());
    let states: Vec<State> = (0..n).collect();
    let resolver = Resolver::new(direction, config.tie_break);
    let mut scratch = allocate(n, 0.0, config)?;
    for _ in 0..steps {
        jacobi_step(model, &states, &values, &mut scratch, UpdateRule::Reachability, &resolver)?;
        std::mem::swap(&mut values, &mut scratch);
    }
    Ok(values)
}

/// `I=T` for CTMCs.
pub fn instantaneous_time(model: &Model, structure: &RewardStructure, time: f64, config: &Config) -> Result<Transient> {
    let n = model.num_states();
    let mut init = allocate(n, 0.0, config)?;
    init.copy_from_slice(structure.state_rewards());
    bounded::transient(model, &StateSet::empty(n), init, time, config)
}
