//! Step- and time-bounded operators.
//!
//! Discrete-time bounds are handled by unrolling the Bellman update exactly
//! `k` times. Continuous-time bounds use uniformization: with a rate
//! `q >= max exit rate`, the CTMC is turned into the DTMC
//! `P = I + Q/q`, and the transient vector at time `t` is the Poisson-weighted
//! sum `sum_i ψ(i) P^i v`. The Poisson series is truncated by
//! [`PoissonWeights`]; the discarded mass is reported separately as a
//! truncation error and never mixed with iteration residuals.
//!
//! Interval bounds `U[a,b]` are computed in two phases: first the bounded
//! reachability over `b - a`, then `a` further steps (or time units) during
//! which the left operand must hold. States violating it are absorbing with
//! value zero during the second phase.

use log::debug;

use crate::bitset::StateSet;
use crate::config::Config;
use crate::error::Result;
use crate::model::Model;
use crate::poisson::PoissonWeights;
use crate::precompute;
use crate::scheduler::Resolver;
use crate::solver::{allocate, bellman, check_steps, jacobi_step, UpdateRule};
use crate::types::{Direction, State};

/// Factor applied to the largest exit rate to obtain the uniformization rate.
const UNIFORMIZATION_FACTOR: f64 = 1.02;

/// Result of a transient computation.
#[derive(Debug, Clone)]
pub struct Transient {
    pub values: Vec<f64>,
    /// Number of uniformized steps performed.
    pub steps: usize,
    /// Poisson mass discarded by truncation.
    pub truncation_error: f64,
}

fn indicator(set: &StateSet, config: &Config) -> Result<Vec<f64>> {
    let mut values = allocate(set.universe(), 0.0, config)?;
    for s in set {
        values[s] = 1.0;
    }
    Ok(values)
}

/// One-step probability `P[X φ]`.
pub fn next(model: &Model, target: &StateSet, direction: Direction, config: &Config) -> Result<Vec<f64>> {
    let resolver = Resolver::new(direction, config.tie_break);
    let values = indicator(target, config)?;
    let mut result = allocate(model.num_states(), 0.0, config)?;
    for s in 0..model.num_states() {
        result[s] = bellman(model, s, &values, UpdateRule::Reachability, &resolver)?.1;
    }
    Ok(result)
}

/// `P[left U<=k right]` for discrete-time models.
pub fn until_steps(
    model: &Model,
    left: &StateSet,
    right: &StateSet,
    steps: usize,
    direction: Direction,
    config: &Config,
) -> Result<Vec<f64>> {
    check_steps(steps, config)?;
    let mut values = indicator(right, config)?;
    if steps == 0 {
        return Ok(values);
    }
    let remain = left.union(right);
    let never = precompute::prob0a(model, &remain, right);
    let states: Vec<State> = left.difference(right).difference(&never).iter().collect();
    debug!("Bounded until: {} steps over {} states", steps, states.len());

    let resolver = Resolver::new(direction, config.tie_break);
    let mut scratch = allocate(values.len(), 0.0, config)?;
    for _ in 0..steps {
        jacobi_step(model, &states, &values, &mut scratch, UpdateRule::Reachability, &resolver)?;
        std::mem::swap(&mut values, &mut scratch);
    }
    Ok(values)
}

/// Propagates `values` backwards over `steps` steps during which `left` must hold.
///
/// This is the second phase of `U[a,b]` with `steps = a`.
pub fn hold_steps(
    model: &Model,
    left: &StateSet,
    mut values: Vec<f64>,
    steps: usize,
    direction: Direction,
    config: &Config,
) -> Result<Vec<f64>> {
    check_steps(steps, config)?;
    if steps == 0 {
        return Ok(values);
    }
    let states: Vec<State> = left.iter().collect();
    let violating = left.complement();
    let resolver = Resolver::new(direction, config.tie_break);
    let mut scratch = allocate(values.len(), 0.0, config)?;
    for _ in 0..steps {
        jacobi_step(model, &states, &values, &mut scratch, UpdateRule::Reachability, &resolver)?;
        for s in &violating {
            scratch[s] = 0.0;
        }
        std::mem::swap(&mut values, &mut scratch);
    }
    Ok(values)
}

/// Uniformization rate of a CTMC.
pub fn uniformization_rate(model: &Model) -> f64 {
    model.max_exit_rate() * UNIFORMIZATION_FACTOR
}

/// `dst = P src` for the uniformized chain, keeping `absorbing` states fixed.
pub(crate) fn uniformized_step(model: &Model, absorbing: &StateSet, rate: f64, src: &[f64], dst: &mut [f64]) {
    for s in 0..model.num_states() {
        if absorbing.contains(s) {
            dst[s] = src[s];
            continue;
        }
        let leave = model.exit_rate(s) / rate;
        let moved = model.successors(s, 0).expectation(src);
        dst[s] = leave * moved + (1.0 - leave) * src[s];
    }
}

/// Computes `sum_i ψ(i) P^i v` for the uniformized chain up to `time`.
pub(crate) fn transient(
    model: &Model,
    absorbing: &StateSet,
    init: Vec<f64>,
    time: f64,
    config: &Config,
) -> Result<Transient> {
    if time == 0.0 {
        return Ok(Transient {
            values: init,
            steps: 0,
            truncation_error: 0.0,
        });
    }
    let rate = uniformization_rate(model);
    let poisson = PoissonWeights::new(rate * time, config.tolerance);
    let n = model.num_states();
    let mut current = init;
    let mut scratch = allocate(n, 0.0, config)?;
    let mut result = allocate(n, 0.0, config)?;

    for i in 0..=poisson.right() {
        if i > 0 {
            uniformized_step(model, absorbing, rate, &current, &mut scratch);
            std::mem::swap(&mut current, &mut scratch);
        }
        let weight = poisson.weight(i);
        if weight > 0.0 {
            for (r, &x) in result.iter_mut().zip(&current) {
                *r += weight * x;
            }
        }
    }
    debug!(
        "Uniformization: rate {}, {} steps, truncation error {:e}",
        rate,
        poisson.right(),
        poisson.truncation_error()
    );
    Ok(Transient {
        values: result,
        steps: poisson.right(),
        truncation_error: poisson.truncation_error(),
    })
}

/// `P[left U<=t right]` for CTMCs.
pub fn until_time(model: &Model, left: &StateSet, right: &StateSet, time: f64, config: &Config) -> Result<Transient> {
    let init = indicator(right, config)?;
    if time == 0.0 {
        return Ok(Transient {
            values: init,
            steps: 0,
            truncation_error: 0.0,
        });
    }
    let remain = left.union(right);
    let never = precompute::prob0a(model, &remain, right);
    let absorbing = right.union(&left.complement()).union(&never);
    let mut result = transient(model, &absorbing, init, time, config)?;
    for s in right {
        result.values[s] = 1.0;
    }
    Ok(result)
}

/// Continuous-time counterpart of [`hold_steps`]: `left` must hold for `time` units.
pub fn hold_time(model: &Model, left: &StateSet, mut values: Vec<f64>, time: f64, config: &Config) -> Result<Transient> {
    if time == 0.0 {
        return Ok(Transient {
            values,
            steps: 0,
            truncation_error: 0.0,
        });
    }
    let absorbing = left.complement();
    for s in &absorbing {
        values[s] = 0.0;
    }
    transient(model, &absorbing, values, time, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::error::Error;
    use crate::model::ModelBuilder;
    use crate::types::Semantics;

    fn line() -> Model {
        let mut builder = ModelBuilder::new(Semantics::Dtmc, 3);
        builder.add_choice(0, [(1, 1.0)]);
        builder.add_choice(1, [(2, 1.0)]);
        builder.add_choice(2, [(2, 1.0)]);
        builder.set_initial([0]);
        builder.build().unwrap()
    }

    fn two_state(lambda: f64, mu: f64) -> Model {
        let mut builder = ModelBuilder::new(Semantics::Ctmc, 2);
        builder.add_choice(0, [(1, lambda)]);
        builder.add_choice(1, [(0, mu)]);
        builder.set_initial([0]);
        builder.build().unwrap()
    }

    #[test]
    fn test_until_steps() {
        let model = line();
        let all = StateSet::full(3);
        let goal = StateSet::from_states(3, [2]);
        let config = Config::default();
        assert_eq!(until_steps(&model, &all, &goal, 0, Direction::Max, &config).unwrap(), vec![0.0, 0.0, 1.0]);
        assert_eq!(until_steps(&model, &all, &goal, 1, Direction::Max, &config).unwrap(), vec![0.0, 1.0, 1.0]);
        assert_eq!(until_steps(&model, &all, &goal, 5, Direction::Max, &config).unwrap(), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_step_bound_above_cap() {
        let model = line();
        let all = StateSet::full(3);
        let goal = StateSet::from_states(3, [2]);
        let config = Config::default().with_max_iterations(5);
        assert!(until_steps(&model, &all, &goal, 5, Direction::Max, &config).is_ok());
        assert!(matches!(
            until_steps(&model, &all, &goal, 6, Direction::Max, &config),
            Err(Error::InvalidQuery(_))
        ));
        assert!(matches!(
            hold_steps(&model, &all, vec![0.0; 3], usize::MAX, Direction::Max, &config),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_hold_steps_zeroes_violations() {
        let model = line();
        let left = StateSet::from_states(3, [0, 2]);
        let values = vec![0.0, 1.0, 1.0];
        let held = hold_steps(&model, &left, values.clone(), 1, Direction::Max, &Config::default()).unwrap();
        assert_eq!(held, vec![1.0, 0.0, 1.0]);
        let unchanged = hold_steps(&model, &left, values.clone(), 0, Direction::Max, &Config::default()).unwrap();
        assert_eq!(unchanged, values);
    }

    #[test]
    fn test_next() {
        let model = line();
        let target = StateSet::from_states(3, [1]);
        let values = next(&model, &target, Direction::Max, &Config::default()).unwrap();
        assert_eq!(values, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_until_time_closed_form() {
        let (lambda, mu, t) = (2.0, 3.0, 0.5);
        let model = two_state(lambda, mu);
        let all = StateSet::full(2);
        let goal = StateSet::from_states(2, [1]);
        let result = until_time(&model, &all, &goal, t, &Config::default()).unwrap();
        let expected = 1.0 - f64::exp(-lambda * t);
        assert!((result.values[0] - expected).abs() < 1e-8);
        assert_eq!(result.values[1], 1.0);
        assert!(result.truncation_error <= 1e-10);
    }

    #[test]
    fn test_transient_probability() {
        let (lambda, mu, t) = (2.0, 3.0, 0.5);
        let model = two_state(lambda, mu);
        let all = StateSet::full(2);
        let values = vec![0.0, 1.0];
        let result = hold_time(&model, &all, values, t, &Config::default()).unwrap();
        let expected = lambda / (lambda + mu) * (1.0 - f64::exp(-(lambda + mu) * t));
        assert!((result.values[0] - expected).abs() < 1e-8);
    }

    #[test]
    fn test_zero_time_is_indicator() {
        let model = two_state(1.0, 1.0);
        let goal = StateSet::from_states(2, [1]);
        let result = until_time(&model, &StateSet::full(2), &goal, 0.0, &Config::default()).unwrap();
        assert_eq!(result.values, vec![0.0, 1.0]);
        assert_eq!(result.truncation_error, 0.0);
    }
}
