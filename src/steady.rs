//! Steady-state analysis of Markov chains.
//!
//! The long-run average of a state function `f` is computed in three steps:
//!
//! 1. decompose the chain into bottom SCCs ([`crate::components::bsccs`]);
//! 2. solve the stationary distribution `π` of every BSCC `B` and set
//!    `v_B = sum_{s in B} π(s) f(s)` for all of its states;
//! 3. for the remaining (transient) states, weight the `v_B` by the
//!    probability of being absorbed in `B`, which is a reachability fixpoint
//!    with the BSCC values held constant.
//!
//! The stationary distribution solves `π = π P` (or `π Q = 0` for CTMCs)
//! restricted to the BSCC. Each Gauss-Seidel sweep updates
//!
//! ```text
//! π(j) = sum_{i != j} π(i) w(i, j) / sum_{k != j} w(j, k)
//! ```
//!
//! with `w` the transition probability (DTMC) or rate (CTMC), then normalises.
//! Gauss-Seidel is used regardless of the configured method, since Jacobi
//! sweeps oscillate on periodic components.

use log::{debug, warn};

use crate::bitset::StateSet;
use crate::components;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::Model;
use crate::solver::{self, allocate, UpdateRule};
use crate::types::{Direction, State};

/// Result of a long-run computation.
#[derive(Debug, Clone)]
pub struct LongRun {
    pub values: Vec<f64>,
    pub iterations: usize,
    pub residual: f64,
    pub converged: bool,
}

#[derive(Debug)]
struct Sweeps {
    iterations: usize,
    residual: f64,
    converged: bool,
}

/// Probability flow (DTMC) or rate (CTMC) of a transition leaving `source`.
#[inline]
fn flow(model: &Model, source: State, probability: f64) -> f64 {
    probability * model.exit_rate(source)
}

/// Solves the stationary distribution of `bscc` into `pi` (indexed by state).
fn stationary(model: &Model, bscc: &[State], members: &StateSet, pi: &mut [f64], config: &Config) -> Result<Sweeps> {
    if bscc.len() == 1 {
        pi[bscc[0]] = 1.0;
        return Ok(Sweeps {
            iterations: 0,
            residual: 0.0,
            converged: true,
        });
    }
    let preds = model.predecessors();
    let mut outflow = allocate(bscc.len(), 0.0, config)?;
    for (out, &j) in outflow.iter_mut().zip(bscc) {
        let stay = model.successors(j, 0).probability(j);
        *out = model.exit_rate(j) * (1.0 - stay);
    }
    let uniform = 1.0 / bscc.len() as f64;
    for &s in bscc {
        pi[s] = uniform;
    }
    let mut previous = allocate(bscc.len(), 0.0, config)?;
    let threshold = config.tolerance / 2.0;

    let mut iterations = 0;
    let mut residual = f64::INFINITY;
    let mut converged = false;
    while iterations < config.max_iterations {
        iterations += 1;
        for (k, &j) in bscc.iter().enumerate() {
            previous[k] = pi[j];
            let inflow: f64 = preds
                .transitions_into(j)
                .filter(|&(i, _)| i != j && members.contains(i))
                .map(|(i, tr)| pi[i] * flow(model, i, model.weight(tr)))
                .sum();
            pi[j] = inflow / outflow[k];
        }
        let total: f64 = bscc.iter().map(|&j| pi[j]).sum();
        if total <= 0.0 || !total.is_finite() {
            return Err(Error::NumericalDefect {
                state: bscc[0],
                value: total,
            });
        }
        residual = 0.0;
        for (k, &j) in bscc.iter().enumerate() {
            pi[j] /= total;
            residual = residual.max((pi[j] - previous[k]).abs());
        }
        if residual <= threshold {
            converged = true;
            break;
        }
    }
    if !converged {
        warn!(
            "Stationary distribution of a {}-state BSCC did not converge in {} iterations (residual {:e})",
            bscc.len(),
            iterations,
            residual
        );
    }
    Ok(Sweeps {
        iterations,
        residual,
        converged,
    })
}

/// Long-run average of the state function `f` from every state.
pub fn long_run(model: &Model, f: &[f64], config: &Config) -> Result<LongRun> {
    if model.semantics().is_nondeterministic() {
        return Err(Error::Unsupported(format!(
            "long-run analysis of an {}",
            model.semantics()
        )));
    }
    let n = model.num_states();
    let bsccs = components::bsccs(model);
    let mut values = allocate(n, 0.0, config)?;
    let mut pi = allocate(n, 0.0, config)?;
    let mut recurrent = StateSet::empty(n);
    let mut iterations = 0;
    let mut residual = 0.0f64;
    let mut converged = true;

    for bscc in &bsccs {
        let members = StateSet::from_states(n, bscc.iter().copied());
        let sweeps = stationary(model, bscc, &members, &mut pi, config)?;
        iterations += sweeps.iterations;
        residual = residual.max(sweeps.residual);
        converged &= sweeps.converged;
        let average: f64 = bscc.iter().map(|&s| pi[s] * f[s]).sum();
        for &s in bscc {
            values[s] = average;
        }
        recurrent.union_with(&members);
    }
    debug!(
        "Steady state: {} BSCCs covering {} of {} states",
        bsccs.len(),
        recurrent.len(),
        n
    );

    let transient = recurrent.complement();
    let absorption = solver::solve(model, &transient, values, UpdateRule::Reachability, Direction::Max, config)?;
    Ok(LongRun {
        values: absorption.values,
        iterations: iterations + absorption.iterations,
        residual: residual.max(absorption.residual),
        converged: converged && absorption.converged,
    })
}

/// Long-run probability of being in `target`.
pub fn probability(model: &Model, target: &StateSet, config: &Config) -> Result<LongRun> {
    let mut f = allocate(model.num_states(), 0.0, config)?;
    for s in target {
        f[s] = 1.0;
    }
    long_run(model, &f, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::model::ModelBuilder;
    use crate::types::Semantics;

    #[test]
    fn test_periodic_bscc_and_transient_state() {
        let mut builder = ModelBuilder::new(Semantics::Dtmc, 4);
        builder.add_choice(0, [(1, 1.0)]);
        builder.add_choice(1, [(0, 1.0)]);
        builder.add_choice(2, [(0, 0.5), (3, 0.5)]);
        builder.add_choice(3, [(3, 1.0)]);
        builder.set_initial([2]);
        let model = builder.build().unwrap();

        let target = StateSet::from_states(4, [0]);
        let result = probability(&model, &target, &Config::default()).unwrap();
        assert!(result.converged);
        assert!((result.values[0] - 0.5).abs() < 1e-9);
        assert!((result.values[2] - 0.25).abs() < 1e-9);
        assert_eq!(result.values[3], 0.0);
    }

    #[test]
    fn test_stationary_distribution() {
        let mut builder = ModelBuilder::new(Semantics::Dtmc, 3);
        builder.add_choice(0, [(1, 1.0)]);
        builder.add_choice(1, [(0, 0.5), (2, 0.5)]);
        builder.add_choice(2, [(0, 1.0)]);
        builder.set_initial([0]);
        let model = builder.build().unwrap();

        let target = StateSet::from_states(3, [2]);
        let result = probability(&model, &target, &Config::default()).unwrap();
        for s in 0..3 {
            assert!((result.values[s] - 0.2).abs() < 1e-9);
        }
    }

    #[test]
    fn test_ctmc_two_state() {
        let (lambda, mu) = (2.0, 3.0);
        let mut builder = ModelBuilder::new(Semantics::Ctmc, 2);
        builder.add_choice(0, [(1, lambda)]);
        builder.add_choice(1, [(0, mu), (1, 7.0)]);
        builder.set_initial([0]);
        let model = builder.build().unwrap();

        let target = StateSet::from_states(2, [1]);
        let result = probability(&model, &target, &Config::default()).unwrap();
        assert!((result.values[0] - lambda / (lambda + mu)).abs() < 1e-9);
    }

    #[test]
    fn test_memory_limit() {
        let mut builder = ModelBuilder::new(Semantics::Dtmc, 4);
        for s in 0..4 {
            builder.add_choice(s, [((s + 1) % 4, 1.0)]);
        }
        builder.set_initial([0]);
        let model = builder.build().unwrap();
        let config = Config::default().with_memory_limit(16);
        assert!(matches!(
            probability(&model, &StateSet::full(4), &config),
            Err(Error::ResourceExhausted { requested: 32 })
        ));
    }

    #[test]
    fn test_mdp_is_unsupported() {
        let mut builder = ModelBuilder::new(Semantics::Mdp, 1);
        builder.add_choice(0, [(0, 1.0)]);
        builder.set_initial([0]);
        let model = builder.build().unwrap();
        let result = probability(&model, &StateSet::full(1), &Config::default());
        assert!(matches!(result, Err(Error::Unsupported(_))));
    }
}
