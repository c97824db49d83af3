//! Query evaluation.
//!
//! [`ModelChecker`] walks a formula bottom-up: Boolean subformulas become
//! [`StateSet`]s, probabilistic and reward operators are dispatched to the
//! precomputation, value iteration, transient and long-run engines, and the
//! result is finally reduced by a filter or restriction.
//!
//! The one-shot entry point is [`evaluate`].
//!
//! # Examples
//!
//! ```
//! use pmc_rs::checker::evaluate;
//! use pmc_rs::config::Config;
//! use pmc_rs::model::ModelBuilder;
//! use pmc_rs::query::{PathFormula, Query, StateFormula};
//! use pmc_rs::types::Semantics;
//!
//! // A fair coin flipped until heads.
//! let mut builder = ModelBuilder::new(Semantics::Dtmc, 2);
//! builder.add_choice(0, [(0, 0.5), (1, 0.5)]);
//! builder.add_choice(1, [(1, 1.0)]);
//! builder.add_label("heads", [1]);
//! builder.set_initial([0]);
//! let model = builder.build()?;
//!
//! let query = Query::new(StateFormula::prob(None, PathFormula::finally(StateFormula::label("heads"))));
//! let result = evaluate(&model, &query, &Config::default())?;
//! assert!((result.verdict.as_real().unwrap() - 1.0).abs() < 1e-9);
//! # Ok::<(), pmc_rs::error::Error>(())
//! ```

use log::debug;

use crate::bitset::StateSet;
use crate::bounded::{self, Transient};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::filter::{self, FilterKind};
use crate::model::{Model, RewardStructure};
use crate::precompute;
use crate::query::{Aggregate, Bound, PathFormula, Query, RewardKind, StateFormula, TimeBound};
use crate::reward;
use crate::scheduler::Scheduler;
use crate::solver::{self, allocate, Solution, UpdateRule};
use crate::steady::{self, LongRun};
use crate::types::Direction;
use crate::values::{StateValues, Verdict};

/// Convergence bookkeeping accumulated over all numerical phases of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    /// Total iterations, sweeps and unrolled steps.
    pub iterations: usize,
    /// Largest final residual of any iterative solve.
    pub residual: f64,
    /// Sum of the Poisson truncation errors of all transient phases.
    pub truncation_error: f64,
    pub converged: bool,
}

impl Default for Statistics {
    fn default() -> Self {
        Self {
            iterations: 0,
            residual: 0.0,
            truncation_error: 0.0,
            converged: true,
        }
    }
}

/// Outcome of [`evaluate`].
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub verdict: Verdict,
    pub statistics: Statistics,
    /// Witness of the last unbounded MDP solve, if requested in the [`Config`].
    pub scheduler: Option<Scheduler>,
}

/// Evaluates `query` on `model`.
///
/// If any iterative phase hits the iteration cap, the result is returned
/// inside [`Error::NotConverged`] instead.
pub fn evaluate(model: &Model, query: &Query, config: &Config) -> Result<Evaluation> {
    debug!("Evaluating {} on a {} with {} states", query, model.semantics(), model.num_states());
    let mut checker = ModelChecker::new(model, config);
    let verdict = checker.verdict(query)?;
    let evaluation = checker.finish(verdict);
    if evaluation.statistics.converged {
        Ok(evaluation)
    } else {
        Err(Error::NotConverged {
            iterations: evaluation.statistics.iterations,
            residual: evaluation.statistics.residual,
            approximation: Box::new(evaluation),
        })
    }
}

/// Recursive evaluator of state formulas over a fixed model.
pub struct ModelChecker<'a> {
    model: &'a Model,
    config: &'a Config,
    statistics: Statistics,
    scheduler: Option<Scheduler>,
}

impl<'a> ModelChecker<'a> {
    pub fn new(model: &'a Model, config: &'a Config) -> Self {
        Self {
            model,
            config,
            statistics: Statistics::default(),
            scheduler: None,
        }
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// Consumes the checker, packaging `verdict` with the collected statistics.
    pub fn finish(self, verdict: Verdict) -> Evaluation {
        Evaluation {
            verdict,
            statistics: self.statistics,
            scheduler: self.scheduler,
        }
    }

    /// Reduces the top-level formula of `query` to a verdict.
    pub fn verdict(&mut self, query: &Query) -> Result<Verdict> {
        let model = self.model;
        if let Some(restriction) = &query.restriction {
            let values = self.check(&query.formula)?;
            let states = self.check_bool(&restriction.states)?;
            if states.is_empty() {
                return Err(Error::InvalidQuery(format!(
                    "restriction {} matches no state",
                    restriction.states
                )));
            }
            let kind = match restriction.aggregate {
                Aggregate::Min => FilterKind::Min,
                Aggregate::Max => FilterKind::Max,
            };
            return filter::apply(kind, &values, &states);
        }
        match &query.formula {
            StateFormula::Filter { kind, formula, states } => {
                let values = self.check(formula)?;
                let states = self.check_bool(states)?;
                filter::apply(*kind, &values, &states)
            }
            formula => {
                let values = self.check(formula)?;
                Ok(filter::per_state(&values, model.initial_states()))
            }
        }
    }

    /// Evaluates a Boolean formula.
    pub fn check_bool(&mut self, formula: &StateFormula) -> Result<StateSet> {
        self.check(formula)?.into_bool()
    }

    /// Evaluates `formula` in every state.
    pub fn check(&mut self, formula: &StateFormula) -> Result<StateValues> {
        let model = self.model;
        let n = model.num_states();
        match formula {
            StateFormula::True => Ok(StateValues::Bool(StateSet::full(n))),
            StateFormula::False => Ok(StateValues::Bool(StateSet::empty(n))),
            StateFormula::Label(name) => Ok(StateValues::Bool(model.labelled(name)?.clone())),
            StateFormula::Not(inner) => Ok(StateValues::Bool(self.check_bool(inner)?.complement())),
            StateFormula::And(lhs, rhs) => {
                let mut set = self.check_bool(lhs)?;
                set.intersect_with(&self.check_bool(rhs)?);
                Ok(StateValues::Bool(set))
            }
            StateFormula::Or(lhs, rhs) => {
                let mut set = self.check_bool(lhs)?;
                set.union_with(&self.check_bool(rhs)?);
                Ok(StateValues::Bool(set))
            }
            StateFormula::Implies(lhs, rhs) => {
                let mut set = self.check_bool(lhs)?.complement();
                set.union_with(&self.check_bool(rhs)?);
                Ok(StateValues::Bool(set))
            }
            StateFormula::Probability { direction, bound, path } => {
                let direction = self.resolve_direction(*direction, bound)?;
                debug!("Checking P{} [ {} ]", direction, path);
                let values = self.path(path, direction)?;
                Ok(apply_bound(values, bound))
            }
            StateFormula::Reward {
                structure,
                direction,
                bound,
                kind,
            } => {
                let rewards = model.reward_structure(structure)?;
                let direction = self.resolve_direction(*direction, bound)?;
                debug!("Checking R{{\"{}\"}}{} [ {} ]", structure, direction, kind);
                let values = self.reward(rewards, kind, direction)?;
                Ok(apply_bound(values, bound))
            }
            StateFormula::SteadyState { bound, formula, .. } => {
                if model.semantics().is_nondeterministic() {
                    return Err(Error::Unsupported(format!(
                        "steady-state probabilities of an {}",
                        model.semantics()
                    )));
                }
                let target = self.check_bool(formula)?;
                let result = steady::probability(model, &target, self.config)?;
                Ok(apply_bound(self.record_long_run(result), bound))
            }
            StateFormula::Filter { kind, formula, states } => {
                let values = self.check(formula)?;
                let states = self.check_bool(states)?;
                filter::broadcast(filter::apply(*kind, &values, &states)?, n)
            }
        }
    }

    /// Direction used for an operator, validating it against the model kind.
    ///
    /// Markov chains ignore it. On an MDP a numeric query needs an explicit
    /// `min` or `max`, while a comparison defaults to the direction that decides it.
    fn resolve_direction(&self, direction: Option<Direction>, bound: &Bound) -> Result<Direction> {
        if !self.model.semantics().is_nondeterministic() {
            return Ok(direction.unwrap_or(Direction::Max));
        }
        match (direction, bound) {
            (Some(direction), _) => Ok(direction),
            (None, Bound::Compare(op, _)) => Ok(op.direction()),
            (None, Bound::Query) => Err(Error::InvalidQuery(
                "numeric queries on an MDP must specify min or max".to_string(),
            )),
        }
    }

    fn path(&mut self, path: &PathFormula, direction: Direction) -> Result<Vec<f64>> {
        let n = self.model.num_states();
        match path {
            PathFormula::Next(formula) => {
                let target = self.check_bool(formula)?;
                bounded::next(self.model, &target, direction, self.config)
            }
            PathFormula::Until { left, right, bound } => {
                let left = self.check_bool(left)?;
                let right = self.check_bool(right)?;
                self.until(&left, &right, bound, direction)
            }
            PathFormula::Finally { formula, bound } => {
                let target = self.check_bool(formula)?;
                self.until(&StateSet::full(n), &target, bound, direction)
            }
            PathFormula::Globally { formula, bound } => {
                let violating = self.check_bool(formula)?.complement();
                let reach = self.until(&StateSet::full(n), &violating, bound, direction.flip())?;
                Ok(reach.into_iter().map(|p| (1.0 - p).max(0.0)).collect())
            }
        }
    }

    fn until(&mut self, left: &StateSet, right: &StateSet, bound: &TimeBound, direction: Direction) -> Result<Vec<f64>> {
        for t in [bound.lower, bound.upper].into_iter().flatten() {
            if t.is_nan() || t < 0.0 {
                return Err(Error::InvalidQuery(format!("invalid time bound {}", t)));
            }
        }
        let lower = bound.lower.filter(|&a| a > 0.0);
        let upper = bound.upper.filter(|b| b.is_finite());
        match (lower, upper) {
            (None, None) => self.until_unbounded(left, right, direction),
            (None, Some(b)) => self.until_upto(left, right, b, direction),
            (Some(a), upper) => {
                let reach = match upper {
                    Some(b) if a > b => {
                        return Err(Error::InvalidQuery(format!(
                            "lower time bound {} exceeds upper bound {}",
                            a, b
                        )));
                    }
                    Some(b) => self.until_upto(left, right, b - a, direction)?,
                    None => self.until_unbounded(left, right, direction)?,
                };
                self.hold(left, reach, a, direction)
            }
        }
    }

    fn until_unbounded(&mut self, left: &StateSet, right: &StateSet, direction: Direction) -> Result<Vec<f64>> {
        let model = self.model;
        let forbidden = left.union(right).complement();
        let partition = precompute::partition(model, &forbidden, right, direction);
        let mut values = allocate(model.num_states(), 0.0, self.config)?;
        for s in &partition.one {
            values[s] = 1.0;
        }
        let mut solution = solver::solve(
            model,
            &partition.maybe,
            values,
            UpdateRule::Reachability,
            direction,
            self.config,
        )?;
        // Values alone cannot separate progress from stalling inside the decided regions.
        if let Some(scheduler) = solution.scheduler.as_mut() {
            let decided = match direction {
                Direction::Max => precompute::progress_choices(model, &partition.one, right),
                Direction::Min => precompute::confining_choices(model, &partition.zero),
            };
            for (s, c) in decided {
                scheduler.set(s, c);
            }
        }
        Ok(self.record_solution(solution))
    }

    fn until_upto(&mut self, left: &StateSet, right: &StateSet, bound: f64, direction: Direction) -> Result<Vec<f64>> {
        if self.model.semantics().is_continuous() {
            let result = bounded::until_time(self.model, left, right, bound, self.config)?;
            Ok(self.record_transient(result))
        } else {
            let steps = discrete(bound)?;
            let values = bounded::until_steps(self.model, left, right, steps, direction, self.config)?;
            self.statistics.iterations += steps;
            Ok(values)
        }
    }

    fn hold(&mut self, left: &StateSet, values: Vec<f64>, bound: f64, direction: Direction) -> Result<Vec<f64>> {
        if self.model.semantics().is_continuous() {
            let result = bounded::hold_time(self.model, left, values, bound, self.config)?;
            Ok(self.record_transient(result))
        } else {
            let steps = discrete(bound)?;
            let values = bounded::hold_steps(self.model, left, values, steps, direction, self.config)?;
            self.statistics.iterations += steps;
            Ok(values)
        }
    }

    fn reward(&mut self, rewards: &RewardStructure, kind: &RewardKind, direction: Direction) -> Result<Vec<f64>> {
        let model = self.model;
        let continuous = model.semantics().is_continuous();
        match kind {
            RewardKind::Reachability(formula) => {
                let target = self.check_bool(formula)?;
                let solution = reward::reachability(model, rewards, &target, direction, self.config)?;
                Ok(self.record_solution(solution))
            }
            RewardKind::Cumulative(None) => {
                let solution = reward::total(model, rewards, direction, self.config)?;
                Ok(self.record_solution(solution))
            }
            RewardKind::Cumulative(Some(t)) if continuous => {
                let result = reward::cumulative_time(model, rewards, time(*t)?, self.config)?;
                Ok(self.record_transient(result))
            }
            RewardKind::Cumulative(Some(k)) => {
                let steps = discrete(*k)?;
                let values = reward::cumulative_steps(model, rewards, steps, direction, self.config)?;
                self.statistics.iterations += steps;
                Ok(values)
            }
            RewardKind::Discounted { .. } if continuous => Err(Error::Unsupported(
                "discounted reward of a CTMC".to_string(),
            )),
            RewardKind::Discounted { factor, .. } if factor.is_nan() || *factor < 0.0 => Err(Error::InvalidQuery(
                format!("discount factor {} must be non-negative", factor),
            )),
            RewardKind::Discounted { bound: None, factor } => {
                if *factor >= 1.0 {
                    return Err(Error::InvalidQuery(format!(
                        "discount factor {} of an unbounded horizon must be below 1",
                        factor
                    )));
                }
                let solution = reward::discounted(model, rewards, *factor, direction, self.config)?;
                Ok(self.record_solution(solution))
            }
            RewardKind::Discounted {
                bound: Some(k),
                factor,
            } => {
                let steps = discrete(*k)?;
                let values = reward::discounted_steps(model, rewards, steps, *factor, direction, self.config)?;
                self.statistics.iterations += steps;
                Ok(values)
            }
            RewardKind::Instantaneous(t) if continuous => {
                let result = reward::instantaneous_time(model, rewards, time(*t)?, self.config)?;
                Ok(self.record_transient(result))
            }
            RewardKind::Instantaneous(k) => {
                let steps = discrete(*k)?;
                let values = reward::instantaneous_steps(model, rewards, steps, direction, self.config)?;
                self.statistics.iterations += steps;
                Ok(values)
            }
            RewardKind::LongRun => {
                if model.semantics().is_nondeterministic() {
                    return Err(Error::Unsupported(format!("long-run reward of an {}", model.semantics())));
                }
                let rates = reward::rate_rewards(model, rewards, self.config)?;
                let result = steady::long_run(model, &rates, self.config)?;
                Ok(self.record_long_run(result))
            }
        }
    }

    fn record_solution(&mut self, solution: Solution) -> Vec<f64> {
        self.statistics.iterations += solution.iterations;
        self.statistics.residual = self.statistics.residual.max(solution.residual);
        self.statistics.converged &= solution.converged;
        if solution.scheduler.is_some() {
            self.scheduler = solution.scheduler;
        }
        solution.values
    }

    fn record_transient(&mut self, transient: Transient) -> Vec<f64> {
        self.statistics.iterations += transient.steps;
        self.statistics.truncation_error += transient.truncation_error;
        transient.values
    }

    fn record_long_run(&mut self, result: LongRun) -> Vec<f64> {
        self.statistics.iterations += result.iterations;
        self.statistics.residual = self.statistics.residual.max(result.residual);
        self.statistics.converged &= result.converged;
        result.values
    }
}

fn apply_bound(values: Vec<f64>, bound: &Bound) -> StateValues {
    match *bound {
        Bound::Query => StateValues::Real(values),
        Bound::Compare(op, threshold) => StateValues::Bool(StateSet::from_predicate(values.len(), |s| {
            op.holds(values[s], threshold)
        })),
    }
}

/// Step count of a discrete-time bound.
fn discrete(bound: f64) -> Result<usize> {
    if bound.is_finite() && bound >= 0.0 && bound.fract() == 0.0 {
        Ok(bound as usize)
    } else {
        Err(Error::InvalidQuery(format!(
            "step bound {} of a discrete-time model must be a non-negative integer",
            bound
        )))
    }
}

fn time(bound: f64) -> Result<f64> {
    if bound.is_finite() && bound >= 0.0 {
        Ok(bound)
    } else {
        Err(Error::InvalidQuery(format!("invalid time bound {}", bound)))
    }
}
