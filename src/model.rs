//! Explicit model graph.
//!
//! A [`Model`] stores states, choices and transitions in three flat arrays in
//! compressed sparse row layout:
//!
//! - `state_bounds[s]..state_bounds[s + 1]` are the (global) choice indices of state `s`,
//! - `choice_bounds[c]..choice_bounds[c + 1]` are the (global) transition indices of choice `c`,
//! - `targets[t]` and `weights[t]` describe transition `t`.
//!
//! Markov chains have exactly one choice per state. For CTMCs the stored
//! weights are the probabilities of the embedded DTMC and the exit rate of
//! every state is kept separately, so the rate of a transition is
//! `weight * exit_rate`.
//!
//! The graph is immutable once built. The reverse adjacency needed by the
//! backward fixpoint algorithms is computed on first use and cached; the cache
//! is a [`OnceLock`], so a model can be shared between threads.
//!
//! # Examples
//!
//! ```
//! use pmc_rs::model::ModelBuilder;
//! use pmc_rs::types::Semantics;
//!
//! let mut builder = ModelBuilder::new(Semantics::Dtmc, 2);
//! builder.add_choice(0, [(0, 0.5), (1, 0.5)]);
//! builder.add_choice(1, [(1, 1.0)]);
//! builder.add_label("goal", [1]);
//! builder.set_initial([0]);
//! let model = builder.build().unwrap();
//!
//! assert_eq!(model.num_states(), 2);
//! assert_eq!(model.successors(0, 0).probability(1), 0.5);
//! assert!(model.label(1, "goal").unwrap());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Range;
use std::sync::OnceLock;

use log::debug;

use crate::bitset::StateSet;
use crate::error::{Error, Result};
use crate::types::{Semantics, State};

/// Allowed deviation of a probability distribution's total mass from 1.
pub const DISTRIBUTION_TOLERANCE: f64 = 1e-6;

/// Name of the label that falls back to the initial states when not defined explicitly.
pub const INIT_LABEL: &str = "init";

/// A view of one outgoing distribution.
#[derive(Debug, Copy, Clone)]
pub struct Distribution<'a> {
    offset: usize,
    targets: &'a [State],
    weights: &'a [f64],
}

impl<'a> Distribution<'a> {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Iterates over `(successor, probability)` pairs in ascending successor order.
    pub fn iter(&self) -> impl Iterator<Item = (State, f64)> + 'a {
        let (targets, weights) = (self.targets, self.weights);
        targets.iter().copied().zip(weights.iter().copied())
    }

    /// Iterates over `(transition index, successor, probability)` triples.
    pub fn transitions(&self) -> impl Iterator<Item = (usize, State, f64)> + 'a {
        let offset = self.offset;
        self.iter().enumerate().map(move |(i, (t, p))| (offset + i, t, p))
    }

    /// Probability of moving to `target`, zero if it is not a successor.
    pub fn probability(&self, target: State) -> f64 {
        match self.targets.binary_search(&target) {
            Ok(i) => self.weights[i],
            Err(_) => 0.0,
        }
    }

    /// Returns true if every successor lies in `set`.
    pub fn all_in(&self, set: &StateSet) -> bool {
        self.targets.iter().all(|&t| set.contains(t))
    }

    /// Returns true if some successor lies in `set`.
    pub fn any_in(&self, set: &StateSet) -> bool {
        self.targets.iter().any(|&t| set.contains(t))
    }

    /// Expected value of `values` after one step.
    #[inline]
    pub fn expectation(&self, values: &[f64]) -> f64 {
        self.iter().map(|(t, p)| p * values[t]).sum()
    }
}

/// A named reward structure with state, choice and transition rewards.
///
/// All three tables are dense and default to zero.
#[derive(Debug, Clone)]
pub struct RewardStructure {
    state: Vec<f64>,
    choice: Vec<f64>,
    transition: Vec<f64>,
}

impl RewardStructure {
    fn zeros(num_states: usize, num_choices: usize, num_transitions: usize) -> Self {
        Self {
            state: vec![0.0; num_states],
            choice: vec![0.0; num_choices],
            transition: vec![0.0; num_transitions],
        }
    }

    pub fn state(&self, state: State) -> f64 {
        self.state[state]
    }

    /// Reward attached to a global choice index.
    pub fn choice(&self, choice: usize) -> f64 {
        self.choice[choice]
    }

    /// Reward attached to a global transition index.
    pub fn transition(&self, transition: usize) -> f64 {
        self.transition[transition]
    }

    pub fn state_rewards(&self) -> &[f64] {
        &self.state
    }
}

/// Reverse adjacency: for every state, the `(source, choice)` pairs leading into it.
#[derive(Debug)]
pub struct Predecessors {
    bounds: Vec<usize>,
    sources: Vec<State>,
    choices: Vec<usize>,
    transitions: Vec<usize>,
}

impl Predecessors {
    /// Iterates over `(source state, global choice)` pairs with a transition into `state`.
    pub fn of(&self, state: State) -> impl Iterator<Item = (State, usize)> + '_ {
        let range = self.bounds[state]..self.bounds[state + 1];
        self.sources[range.clone()].iter().copied().zip(self.choices[range].iter().copied())
    }

    /// Like [`Predecessors::of`] but also yields the global transition index.
    pub fn transitions_into(&self, state: State) -> impl Iterator<Item = (State, usize)> + '_ {
        let range = self.bounds[state]..self.bounds[state + 1];
        self.sources[range.clone()].iter().copied().zip(self.transitions[range].iter().copied())
    }
}

/// Immutable explicit-state model.
pub struct Model {
    semantics: Semantics,
    num_states: usize,
    state_bounds: Vec<usize>,
    choice_bounds: Vec<usize>,
    targets: Vec<State>,
    weights: Vec<f64>,
    exit_rates: Vec<f64>,
    labels: HashMap<String, StateSet>,
    initial: StateSet,
    rewards: HashMap<String, RewardStructure>,
    predecessors: OnceLock<Predecessors>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("semantics", &self.semantics)
            .field("states", &self.num_states)
            .field("choices", &self.num_choices())
            .field("transitions", &self.num_transitions())
            .field("labels", &self.labels.keys().collect::<Vec<_>>())
            .field("rewards", &self.rewards.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Model {
    pub fn semantics(&self) -> Semantics {
        self.semantics
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    /// Total number of choices over all states.
    pub fn num_choices(&self) -> usize {
        self.choice_bounds.len() - 1
    }

    pub fn num_transitions(&self) -> usize {
        self.targets.len()
    }

    /// Number of choices of `state`.
    pub fn choices(&self, state: State) -> usize {
        self.state_bounds[state + 1] - self.state_bounds[state]
    }

    /// Global indices of the choices of `state`.
    #[inline]
    pub fn choice_range(&self, state: State) -> Range<usize> {
        self.state_bounds[state]..self.state_bounds[state + 1]
    }

    /// Distribution of the global choice `choice`.
    #[inline]
    pub fn distribution(&self, choice: usize) -> Distribution<'_> {
        let range = self.choice_bounds[choice]..self.choice_bounds[choice + 1];
        Distribution {
            offset: range.start,
            targets: &self.targets[range.clone()],
            weights: &self.weights[range],
        }
    }

    /// Distribution of the `choice`-th choice (local index) of `state`.
    pub fn successors(&self, state: State, choice: usize) -> Distribution<'_> {
        assert!(
            choice < self.choices(state),
            "State {} has no choice {}",
            state,
            choice
        );
        self.distribution(self.state_bounds[state] + choice)
    }

    /// Global indices of all transitions leaving `state`, over all of its choices.
    #[inline]
    pub fn transition_range(&self, state: State) -> Range<usize> {
        self.choice_bounds[self.state_bounds[state]]..self.choice_bounds[self.state_bounds[state + 1]]
    }

    /// Target state of the global transition `transition`.
    #[inline]
    pub fn target(&self, transition: usize) -> State {
        self.targets[transition]
    }

    /// Probability of the global transition `transition` (embedded probability for CTMCs).
    #[inline]
    pub fn weight(&self, transition: usize) -> f64 {
        self.weights[transition]
    }

    /// Iterates over the distributions of all choices of `state`.
    pub fn distributions(&self, state: State) -> impl Iterator<Item = Distribution<'_>> + '_ {
        self.choice_range(state).map(move |c| self.distribution(c))
    }

    /// Total outgoing rate of `state`. Always 1 for discrete-time models.
    #[inline]
    pub fn exit_rate(&self, state: State) -> f64 {
        if self.semantics.is_continuous() {
            self.exit_rates[state]
        } else {
            1.0
        }
    }

    /// Largest exit rate over all states.
    pub fn max_exit_rate(&self) -> f64 {
        self.exit_rates.iter().copied().fold(0.0, f64::max)
    }

    pub fn initial_states(&self) -> &StateSet {
        &self.initial
    }

    /// States carrying label `name`.
    ///
    /// The label `"init"` refers to the initial states unless the model defines it.
    pub fn labelled(&self, name: &str) -> Result<&StateSet> {
        match self.labels.get(name) {
            Some(set) => Ok(set),
            None if name == INIT_LABEL => Ok(&self.initial),
            None => Err(Error::UnknownLabel(name.to_string())),
        }
    }

    /// Returns true if `state` carries label `name`.
    pub fn label(&self, state: State, name: &str) -> Result<bool> {
        Ok(self.labelled(name)?.contains(state))
    }

    pub fn reward_structure(&self, name: &str) -> Result<&RewardStructure> {
        self.rewards
            .get(name)
            .ok_or_else(|| Error::UnknownReward(name.to_string()))
    }

    /// State reward of `state` in structure `name`.
    pub fn reward(&self, state: State, name: &str) -> Result<f64> {
        Ok(self.reward_structure(name)?.state(state))
    }

    /// Reverse adjacency, built on first use.
    pub fn predecessors(&self) -> &Predecessors {
        self.predecessors.get_or_init(|| {
            let n = self.num_states;
            let mut bounds = vec![0usize; n + 1];
            for &t in &self.targets {
                bounds[t + 1] += 1;
            }
            for i in 0..n {
                bounds[i + 1] += bounds[i];
            }
            let m = self.targets.len();
            let mut sources = vec![0; m];
            let mut choices = vec![0; m];
            let mut transitions = vec![0; m];
            let mut fill = bounds.clone();
            for s in 0..n {
                for c in self.choice_range(s) {
                    for (tr, t, _) in self.distribution(c).transitions() {
                        let pos = fill[t];
                        sources[pos] = s;
                        choices[pos] = c;
                        transitions[pos] = tr;
                        fill[t] += 1;
                    }
                }
            }
            debug!("Built reverse index with {} entries", m);
            Predecessors {
                bounds,
                sources,
                choices,
                transitions,
            }
        })
    }
}

#[derive(Debug, Default)]
struct PendingRewards {
    state: Vec<(State, f64)>,
    choice: Vec<(State, usize, f64)>,
    transition: Vec<(State, usize, State, f64)>,
}

/// Incremental constructor for [`Model`].
///
/// Source state indices are checked eagerly (out-of-range indices panic);
/// everything else is validated by [`ModelBuilder::build`].
#[derive(Debug)]
pub struct ModelBuilder {
    semantics: Semantics,
    num_states: usize,
    choices: Vec<Vec<Vec<(State, f64)>>>,
    labels: HashMap<String, StateSet>,
    initial: StateSet,
    rewards: BTreeMap<String, PendingRewards>,
}

impl ModelBuilder {
    pub fn new(semantics: Semantics, num_states: usize) -> Self {
        Self {
            semantics,
            num_states,
            choices: vec![Vec::new(); num_states],
            labels: HashMap::new(),
            initial: StateSet::empty(num_states),
            rewards: BTreeMap::new(),
        }
    }

    fn check_state(&self, state: State) {
        assert!(
            state < self.num_states,
            "State {} is out of range 0..{}",
            state,
            self.num_states
        );
    }

    /// Appends a choice to `state`. For CTMCs the weights are rates.
    pub fn add_choice(&mut self, state: State, transitions: impl IntoIterator<Item = (State, f64)>) -> &mut Self {
        self.check_state(state);
        self.choices[state].push(transitions.into_iter().collect());
        self
    }

    /// Adds `states` to label `name`, creating the label if needed.
    pub fn add_label(&mut self, name: &str, states: impl IntoIterator<Item = State>) -> &mut Self {
        let n = self.num_states;
        self.labels
            .entry(name.to_string())
            .or_insert_with(|| StateSet::empty(n))
            .extend(states);
        self
    }

    pub fn set_initial(&mut self, states: impl IntoIterator<Item = State>) -> &mut Self {
        self.initial.extend(states);
        self
    }

    /// Declares reward structure `name` (possibly without any non-zero entry).
    pub fn add_reward_structure(&mut self, name: &str) -> &mut Self {
        self.rewards.entry(name.to_string()).or_default();
        self
    }

    pub fn add_state_reward(&mut self, name: &str, state: State, value: f64) -> &mut Self {
        self.check_state(state);
        self.rewards.entry(name.to_string()).or_default().state.push((state, value));
        self
    }

    /// Reward earned when the `choice`-th choice of `state` is taken.
    pub fn add_choice_reward(&mut self, name: &str, state: State, choice: usize, value: f64) -> &mut Self {
        self.check_state(state);
        self.rewards
            .entry(name.to_string())
            .or_default()
            .choice
            .push((state, choice, value));
        self
    }

    /// Reward earned on the transition `state --choice--> target`.
    pub fn add_transition_reward(
        &mut self,
        name: &str,
        state: State,
        choice: usize,
        target: State,
        value: f64,
    ) -> &mut Self {
        self.check_state(state);
        self.rewards
            .entry(name.to_string())
            .or_default()
            .transition
            .push((state, choice, target, value));
        self
    }

    /// Validates and freezes the model.
    pub fn build(self) -> Result<Model> {
        let n = self.num_states;
        let semantics = self.semantics;

        if n == 0 {
            return Err(Error::MalformedModel("model has no states".to_string()));
        }
        if self.initial.is_empty() {
            return Err(Error::MalformedModel("model has no initial state".to_string()));
        }

        let mut state_bounds = Vec::with_capacity(n + 1);
        let mut choice_bounds = vec![0];
        let mut targets = Vec::new();
        let mut weights = Vec::new();
        let mut exit_rates = Vec::new();
        state_bounds.push(0);

        for (s, choices) in self.choices.into_iter().enumerate() {
            if choices.is_empty() {
                return Err(Error::MalformedModel(format!(
                    "state {} has no outgoing distribution",
                    s
                )));
            }
            if !semantics.is_nondeterministic() && choices.len() > 1 {
                return Err(Error::MalformedModel(format!(
                    "state {} of a {} has {} choices",
                    s,
                    semantics,
                    choices.len()
                )));
            }
            for (c, mut transitions) in choices.into_iter().enumerate() {
                transitions.sort_by_key(|&(t, _)| t);
                let mut merged: Vec<(State, f64)> = Vec::with_capacity(transitions.len());
                for (t, w) in transitions {
                    if t >= n {
                        return Err(Error::MalformedModel(format!(
                            "state {} choice {} leads to unknown state {}",
                            s, c, t
                        )));
                    }
                    if !w.is_finite() || w < 0.0 {
                        return Err(Error::MalformedModel(format!(
                            "state {} choice {} has invalid weight {} to state {}",
                            s, c, w, t
                        )));
                    }
                    match merged.last_mut() {
                        Some((last, acc)) if *last == t => *acc += w,
                        _ => merged.push((t, w)),
                    }
                }
                merged.retain(|&(_, w)| w > 0.0);
                let total: f64 = merged.iter().map(|&(_, w)| w).sum();
                if merged.is_empty() {
                    return Err(Error::MalformedModel(format!(
                        "state {} choice {} has an empty distribution",
                        s, c
                    )));
                }
                if semantics.is_continuous() {
                    exit_rates.push(total);
                    for (t, rate) in merged {
                        targets.push(t);
                        weights.push(rate / total);
                    }
                } else {
                    if (total - 1.0).abs() > DISTRIBUTION_TOLERANCE {
                        return Err(Error::MalformedModel(format!(
                            "state {} choice {} sums to {} instead of 1",
                            s, c, total
                        )));
                    }
                    for (t, p) in merged {
                        targets.push(t);
                        weights.push(p);
                    }
                }
                choice_bounds.push(targets.len());
            }
            state_bounds.push(choice_bounds.len() - 1);
        }

        let num_choices = choice_bounds.len() - 1;
        let mut rewards = HashMap::new();
        for (name, pending) in self.rewards {
            let mut structure = RewardStructure::zeros(n, num_choices, targets.len());
            let check = |value: f64| -> Result<()> {
                if !value.is_finite() || value < 0.0 {
                    return Err(Error::MalformedModel(format!(
                        "reward structure \"{}\" has invalid value {}",
                        name, value
                    )));
                }
                Ok(())
            };
            for (s, value) in pending.state {
                check(value)?;
                structure.state[s] += value;
            }
            for (s, c, value) in pending.choice {
                check(value)?;
                let global = local_choice(&state_bounds, s, c).ok_or_else(|| {
                    Error::MalformedModel(format!("reward on missing choice {} of state {}", c, s))
                })?;
                structure.choice[global] += value;
            }
            for (s, c, t, value) in pending.transition {
                check(value)?;
                let missing = || Error::MalformedModel(format!("reward on missing transition {} -[{}]-> {}", s, c, t));
                let global = local_choice(&state_bounds, s, c).ok_or_else(missing)?;
                let range = choice_bounds[global]..choice_bounds[global + 1];
                let pos = targets[range.clone()].binary_search(&t).map_err(|_| missing())?;
                structure.transition[range.start + pos] += value;
            }
            rewards.insert(name, structure);
        }

        debug!(
            "Built {} with {} states, {} choices, {} transitions",
            semantics,
            n,
            num_choices,
            targets.len()
        );

        Ok(Model {
            semantics,
            num_states: n,
            state_bounds,
            choice_bounds,
            targets,
            weights,
            exit_rates,
            labels: self.labels,
            initial: self.initial,
            rewards,
            predecessors: OnceLock::new(),
        })
    }
}

fn local_choice(state_bounds: &[usize], state: State, choice: usize) -> Option<usize> {
    let global = state_bounds[state] + choice;
    (global < state_bounds[state + 1]).then_some(global)
}
