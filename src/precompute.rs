//! Qualitative precomputation.
//!
//! Graph fixpoints that decide, without any arithmetic, which states reach a
//! target with probability exactly 0 or exactly 1. The four classic sets are:
//!
//! | Set     | Meaning                                   | Algorithm                      |
//! |---------|-------------------------------------------|--------------------------------|
//! | `Prob0A`| `Pmax = 0`: no scheduler can reach        | complement of backward E-reach |
//! | `Prob0E`| `Pmin = 0`: some scheduler avoids surely  | complement of the A-attractor  |
//! | `Prob1E`| `Pmax = 1`: some scheduler reaches surely | nested greatest/least fixpoint |
//! | `Prob1A`| `Pmin = 1`: every scheduler reaches surely| complement of E-reach of Prob0E|
//!
//! For Markov chains the `A` and `E` variants coincide.
//!
//! All functions take a `remain` set (states that may be passed through before
//! the target is hit) and a `target` set. [`partition`] instead takes a
//! *forbidden* set, and forbidden states take priority over target states:
//! a state that is both is treated as forbidden.

use log::debug;

use crate::bitset::StateSet;
use crate::model::Model;
use crate::types::{Direction, State};

/// Three-way split of the state space for a reachability objective.
#[derive(Debug, Clone)]
pub struct Partition {
    /// States whose value is exactly 0.
    pub zero: StateSet,
    /// States whose value is exactly 1.
    pub one: StateSet,
    /// Everything else; only these need numerical solving.
    pub maybe: StateSet,
}

/// Backward closure of `start` through states in `remain`.
fn reach_backward(model: &Model, remain: &StateSet, start: &StateSet) -> StateSet {
    let preds = model.predecessors();
    let mut reached = start.clone();
    let mut stack: Vec<usize> = start.iter().collect();
    while let Some(t) = stack.pop() {
        for (s, _) in preds.of(t) {
            if remain.contains(s) && reached.insert(s) {
                stack.push(s);
            }
        }
    }
    reached
}

/// States in `remain` all of whose choices can move into the growing set: the universal attractor of `start`.
fn attract(model: &Model, remain: &StateSet, start: &StateSet) -> StateSet {
    let preds = model.predecessors();
    let mut reached = start.clone();
    let mut hit = vec![false; model.num_choices()];
    let mut pending: Vec<usize> = (0..model.num_states()).map(|s| model.choices(s)).collect();
    let mut stack: Vec<usize> = start.iter().collect();
    while let Some(t) = stack.pop() {
        for (s, c) in preds.of(t) {
            if !remain.contains(s) || reached.contains(s) || hit[c] {
                continue;
            }
            hit[c] = true;
            pending[s] -= 1;
            if pending[s] == 0 {
                reached.insert(s);
                stack.push(s);
            }
        }
    }
    reached
}

/// States from which no scheduler reaches `target` (`Pmax = 0`).
pub fn prob0a(model: &Model, remain: &StateSet, target: &StateSet) -> StateSet {
    reach_backward(model, remain, target).complement()
}

/// States from which some scheduler avoids `target` surely (`Pmin = 0`).
pub fn prob0e(model: &Model, remain: &StateSet, target: &StateSet) -> StateSet {
    attract(model, remain, target).complement()
}

/// States from which some scheduler reaches `target` almost surely (`Pmax = 1`).
pub fn prob1e(model: &Model, remain: &StateSet, target: &StateSet) -> StateSet {
    let preds = model.predecessors();
    let mut outer = reach_backward(model, remain, target);
    let mut rounds = 0;
    loop {
        rounds += 1;
        let mut inner = target.intersection(&outer);
        let mut stack: Vec<usize> = inner.iter().collect();
        while let Some(t) = stack.pop() {
            for (s, c) in preds.of(t) {
                if !remain.contains(s) || !outer.contains(s) || inner.contains(s) {
                    continue;
                }
                if model.distribution(c).all_in(&outer) {
                    inner.insert(s);
                    stack.push(s);
                }
            }
        }
        if inner == outer {
            break;
        }
        outer = inner;
    }
    debug!("prob1e: {} states after {} rounds", outer.len(), rounds);
    outer
}

/// States from which every scheduler reaches `target` almost surely (`Pmin = 1`).
pub fn prob1a(model: &Model, remain: &StateSet, target: &StateSet) -> StateSet {
    let avoid = prob0e(model, remain, target);
    let through = remain.difference(target);
    reach_backward(model, &through, &avoid).complement()
}

/// Splits the state space for `P[¬forbidden U target]` under `direction`.
///
/// A state in both `forbidden` and `target` counts as forbidden. For Markov
/// chains the direction is irrelevant.
pub fn partition(model: &Model, forbidden: &StateSet, target: &StateSet, direction: Direction) -> Partition {
    let target = target.difference(forbidden);
    let remain = forbidden.complement();
    let (zero, one) = if model.semantics().is_nondeterministic() && direction == Direction::Min {
        (
            prob0e(model, &remain, &target),
            prob1a(model, &remain, &target),
        )
    } else {
        (
            prob0a(model, &remain, &target),
            prob1e(model, &remain, &target),
        )
    };
    let maybe = zero.union(&one).complement();
    debug!(
        "Precomputation ({}): {} zero, {} one, {} maybe",
        direction,
        zero.len(),
        one.len(),
        maybe.len()
    );
    Partition { zero, one, maybe }
}

/// For every state of `region` outside `target`, a choice that stays in `region`
/// and moves strictly closer to `target`.
///
/// On a `Prob1E` region such a choice always exists, so following these
/// choices reaches `target` almost surely.
pub fn progress_choices(model: &Model, region: &StateSet, target: &StateSet) -> Vec<(State, usize)> {
    progress_choices_among(model, region, target, |_| true)
}

/// [`progress_choices`] restricted to the global choices for which `allowed` holds.
///
/// States without an allowed choice that makes progress are left out.
pub fn progress_choices_among(
    model: &Model,
    region: &StateSet,
    target: &StateSet,
    allowed: impl Fn(usize) -> bool,
) -> Vec<(State, usize)> {
    let mut reached = region.intersection(target);
    let mut pending: Vec<State> = region.difference(target).iter().collect();
    let mut result = Vec::with_capacity(pending.len());
    loop {
        let mut layer = Vec::new();
        pending.retain(|&s| {
            match model
                .choice_range(s)
                .zip(model.distributions(s))
                .position(|(c, d)| allowed(c) && d.all_in(region) && d.any_in(&reached))
            {
                Some(c) => {
                    layer.push((s, c));
                    false
                }
                None => true,
            }
        });
        if layer.is_empty() {
            break;
        }
        for &(s, _) in &layer {
            reached.insert(s);
        }
        result.extend(layer);
    }
    result
}

/// For every state of `region`, the first choice that never leaves it (if any).
pub fn confining_choices(model: &Model, region: &StateSet) -> Vec<(State, usize)> {
    region
        .iter()
        .filter_map(|s| model.distributions(s).position(|d| d.all_in(region)).map(|c| (s, c)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::config::Config;
    use crate::model::ModelBuilder;
    use crate::solver::{self, UpdateRule};
    use crate::types::Semantics;

    /// s0: a -> {s1: 1/2, s2: 1/2}, b -> {s3}; s3 -> {s0: 1/2, s1: 1/2}; s1 goal, s2 fail.
    fn choice_mdp() -> Model {
        let mut builder = ModelBuilder::new(Semantics::Mdp, 4);
        builder.add_choice(0, [(1, 0.5), (2, 0.5)]);
        builder.add_choice(0, [(3, 1.0)]);
        builder.add_choice(1, [(1, 1.0)]);
        builder.add_choice(2, [(2, 1.0)]);
        builder.add_choice(3, [(0, 0.5), (1, 0.5)]);
        builder.set_initial([0]);
        builder.build().unwrap()
    }

    fn set(states: &[usize]) -> StateSet {
        StateSet::from_states(4, states.iter().copied())
    }

    #[test]
    fn test_prob0() {
        let model = choice_mdp();
        let all = StateSet::full(4);
        let goal = set(&[1]);
        assert_eq!(prob0a(&model, &all, &goal), set(&[2]));
        assert_eq!(prob0e(&model, &all, &goal), set(&[2]));
    }

    #[test]
    fn test_prob1() {
        let model = choice_mdp();
        let all = StateSet::full(4);
        let goal = set(&[1]);
        // Choosing b forever reaches the goal almost surely.
        assert_eq!(prob1e(&model, &all, &goal), set(&[0, 1, 3]));
        // Choosing a risks the fail state.
        assert_eq!(prob1a(&model, &all, &goal), set(&[1]));
    }

    #[test]
    fn test_prob0e_avoidance_by_choice() {
        let model = choice_mdp();
        let all = StateSet::full(4);
        let fail = set(&[2]);
        // Choice b at s0 never reaches the fail state.
        assert_eq!(prob0e(&model, &all, &fail), set(&[0, 1, 3]));
        assert_eq!(prob0a(&model, &all, &fail), set(&[1]));
    }

    #[test]
    fn test_partition_directions() {
        let model = choice_mdp();
        let none = StateSet::empty(4);
        let goal = set(&[1]);

        let max = partition(&model, &none, &goal, Direction::Max);
        assert_eq!(max.zero, set(&[2]));
        assert_eq!(max.one, set(&[0, 1, 3]));
        assert!(max.maybe.is_empty());

        let min = partition(&model, &none, &goal, Direction::Min);
        assert_eq!(min.zero, set(&[2]));
        assert_eq!(min.one, set(&[1]));
        assert_eq!(min.maybe, set(&[0, 3]));
    }

    /// A state that is both forbidden and a target counts as forbidden.
    #[test]
    fn test_forbidden_wins_over_target() {
        let model = choice_mdp();
        let forbidden = set(&[1]);
        let target = set(&[1]);
        let part = partition(&model, &forbidden, &target, Direction::Max);
        assert!(part.zero.is_full());
        assert!(part.one.is_empty());
    }

    #[test]
    fn test_forbidden_blocks_paths() {
        let mut builder = ModelBuilder::new(Semantics::Dtmc, 3);
        builder.add_choice(0, [(1, 1.0)]);
        builder.add_choice(1, [(2, 1.0)]);
        builder.add_choice(2, [(2, 1.0)]);
        builder.set_initial([0]);
        let model = builder.build().unwrap();

        let target = StateSet::from_states(3, [2]);
        let open = partition(&model, &StateSet::empty(3), &target, Direction::Max);
        assert!(open.one.is_full());

        let blocked = partition(&model, &StateSet::from_states(3, [1]), &target, Direction::Max);
        assert_eq!(blocked.zero, StateSet::from_states(3, [0, 1]));
        assert_eq!(blocked.one, target);
    }

    /// Plain value iteration over every non-target state, without any graph precomputation.
    fn iterate(model: &Model, target: &StateSet, direction: Direction) -> Vec<f64> {
        let n = model.num_states();
        let mut values = vec![0.0; n];
        for s in target {
            values[s] = 1.0;
        }
        let config = Config::default();
        let solution = solver::solve(
            model,
            &target.complement(),
            values,
            UpdateRule::Reachability,
            direction,
            &config,
        )
        .unwrap();
        assert!(solution.converged);
        solution.values
    }

    fn assert_agrees_with_iteration(model: &Model, target: &StateSet, direction: Direction) {
        let n = model.num_states();
        let part = partition(model, &StateSet::empty(n), target, direction);
        let values = iterate(model, target, direction);
        for s in 0..n {
            if part.one.contains(s) {
                assert!((values[s] - 1.0).abs() < 1e-6, "state {} in one has {}", s, values[s]);
            } else if part.zero.contains(s) {
                assert!(values[s].abs() < 1e-6, "state {} in zero has {}", s, values[s]);
            } else {
                assert!(values[s] > 1e-6 && values[s] < 1.0 - 1e-6, "state {} in maybe has {}", s, values[s]);
            }
        }
    }

    #[test]
    fn test_partition_matches_iteration_on_dtmc() {
        // s0 -> {s1, s2}; s1 -> {s1, s3}; s4 -> {s4, s2}; s2 and s3 absorbing.
        let mut builder = ModelBuilder::new(Semantics::Dtmc, 5);
        builder.add_choice(0, [(1, 0.5), (2, 0.5)]);
        builder.add_choice(1, [(1, 0.5), (3, 0.5)]);
        builder.add_choice(2, [(2, 1.0)]);
        builder.add_choice(3, [(3, 1.0)]);
        builder.add_choice(4, [(2, 0.5), (4, 0.5)]);
        builder.set_initial([0]);
        let model = builder.build().unwrap();

        let target = StateSet::from_states(5, [3]);
        let part = partition(&model, &StateSet::empty(5), &target, Direction::Max);
        assert_eq!(part.one, StateSet::from_states(5, [1, 3]));
        assert_eq!(part.zero, StateSet::from_states(5, [2, 4]));
        assert_agrees_with_iteration(&model, &target, Direction::Max);
    }

    #[test]
    fn test_partition_matches_iteration_on_mdp() {
        let model = choice_mdp();
        for target in [set(&[1]), set(&[2]), set(&[3])] {
            for direction in [Direction::Min, Direction::Max] {
                assert_agrees_with_iteration(&model, &target, direction);
            }
        }
    }

    #[test]
    fn test_witness_choices() {
        let model = choice_mdp();
        let goal = set(&[1]);
        let one = set(&[0, 1, 3]);
        let mut progress = progress_choices(&model, &one, &goal);
        progress.sort();
        // s0 must pick b: a leaves the region through the fail state.
        assert_eq!(progress, vec![(0, 1), (3, 0)]);

        let zero = set(&[0, 1, 3]);
        let fail = set(&[2]);
        assert_eq!(prob0e(&model, &StateSet::full(4), &fail), zero);
        assert_eq!(confining_choices(&model, &zero), vec![(0, 1), (1, 0), (3, 0)]);
    }
}
