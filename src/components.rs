//! Strongly connected components.
//!
//! Tarjan's algorithm over the underlying graph of the model (an edge `s -> t`
//! exists if some choice of `s` moves to `t` with positive probability),
//! written with an explicit call stack so that deep chains do not overflow
//! the thread stack.
//!
//! Bottom SCCs (no transition leaves the component) are the recurrent classes
//! used by steady-state analysis. Maximal end components generalise them to
//! MDPs: sets of states that some scheduler can keep the run in forever while
//! visiting all of them.

use log::debug;

use crate::bitset::StateSet;
use crate::model::Model;
use crate::types::State;

const UNVISITED: usize = usize::MAX;

/// All SCCs, each sorted ascending, in reverse topological order.
pub fn sccs(model: &Model) -> Vec<Vec<State>> {
    tarjan(model, &StateSet::full(model.num_states()), |_| true)
}

/// SCCs of the subgraph induced by `within`, keeping only the transitions (by global index) accepted by `edge`.
fn tarjan(model: &Model, within: &StateSet, edge: impl Fn(usize) -> bool) -> Vec<Vec<State>> {
    let n = model.num_states();
    let mut index = vec![UNVISITED; n];
    let mut low = vec![0; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<State> = Vec::new();
    let mut call: Vec<(State, usize)> = Vec::new();
    let mut counter = 0;
    let mut components = Vec::new();

    for root in within {
        if index[root] != UNVISITED {
            continue;
        }
        index[root] = counter;
        low[root] = counter;
        counter += 1;
        stack.push(root);
        on_stack[root] = true;
        call.push((root, model.transition_range(root).start));

        while let Some(&(v, next)) = call.last() {
            if next < model.transition_range(v).end {
                let top = call.len() - 1;
                call[top].1 += 1;
                let w = model.target(next);
                if !edge(next) || !within.contains(w) {
                    continue;
                }
                if index[w] == UNVISITED {
                    index[w] = counter;
                    low[w] = counter;
                    counter += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    call.push((w, model.transition_range(w).start));
                } else if on_stack[w] {
                    low[v] = low[v].min(index[w]);
                }
                continue;
            }

            call.pop();
            if let Some(&(u, _)) = call.last() {
                low[u] = low[u].min(low[v]);
            }
            if low[v] == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                component.sort_unstable();
                components.push(component);
            }
        }
    }
    components
}

/// Bottom SCCs: components that no transition leaves.
pub fn bsccs(model: &Model) -> Vec<Vec<State>> {
    let components = sccs(model);
    let mut owner = vec![0; model.num_states()];
    for (i, component) in components.iter().enumerate() {
        for &s in component {
            owner[s] = i;
        }
    }
    let bottom: Vec<Vec<State>> = components
        .into_iter()
        .enumerate()
        .filter(|(i, component)| {
            component
                .iter()
                .all(|&s| model.transition_range(s).all(|tr| owner[model.target(tr)] == *i))
        })
        .map(|(_, component)| component)
        .collect();
    debug!("Found {} bottom SCCs", bottom.len());
    bottom
}

/// Maximal end components of the sub-MDP of `states` that only uses the global choices accepted by `allowed`.
///
/// Repeatedly splits the candidate set into SCCs and drops every choice that
/// can leave its SCC, and every state left without a choice, until nothing
/// changes. For a Markov chain with all choices allowed these are the BSCCs.
pub fn end_components(model: &Model, states: &StateSet, allowed: impl Fn(usize) -> bool) -> Vec<Vec<State>> {
    let n = model.num_states();
    let mut enabled: Vec<bool> = (0..model.num_choices()).map(allowed).collect();
    let mut live = vec![false; model.num_transitions()];
    let mut owner = vec![UNVISITED; n];
    let mut alive = states.clone();
    let mut rounds = 0;
    loop {
        rounds += 1;
        live.iter_mut().for_each(|e| *e = false);
        for s in &alive {
            for c in model.choice_range(s).filter(|&c| enabled[c]) {
                for (tr, _, _) in model.distribution(c).transitions() {
                    live[tr] = true;
                }
            }
        }
        let components = tarjan(model, &alive, |tr| live[tr]);
        owner.iter_mut().for_each(|o| *o = UNVISITED);
        for (i, component) in components.iter().enumerate() {
            for &s in component {
                owner[s] = i;
            }
        }

        let mut changed = false;
        for component in &components {
            for &s in component {
                let mut stays = false;
                for c in model.choice_range(s) {
                    if !enabled[c] {
                        continue;
                    }
                    if model.distribution(c).iter().all(|(t, _)| owner[t] == owner[s]) {
                        stays = true;
                    } else {
                        enabled[c] = false;
                        changed = true;
                    }
                }
                if !stays {
                    alive.remove(s);
                    changed = true;
                }
            }
        }
        if !changed {
            debug!("Found {} end components after {} rounds", components.len(), rounds);
            return components;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::model::ModelBuilder;
    use crate::types::Semantics;

    /// 0 <-> 1 -> 2 <-> 3, and 4 absorbing, reached from 1.
    fn graph() -> Model {
        let mut builder = ModelBuilder::new(Semantics::Dtmc, 5);
        builder.add_choice(0, [(1, 1.0)]);
        builder.add_choice(1, [(0, 0.5), (2, 0.25), (4, 0.25)]);
        builder.add_choice(2, [(3, 1.0)]);
        builder.add_choice(3, [(2, 1.0)]);
        builder.add_choice(4, [(4, 1.0)]);
        builder.set_initial([0]);
        builder.build().unwrap()
    }

    #[test]
    fn test_sccs() {
        let mut components = sccs(&graph());
        components.sort();
        assert_eq!(components, vec![vec![0, 1], vec![2, 3], vec![4]]);
    }

    #[test]
    fn test_bsccs() {
        let mut bottom = bsccs(&graph());
        bottom.sort();
        assert_eq!(bottom, vec![vec![2, 3], vec![4]]);
    }

    /// s0: a -> s1, b -> s2; s1 -> s0; s2 -> {s2: 1/2, s3: 1/2}; s3 absorbing.
    fn end_component_mdp() -> Model {
        let mut builder = ModelBuilder::new(Semantics::Mdp, 4);
        builder.add_choice(0, [(1, 1.0)]);
        builder.add_choice(0, [(2, 1.0)]);
        builder.add_choice(1, [(0, 1.0)]);
        builder.add_choice(2, [(2, 0.5), (3, 0.5)]);
        builder.add_choice(3, [(3, 1.0)]);
        builder.set_initial([0]);
        builder.build().unwrap()
    }

    #[test]
    fn test_end_components() {
        let model = end_component_mdp();
        let all = StateSet::full(4);
        let mut components = end_components(&model, &all, |_| true);
        components.sort();
        // s2 is transient: it leaves towards s3 with positive probability.
        assert_eq!(components, vec![vec![0, 1], vec![3]]);

        // Without choice a of s0 the loop through s1 breaks.
        let mut components = end_components(&model, &all, |c| c != 0);
        components.sort();
        assert_eq!(components, vec![vec![3]]);

        let components = end_components(&model, &StateSet::from_states(4, [0, 1, 2]), |_| true);
        assert_eq!(components, vec![vec![0, 1]]);
    }

    #[test]
    fn test_end_components_of_a_chain_are_bsccs() {
        let model = graph();
        let mut components = end_components(&model, &StateSet::full(5), |_| true);
        components.sort();
        assert_eq!(components, vec![vec![2, 3], vec![4]]);
    }

    #[test]
    fn test_long_chain() {
        let n = 100_000;
        let mut builder = ModelBuilder::new(Semantics::Dtmc, n);
        for s in 0..n - 1 {
            builder.add_choice(s, [(s + 1, 1.0)]);
        }
        builder.add_choice(n - 1, [(0, 1.0)]);
        builder.set_initial([0]);
        let model = builder.build().unwrap();
        let components = sccs(&model);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].len(), n);
        assert_eq!(bsccs(&model).len(), 1);
    }
}
