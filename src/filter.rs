//! Quantified filters.
//!
//! A filter reduces the per-state values of a formula over a subset of states
//! to a single [`Verdict`]. The `{predicate}{min|max}` restriction on a
//! [`Query`](crate::query::Query) is evaluated through the same code with
//! [`FilterKind::Min`] or [`FilterKind::Max`].
//!
//! Nested filters are broadcast back to every state by [`broadcast`], so
//! `filter(forall, ...)` can appear under a Boolean connective.

use std::fmt;

use crate::bitset::StateSet;
use crate::error::{Error, Result};
use crate::values::{StateValues, Verdict};

/// Aggregation performed by a filter.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FilterKind {
    Min,
    Max,
    Argmin,
    Argmax,
    Count,
    Sum,
    Avg,
    First,
    Range,
    Forall,
    Exists,
    State,
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterKind::Min => "min",
            FilterKind::Max => "max",
            FilterKind::Argmin => "argmin",
            FilterKind::Argmax => "argmax",
            FilterKind::Count => "count",
            FilterKind::Sum => "sum",
            FilterKind::Avg => "avg",
            FilterKind::First => "first",
            FilterKind::Range => "range",
            FilterKind::Forall => "forall",
            FilterKind::Exists => "exists",
            FilterKind::State => "state",
        };
        write!(f, "{}", name)
    }
}

fn nonempty(kind: FilterKind, states: &StateSet) -> Result<()> {
    if states.is_empty() {
        Err(Error::InvalidQuery(format!("filter '{}' over an empty set of states", kind)))
    } else {
        Ok(())
    }
}

fn needs_bool(kind: FilterKind) -> Error {
    Error::InvalidQuery(format!("filter '{}' requires a Boolean formula", kind))
}

fn needs_real(kind: FilterKind) -> Error {
    Error::InvalidQuery(format!("filter '{}' requires a numeric formula", kind))
}

/// Reduces `values` over `states`.
///
/// `min`/`max` of a Boolean formula behave as `forall`/`exists`.
pub fn apply(kind: FilterKind, values: &StateValues, states: &StateSet) -> Result<Verdict> {
    match (kind, values) {
        (FilterKind::Forall, StateValues::Bool(set)) => Ok(Verdict::Bool(states.is_subset(set))),
        (FilterKind::Exists, StateValues::Bool(set)) => Ok(Verdict::Bool(states.intersects(set))),
        (FilterKind::Count, StateValues::Bool(set)) => Ok(Verdict::Real(states.intersection(set).len() as f64)),
        (FilterKind::Forall | FilterKind::Exists | FilterKind::Count, StateValues::Real(_)) => Err(needs_bool(kind)),

        (FilterKind::Min, StateValues::Bool(set)) => {
            nonempty(kind, states)?;
            Ok(Verdict::Bool(states.is_subset(set)))
        }
        (FilterKind::Max, StateValues::Bool(set)) => {
            nonempty(kind, states)?;
            Ok(Verdict::Bool(states.intersects(set)))
        }
        (FilterKind::Min, StateValues::Real(values)) => {
            nonempty(kind, states)?;
            Ok(Verdict::Real(states.iter().map(|s| values[s]).fold(f64::INFINITY, f64::min)))
        }
        (FilterKind::Max, StateValues::Real(values)) => {
            nonempty(kind, states)?;
            Ok(Verdict::Real(states.iter().map(|s| values[s]).fold(f64::NEG_INFINITY, f64::max)))
        }

        (FilterKind::Sum, StateValues::Real(values)) => Ok(Verdict::Real(states.iter().map(|s| values[s]).sum())),
        (FilterKind::Avg, StateValues::Real(values)) => {
            nonempty(kind, states)?;
            let sum: f64 = states.iter().map(|s| values[s]).sum();
            Ok(Verdict::Real(sum / states.len() as f64))
        }
        (FilterKind::Range, StateValues::Real(values)) => {
            nonempty(kind, states)?;
            let (low, high) = states
                .iter()
                .map(|s| values[s])
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| (lo.min(x), hi.max(x)));
            Ok(Verdict::Interval { low, high })
        }
        (FilterKind::Argmin | FilterKind::Argmax, StateValues::Real(values)) => {
            let best = if kind == FilterKind::Argmin {
                states.iter().map(|s| values[s]).fold(f64::INFINITY, f64::min)
            } else {
                states.iter().map(|s| values[s]).fold(f64::NEG_INFINITY, f64::max)
            };
            let argset = StateSet::from_states(states.universe(), states.iter().filter(|&s| values[s] == best));
            Ok(Verdict::States(argset))
        }
        (
            FilterKind::Sum | FilterKind::Avg | FilterKind::Range | FilterKind::Argmin | FilterKind::Argmax,
            StateValues::Bool(_),
        ) => Err(needs_real(kind)),

        (FilterKind::First, _) => {
            let s = states
                .first()
                .ok_or_else(|| Error::InvalidQuery(format!("filter '{}' over an empty set of states", kind)))?;
            Ok(Verdict::from(values.get(s)))
        }
        (FilterKind::State, _) => {
            if states.len() != 1 {
                return Err(Error::InvalidQuery(format!(
                    "filter 'state' must match exactly one state, matched {}",
                    states.len()
                )));
            }
            let s = states.first().ok_or_else(|| Error::InvalidQuery("empty state filter".to_string()))?;
            Ok(Verdict::from(values.get(s)))
        }
    }
}

/// Turns a filter verdict back into per-state values over `universe` states.
///
/// Used when a filter is nested inside another formula: every state gets the
/// same value, except for `argmin`/`argmax` which yield their state set.
pub fn broadcast(verdict: Verdict, universe: usize) -> Result<StateValues> {
    match verdict {
        Verdict::Bool(true) => Ok(StateValues::Bool(StateSet::full(universe))),
        Verdict::Bool(false) => Ok(StateValues::Bool(StateSet::empty(universe))),
        Verdict::Real(x) => Ok(StateValues::Real(vec![x; universe])),
        Verdict::States(set) => Ok(StateValues::Bool(set)),
        Verdict::Interval { .. } => Err(Error::InvalidQuery(
            "a 'range' filter cannot be nested inside another formula".to_string(),
        )),
        Verdict::PerState(_) => Err(Error::InvalidQuery(
            "per-state results cannot be nested inside another formula".to_string(),
        )),
    }
}

/// Values of `values` restricted to `states` as a per-state verdict.
pub(crate) fn per_state(values: &StateValues, states: &StateSet) -> Verdict {
    if states.len() == 1 {
        if let Some(s) = states.first() {
            return Verdict::from(values.get(s));
        }
    }
    Verdict::PerState(states.iter().map(|s| (s, values.get(s))).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn reals() -> StateValues {
        StateValues::Real(vec![0.5, 0.25, 1.0, 0.25])
    }

    #[test]
    fn test_numeric_aggregates() {
        let all = StateSet::full(4);
        assert_eq!(apply(FilterKind::Min, &reals(), &all).unwrap(), Verdict::Real(0.25));
        assert_eq!(apply(FilterKind::Max, &reals(), &all).unwrap(), Verdict::Real(1.0));
        assert_eq!(apply(FilterKind::Sum, &reals(), &all).unwrap(), Verdict::Real(2.0));
        assert_eq!(apply(FilterKind::Avg, &reals(), &all).unwrap(), Verdict::Real(0.5));
        assert_eq!(
            apply(FilterKind::Range, &reals(), &all).unwrap(),
            Verdict::Interval { low: 0.25, high: 1.0 }
        );
        assert_eq!(
            apply(FilterKind::Argmin, &reals(), &all).unwrap(),
            Verdict::States(StateSet::from_states(4, [1, 3]))
        );
        assert_eq!(apply(FilterKind::First, &reals(), &all).unwrap(), Verdict::Real(0.5));
    }

    #[test]
    fn test_boolean_quantifiers() {
        let values = StateValues::Bool(StateSet::from_states(4, [0, 1]));
        let first_two = StateSet::from_states(4, [0, 1]);
        let all = StateSet::full(4);
        assert_eq!(apply(FilterKind::Forall, &values, &first_two).unwrap(), Verdict::Bool(true));
        assert_eq!(apply(FilterKind::Forall, &values, &all).unwrap(), Verdict::Bool(false));
        assert_eq!(apply(FilterKind::Exists, &values, &all).unwrap(), Verdict::Bool(true));
        assert_eq!(apply(FilterKind::Count, &values, &all).unwrap(), Verdict::Real(2.0));
        assert_eq!(apply(FilterKind::Min, &values, &first_two).unwrap(), Verdict::Bool(true));
        assert_eq!(apply(FilterKind::Max, &values, &StateSet::from_states(4, [3])).unwrap(), Verdict::Bool(false));

        // Vacuous truth over the empty set.
        let none = StateSet::empty(4);
        assert_eq!(apply(FilterKind::Forall, &values, &none).unwrap(), Verdict::Bool(true));
        assert_eq!(apply(FilterKind::Exists, &values, &none).unwrap(), Verdict::Bool(false));
    }

    #[test]
    fn test_forall_is_idempotent() {
        let values = StateValues::Bool(StateSet::from_states(3, [0, 2]));
        let all = StateSet::full(3);
        let once = apply(FilterKind::Forall, &values, &all).unwrap();
        let again = apply(FilterKind::Forall, &broadcast(once.clone(), 3).unwrap(), &all).unwrap();
        assert_eq!(once, again);
    }

    #[test]
    fn test_type_mismatches() {
        let all = StateSet::full(4);
        assert!(matches!(apply(FilterKind::Forall, &reals(), &all), Err(Error::InvalidQuery(_))));
        let bools = StateValues::Bool(StateSet::full(4));
        assert!(matches!(apply(FilterKind::Sum, &bools, &all), Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn test_empty_and_state_filters() {
        let none = StateSet::empty(4);
        assert!(matches!(apply(FilterKind::Min, &reals(), &none), Err(Error::InvalidQuery(_))));
        assert!(matches!(apply(FilterKind::Avg, &reals(), &none), Err(Error::InvalidQuery(_))));
        assert!(matches!(
            apply(FilterKind::State, &reals(), &StateSet::full(4)),
            Err(Error::InvalidQuery(_))
        ));
        assert_eq!(
            apply(FilterKind::State, &reals(), &StateSet::from_states(4, [2])).unwrap(),
            Verdict::Real(1.0)
        );
    }

    #[test]
    fn test_broadcast() {
        assert_eq!(broadcast(Verdict::Real(0.5), 2).unwrap(), StateValues::Real(vec![0.5, 0.5]));
        assert_eq!(broadcast(Verdict::Bool(true), 2).unwrap(), StateValues::Bool(StateSet::full(2)));
        assert!(matches!(
            broadcast(Verdict::Interval { low: 0.0, high: 1.0 }, 2),
            Err(Error::InvalidQuery(_))
        ));
    }
}
