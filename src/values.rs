//! Per-state results and final verdicts.

use std::collections::BTreeMap;
use std::fmt;

use crate::bitset::StateSet;
use crate::error::{Error, Result};
use crate::types::State;

/// Value of a subformula in every state.
#[derive(Debug, Clone, PartialEq)]
pub enum StateValues {
    Bool(StateSet),
    Real(Vec<f64>),
}

impl StateValues {
    pub fn len(&self) -> usize {
        match self {
            StateValues::Bool(set) => set.universe(),
            StateValues::Real(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, state: State) -> Scalar {
        match self {
            StateValues::Bool(set) => Scalar::Bool(set.contains(state)),
            StateValues::Real(values) => Scalar::Real(values[state]),
        }
    }

    pub fn into_bool(self) -> Result<StateSet> {
        match self {
            StateValues::Bool(set) => Ok(set),
            StateValues::Real(_) => Err(Error::InvalidQuery(
                "expected a Boolean formula, got a numeric one".to_string(),
            )),
        }
    }

    pub fn into_real(self) -> Result<Vec<f64>> {
        match self {
            StateValues::Real(values) => Ok(values),
            StateValues::Bool(_) => Err(Error::InvalidQuery(
                "expected a numeric formula, got a Boolean one".to_string(),
            )),
        }
    }
}

/// Value of a formula in a single state.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Real(f64),
}

fn write_real(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value == f64::INFINITY {
        write!(f, "Infinity")
    } else if value == f64::NEG_INFINITY {
        write!(f, "-Infinity")
    } else {
        write!(f, "{}", value)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Real(x) => write_real(f, x),
        }
    }
}

/// Final answer of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Bool(bool),
    Real(f64),
    /// Result of a `range` filter.
    Interval { low: f64, high: f64 },
    /// Result of `argmin`/`argmax`.
    States(StateSet),
    /// Value in each of several initial states.
    PerState(BTreeMap<State, Scalar>),
}

impl Verdict {
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Verdict::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match *self {
            Verdict::Real(x) => Some(x),
            _ => None,
        }
    }
}

impl From<Scalar> for Verdict {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Bool(b) => Verdict::Bool(b),
            Scalar::Real(x) => Verdict::Real(x),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Bool(b) => write!(f, "{}", b),
            Verdict::Real(x) => write_real(f, *x),
            Verdict::Interval { low, high } => {
                write!(f, "[")?;
                write_real(f, *low)?;
                write!(f, ",")?;
                write_real(f, *high)?;
                write!(f, "]")
            }
            Verdict::States(set) => write!(f, "{:?}", set),
            Verdict::PerState(map) => {
                write!(f, "{{")?;
                for (i, (s, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", s, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn test_conversions() {
        let values = StateValues::Real(vec![0.5, 1.0]);
        assert_eq!(values.len(), 2);
        assert_eq!(values.get(1), Scalar::Real(1.0));
        assert!(matches!(values.clone().into_bool(), Err(Error::InvalidQuery(_))));
        assert_eq!(values.into_real().unwrap(), vec![0.5, 1.0]);

        let values = StateValues::Bool(StateSet::from_states(3, [2]));
        assert_eq!(values.get(2), Scalar::Bool(true));
        assert_eq!(values.get(0), Scalar::Bool(false));
        assert!(matches!(values.into_real(), Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn test_display() {
        assert_eq!(Verdict::Real(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(Verdict::Interval { low: 0.25, high: 1.0 }.to_string(), "[0.25,1]");
        let map = BTreeMap::from([(0, Scalar::Real(0.5)), (3, Scalar::Bool(true))]);
        assert_eq!(Verdict::PerState(map).to_string(), "{0: 0.5, 3: true}");
        assert_eq!(Verdict::from(Scalar::Bool(false)).as_bool(), Some(false));
    }
}
