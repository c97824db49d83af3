//! Query trees.
//!
//! Queries arrive already parsed: a [`Query`] wraps a [`StateFormula`] and an
//! optional `{predicate}{min|max}` [`Restriction`]. Formulas are plain sum
//! types matched exhaustively by the checker, so a new operator cannot be
//! added without the compiler pointing at every place that must handle it.
//!
//! The `Display` impls print formulas in the familiar PRISM-like syntax,
//! which is what shows up in logs.
//!
//! # Examples
//!
//! ```
//! use pmc_rs::query::{PathFormula, Query, StateFormula, TimeBound};
//! use pmc_rs::types::Direction;
//!
//! // Pmin=? [ F<=10 "done" ] {"init"}{min}
//! let query = Query::new(StateFormula::prob(
//!     Some(Direction::Min),
//!     PathFormula::finally_bounded(StateFormula::label("done"), TimeBound::upto(10.0)),
//! ))
//! .restrict(StateFormula::label("init"), pmc_rs::query::Aggregate::Min);
//! assert_eq!(query.to_string(), "Pmin=? [ F<=10 \"done\" ] {\"init\"}{min}");
//! ```

use std::fmt;

use crate::filter::FilterKind;
use crate::types::{Comparison, Direction};

/// Either a numeric query (`=?`) or a comparison against a threshold.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Bound {
    Query,
    Compare(Comparison, f64),
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Query => write!(f, "=?"),
            Bound::Compare(op, threshold) => write!(f, "{}{}", op, threshold),
        }
    }
}

/// Closed time (or step) interval of a path operator. `None` means unbounded on that side.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct TimeBound {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl TimeBound {
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// `<=t`
    pub fn upto(t: f64) -> Self {
        Self {
            lower: None,
            upper: Some(t),
        }
    }

    /// `>=t`
    pub fn at_least(t: f64) -> Self {
        Self {
            lower: Some(t),
            upper: None,
        }
    }

    /// `[a,b]`
    pub fn interval(a: f64, b: f64) -> Self {
        Self {
            lower: Some(a),
            upper: Some(b),
        }
    }

    /// `[t,t]`
    pub fn at(t: f64) -> Self {
        Self::interval(t, t)
    }

    pub fn is_unbounded(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }
}

impl fmt::Display for TimeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lower, self.upper) {
            (None, None) => Ok(()),
            (None, Some(b)) => write!(f, "<={}", b),
            (Some(a), None) => write!(f, ">={}", a),
            (Some(a), Some(b)) => write!(f, "[{},{}]", a, b),
        }
    }
}

/// Path formulas under a `P` operator.
#[derive(Debug, Clone, PartialEq)]
pub enum PathFormula {
    Next(Box<StateFormula>),
    Until {
        left: Box<StateFormula>,
        right: Box<StateFormula>,
        bound: TimeBound,
    },
    Finally {
        formula: Box<StateFormula>,
        bound: TimeBound,
    },
    Globally {
        formula: Box<StateFormula>,
        bound: TimeBound,
    },
}

impl PathFormula {
    pub fn next(formula: StateFormula) -> Self {
        PathFormula::Next(Box::new(formula))
    }

    pub fn until(left: StateFormula, right: StateFormula) -> Self {
        Self::until_bounded(left, right, TimeBound::unbounded())
    }

    pub fn until_bounded(left: StateFormula, right: StateFormula, bound: TimeBound) -> Self {
        PathFormula::Until {
            left: Box::new(left),
            right: Box::new(right),
            bound,
        }
    }

    pub fn finally(formula: StateFormula) -> Self {
        Self::finally_bounded(formula, TimeBound::unbounded())
    }

    pub fn finally_bounded(formula: StateFormula, bound: TimeBound) -> Self {
        PathFormula::Finally {
            formula: Box::new(formula),
            bound,
        }
    }

    pub fn globally(formula: StateFormula) -> Self {
        Self::globally_bounded(formula, TimeBound::unbounded())
    }

    pub fn globally_bounded(formula: StateFormula, bound: TimeBound) -> Self {
        PathFormula::Globally {
            formula: Box::new(formula),
            bound,
        }
    }
}

impl fmt::Display for PathFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathFormula::Next(formula) => write!(f, "X {}", formula),
            PathFormula::Until { left, right, bound } => write!(f, "{} U{} {}", left, bound, right),
            PathFormula::Finally { formula, bound } => write!(f, "F{} {}", bound, formula),
            PathFormula::Globally { formula, bound } => write!(f, "G{} {}", bound, formula),
        }
    }
}

/// What an `R` operator accumulates.
#[derive(Debug, Clone, PartialEq)]
pub enum RewardKind {
    /// `F φ`: until `φ` is reached.
    Reachability(Box<StateFormula>),
    /// `C<=k`, or the total reward `C` when `None`.
    Cumulative(Option<f64>),
    /// `C<=k, DISCOUNT=γ`: step `i` earns `γ^i` times its reward.
    /// Without a bound the horizon is infinite and `γ` must lie in `[0, 1)`.
    Discounted { bound: Option<f64>, factor: f64 },
    /// `I=k`
    Instantaneous(f64),
    /// `S`: long-run average.
    LongRun,
}

impl RewardKind {
    pub fn reachability(formula: StateFormula) -> Self {
        RewardKind::Reachability(Box::new(formula))
    }

    pub fn discounted(bound: Option<f64>, factor: f64) -> Self {
        RewardKind::Discounted { bound, factor }
    }
}

impl fmt::Display for RewardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewardKind::Reachability(formula) => write!(f, "F {}", formula),
            RewardKind::Cumulative(None) => write!(f, "C"),
            RewardKind::Cumulative(Some(t)) => write!(f, "C<={}", t),
            RewardKind::Discounted { bound: None, factor } => write!(f, "C, DISCOUNT={}", factor),
            RewardKind::Discounted {
                bound: Some(t),
                factor,
            } => write!(f, "C<={}, DISCOUNT={}", t, factor),
            RewardKind::Instantaneous(t) => write!(f, "I={}", t),
            RewardKind::LongRun => write!(f, "S"),
        }
    }
}

/// State formulas.
#[derive(Debug, Clone, PartialEq)]
pub enum StateFormula {
    True,
    False,
    Label(String),
    Not(Box<StateFormula>),
    And(Box<StateFormula>, Box<StateFormula>),
    Or(Box<StateFormula>, Box<StateFormula>),
    Implies(Box<StateFormula>, Box<StateFormula>),
    Probability {
        direction: Option<Direction>,
        bound: Bound,
        path: PathFormula,
    },
    Reward {
        structure: String,
        direction: Option<Direction>,
        bound: Bound,
        kind: RewardKind,
    },
    SteadyState {
        direction: Option<Direction>,
        bound: Bound,
        formula: Box<StateFormula>,
    },
    Filter {
        kind: FilterKind,
        formula: Box<StateFormula>,
        states: Box<StateFormula>,
    },
}

impl StateFormula {
    pub fn label(name: &str) -> Self {
        StateFormula::Label(name.to_string())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(formula: Self) -> Self {
        StateFormula::Not(Box::new(formula))
    }

    pub fn and(lhs: Self, rhs: Self) -> Self {
        StateFormula::And(Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: Self, rhs: Self) -> Self {
        StateFormula::Or(Box::new(lhs), Box::new(rhs))
    }

    pub fn implies(lhs: Self, rhs: Self) -> Self {
        StateFormula::Implies(Box::new(lhs), Box::new(rhs))
    }

    /// `P=? [path]`, `Pmin=? [path]` or `Pmax=? [path]`.
    pub fn prob(direction: Option<Direction>, path: PathFormula) -> Self {
        StateFormula::Probability {
            direction,
            bound: Bound::Query,
            path,
        }
    }

    /// `P~p [path]`.
    pub fn prob_bounded(direction: Option<Direction>, op: Comparison, threshold: f64, path: PathFormula) -> Self {
        StateFormula::Probability {
            direction,
            bound: Bound::Compare(op, threshold),
            path,
        }
    }

    /// `R{"structure"}=? [kind]`.
    pub fn reward(structure: &str, direction: Option<Direction>, kind: RewardKind) -> Self {
        StateFormula::Reward {
            structure: structure.to_string(),
            direction,
            bound: Bound::Query,
            kind,
        }
    }

    /// `R{"structure"}~r [kind]`.
    pub fn reward_bounded(
        structure: &str,
        direction: Option<Direction>,
        op: Comparison,
        threshold: f64,
        kind: RewardKind,
    ) -> Self {
        StateFormula::Reward {
            structure: structure.to_string(),
            direction,
            bound: Bound::Compare(op, threshold),
            kind,
        }
    }

    /// `S=? [formula]`.
    pub fn steady(direction: Option<Direction>, formula: StateFormula) -> Self {
        StateFormula::SteadyState {
            direction,
            bound: Bound::Query,
            formula: Box::new(formula),
        }
    }

    /// `S~p [formula]`.
    pub fn steady_bounded(direction: Option<Direction>, op: Comparison, threshold: f64, formula: StateFormula) -> Self {
        StateFormula::SteadyState {
            direction,
            bound: Bound::Compare(op, threshold),
            formula: Box::new(formula),
        }
    }

    /// `filter(kind, formula, states)`.
    pub fn filter(kind: FilterKind, formula: StateFormula, states: StateFormula) -> Self {
        StateFormula::Filter {
            kind,
            formula: Box::new(formula),
            states: Box::new(states),
        }
    }
}

fn write_operator(f: &mut fmt::Formatter<'_>, direction: &Option<Direction>, bound: &Bound) -> fmt::Result {
    if let Some(direction) = direction {
        write!(f, "{}", direction)?;
    }
    write!(f, "{}", bound)
}

impl fmt::Display for StateFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateFormula::True => write!(f, "true"),
            StateFormula::False => write!(f, "false"),
            StateFormula::Label(name) => write!(f, "\"{}\"", name),
            StateFormula::Not(inner) => write!(f, "!{}", inner),
            StateFormula::And(lhs, rhs) => write!(f, "({} & {})", lhs, rhs),
            StateFormula::Or(lhs, rhs) => write!(f, "({} | {})", lhs, rhs),
            StateFormula::Implies(lhs, rhs) => write!(f, "({} => {})", lhs, rhs),
            StateFormula::Probability { direction, bound, path } => {
                write!(f, "P")?;
                write_operator(f, direction, bound)?;
                write!(f, " [ {} ]", path)
            }
            StateFormula::Reward {
                structure,
                direction,
                bound,
                kind,
            } => {
                write!(f, "R{{\"{}\"}}", structure)?;
                write_operator(f, direction, bound)?;
                write!(f, " [ {} ]", kind)
            }
            StateFormula::SteadyState {
                direction,
                bound,
                formula,
            } => {
                write!(f, "S")?;
                write_operator(f, direction, bound)?;
                write!(f, " [ {} ]", formula)
            }
            StateFormula::Filter { kind, formula, states } => {
                write!(f, "filter({}, {}, {})", kind, formula, states)
            }
        }
    }
}

/// Aggregation applied by a `{predicate}{min|max}` restriction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Aggregate {
    Min,
    Max,
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregate::Min => write!(f, "min"),
            Aggregate::Max => write!(f, "max"),
        }
    }
}

/// Scopes a query to the states satisfying `states` and reports the min or max over them.
#[derive(Debug, Clone, PartialEq)]
pub struct Restriction {
    pub states: StateFormula,
    pub aggregate: Aggregate,
}

/// A top-level query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub formula: StateFormula,
    pub restriction: Option<Restriction>,
}

impl Query {
    pub fn new(formula: StateFormula) -> Self {
        Self {
            formula,
            restriction: None,
        }
    }

    pub fn restrict(mut self, states: StateFormula, aggregate: Aggregate) -> Self {
        self.restriction = Some(Restriction { states, aggregate });
        self
    }
}

impl From<StateFormula> for Query {
    fn from(formula: StateFormula) -> Self {
        Query::new(formula)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formula)?;
        if let Some(restriction) = &self.restriction {
            write!(f, " {{{}}}{{{}}}", restriction.states, restriction.aggregate)?;
        }
        Ok(())
    }
}
