//! Small enums shared across the engine.
//!
//! These types keep the vocabulary of the checker explicit: which kind of
//! model is being analysed, which way an optimisation goes, and how a value is
//! compared against a probability or reward bound.
use std::fmt;

/// Index of a state in the dense range `[0, N)`.
pub type State = usize;

/// Kind of stochastic model.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Semantics {
    /// Discrete-time Markov chain.
    Dtmc,
    /// Continuous-time Markov chain. Outgoing weights are rates.
    Ctmc,
    /// Markov decision process.
    Mdp,
}

impl Semantics {
    /// Returns true if states may have several choices.
    pub fn is_nondeterministic(self) -> bool {
        matches!(self, Semantics::Mdp)
    }

    /// Returns true if time is continuous.
    pub fn is_continuous(self) -> bool {
        matches!(self, Semantics::Ctmc)
    }
}

impl fmt::Display for Semantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Semantics::Dtmc => write!(f, "DTMC"),
            Semantics::Ctmc => write!(f, "CTMC"),
            Semantics::Mdp => write!(f, "MDP"),
        }
    }
}

/// Optimisation direction over the nondeterministic choices of an MDP.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Direction {
    Min,
    Max,
}

impl Direction {
    /// Returns the opposite direction.
    pub fn flip(self) -> Self {
        match self {
            Direction::Min => Direction::Max,
            Direction::Max => Direction::Min,
        }
    }

    /// Returns true if `candidate` is strictly better than `incumbent`.
    ///
    /// Strictness is what makes the lowest index win on ties.
    #[inline]
    pub fn improves(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Direction::Min => candidate < incumbent,
            Direction::Max => candidate > incumbent,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Min => write!(f, "min"),
            Direction::Max => write!(f, "max"),
        }
    }
}

/// Relational operator of a bounded query such as `P>=0.5 [...]`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    /// Evaluates `value <op> threshold`.
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::Lt => value < threshold,
            Comparison::Le => value <= threshold,
            Comparison::Gt => value > threshold,
            Comparison::Ge => value >= threshold,
        }
    }

    /// Returns true for `>` and `>=`.
    pub fn is_lower_bound(self) -> bool {
        matches!(self, Comparison::Gt | Comparison::Ge)
    }

    /// Direction that decides the bound for every scheduler.
    ///
    /// A lower bound must hold for the minimising scheduler, an upper bound for the maximising one.
    pub fn direction(self) -> Direction {
        if self.is_lower_bound() {
            Direction::Min
        } else {
            Direction::Max
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::Lt => write!(f, "<"),
            Comparison::Le => write!(f, "<="),
            Comparison::Gt => write!(f, ">"),
            Comparison::Ge => write!(f, ">="),
        }
    }
}
