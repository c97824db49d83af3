//! Scheduler resolution for nondeterministic models.
//!
//! At every Bellman update the solver asks a [`Resolver`] which choice of a
//! state is optimal. The resolver applies the configured [`TieBreak`] policy,
//! so repeated runs always pick the same choice. When a witness is requested
//! the winning choices are collected into a [`Scheduler`].

use crate::config::TieBreak;
use crate::types::{Direction, State};

/// A memoryless deterministic scheduler: one local choice index per state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheduler {
    choices: Vec<usize>,
}

impl Scheduler {
    /// Scheduler picking the first choice everywhere.
    pub fn new(num_states: usize) -> Self {
        Self {
            choices: vec![0; num_states],
        }
    }

    /// Local choice index selected at `state`.
    pub fn choice(&self, state: State) -> usize {
        self.choices[state]
    }

    pub fn set(&mut self, state: State, choice: usize) {
        self.choices[state] = choice;
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.choices
    }
}

/// Picks the optimal choice among candidate values.
#[derive(Debug, Copy, Clone)]
pub struct Resolver {
    direction: Direction,
    tie_break: TieBreak,
}

impl Resolver {
    pub fn new(direction: Direction, tie_break: TieBreak) -> Self {
        Self {
            direction,
            tie_break,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the index and value of the best candidate, or `None` if there is none.
    pub fn best(&self, values: impl IntoIterator<Item = f64>) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (i, v) in values.into_iter().enumerate() {
            best = match best {
                None => Some((i, v)),
                Some((_, incumbent)) if self.prefers(v, incumbent) => Some((i, v)),
                keep => keep,
            };
        }
        best
    }

    #[inline]
    fn prefers(&self, candidate: f64, incumbent: f64) -> bool {
        match self.tie_break {
            TieBreak::LowestIndex => self.direction.improves(candidate, incumbent),
        }
    }
}
