//! Dense bit set over a fixed universe of states.
//!
//! Every graph algorithm in the crate (precomputation, SCC search, filters)
//! works on subsets of `[0, N)`. This module provides a compact, cache-friendly
//! representation with the usual set algebra.
//!
//! Unlike a growable bit set, a [`StateSet`] knows the size of its universe,
//! which makes [`StateSet::complement`] well-defined. Bits at or beyond the
//! universe size are always zero.

use std::fmt;

/// A set of state indices drawn from `[0, universe)`.
#[derive(Clone, PartialEq, Eq)]
pub struct StateSet {
    /// Storage: each u64 holds 64 bits
    words: Vec<u64>,
    /// Number of representable states
    universe: usize,
    /// Number of set bits (cached for O(1) len())
    count: usize,
}

impl StateSet {
    /// Number of bits per word.
    const BITS_PER_WORD: usize = 64;

    #[inline]
    fn num_words(universe: usize) -> usize {
        universe.div_ceil(Self::BITS_PER_WORD)
    }

    #[inline]
    fn word_and_bit(index: usize) -> (usize, usize) {
        (index / Self::BITS_PER_WORD, index % Self::BITS_PER_WORD)
    }

    /// Creates an empty set over `universe` states.
    pub fn empty(universe: usize) -> Self {
        Self {
            words: vec![0; Self::num_words(universe)],
            universe,
            count: 0,
        }
    }

    /// Creates a set containing every state of the universe.
    pub fn full(universe: usize) -> Self {
        let mut set = Self {
            words: vec![u64::MAX; Self::num_words(universe)],
            universe,
            count: universe,
        };
        set.clear_tail();
        set
    }

    /// Creates a set from an iterator of state indices.
    ///
    /// # Panics
    ///
    /// Panics if an index is outside the universe.
    pub fn from_states(universe: usize, states: impl IntoIterator<Item = usize>) -> Self {
        let mut set = Self::empty(universe);
        set.extend(states);
        set
    }

    /// Creates a set of all states for which `pred` holds.
    pub fn from_predicate(universe: usize, mut pred: impl FnMut(usize) -> bool) -> Self {
        let mut set = Self::empty(universe);
        for state in 0..universe {
            if pred(state) {
                set.insert(state);
            }
        }
        set
    }

    /// Zeroes bits past the universe in the last word.
    fn clear_tail(&mut self) {
        let rem = self.universe % Self::BITS_PER_WORD;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
    }

    fn recount(&mut self) {
        self.count = self.words.iter().map(|w| w.count_ones() as usize).sum();
    }

    /// Returns the size of the universe.
    #[inline]
    pub fn universe(&self) -> usize {
        self.universe
    }

    /// Returns the number of states in the set.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the set contains no states.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns true if every state of the universe is in the set.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == self.universe
    }

    /// Returns true if `state` is in the set. States outside the universe are never contained.
    #[inline]
    pub fn contains(&self, state: usize) -> bool {
        if state >= self.universe {
            return false;
        }
        let (word, bit) = Self::word_and_bit(state);
        (self.words[word] >> bit) & 1 == 1
    }

    /// Adds `state` to the set. Returns true if it was not present before.
    ///
    /// # Panics
    ///
    /// Panics if `state` is outside the universe.
    #[inline]
    pub fn insert(&mut self, state: usize) -> bool {
        assert!(
            state < self.universe,
            "State {} is outside the universe of {} states",
            state,
            self.universe
        );
        let (word, bit) = Self::word_and_bit(state);
        let mask = 1u64 << bit;
        let was_clear = self.words[word] & mask == 0;
        if was_clear {
            self.words[word] |= mask;
            self.count += 1;
        }
        was_clear
    }

    /// Removes `state` from the set. Returns true if it was present.
    #[inline]
    pub fn remove(&mut self, state: usize) -> bool {
        if state >= self.universe {
            return false;
        }
        let (word, bit) = Self::word_and_bit(state);
        let mask = 1u64 << bit;
        let was_set = self.words[word] & mask != 0;
        if was_set {
            self.words[word] &= !mask;
            self.count -= 1;
        }
        was_set
    }

    /// Adds all states from an iterator.
    pub fn extend(&mut self, states: impl IntoIterator<Item = usize>) {
        for state in states {
            self.insert(state);
        }
    }

    /// Returns the smallest state in the set.
    pub fn first(&self) -> Option<usize> {
        self.iter().next()
    }

    /// In-place union.
    pub fn union_with(&mut self, other: &StateSet) {
        debug_assert_eq!(self.universe, other.universe);
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= *b;
        }
        self.recount();
    }

    /// In-place intersection.
    pub fn intersect_with(&mut self, other: &StateSet) {
        debug_assert_eq!(self.universe, other.universe);
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a &= *b;
        }
        self.recount();
    }

    /// In-place difference (`self \ other`).
    pub fn difference_with(&mut self, other: &StateSet) {
        debug_assert_eq!(self.universe, other.universe);
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a &= !*b;
        }
        self.recount();
    }

    /// Returns `self ∪ other`.
    pub fn union(&self, other: &StateSet) -> StateSet {
        let mut result = self.clone();
        result.union_with(other);
        result
    }

    /// Returns `self ∩ other`.
    pub fn intersection(&self, other: &StateSet) -> StateSet {
        let mut result = self.clone();
        result.intersect_with(other);
        result
    }

    /// Returns `self \ other`.
    pub fn difference(&self, other: &StateSet) -> StateSet {
        let mut result = self.clone();
        result.difference_with(other);
        result
    }

    /// Returns the complement with respect to the universe.
    pub fn complement(&self) -> StateSet {
        let mut result = StateSet {
            words: self.words.iter().map(|w| !w).collect(),
            universe: self.universe,
            count: self.universe - self.count,
        };
        result.clear_tail();
        result
    }

    /// Returns true if every state of `self` is also in `other`.
    pub fn is_subset(&self, other: &StateSet) -> bool {
        self.words.iter().zip(&other.words).all(|(a, b)| a & !b == 0)
    }

    /// Returns true if the two sets share at least one state.
    pub fn intersects(&self, other: &StateSet) -> bool {
        self.words.iter().zip(&other.words).any(|(a, b)| a & b != 0)
    }

    /// Returns an iterator over the states in ascending order.
    pub fn iter(&self) -> StateSetIter<'_> {
        StateSetIter {
            set: self,
            word_idx: 0,
            current_word: self.words.first().copied().unwrap_or(0),
        }
    }
}

impl fmt::Debug for StateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a StateSet {
    type Item = usize;
    type IntoIter = StateSetIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the states of a [`StateSet`].
pub struct StateSetIter<'a> {
    set: &'a StateSet,
    word_idx: usize,
    current_word: u64,
}

impl Iterator for StateSetIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let bit_idx = self.current_word.trailing_zeros() as usize;
                self.current_word &= self.current_word - 1; // Clear lowest set bit
                return Some(self.word_idx * StateSet::BITS_PER_WORD + bit_idx);
            }

            self.word_idx += 1;
            if self.word_idx >= self.set.words.len() {
                return None;
            }
            self.current_word = self.set.words[self.word_idx];
        }
    }
}
