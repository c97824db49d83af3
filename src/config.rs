//! Solver configuration.
//!
//! A [`Config`] is an immutable value passed by reference into every
//! evaluation. Nothing in the crate reads process-wide settings, so queries
//! with different configurations can run side by side.
//!
//! # Examples
//!
//! ```
//! use pmc_rs::config::{Config, IterationMethod, StopCriterion};
//!
//! let config = Config::default()
//!     .with_tolerance(1e-8)
//!     .with_stop_criterion(StopCriterion::Relative)
//!     .with_method(IterationMethod::Jacobi)
//!     .with_max_iterations(10_000);
//! assert_eq!(config.max_iterations, 10_000);
//! ```

/// How the distance between two successive iterates is measured.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum StopCriterion {
    /// Largest component-wise difference.
    #[default]
    Absolute,
    /// Largest component-wise difference divided by the previous value (when non-zero).
    Relative,
}

/// Update scheme of the value iteration.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum IterationMethod {
    /// Every state reads the previous iterate.
    Jacobi,
    /// States read values already updated in the current sweep.
    #[default]
    GaussSeidel,
}

/// Rule that picks among equally good choices of an MDP state.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum TieBreak {
    #[default]
    LowestIndex,
}

/// Configuration of the numerical engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Precision of iterative solves and truncation bound of Poisson series (default: 1e-10)
    pub tolerance: f64,
    /// Distance measure used for convergence detection (default: absolute)
    pub stop_criterion: StopCriterion,
    /// Hard cap on sweeps of any single iterative solve (default: 100000)
    pub max_iterations: usize,
    /// Jacobi or Gauss-Seidel updates (default: Gauss-Seidel)
    pub method: IterationMethod,
    /// Tie-break policy for the scheduler resolver (default: lowest index)
    pub tie_break: TieBreak,
    /// Upper bound in bytes for a single numeric vector: values, rewards and iterates (default: none).
    /// Bookkeeping of the graph algorithms is not counted.
    pub memory_limit: Option<usize>,
    /// Whether to materialise a witness scheduler for MDP queries (default: false)
    pub compute_scheduler: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            stop_criterion: StopCriterion::Absolute,
            max_iterations: 100_000,
            method: IterationMethod::GaussSeidel,
            tie_break: TieBreak::LowestIndex,
            memory_limit: None,
            compute_scheduler: false,
        }
    }
}

impl Config {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_stop_criterion(mut self, stop_criterion: StopCriterion) -> Self {
        self.stop_criterion = stop_criterion;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_method(mut self, method: IterationMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Limits every numeric vector to `bytes` bytes.
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    pub fn with_scheduler(mut self, compute_scheduler: bool) -> Self {
        self.compute_scheduler = compute_scheduler;
        self
    }
}
