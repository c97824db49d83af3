//! # pmc-rs: Explicit-State Probabilistic Model Checking in Rust
//!
//! **`pmc-rs`** evaluates quantitative and qualitative temporal-probabilistic queries over
//! finite-state stochastic models: discrete-time Markov chains (DTMCs), continuous-time Markov
//! chains (CTMCs) and Markov decision processes (MDPs).
//!
//! ## What does it compute?
//!
//! - **Reachability probabilities**, unbounded or bounded by steps, time or an interval.
//!   On MDPs these are optimised (`min`/`max`) over all schedulers.
//! - **Expected rewards**: accumulated until a target, total over the whole run, cumulative
//!   up to a bound (optionally discounted), instantaneous at a bound, and long-run averages.
//! - **Steady-state probabilities** of Markov chains via BSCC decomposition.
//! - **Filters** such as `forall`, `exists`, `min`, `max` or `range` over a subset of states.
//!
//! ## Key Features
//!
//! - **Graph precomputation first**: the Prob0/Prob1 algorithms decide every state whose value is
//!   exactly 0 or 1, so value iteration only runs on the undecided states.
//! - **Explicit configuration**: tolerance, stop criterion, iteration cap, Jacobi or Gauss-Seidel,
//!   tie-breaking and a memory limit all live in one [`Config`][crate::config::Config] value.
//!   There is no global state, so independent queries can run on separate threads over a shared model.
//! - **Honest numerics**: results carry iteration counts, residuals and the Poisson truncation error
//!   separately. Hitting the iteration cap yields [`Error::NotConverged`][crate::error::Error::NotConverged]
//!   with the best approximation attached, never a silently wrong number.
//!
//! ## Basic Usage
//!
//! ```rust
//! use pmc_rs::checker::evaluate;
//! use pmc_rs::config::Config;
//! use pmc_rs::model::ModelBuilder;
//! use pmc_rs::query::{PathFormula, Query, StateFormula};
//! use pmc_rs::types::{Direction, Semantics};
//!
//! // 1. Build a model: in s0 either gamble (1/2 win, 1/2 lose) or wait.
//! let mut builder = ModelBuilder::new(Semantics::Mdp, 3);
//! builder.add_choice(0, [(1, 0.5), (2, 0.5)]);
//! builder.add_choice(0, [(0, 1.0)]);
//! builder.add_choice(1, [(1, 1.0)]);
//! builder.add_choice(2, [(2, 1.0)]);
//! builder.add_label("win", [1]);
//! builder.set_initial([0]);
//! let model = builder.build()?;
//!
//! // 2. Ask for the best and worst chance of winning.
//! let win = || PathFormula::finally(StateFormula::label("win"));
//! let config = Config::default();
//! let best = evaluate(&model, &Query::new(StateFormula::prob(Some(Direction::Max), win())), &config)?;
//! let worst = evaluate(&model, &Query::new(StateFormula::prob(Some(Direction::Min), win())), &config)?;
//!
//! assert_eq!(best.verdict.as_real(), Some(0.5));
//! assert_eq!(worst.verdict.as_real(), Some(0.0));
//! # Ok::<(), pmc_rs::error::Error>(())
//! ```
//!
//! ## Core Components
//!
//! - **[`model`]**: the immutable transition structure and its [`ModelBuilder`][crate::model::ModelBuilder].
//! - **[`precompute`]**: qualitative Prob0/Prob1 analysis.
//! - **[`solver`]**: value iteration with pluggable update rules.
//! - **[`bounded`]**, **[`reward`]**, **[`steady`]**: the specialised evaluators.
//! - **[`checker`]**: the query dispatcher and the [`evaluate`][crate::checker::evaluate] entry point.

pub mod bitset;
pub mod bounded;
pub mod checker;
pub mod components;
pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod poisson;
pub mod precompute;
pub mod query;
pub mod reward;
pub mod scheduler;
pub mod solver;
pub mod steady;
pub mod types;
pub mod values;
