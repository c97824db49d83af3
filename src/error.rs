//! Typed failures of model construction and query evaluation.

use thiserror::Error;

use crate::checker::Evaluation;
use crate::types::State;

/// Everything that can go wrong while building a model or evaluating a query.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unsupported query: {0}")]
    Unsupported(String),

    /// The iteration cap was hit. The best value at cutoff is carried along.
    #[error("Did not converge after {iterations} iterations (residual {residual:e})")]
    NotConverged {
        iterations: usize,
        residual: f64,
        approximation: Box<Evaluation>,
    },

    #[error("Resource exhausted: could not allocate {requested} bytes")]
    ResourceExhausted { requested: usize },

    #[error("Malformed model: {0}")]
    MalformedModel(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Unknown label \"{0}\"")]
    UnknownLabel(String),

    #[error("Unknown reward structure \"{0}\"")]
    UnknownReward(String),

    #[error("Numerical defect at state {state}: value {value}")]
    NumericalDefect { state: State, value: f64 },
}

pub type Result<T> = std::result::Result<T, Error>;
