//! Truncated Poisson probabilities for uniformization.
//!
//! Transient analysis of a CTMC with uniformization rate `q` up to time `t`
//! needs the Poisson probabilities `ψ(i) = e^{-λ} λ^i / i!` with `λ = q·t`.
//! Only a window `[left, right]` around the mode carries relevant mass; the
//! window is chosen so that each discarded tail is at most `ε/2`.
//!
//! The probabilities are computed outward from the mode with the recurrences
//! `ψ(i+1) = ψ(i)·λ/(i+1)` and `ψ(i-1) = ψ(i)·i/λ`, starting from `ψ(mode)`
//! evaluated in log space, so neither overflow nor underflow occurs for large
//! `λ`. Tails are bounded by geometric series, which is valid because the
//! ratio of neighbouring terms is below 1 on both sides of the mode.

use log::{debug, warn};

/// Window sizes beyond this are logged as suspicious.
const LARGE_WINDOW: usize = 10_000_000;

/// Poisson probabilities on a truncation window.
#[derive(Debug, Clone)]
pub struct PoissonWeights {
    left: usize,
    right: usize,
    weights: Vec<f64>,
    truncation_error: f64,
}

impl PoissonWeights {
    /// Computes the window for rate `lambda` with total truncated mass at most `epsilon`.
    pub fn new(lambda: f64, epsilon: f64) -> Self {
        if lambda <= 0.0 {
            return Self {
                left: 0,
                right: 0,
                weights: vec![1.0],
                truncation_error: 0.0,
            };
        }
        let half = epsilon / 2.0;
        let mode = lambda.floor() as usize;
        let ln_mode = -lambda + mode as f64 * lambda.ln() - ln_factorial(mode);
        let mode_weight = ln_mode.exp();

        let mut upper = Vec::new();
        let mut weight = mode_weight;
        let mut i = mode;
        loop {
            let ratio = lambda / (i + 1) as f64;
            if ratio < 1.0 && weight * ratio / (1.0 - ratio) <= half {
                break;
            }
            weight *= ratio;
            i += 1;
            upper.push(weight);
        }
        let right = i;

        let mut lower = Vec::new();
        weight = mode_weight;
        i = mode;
        while i > 0 {
            let ratio = i as f64 / lambda;
            if ratio < 1.0 && weight * ratio / (1.0 - ratio) <= half {
                break;
            }
            weight *= ratio;
            i -= 1;
            lower.push(weight);
        }
        let left = i;

        let mut weights = Vec::with_capacity(lower.len() + 1 + upper.len());
        weights.extend(lower.into_iter().rev());
        weights.push(mode_weight);
        weights.extend(upper);

        let total: f64 = weights.iter().sum();
        let truncation_error = (1.0 - total).max(0.0);

        debug!(
            "Poisson window for lambda = {}: [{}, {}], truncated mass {:e}",
            lambda, left, right, truncation_error
        );
        if right - left > LARGE_WINDOW {
            warn!("Poisson window of {} terms for lambda = {}", right - left + 1, lambda);
        }

        Self {
            left,
            right,
            weights,
            truncation_error,
        }
    }

    /// First index with non-negligible weight.
    pub fn left(&self) -> usize {
        self.left
    }

    /// Last index with non-negligible weight.
    pub fn right(&self) -> usize {
        self.right
    }

    /// Probability mass outside the window.
    pub fn truncation_error(&self) -> f64 {
        self.truncation_error
    }

    /// `ψ(i)`, zero outside the window.
    pub fn weight(&self, i: usize) -> f64 {
        if i < self.left || i > self.right {
            0.0
        } else {
            self.weights[i - self.left]
        }
    }

    /// Iterates over `(i, ψ(i))` inside the window.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        let left = self.left;
        self.weights.iter().enumerate().map(move |(k, &w)| (left + k, w))
    }
}

fn ln_factorial(n: usize) -> f64 {
    (2..=n).map(|k| (k as f64).ln()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn test_zero_rate() {
        let poisson = PoissonWeights::new(0.0, 1e-10);
        assert_eq!(poisson.left(), 0);
        assert_eq!(poisson.right(), 0);
        assert_eq!(poisson.weight(0), 1.0);
        assert_eq!(poisson.weight(1), 0.0);
        assert_eq!(poisson.truncation_error(), 0.0);
    }

    #[test]
    fn test_small_rate_matches_closed_form() {
        let lambda: f64 = 2.0;
        let poisson = PoissonWeights::new(lambda, 1e-12);
        let e = (-lambda).exp();
        assert_eq!(poisson.left(), 0);
        assert!((poisson.weight(0) - e).abs() < 1e-15);
        assert!((poisson.weight(1) - 2.0 * e).abs() < 1e-15);
        assert!((poisson.weight(3) - 8.0 / 6.0 * e).abs() < 1e-15);
        assert!(poisson.truncation_error() <= 1e-12);
        let total: f64 = poisson.iter().map(|(_, w)| w).sum();
        assert!((total + poisson.truncation_error() - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_large_rate_window() {
        let lambda = 1000.0;
        let poisson = PoissonWeights::new(lambda, 1e-10);
        assert!(poisson.left() > 700);
        assert!(poisson.right() < 1300);
        let peak = poisson.weight(1000);
        assert!((peak - 0.012_6).abs() < 1e-3);
        assert!(poisson.truncation_error() <= 1e-10);
    }
}
