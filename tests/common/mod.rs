#![allow(dead_code)]

use pmc_rs::model::{Model, ModelBuilder};
use pmc_rs::types::Semantics;

pub const FACES: [&str; 6] = ["one", "two", "three", "four", "five", "six"];

/// Knuth-Yao die: a fair coin simulating a fair six-sided die.
///
/// States 0..=6 are coin-flip states, 7..=12 are the faces 1..=6.
pub fn knuth_die() -> Model {
    let mut builder = ModelBuilder::new(Semantics::Dtmc, 13);
    builder.add_choice(0, [(1, 0.5), (2, 0.5)]);
    builder.add_choice(1, [(3, 0.5), (4, 0.5)]);
    builder.add_choice(2, [(5, 0.5), (6, 0.5)]);
    builder.add_choice(3, [(1, 0.5), (7, 0.5)]);
    builder.add_choice(4, [(8, 0.5), (9, 0.5)]);
    builder.add_choice(5, [(10, 0.5), (11, 0.5)]);
    builder.add_choice(6, [(12, 0.5), (2, 0.5)]);
    for (i, face) in FACES.iter().enumerate() {
        let s = 7 + i;
        builder.add_choice(s, [(s, 1.0)]);
        builder.add_label(face, [s]);
        builder.add_label("done", [s]);
    }
    for s in 0..7 {
        builder.add_state_reward("flips", s, 1.0);
    }
    builder.set_initial([0]);
    builder.build().unwrap()
}

/// s0: a -> {s1: 1/2, s2: 1/2}, b -> {s3}; s3 -> {s0: 1/2, s1: 1/2}.
///
/// s1 is the goal, s2 a trap. Every visit to s0 or s3 costs one step.
pub fn choice_mdp() -> Model {
    let mut builder = ModelBuilder::new(Semantics::Mdp, 4);
    builder.add_choice(0, [(1, 0.5), (2, 0.5)]);
    builder.add_choice(0, [(3, 1.0)]);
    builder.add_choice(1, [(1, 1.0)]);
    builder.add_choice(2, [(2, 1.0)]);
    builder.add_choice(3, [(0, 0.5), (1, 0.5)]);
    builder.add_label("goal", [1]);
    builder.add_label("trap", [2]);
    builder.add_state_reward("steps", 0, 1.0);
    builder.add_state_reward("steps", 3, 1.0);
    builder.set_initial([0]);
    builder.build().unwrap()
}

/// Two-state CTMC: down (s0) fails over to up (s1) at rate `lambda`, back at rate `mu`.
pub fn two_state(lambda: f64, mu: f64) -> Model {
    let mut builder = ModelBuilder::new(Semantics::Ctmc, 2);
    builder.add_choice(0, [(1, lambda)]);
    builder.add_choice(1, [(0, mu)]);
    builder.add_label("down", [0]);
    builder.add_label("up", [1]);
    builder.add_state_reward("uptime", 1, 1.0);
    builder.add_transition_reward("repairs", 1, 0, 0, 1.0);
    builder.set_initial([0]);
    builder.build().unwrap()
}

/// A transient state s2 entering either a period-2 cycle {s0, s1} or the sink s3.
pub fn periodic() -> Model {
    let mut builder = ModelBuilder::new(Semantics::Dtmc, 4);
    builder.add_choice(0, [(1, 1.0)]);
    builder.add_choice(1, [(0, 1.0)]);
    builder.add_choice(2, [(0, 0.5), (3, 0.5)]);
    builder.add_choice(3, [(3, 1.0)]);
    builder.add_label("zero", [0]);
    builder.add_label("sink", [3]);
    builder.set_initial([2]);
    builder.build().unwrap()
}

pub fn close(actual: f64, expected: f64, eps: f64) -> bool {
    (actual - expected).abs() <= eps
}
