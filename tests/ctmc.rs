mod common;

use pmc_rs::checker::evaluate;
use pmc_rs::config::Config;
use pmc_rs::model::Model;
use pmc_rs::query::{Aggregate, PathFormula, Query, RewardKind, StateFormula, TimeBound};
use test_log::test;

use common::{close, two_state};

const LAMBDA: f64 = 2.0;
const MU: f64 = 3.0;

fn value(model: &Model, query: Query) -> f64 {
    evaluate(model, &query, &Config::default())
        .unwrap()
        .verdict
        .as_real()
        .unwrap()
}

fn up_within(bound: TimeBound) -> Query {
    Query::new(StateFormula::prob(
        None,
        PathFormula::finally_bounded(StateFormula::label("up"), bound),
    ))
}

#[test]
fn test_time_bounded_reachability() {
    let model = two_state(LAMBDA, MU);
    for t in [0.1, 0.5, 2.0] {
        let result = evaluate(&model, &up_within(TimeBound::upto(t)), &Config::default()).unwrap();
        let expected = 1.0 - f64::exp(-LAMBDA * t);
        assert!(close(result.verdict.as_real().unwrap(), expected, 1e-8), "t = {}", t);
        assert!(result.statistics.truncation_error <= Config::default().tolerance);
    }
    assert_eq!(value(&model, up_within(TimeBound::upto(0.0))), 0.0);
    assert_eq!(value(&model, up_within(TimeBound::unbounded())), 1.0);
}

#[test]
fn test_transient_probability_at_time_point() {
    let model = two_state(LAMBDA, MU);
    let t = 0.4;
    let expected = LAMBDA / (LAMBDA + MU) * (1.0 - f64::exp(-(LAMBDA + MU) * t));
    assert!(close(value(&model, up_within(TimeBound::at(t))), expected, 1e-8));
}

#[test]
fn test_steady_state() {
    let model = two_state(LAMBDA, MU);
    let query = Query::new(StateFormula::steady(None, StateFormula::label("up")));
    assert!(close(value(&model, query), LAMBDA / (LAMBDA + MU), 1e-9));
}

#[test]
fn test_rewards() {
    let model = two_state(LAMBDA, MU);
    let t = 1.5;
    let sum = LAMBDA + MU;

    let cumulative = Query::new(StateFormula::reward("uptime", None, RewardKind::Cumulative(Some(t))));
    let expected = LAMBDA / sum * (t - (1.0 - f64::exp(-sum * t)) / sum);
    assert!(close(value(&model, cumulative), expected, 1e-8));

    let instantaneous = Query::new(StateFormula::reward("uptime", None, RewardKind::Instantaneous(t)));
    let expected = LAMBDA / sum * (1.0 - f64::exp(-sum * t));
    assert!(close(value(&model, instantaneous), expected, 1e-8));

    let long_run = Query::new(StateFormula::reward("uptime", None, RewardKind::LongRun));
    assert!(close(value(&model, long_run), LAMBDA / sum, 1e-9));

    // One repair per visit to the up state, which is left at rate mu.
    let repairs = Query::new(StateFormula::reward("repairs", None, RewardKind::LongRun));
    assert!(close(value(&model, repairs), LAMBDA * MU / sum, 1e-9));
}

#[test]
fn test_sojourn_time_reward() {
    let model = two_state(LAMBDA, MU);
    let query = Query::new(StateFormula::reward(
        "uptime",
        None,
        RewardKind::reachability(StateFormula::label("down")),
    ))
    .restrict(StateFormula::label("up"), Aggregate::Max);
    assert!(close(value(&model, query), 1.0 / MU, 1e-12));
}
