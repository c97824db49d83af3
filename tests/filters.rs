mod common;

use pmc_rs::bitset::StateSet;
use pmc_rs::checker::evaluate;
use pmc_rs::config::Config;
use pmc_rs::error::Error;
use pmc_rs::filter::FilterKind;
use pmc_rs::model::Model;
use pmc_rs::query::{PathFormula, Query, StateFormula};
use pmc_rs::types::Comparison;
use pmc_rs::values::Verdict;
use test_log::test;

use common::{close, knuth_die};

fn verdict(model: &Model, formula: StateFormula) -> Verdict {
    evaluate(model, &Query::new(formula), &Config::default()).unwrap().verdict
}

fn reach(label: &str) -> StateFormula {
    StateFormula::prob(None, PathFormula::finally(StateFormula::label(label)))
}

fn coin_states() -> StateFormula {
    StateFormula::not(StateFormula::label("done"))
}

#[test]
fn test_forall_and_exists() {
    let model = knuth_die();
    let terminates = StateFormula::prob_bounded(None, Comparison::Ge, 1.0, PathFormula::finally(StateFormula::label("done")));
    assert_eq!(
        verdict(&model, StateFormula::filter(FilterKind::Forall, terminates, StateFormula::True)),
        Verdict::Bool(true)
    );

    let certain_one = StateFormula::prob_bounded(None, Comparison::Ge, 1.0, PathFormula::finally(StateFormula::label("one")));
    assert_eq!(
        verdict(&model, StateFormula::filter(FilterKind::Forall, certain_one.clone(), coin_states())),
        Verdict::Bool(false)
    );
    assert_eq!(
        verdict(&model, StateFormula::filter(FilterKind::Exists, certain_one, StateFormula::True)),
        Verdict::Bool(true)
    );
}

#[test]
fn test_implication_inside_forall() {
    let model = knuth_die();
    let formula = StateFormula::implies(
        StateFormula::label("init"),
        StateFormula::prob_bounded(None, Comparison::Ge, 1.0, PathFormula::finally(StateFormula::label("done"))),
    );
    assert_eq!(
        verdict(&model, StateFormula::filter(FilterKind::Forall, formula, StateFormula::True)),
        Verdict::Bool(true)
    );
}

#[test]
fn test_numeric_aggregates() {
    let model = knuth_die();
    let count = verdict(&model, StateFormula::filter(FilterKind::Count, StateFormula::label("done"), StateFormula::True));
    assert_eq!(count, Verdict::Real(6.0));

    let sum = verdict(&model, StateFormula::filter(FilterKind::Sum, reach("one"), StateFormula::label("done")));
    assert_eq!(sum, Verdict::Real(1.0));

    let avg = verdict(&model, StateFormula::filter(FilterKind::Avg, reach("one"), StateFormula::label("done")));
    assert!(close(avg.as_real().unwrap(), 1.0 / 6.0, 1e-12));

    let first = verdict(&model, StateFormula::filter(FilterKind::First, reach("one"), StateFormula::True));
    assert!(close(first.as_real().unwrap(), 1.0 / 6.0, 1e-8));

    let face = verdict(&model, StateFormula::filter(FilterKind::State, reach("one"), StateFormula::label("six")));
    assert_eq!(face, Verdict::Real(0.0));
}

#[test]
fn test_range_and_argmax() {
    let model = knuth_die();
    match verdict(&model, StateFormula::filter(FilterKind::Range, reach("one"), coin_states())) {
        Verdict::Interval { low, high } => {
            assert_eq!(low, 0.0);
            assert!(close(high, 2.0 / 3.0, 1e-8));
        }
        other => panic!("expected an interval, got {}", other),
    }

    let argmax = verdict(&model, StateFormula::filter(FilterKind::Argmax, reach("one"), coin_states()));
    assert_eq!(argmax, Verdict::States(StateSet::from_states(13, [3])));
}

#[test]
fn test_nested_filters() {
    let model = knuth_die();
    let everywhere = StateFormula::filter(
        FilterKind::Forall,
        StateFormula::prob_bounded(None, Comparison::Ge, 1.0, PathFormula::finally(StateFormula::label("done"))),
        StateFormula::True,
    );
    let formula = StateFormula::filter(
        FilterKind::Exists,
        StateFormula::and(everywhere, StateFormula::label("one")),
        StateFormula::True,
    );
    assert_eq!(verdict(&model, formula), Verdict::Bool(true));

    let range = StateFormula::filter(FilterKind::Range, reach("one"), StateFormula::True);
    let nested = StateFormula::filter(FilterKind::Max, range, StateFormula::True);
    assert!(matches!(
        evaluate(&model, &Query::new(nested), &Config::default()),
        Err(Error::InvalidQuery(_))
    ));
}

#[test]
fn test_forall_over_boolean_is_idempotent() {
    let model = knuth_die();
    let inner = StateFormula::filter(FilterKind::Forall, StateFormula::label("done"), StateFormula::label("six"));
    let outer = StateFormula::filter(FilterKind::Forall, inner.clone(), StateFormula::True);
    assert_eq!(verdict(&model, inner), verdict(&model, outer));
}

#[test]
fn test_state_filter_needs_exactly_one_state() {
    let model = knuth_die();
    let formula = StateFormula::filter(FilterKind::State, reach("one"), StateFormula::label("done"));
    assert!(matches!(
        evaluate(&model, &Query::new(formula), &Config::default()),
        Err(Error::InvalidQuery(_))
    ));
}
