use clap::{Parser, ValueEnum};

use pmc_rs::checker::evaluate;
use pmc_rs::config::{Config, IterationMethod};
use pmc_rs::model::{Model, ModelBuilder};
use pmc_rs::query::{PathFormula, Query, RewardKind, StateFormula, TimeBound};
use pmc_rs::types::Semantics;

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Method {
    Jacobi,
    GaussSeidel,
}

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Convergence tolerance.
    #[arg(long, value_name = "FLOAT", default_value = "1e-10")]
    tolerance: f64,

    /// Iteration method for unbounded properties.
    #[arg(long, value_enum, default_value = "gauss-seidel")]
    method: Method,

    /// Iteration cap.
    #[arg(long, value_name = "INT", default_value = "100000")]
    max_iterations: usize,

    /// Step bound for the bounded reachability query.
    #[arg(long, value_name = "INT", default_value = "3")]
    steps: usize,
}

const FACES: [&str; 6] = ["one", "two", "three", "four", "five", "six"];

/// Knuth-Yao die: a fair coin drives a 7-state tree whose leaves are the six faces.
fn knuth_die() -> pmc_rs::error::Result<Model> {
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
    builder.build()
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let config = Config::default()
        .with_tolerance(args.tolerance)
        .with_max_iterations(args.max_iterations)
        .with_method(match args.method {
            Method::Jacobi => IterationMethod::Jacobi,
            Method::GaussSeidel => IterationMethod::GaussSeidel,
        });
    println!("config = {:?}", config);

    let model = knuth_die()?;
    println!("model = {:?}", model);

    let mut queries: Vec<Query> = FACES
        .iter()
        .map(|face| Query::new(StateFormula::prob(None, PathFormula::finally(StateFormula::label(face)))))
        .collect();
    queries.push(Query::new(StateFormula::prob(
        None,
        PathFormula::finally_bounded(StateFormula::label("one"), TimeBound::upto(args.steps as f64)),
    )));
    queries.push(Query::new(StateFormula::reward(
        "flips",
        None,
        RewardKind::reachability(StateFormula::label("done")),
    )));

    for query in &queries {
        let result = evaluate(&model, query, &config)?;
        println!(
            "{} = {} ({} iterations, residual {:e})",
            query, result.verdict, result.statistics.iterations, result.statistics.residual
        );
    }

    let time_total = time_total.elapsed();
    println!("Total time: {:.3} s", time_total.as_secs_f64());

    Ok(())
}
