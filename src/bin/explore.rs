//! Explore Binary
//!
//! A small CLI front-end over the inference engine: pick a demo program and
//! a strategy, run it, and print the resulting marginal.

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use colored::Colorize;

use ppl_infer::*;

#[derive(Parser)]
#[command(author, version, about = "Explore the probabilistic inference runtime", long_about = None)]
struct Cli {
    #[command(subcommand)]
    strategy: Strategy,

    #[arg(long, value_enum, default_value_t = Program::TwoCoins, help = "which demo program to run")]
    program: Program,

    #[arg(long, help = "seed the shared PRNG for a reproducible run")]
    seed: Option<u64>,

    #[arg(long, value_enum, default_value_t = Verbosity::Warn)]
    verbosity: Verbosity,
}

#[derive(Subcommand)]
enum Strategy {
    #[command(about = "Draw a single prior sample, rejecting any factor", alias = "fwd")]
    Forward {
        #[arg(long, default_value_t = 1, help = "repeat the draw this many times and print an empirical summary")]
        repeat: usize,
    },
    #[command(about = "Exhaustively enumerate the discrete support", alias = "enum")]
    Enumerate {
        #[arg(long, value_enum, default_value_t = Discipline::LikelyFirst)]
        discipline: Discipline,
        #[arg(long, default_value_t = 1000)]
        max_executions: usize,
    },
    #[command(about = "Run a sequential-importance-resampling particle filter", alias = "pf")]
    Particles {
        #[arg(long, default_value_t = 1000)]
        n: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Program {
    /// spec.md §8 scenario 2: two independent fair coins, conditioned equal.
    TwoCoins,
    /// spec.md §8 scenario 3: a 3-sided die weighted by its own face value.
    WeightedDie,
    /// spec.md §8 scenario 1: a single biased coin (forward sampling only).
    Bernoulli,
}

#[derive(Clone, Copy, ValueEnum)]
enum Verbosity {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<Verbosity> for log::LevelFilter {
    fn from(v: Verbosity) -> Self {
        match v {
            Verbosity::Error => log::LevelFilter::Error,
            Verbosity::Warn => log::LevelFilter::Warn,
            Verbosity::Info => log::LevelFilter::Info,
            Verbosity::Debug => log::LevelFilter::Debug,
            Verbosity::Trace => log::LevelFilter::Trace,
        }
    }
}

impl Program {
    fn entry(self) -> Entry {
        match self {
            Program::TwoCoins => two_coins(),
            Program::WeightedDie => weighted_die(),
            Program::Bernoulli => biased_coin(),
        }
    }
}

/// `sample(v1 <- Bernoulli[0.5]). sample(v2 <- Bernoulli[0.5]). factor(log(1)
/// if v1==v2 else log(0)). exit([v1, v2])` — spec.md §8 scenario 2.
fn two_coins() -> Entry {
    std::rc::Rc::new(move || {
        let b1 = erps::bernoulli_erp();
        sample_step(b1, vec![Value::Real(0.5)], move |v1| {
            let b2 = erps::bernoulli_erp();
            sample_step(b2, vec![Value::Real(0.5)], move |v2| {
                let log_weight = if v1 == v2 { 0.0 } else { f64::NEG_INFINITY };
                let v1 = v1.clone();
                factor_step(log_weight, move |_| exit_step(Value::Tuple(vec![v1.clone(), v2.clone()])))
            })
        })
    })
}

/// `sample(i <- RandomInteger[3]). factor(i). exit(i)` — spec.md §8 scenario 3.
fn weighted_die() -> Entry {
    std::rc::Rc::new(move || {
        let dist = erps::random_integer_erp();
        sample_step(dist, vec![Value::Int(3)], |i| {
            let weight = i.as_int().unwrap() as f64;
            factor_step(weight, move |_| exit_step(i.clone()))
        })
    })
}

/// `exit(Bernoulli.sample([0.7]))` — spec.md §8 scenario 1, a forward-only
/// program (no factor: enumeration/particle-filter would just run it once
/// with no bookkeeping).
fn biased_coin() -> Entry {
    std::rc::Rc::new(move || sample_step(erps::bernoulli_erp(), vec![Value::Real(0.7)], exit_step))
}

fn print_marginal(marginal: &Marginal) {
    for (value, probability) in marginal.probabilities() {
        let label = format!("{:<24}", value.to_string());
        println!("  {} {:.6}", label.cyan(), probability);
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    ppl_infer::init_logging(cli.verbosity.into());
    if let Some(seed) = cli.seed {
        rng::seed(seed);
    }

    match cli.strategy {
        Strategy::Forward { repeat } if repeat > 1 => {
            let samples = ppl_infer::repeat(repeat, || forward(cli.program.entry()).map(|delta| delta.value().clone()));
            let samples: Result<Vec<Value>, InferenceError> = samples.into_iter().collect();
            let samples = samples?;
            let true_count = samples.iter().filter(|v| v.as_bool() == Some(true)).count();
            println!("{}", format!("forward sampling, {repeat} draws").bold());
            println!("  empirical P(true) = {:.4}", true_count as f64 / repeat as f64);
        }
        Strategy::Forward { .. } => {
            let delta = forward(cli.program.entry())?;
            println!("{}", "forward sampling, 1 draw".bold());
            println!("  value = {}", delta.value());
        }
        Strategy::Enumerate { discipline, max_executions } => {
            let marginal = enumerate(cli.program.entry(), discipline, max_executions)?;
            println!("{}", "enumeration".bold());
            print_marginal(&marginal);
        }
        Strategy::Particles { n } => {
            let marginal = particle_filter(cli.program.entry(), n)?;
            println!("{}", format!("particle filter, N={n}").bold());
            print_marginal(&marginal);
        }
    }
    Ok(())
}
