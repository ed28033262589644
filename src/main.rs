//! Beam-ACO Solver - Command Line Interface
//!
//! Runs the beam-search ant colony engine on a TSP-with-time-windows
//! instance and reports per-trial and aggregate statistics.

use clap::{Parser, ValueEnum};

use beam_aco::instance::{HeuristicWeights, TsptwInstance};
use beam_aco::model::LocalSearchMode;
use beam_aco::search::{SearchConfig, Trace, TrialRunner};

use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "beam-aco")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "Beam-ACO solver for the TSP with time windows")]
struct Cli {
    /// Instance file
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Random seed (default: current UNIX time)
    #[arg(short = 's', long)]
    seed: Option<u64>,

    /// Time limit of each trial in seconds
    #[arg(short = 't', long)]
    time: Option<f64>,

    /// Number of iterations per trial
    #[arg(short = 'n', long)]
    iterations: Option<u64>,

    /// Trace file (default: standard error)
    #[arg(short = 'T', long)]
    trace: Option<PathBuf>,

    /// Number of trials to be run on the instance
    #[arg(short = 'r', long, default_value_t = 1)]
    trials: usize,

    /// Number of ants
    #[arg(short = 'a', long, default_value_t = 1)]
    ants: usize,

    /// Width of the beam search
    #[arg(short = 'b', long, default_value_t = 1)]
    beam_width: usize,

    /// Candidate surplus factor of the beam pruning step
    #[arg(short = 'm', long, default_value_t = 2.0)]
    mu: f64,

    /// Maximum number of children per beam element
    #[arg(long, default_value_t = 100)]
    max_children: usize,

    /// Number of stochastic samples per partial solution
    #[arg(short = 'S', long, default_value_t = 10)]
    samples: usize,

    /// Percentage of positions generated by stochastic sampling
    #[arg(long, default_value_t = 100)]
    sample_rate: u32,

    /// Learning rate used for updating pheromones
    #[arg(long, default_value_t = 0.1)]
    l_rate: f64,

    /// Rate of determinism in the solution construction
    #[arg(long, default_value_t = 0.9)]
    det_rate: f64,

    /// Local search type
    #[arg(long, value_enum, default_value = "none")]
    ls: LsChoice,

    /// Heuristic information weights as travel,latest,earliest
    #[arg(short = 'w', long)]
    weights: Option<String>,

    /// Write the best solution as JSON
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Write per-trial results as CSV
    #[arg(long)]
    results: Option<PathBuf>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum LsChoice {
    /// No local search
    None,
    /// First-improvement descent
    First,
    /// Best-improvement descent
    Best,
}

impl From<LsChoice> for LocalSearchMode {
    fn from(choice: LsChoice) -> Self {
        match choice {
            LsChoice::None => LocalSearchMode::None,
            LsChoice::First => LocalSearchMode::First,
            LsChoice::Best => LocalSearchMode::Best,
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::try_parse().unwrap_or_else(|e| {
        println!("{}", e);
        std::process::exit(1);
    });

    let weights = match &cli.weights {
        Some(text) => HeuristicWeights::parse(text).unwrap_or_else(|e| exit_config_error(&e)),
        None => HeuristicWeights::default(),
    };

    let started = Instant::now();
    let instance =
        TsptwInstance::from_file(&cli.input, weights).unwrap_or_else(|e| exit_config_error(&e));

    let config = SearchConfig {
        n_ants: cli.ants,
        n_trials: cli.trials,
        time_limit: cli.time,
        iteration_limit: cli.iterations,
        learning_rate: cli.l_rate,
        det_rate: cli.det_rate,
        beam_width: cli.beam_width,
        mu: cli.mu,
        max_children: cli.max_children,
        n_samples: cli.samples,
        sample_percent: cli.sample_rate,
        local_search: cli.ls.into(),
        seed: cli
            .seed
            .unwrap_or_else(|| chrono::Utc::now().timestamp() as u64),
        ..SearchConfig::default()
    };
    if let Err(e) = config.validate() {
        exit_config_error(&e);
    }

    print_parameters(&instance, &config);

    let mut trace = match &cli.trace {
        Some(path) => Trace::to_file(path).unwrap_or_else(|e| exit_config_error(&e)),
        None => Trace::stderr(),
    };
    trace.comment(&format!(
        "Initialization time {:.3}",
        started.elapsed().as_secs_f64()
    ));

    let mut runner = TrialRunner::new(&instance, config, trace);
    let report = runner.run().unwrap_or_else(|e| exit_config_error(&e));

    println!("{}", report.summary());

    if let Some(path) = &cli.output {
        let json = serde_json::to_string_pretty(&report.best).unwrap();
        std::fs::write(path, json).expect("Failed to write output");
        println!("Best solution saved to {:?}", path);
    }

    if let Some(path) = &cli.results {
        report
            .export_csv(path)
            .unwrap_or_else(|e| exit_config_error(&e));
        println!("Per-trial results saved to {:?}", path);
    }
}

fn exit_config_error(message: &str) -> ! {
    println!("error: {}", message);
    println!("use --help for usage.");
    std::process::exit(1);
}

fn print_parameters(instance: &TsptwInstance, config: &SearchConfig) {
    println!("# Beam-ACO {}", env!("CARGO_PKG_VERSION"));
    println!(
        "# run started {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    println!("#");
    println!(
        "# instance : {} (n = {}, {})",
        instance.name,
        instance.dimension,
        if instance.symmetric {
            "symmetric"
        } else {
            "asymmetric"
        }
    );
    println!("#");
    println!("# number trials : {}", config.n_trials);
    match config.iteration_limit {
        Some(limit) => println!("# number iterations : {}", limit),
        None => println!("# number iterations : unlimited"),
    }
    match config.time_limit {
        Some(limit) => println!("# time limit : {}", limit),
        None => println!("# time limit : unlimited"),
    }
    println!("# seed : {}", config.seed);
    println!("#");
    println!("# number of ants : {}", config.n_ants);
    println!("# learning rate : {}", config.learning_rate);
    println!("# determinism rate : {}", config.det_rate);
    println!(
        "# heuristic weights : {:.3},{:.3},{:.3}",
        instance.weights.travel, instance.weights.latest, instance.weights.earliest
    );
    println!("# localsearch : {}", config.local_search.as_str());
    println!("#");
    println!("# beam width : {}", config.beam_width);
    println!("# mu : {}", config.mu);
    println!("# maximum children : {}", config.max_children);
    println!("# stochastic samples : {}", config.n_samples);
    println!("# sampling rate : {}%", config.sample_percent);
    println!("#");
    println!();
}
