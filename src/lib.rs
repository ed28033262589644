//! Beam-ACO Solver Library
//!
//! An ant-colony optimization engine for permutation problems that
//! combines pheromone learning with beam-search construction, stochastic
//! look-ahead sampling and convergence-driven restarts.
//!
//! # Features
//!
//! - Bounded pheromone model with a convex-blend update rule
//! - Randomized greedy and beam-search solution construction
//! - Monte-Carlo look-ahead ranking of partial orderings
//! - Adaptive deposit weighting and hysteretic restart control
//! - Generic over a problem-model contract; a TSP-with-time-windows
//!   model is included
//!
//! # Example
//!
//! ```no_run
//! use beam_aco::instance::{HeuristicWeights, TsptwInstance};
//! use beam_aco::search::{SearchConfig, Trace, TrialRunner};
//!
//! // Load instance
//! let instance =
//!     TsptwInstance::from_file("instance.txt", HeuristicWeights::default()).unwrap();
//!
//! // Configure and run the search
//! let config = SearchConfig {
//!     iteration_limit: Some(500),
//!     beam_width: 5,
//!     ..SearchConfig::default()
//! };
//! let mut runner = TrialRunner::new(&instance, config, Trace::stderr());
//! let report = runner.run().unwrap();
//!
//! println!("Best cost: {:.2}", report.best.cost);
//! ```

pub mod instance;
pub mod local_search;
pub mod model;
pub mod report;
pub mod search;
pub mod solution;

pub use instance::TsptwInstance;
pub use model::{Evaluated, LocalSearchMode, ProblemModel};
pub use report::RunReport;
pub use search::{SearchConfig, TrialRunner};
pub use solution::Tour;
