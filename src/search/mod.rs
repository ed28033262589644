//! The search engine: pheromone learning, construction, convergence
//! control and trial orchestration.

pub mod beam;
pub mod convergence;
pub mod greedy;
pub mod orchestrator;
pub mod pheromone;
pub mod trace;

pub use beam::BeamSearch;
pub use convergence::{ControlAction, ConvergenceController, TrailWeights};
pub use orchestrator::{SearchConfig, TrialRunner};
pub use pheromone::{DepositMatrix, PheromoneMatrix};
pub use trace::Trace;
