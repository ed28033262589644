//! Convergence measurement and restart control.
//!
//! The controller tracks how close the pheromone trails are to their
//! bounds and steers the update: early on the iteration best drives the
//! deposit, later the restart best, and once the colony has converged the
//! best-so-far solution takes over for one more cycle before a restart is
//! allowed.

use crate::search::pheromone::PheromoneMatrix;
use log::{debug, info};

/// Deposit weights of the three reference orderings. Always sums to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailWeights {
    pub iteration_best: f64,
    pub restart_best: f64,
    pub best_so_far: f64,
}

impl TrailWeights {
    pub fn sum(&self) -> f64 {
        self.iteration_best + self.restart_best + self.best_so_far
    }
}

/// Outcome of one control decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlAction {
    /// Reset the pheromone matrix; no deposit this iteration.
    Restart,
    /// Deposit with the given weights.
    Deposit(TrailWeights),
}

/// Per-trial control state: whether best-so-far currently drives the
/// deposit, and whether a restart has just been triggered.
#[derive(Debug, Default)]
pub struct ConvergenceController {
    bs_update: bool,
    restart: bool,
}

impl ConvergenceController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear both flags at the start of a trial.
    pub fn begin_trial(&mut self) {
        self.bs_update = false;
        self.restart = false;
    }

    /// Scalar in [-1, 1] summarizing trail saturation: 0 when every trail
    /// sits at the bound midpoint, approaching 1 as trails saturate to
    /// either bound.
    pub fn convergence_factor(pheromone: &PheromoneMatrix) -> f64 {
        let n = pheromone.n();
        let tau_min = pheromone.tau_min();
        let tau_max = pheromone.tau_max();

        let mut sum = 0.0;
        for i in 0..n {
            for j in 0..n {
                let value = pheromone.get(i, j);
                sum += f64::max(tau_max - value, value - tau_min);
            }
        }
        let ratio = sum / ((n * n) as f64 * (tau_max - tau_min));
        (ratio - 0.5) * 2.0
    }

    /// Deposit weights for (iteration best, restart best, best so far) as
    /// a function of the convergence factor. Influence shifts from the
    /// noisiest signal toward the most stable one as the colony converges.
    pub fn weights_for(bs_update: bool, cf: f64) -> TrailWeights {
        if bs_update {
            return TrailWeights {
                iteration_best: 0.0,
                restart_best: 0.0,
                best_so_far: 1.0,
            };
        }
        if cf < 0.4 {
            TrailWeights {
                iteration_best: 1.0,
                restart_best: 0.0,
                best_so_far: 0.0,
            }
        } else if cf < 0.6 {
            TrailWeights {
                iteration_best: 2.0 / 3.0,
                restart_best: 1.0 / 3.0,
                best_so_far: 0.0,
            }
        } else if cf < 0.8 {
            TrailWeights {
                iteration_best: 1.0 / 3.0,
                restart_best: 2.0 / 3.0,
                best_so_far: 0.0,
            }
        } else {
            TrailWeights {
                iteration_best: 0.0,
                restart_best: 1.0,
                best_so_far: 0.0,
            }
        }
    }

    /// One control step. A restart only fires after a full best-so-far
    /// update cycle: the first time cf exceeds 0.99 the controller merely
    /// switches the deposit to best-so-far; a later converged check
    /// triggers the restart itself.
    pub fn decide(&mut self, cf: f64) -> ControlAction {
        debug!("cf: {:.4}", cf);
        if self.bs_update && cf > 0.99 {
            self.bs_update = false;
            self.restart = true;
            info!("convergence factor {:.4}: restarting", cf);
            return ControlAction::Restart;
        }
        if cf > 0.99 {
            self.bs_update = true;
        }
        ControlAction::Deposit(Self::weights_for(self.bs_update, cf))
    }

    /// Whether the previous decision triggered a restart.
    pub fn restart_pending(&self) -> bool {
        self.restart
    }

    /// Acknowledge a pending restart during iteration bookkeeping.
    pub fn clear_restart(&mut self) {
        self.restart = false;
    }
}
