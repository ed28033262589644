//! Per-trial results and aggregate run statistics.
//!
//! Collects one row per trial and summarizes a run: overall best
//! solution, mean and sample standard deviation of the per-trial best
//! costs, violation counts and discovery times.

use crate::model::Evaluated;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::path::Path;

/// Outcome of one trial.
#[derive(Debug, Clone, Serialize)]
pub struct TrialResult {
    /// 1-based trial index.
    pub trial: usize,
    /// Cost of the trial's best solution.
    pub best_cost: f64,
    /// Violation count of the trial's best solution.
    pub best_violations: u32,
    /// Iteration at which the best solution was found.
    pub best_iteration: u64,
    /// Elapsed seconds when the best solution was found.
    pub time_to_best: f64,
    /// Iterations executed in the trial.
    pub iterations: u64,
    /// Total trial wall-clock seconds.
    pub total_time: f64,
    /// Solution evaluations performed during the trial.
    pub evaluations: u64,
    /// Cumulative local-search seconds.
    pub local_search_time: f64,
    /// Cumulative look-ahead sampling seconds.
    pub sampling_time: f64,
}

impl TrialResult {
    pub fn new(trial: usize) -> Self {
        TrialResult {
            trial,
            best_cost: f64::INFINITY,
            best_violations: 0,
            best_iteration: 0,
            time_to_best: 0.0,
            iterations: 0,
            total_time: 0.0,
            evaluations: 0,
            local_search_time: 0.0,
            sampling_time: 0.0,
        }
    }
}

/// Results of a whole run: the best solution over all trials plus one
/// result row per trial.
#[derive(Debug, Clone)]
pub struct RunReport<S> {
    pub best: S,
    pub trials: Vec<TrialResult>,
}

impl<S: Evaluated> RunReport<S> {
    /// One-line aggregate statistics: overall best (cost, violations),
    /// mean and sample standard deviation of per-trial best cost and
    /// violation count, then of the per-trial discovery times.
    pub fn summary(&self) -> String {
        let costs: Vec<f64> = self.trials.iter().map(|t| t.best_cost).collect();
        let violations: Vec<f64> = self.trials.iter().map(|t| t.best_violations as f64).collect();
        let times: Vec<f64> = self.trials.iter().map(|t| t.time_to_best).collect();

        format!(
            "# statistics\t({},{})\t({:.6},{:.6})\t({:.6},{:.6})\t{:.6}\t{:.6}",
            self.best.cost(),
            self.best.constraint_violations(),
            costs.iter().mean(),
            violations.iter().mean(),
            sample_std_dev(&costs),
            sample_std_dev(&violations),
            times.iter().mean(),
            sample_std_dev(&times),
        )
    }

    /// Export one CSV row per trial.
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)
            .map_err(|e| format!("cannot write results to {}: {}", path.display(), e))?;
        for trial in &self.trials {
            writer
                .serialize(trial)
                .map_err(|e| format!("cannot serialize trial result: {}", e))?;
        }
        writer
            .flush()
            .map_err(|e| format!("cannot flush results: {}", e))
    }
}

/// Sample standard deviation; 0 for fewer than two observations.
fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().std_dev()
}
