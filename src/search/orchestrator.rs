//! Trial orchestration: the main search loop.
//!
//! A run consists of one or more independent trials. Within a trial, each
//! iteration lets every ant construct one ordering (beam construction
//! when the beam is wider than one, greedy otherwise), optionally refines
//! it with the model's local search, updates the three reference
//! solutions, and lets the convergence controller steer the pheromone
//! update and the restart mechanism. The mutation order is fixed:
//! construct all ants, finalize the iteration best, update restart
//! best/best so far, compute the convergence factor, update pheromones.

use crate::model::{Evaluated, LocalSearchMode, ProblemModel};
use crate::report::{RunReport, TrialResult};
use crate::search::beam::BeamSearch;
use crate::search::convergence::{ControlAction, ConvergenceController};
use crate::search::greedy;
use crate::search::pheromone::{DepositMatrix, PheromoneMatrix};
use crate::search::trace::Trace;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, Instant};

/// All tunable parameters of a run, collected into one explicit struct.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Number of ants per iteration.
    pub n_ants: usize,
    /// Number of independent trials.
    pub n_trials: usize,
    /// Wall-clock limit per trial in seconds.
    pub time_limit: Option<f64>,
    /// Iteration limit per trial.
    pub iteration_limit: Option<u64>,
    /// Learning rate of the pheromone update.
    pub learning_rate: f64,
    /// Probability of picking the heaviest candidate during construction.
    pub det_rate: f64,
    /// Lower pheromone bound.
    pub tau_min: f64,
    /// Upper pheromone bound.
    pub tau_max: f64,
    /// Number of partial orderings kept per construction depth.
    pub beam_width: usize,
    /// Candidate surplus factor: `to_choose = beam_width * mu`.
    pub mu: f64,
    /// Maximum extensions proposed per beam element.
    pub max_children: usize,
    /// Look-ahead completions per ranked candidate.
    pub n_samples: usize,
    /// Percentage of look-ahead positions drawn stochastically.
    pub sample_percent: u32,
    /// Local search applied to every constructed ordering.
    pub local_search: LocalSearchMode,
    /// Random seed.
    pub seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            n_ants: 1,
            n_trials: 1,
            time_limit: None,
            iteration_limit: None,
            learning_rate: 0.1,
            det_rate: 0.9,
            tau_min: 0.001,
            tau_max: 0.999,
            beam_width: 1,
            mu: 2.0,
            max_children: 100,
            n_samples: 10,
            sample_percent: 100,
            local_search: LocalSearchMode::None,
            seed: 42,
        }
    }
}

impl SearchConfig {
    /// Reject configurations the search cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.time_limit.is_none() && self.iteration_limit.is_none() {
            return Err(
                "no time limit or number of iterations given. Please specify:\n\n\
                 * a time limit in seconds (e.g., --time 20), or\n\
                 * an iteration limit (e.g., --iterations 1000), or\n\
                 * both."
                    .to_string(),
            );
        }
        if let Some(limit) = self.time_limit {
            if limit <= 0.0 {
                return Err("time limit must be positive".to_string());
            }
        }
        if let Some(limit) = self.iteration_limit {
            if limit == 0 {
                return Err("iteration limit must be at least 1".to_string());
            }
        }
        if self.sample_percent > 100 {
            return Err("sample rate must be within [0, 100]".to_string());
        }
        if self.n_ants == 0 {
            return Err("at least one ant is required".to_string());
        }
        if self.n_trials == 0 {
            return Err("at least one trial is required".to_string());
        }
        if self.beam_width == 0 {
            return Err("beam width must be at least 1".to_string());
        }
        if self.mu <= 0.0 {
            return Err("mu must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.det_rate) {
            return Err("determinism rate must be within [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.learning_rate) || self.learning_rate == 0.0 {
            return Err("learning rate must be within (0, 1]".to_string());
        }
        if self.tau_min >= self.tau_max {
            return Err("pheromone bounds must satisfy tau_min < tau_max".to_string());
        }
        Ok(())
    }
}

/// Drives all trials of a run over one problem model.
pub struct TrialRunner<'a, M: ProblemModel> {
    model: &'a M,
    config: SearchConfig,
    pheromone: PheromoneMatrix,
    controller: ConvergenceController,
    rng: ChaCha8Rng,
    trace: Trace,
}

impl<'a, M: ProblemModel> TrialRunner<'a, M> {
    pub fn new(model: &'a M, config: SearchConfig, trace: Trace) -> Self {
        let pheromone = PheromoneMatrix::new(model.n(), config.tau_min, config.tau_max);
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        TrialRunner {
            model,
            config,
            pheromone,
            controller: ConvergenceController::new(),
            rng,
            trace,
        }
    }

    /// Run every trial to completion and return the collected results.
    pub fn run(&mut self) -> Result<RunReport<M::Solution>, String> {
        self.config.validate()?;

        let beam = BeamSearch::new(&self.config, self.model.n());
        let mut overall_best: Option<M::Solution> = None;
        let mut trials: Vec<TrialResult> = Vec::new();

        for trial in 1..=self.config.n_trials {
            println!("# begin try {}", trial);
            self.trace.header();

            let timer = Instant::now();
            if trial == 1 {
                self.pheromone.init_uniform();
            } else {
                self.pheromone.reset_uniform();
            }
            self.controller.begin_trial();

            let evaluations_base = self.model.evaluations();
            let mut local_search_time = Duration::ZERO;
            let mut sampling_time = Duration::ZERO;
            let mut best_so_far: Option<M::Solution> = None;
            let mut restart_best: Option<M::Solution> = None;
            let mut result = TrialResult::new(trial);
            let mut iteration: u64 = 1;

            loop {
                if let Some(limit) = self.config.time_limit {
                    if timer.elapsed().as_secs_f64() >= limit {
                        break;
                    }
                }
                if let Some(limit) = self.config.iteration_limit {
                    if iteration > limit {
                        break;
                    }
                }

                let mut iteration_best: Option<M::Solution> = None;
                for _ in 0..self.config.n_ants {
                    let evaluations_before = self.model.evaluations();
                    let constructed = if self.config.beam_width > 1 {
                        beam.construct(
                            self.model,
                            &self.pheromone,
                            &mut self.rng,
                            &mut sampling_time,
                        )
                    } else {
                        let permutation = greedy::construct(
                            self.model,
                            &self.pheromone,
                            self.config.det_rate,
                            &mut self.rng,
                        );
                        self.model.evaluate(permutation)
                    };
                    assert!(
                        self.model.evaluations() > evaluations_before,
                        "evaluation counter did not advance"
                    );

                    let refined = self.refine(constructed, &mut local_search_time);
                    iteration_best = match iteration_best {
                        None => Some(refined),
                        Some(current) if refined.better_than(&current) => Some(refined),
                        Some(current) => Some(current),
                    };
                }
                let iteration_best =
                    iteration_best.expect("every iteration runs at least one ant");

                if iteration == 1 {
                    best_so_far = Some(iteration_best.clone());
                    restart_best = Some(iteration_best.clone());
                    self.record_best_so_far(
                        best_so_far.as_ref().expect("just assigned"),
                        iteration,
                        &timer,
                        local_search_time,
                        sampling_time,
                        &mut result,
                    );
                } else if self.controller.restart_pending() {
                    // First iteration after a restart: the restart best
                    // starts over from the current iteration best.
                    self.controller.clear_restart();
                    restart_best = Some(iteration_best.clone());
                    if iteration_best.better_than(best_so_far.as_ref().expect("set in iteration 1"))
                    {
                        best_so_far = Some(iteration_best.clone());
                        self.record_best_so_far(
                            best_so_far.as_ref().expect("just assigned"),
                            iteration,
                            &timer,
                            local_search_time,
                            sampling_time,
                            &mut result,
                        );
                    }
                } else {
                    if iteration_best
                        .better_than(restart_best.as_ref().expect("set in iteration 1"))
                    {
                        restart_best = Some(iteration_best.clone());
                    }
                    if iteration_best.better_than(best_so_far.as_ref().expect("set in iteration 1"))
                    {
                        best_so_far = Some(iteration_best.clone());
                        self.record_best_so_far(
                            best_so_far.as_ref().expect("just assigned"),
                            iteration,
                            &timer,
                            local_search_time,
                            sampling_time,
                            &mut result,
                        );
                    }
                }

                let cf = ConvergenceController::convergence_factor(&self.pheromone);
                match self.controller.decide(cf) {
                    ControlAction::Restart => {
                        // The freshly reset matrix is not overwritten by a
                        // deposit in the same iteration.
                        self.pheromone.reset_uniform();
                    }
                    ControlAction::Deposit(weights) => {
                        let mut deposit = DepositMatrix::new(self.model.n());
                        deposit.add_trail(iteration_best.permutation(), weights.iteration_best);
                        deposit.add_trail(
                            restart_best
                                .as_ref()
                                .expect("set in iteration 1")
                                .permutation(),
                            weights.restart_best,
                        );
                        deposit.add_trail(
                            best_so_far
                                .as_ref()
                                .expect("set in iteration 1")
                                .permutation(),
                            weights.best_so_far,
                        );
                        self.pheromone.update(&deposit, self.config.learning_rate);
                    }
                }

                iteration += 1;
            }

            let trial_best = best_so_far.expect("a valid configuration runs at least one iteration");
            result.iterations = iteration - 1;
            result.total_time = timer.elapsed().as_secs_f64();
            result.evaluations = self.model.evaluations() - evaluations_base;
            result.local_search_time = local_search_time.as_secs_f64();
            result.sampling_time = sampling_time.as_secs_f64();

            println!(
                "{:.2}\t{:.1}\t{} {}",
                trial_best.cost(),
                result.time_to_best,
                trial_best.constraint_violations(),
                permutation_one_line(trial_best.permutation())
            );
            println!(
                "#end try {}, best_iteration = {}, best_time = {:.1}, evaluations = {}, \
                 iterations = {}, total_time = {:.1}, time_ls = {:.1}, time_sampling = {:.1}",
                trial,
                result.best_iteration,
                result.time_to_best,
                result.evaluations,
                result.iterations,
                result.total_time,
                result.local_search_time,
                result.sampling_time
            );

            overall_best = match overall_best {
                None => Some(trial_best.clone()),
                Some(current) if trial_best.better_than(&current) => Some(trial_best.clone()),
                Some(current) => Some(current),
            };
            trials.push(result);
        }

        Ok(RunReport {
            best: overall_best.expect("at least one trial ran"),
            trials,
        })
    }

    /// Promotion of a new best-so-far solution: trace emission and trial
    /// statistics, kept in one place for every call site.
    fn record_best_so_far(
        &mut self,
        solution: &M::Solution,
        iteration: u64,
        timer: &Instant,
        local_search_time: Duration,
        sampling_time: Duration,
        result: &mut TrialResult,
    ) {
        debug_assert!(
            self.model.check(solution),
            "best-so-far solution failed the validity check"
        );
        let elapsed = timer.elapsed().as_secs_f64();
        self.trace.record(
            result.trial,
            iteration,
            solution.cost(),
            solution.constraint_violations(),
            elapsed,
            local_search_time.as_secs_f64(),
            sampling_time.as_secs_f64(),
        );
        result.best_cost = solution.cost();
        result.best_violations = solution.constraint_violations();
        result.best_iteration = iteration;
        result.time_to_best = elapsed;
    }

    /// Refine a constructed ordering with the model's local search until
    /// no strict improvement remains. For symmetric instances every
    /// improving pass is followed by a 2-opt descent; asymmetric
    /// instances skip it, as the reversal-based neighborhood is only
    /// valid under symmetric costs.
    fn refine(&self, constructed: M::Solution, local_search_time: &mut Duration) -> M::Solution {
        if self.config.local_search == LocalSearchMode::None {
            return constructed;
        }

        let started = Instant::now();
        let mode = self.config.local_search;
        let mut current = constructed;
        let mut improved = self.model.local_search(&current, mode);

        while improved.better_than(&current) {
            current = improved;
            improved = self.model.local_search(&current, mode);
            if self.model.is_symmetric() {
                loop {
                    let reversed = self.model.two_opt_first(&improved);
                    if !reversed.better_than(&improved) {
                        break;
                    }
                    improved = reversed;
                }
            }
        }
        current = improved;

        *local_search_time += started.elapsed();
        current
    }
}

fn permutation_one_line(permutation: &[usize]) -> String {
    permutation
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{HeuristicWeights, TimeWindow, TsptwInstance};
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    fn line_instance(n: usize) -> TsptwInstance {
        let mut matrix = vec![vec![0.0; n]; n];
        for (i, row) in matrix.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = (i as f64 - j as f64).abs();
            }
        }
        let windows = vec![
            TimeWindow {
                earliest: 0.0,
                latest: 1000.0,
            };
            n
        ];
        TsptwInstance::from_parts(
            "line".to_string(),
            matrix,
            windows,
            HeuristicWeights::default(),
        )
        .unwrap()
    }

    fn silent_trace() -> Trace {
        Trace::new(Box::new(io::sink()))
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_rejects_missing_termination_criteria() {
        let config = SearchConfig::default();
        assert!(config.validate().is_err());

        let instance = line_instance(4);
        let mut runner = TrialRunner::new(&instance, SearchConfig::default(), silent_trace());
        assert!(runner.run().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_sample_percent() {
        let config = SearchConfig {
            iteration_limit: Some(1),
            sample_percent: 101,
            ..SearchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fully_deterministic_greedy_run() {
        let instance = line_instance(5);
        let config = SearchConfig {
            iteration_limit: Some(5),
            n_ants: 3,
            det_rate: 1.0,
            ..SearchConfig::default()
        };
        let mut runner = TrialRunner::new(&instance, config, silent_trace());
        let report = runner.run().unwrap();

        // Every ant walks the line in order, which is optimal.
        assert_eq!(report.best.cost, 8.0);
        assert_eq!(report.best.permutation, vec![0, 1, 2, 3, 4]);
        assert_eq!(report.trials.len(), 1);
        assert_eq!(report.trials[0].best_iteration, 1);
        assert_eq!(report.trials[0].iterations, 5);
    }

    #[test]
    fn test_deterministic_replay() {
        let instance = line_instance(7);
        let config = SearchConfig {
            iteration_limit: Some(20),
            n_ants: 2,
            det_rate: 0.5,
            seed: 1234,
            ..SearchConfig::default()
        };

        let mut first = TrialRunner::new(&instance, config.clone(), silent_trace());
        let report_a = first.run().unwrap();
        let mut second = TrialRunner::new(&instance, config, silent_trace());
        let report_b = second.run().unwrap();

        assert_eq!(report_a.best.cost, report_b.best.cost);
        assert_eq!(report_a.best.permutation, report_b.best.permutation);
        for (a, b) in report_a.trials.iter().zip(report_b.trials.iter()) {
            assert_eq!(a.best_cost, b.best_cost);
            assert_eq!(a.best_iteration, b.best_iteration);
            assert_eq!(a.evaluations, b.evaluations);
        }
    }

    #[test]
    fn test_best_so_far_costs_never_increase() {
        let instance = line_instance(8);
        let buffer = SharedBuffer::default();
        let config = SearchConfig {
            iteration_limit: Some(60),
            n_ants: 2,
            det_rate: 0.2,
            seed: 5,
            ..SearchConfig::default()
        };
        let mut runner =
            TrialRunner::new(&instance, config, Trace::new(Box::new(buffer.clone())));
        runner.run().unwrap();

        let text = String::from_utf8(buffer.0.borrow().clone()).unwrap();
        let costs: Vec<f64> = text
            .lines()
            .filter(|line| !line.starts_with('#'))
            .map(|line| {
                line.split_whitespace()
                    .nth(2)
                    .expect("trace line has a cost column")
                    .parse()
                    .expect("cost column parses")
            })
            .collect();
        assert!(!costs.is_empty());
        for pair in costs.windows(2) {
            assert!(pair[1] <= pair[0], "best-so-far cost increased: {:?}", pair);
        }
    }

    #[test]
    fn test_multiple_trials_collect_results() {
        let instance = line_instance(5);
        let config = SearchConfig {
            iteration_limit: Some(3),
            n_trials: 3,
            seed: 9,
            ..SearchConfig::default()
        };
        let mut runner = TrialRunner::new(&instance, config, silent_trace());
        let report = runner.run().unwrap();

        assert_eq!(report.trials.len(), 3);
        for (index, trial) in report.trials.iter().enumerate() {
            assert_eq!(trial.trial, index + 1);
            assert_eq!(trial.iterations, 3);
            assert!(trial.evaluations > 0);
            assert!(!report.best.better_than(&instance.evaluate(vec![0, 1, 2, 3, 4])));
        }
    }

    #[test]
    fn test_beam_run_with_local_search() {
        let instance = line_instance(6);
        let config = SearchConfig {
            iteration_limit: Some(4),
            beam_width: 3,
            n_samples: 3,
            local_search: LocalSearchMode::First,
            seed: 2,
            ..SearchConfig::default()
        };
        let mut runner = TrialRunner::new(&instance, config, silent_trace());
        let report = runner.run().unwrap();

        assert!(instance.check(&report.best));
        assert_eq!(report.best.violations, 0);
        // The optimum walks the line in order; nothing can beat it.
        assert!(report.best.cost >= 10.0);
    }
}
