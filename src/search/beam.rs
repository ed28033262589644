//! Beam construction with stochastic look-ahead sampling.
//!
//! Instead of committing to a single ordering, a bounded set of partial
//! orderings grows in parallel. At every depth each beam element proposes
//! up to `max_children` extensions; the pooled children are narrowed to
//! `to_choose` candidates with the same determinism-rate rule used during
//! greedy construction, ranked by a Monte-Carlo estimate of their
//! eventual quality, and pruned to `beam_width` survivors.

use crate::model::{Evaluated, ProblemModel};
use crate::search::greedy::{argmax, candidate_weights, roulette};
use crate::search::orchestrator::SearchConfig;
use crate::search::pheromone::PheromoneMatrix;
use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::cmp::Reverse;
use std::time::{Duration, Instant};

/// A partial ordering kept in the beam, with its accumulated construction
/// weight (the product of the selection weights of its extensions).
#[derive(Debug, Clone)]
struct BeamElement {
    permutation: Vec<usize>,
    visited: Vec<bool>,
    weight: f64,
}

impl BeamElement {
    fn root<M: ProblemModel>(model: &M) -> Self {
        let n = model.n();
        let start = model.start_element();
        let mut visited = vec![false; n];
        visited[start] = true;
        BeamElement {
            permutation: vec![start],
            visited,
            weight: 1.0,
        }
    }

    fn last(&self) -> usize {
        *self
            .permutation
            .last()
            .expect("beam elements always contain the start element")
    }

    fn extend(&self, element: usize, weight: f64) -> Self {
        let mut child = self.clone();
        child.permutation.push(element);
        child.visited[element] = true;
        child.weight *= weight;
        child
    }
}

/// Beam search construction parameters, derived from the run
/// configuration and the problem size.
#[derive(Debug, Clone)]
pub struct BeamSearch {
    pub beam_width: usize,
    pub max_children: usize,
    /// Number of candidates ranked by look-ahead before pruning.
    pub to_choose: usize,
    pub n_samples: usize,
    /// Number of look-ahead positions drawn stochastically; the remaining
    /// positions are completed greedily.
    pub sample_rate: usize,
    pub det_rate: f64,
}

impl BeamSearch {
    pub fn new(config: &SearchConfig, n: usize) -> Self {
        let to_choose = (config.beam_width as f64 * config.mu) as usize;
        let sample_rate =
            (config.sample_percent as f64 * (n as f64 - 1.0) / 100.0).round() as usize + 1;
        BeamSearch {
            beam_width: config.beam_width,
            max_children: config.max_children,
            // The ranking stage never keeps more than it was given.
            to_choose: to_choose.max(config.beam_width),
            n_samples: config.n_samples,
            sample_rate,
            det_rate: config.det_rate,
        }
    }

    /// Build one complete ordering and return the best completion found
    /// in the final beam. Time spent in look-ahead sampling is added to
    /// `sampling_time`.
    pub fn construct<M: ProblemModel>(
        &self,
        model: &M,
        pheromone: &PheromoneMatrix,
        rng: &mut ChaCha8Rng,
        sampling_time: &mut Duration,
    ) -> M::Solution {
        let n = model.n();
        let mut beam = vec![BeamElement::root(model)];

        for _depth in 1..n {
            let mut pool: Vec<BeamElement> = Vec::new();
            for parent in &beam {
                let mut candidates =
                    candidate_weights(model, pheromone, parent.last(), &parent.visited);
                if candidates.len() > self.max_children {
                    candidates.sort_by_key(|&(_, weight)| Reverse(OrderedFloat(weight)));
                    candidates.truncate(self.max_children);
                }
                for (element, weight) in candidates {
                    pool.push(parent.extend(element, weight));
                }
            }
            assert!(
                !pool.is_empty(),
                "beam ran out of partial orderings before completion"
            );

            rescale_weights(&mut pool);

            beam = if pool.len() > self.beam_width {
                let chosen = self.choose_candidates(pool, rng);
                if chosen.len() > self.beam_width {
                    self.prune_by_lookahead(model, pheromone, chosen, rng, sampling_time)
                } else {
                    chosen
                }
            } else {
                pool
            };
        }

        let mut best: Option<M::Solution> = None;
        for element in beam {
            let solution = model.evaluate(element.permutation);
            best = match best {
                None => Some(solution),
                Some(current) if solution.better_than(&current) => Some(solution),
                Some(current) => Some(current),
            };
        }
        best.expect("beam is non-empty at completion")
    }

    /// Narrow the pooled children to `to_choose` candidates, drawing
    /// without replacement with the same rule as greedy construction:
    /// heaviest accumulated weight with probability `det_rate`, roulette
    /// over the accumulated weights otherwise.
    fn choose_candidates(
        &self,
        mut pool: Vec<BeamElement>,
        rng: &mut ChaCha8Rng,
    ) -> Vec<BeamElement> {
        if pool.len() <= self.to_choose {
            return pool;
        }

        let mut chosen = Vec::with_capacity(self.to_choose);
        while chosen.len() < self.to_choose {
            let index = if rng.gen::<f64>() < self.det_rate {
                pool.iter()
                    .enumerate()
                    .max_by_key(|(_, element)| OrderedFloat(element.weight))
                    .map(|(index, _)| index)
                    .expect("pool is non-empty while choosing")
            } else {
                let total: f64 = pool.iter().map(|element| element.weight).sum();
                let mut pick = rng.gen::<f64>() * total;
                let mut selected = pool.len() - 1;
                for (index, element) in pool.iter().enumerate() {
                    pick -= element.weight;
                    if pick <= 0.0 {
                        selected = index;
                        break;
                    }
                }
                selected
            };
            chosen.push(pool.swap_remove(index));
        }
        chosen
    }

    /// Rank candidates by their look-ahead estimate and keep the best
    /// `beam_width`.
    fn prune_by_lookahead<M: ProblemModel>(
        &self,
        model: &M,
        pheromone: &PheromoneMatrix,
        candidates: Vec<BeamElement>,
        rng: &mut ChaCha8Rng,
        sampling_time: &mut Duration,
    ) -> Vec<BeamElement> {
        let started = Instant::now();

        let mut ranked: Vec<(BeamElement, f64, f64)> = candidates
            .into_iter()
            .map(|element| {
                let (cost, violations) = self.estimate(model, pheromone, &element, rng);
                (element, cost, violations)
            })
            .collect();
        ranked.sort_by_key(|&(_, cost, violations)| (OrderedFloat(cost), OrderedFloat(violations)));
        ranked.truncate(self.beam_width);

        *sampling_time += started.elapsed();
        ranked.into_iter().map(|(element, _, _)| element).collect()
    }

    /// Monte-Carlo estimate of a partial ordering's eventual quality:
    /// average cost and violation count over `n_samples` completions.
    fn estimate<M: ProblemModel>(
        &self,
        model: &M,
        pheromone: &PheromoneMatrix,
        element: &BeamElement,
        rng: &mut ChaCha8Rng,
    ) -> (f64, f64) {
        let mut cost_sum = 0.0;
        let mut violation_sum = 0.0;
        for _ in 0..self.n_samples {
            let permutation = self.sample_completion(model, pheromone, element, rng);
            let solution = model.evaluate(permutation);
            cost_sum += solution.cost();
            violation_sum += solution.constraint_violations() as f64;
        }
        let samples = self.n_samples as f64;
        (cost_sum / samples, violation_sum / samples)
    }

    /// Complete a partial ordering: the first `sample_rate` positions are
    /// drawn by roulette to avoid bias, the rest greedily.
    fn sample_completion<M: ProblemModel>(
        &self,
        model: &M,
        pheromone: &PheromoneMatrix,
        element: &BeamElement,
        rng: &mut ChaCha8Rng,
    ) -> Vec<usize> {
        let n = model.n();
        let mut permutation = element.permutation.clone();
        let mut visited = element.visited.clone();
        let mut stochastic_left = self.sample_rate;

        while permutation.len() < n {
            let last = *permutation.last().expect("partial ordering is never empty");
            let candidates = candidate_weights(model, pheromone, last, &visited);
            let next = if stochastic_left > 0 {
                roulette(&candidates, rng)
            } else {
                argmax(&candidates)
            }
            .expect("an unplaced element always remains while the ordering is incomplete");
            stochastic_left = stochastic_left.saturating_sub(1);
            permutation.push(next);
            visited[next] = true;
        }

        permutation
    }
}

/// Rescale accumulated weights so the largest is 1. Selection only
/// depends on relative weights, and the running products would otherwise
/// drift toward underflow on large instances.
fn rescale_weights(pool: &mut [BeamElement]) {
    let max = pool
        .iter()
        .map(|element| element.weight)
        .fold(0.0f64, f64::max);
    if max > 0.0 {
        for element in pool.iter_mut() {
            element.weight /= max;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{HeuristicWeights, TimeWindow, TsptwInstance};
    use crate::model::ProblemModel;

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

    fn beam_config(beam_width: usize, mu: f64) -> SearchConfig {
        SearchConfig {
            beam_width,
            mu,
            iteration_limit: Some(10),
            ..SearchConfig::default()
        }
    }

    #[test]
    fn test_to_choose_arithmetic() {
        let beam = BeamSearch::new(&beam_config(3, 2.0), 10);
        assert_eq!(beam.to_choose, 6);
        assert_eq!(beam.beam_width, 3);
    }

    #[test]
    fn test_sample_rate_covers_all_positions_at_full_percent() {
        let beam = BeamSearch::new(&beam_config(1, 2.0), 10);
        assert_eq!(beam.sample_rate, 10);
    }

    #[test]
    fn test_sample_rate_rounds_partial_percent() {
        let config = SearchConfig {
            sample_percent: 50,
            iteration_limit: Some(1),
            ..SearchConfig::default()
        };
        // 0.5 * 9 = 4.5, rounds to 5, plus one.
        assert_eq!(BeamSearch::new(&config, 10).sample_rate, 6);
    }

    #[test]
    fn test_construct_yields_permutation() {
        let instance = line_instance(6);
        let pheromone = PheromoneMatrix::new(6, 0.001, 0.999);
        let beam = BeamSearch::new(&beam_config(3, 2.0), 6);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut sampling_time = Duration::ZERO;

        let solution = beam.construct(&instance, &pheromone, &mut rng, &mut sampling_time);
        assert!(instance.check(&solution));
        assert_eq!(solution.permutation[0], 0);
    }

    #[test]
    fn test_width_one_behaves_like_single_path() {
        let instance = line_instance(5);
        let pheromone = PheromoneMatrix::new(5, 0.001, 0.999);
        let config = SearchConfig {
            beam_width: 1,
            det_rate: 1.0,
            iteration_limit: Some(1),
            ..SearchConfig::default()
        };
        let beam = BeamSearch::new(&config, 5);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut sampling_time = Duration::ZERO;

        let solution = beam.construct(&instance, &pheromone, &mut rng, &mut sampling_time);
        assert_eq!(solution.permutation.len(), 5);
        assert!(instance.check(&solution));
    }

    #[test]
    fn test_seeded_replay_is_identical() {
        let instance = line_instance(6);
        let pheromone = PheromoneMatrix::new(6, 0.001, 0.999);
        let beam = BeamSearch::new(&beam_config(2, 2.0), 6);

        let mut rng_a = ChaCha8Rng::seed_from_u64(21);
        let mut rng_b = ChaCha8Rng::seed_from_u64(21);
        let mut time_a = Duration::ZERO;
        let mut time_b = Duration::ZERO;
        let a = beam.construct(&instance, &pheromone, &mut rng_a, &mut time_a);
        let b = beam.construct(&instance, &pheromone, &mut rng_b, &mut time_b);
        assert_eq!(a.permutation, b.permutation);
        assert_eq!(a.cost, b.cost);
    }

    #[test]
    fn test_lookahead_records_sampling_time() {
        let instance = line_instance(8);
        let pheromone = PheromoneMatrix::new(8, 0.001, 0.999);
        let beam = BeamSearch::new(&beam_config(2, 2.0), 8);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut sampling_time = Duration::ZERO;

        beam.construct(&instance, &pheromone, &mut rng, &mut sampling_time);
        assert!(sampling_time > Duration::ZERO);
    }
}
