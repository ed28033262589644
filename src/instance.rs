//! Parsing and representation of TSP-with-time-windows instances.
//!
//! An instance file holds the number of nodes, a full (possibly
//! asymmetric) travel time matrix and one time window per node. Lines
//! starting with `#` are comments. The instance precomputes the
//! heuristic-information matrix used to bias solution construction.

use std::cell::Cell;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::local_search::{relocation_pass, two_opt_first_pass};
use crate::model::{LocalSearchMode, ProblemModel};
use crate::solution::Tour;
use serde::{Deserialize, Serialize};

/// Floor for heuristic desirability, keeps roulette weights positive.
const MIN_DESIRABILITY: f64 = 1e-6;

/// Service window of a node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Earliest service time; arriving before it means waiting.
    pub earliest: f64,
    /// Latest service time; arriving after it is a violation.
    pub latest: f64,
}

/// Weights blending the heuristic desirability signals: inverse travel
/// time, window deadline urgency and window opening urgency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HeuristicWeights {
    pub travel: f64,
    pub latest: f64,
    pub earliest: f64,
}

impl HeuristicWeights {
    /// Parse a `travel,latest,earliest` triple and normalize it to sum 1.
    pub fn parse(text: &str) -> Result<Self, String> {
        let parts: Vec<&str> = text.split(',').collect();
        if parts.len() != 3 {
            return Err(format!(
                "expected three comma-separated weights, got {:?}",
                text
            ));
        }
        let mut values = [0.0f64; 3];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .trim()
                .parse()
                .map_err(|_| format!("invalid weight value {:?}", part))?;
            if *slot < 0.0 {
                return Err(format!("weights must be non-negative, got {:?}", part));
            }
        }
        let sum: f64 = values.iter().sum();
        if sum <= 0.0 {
            return Err("at least one weight must be positive".to_string());
        }
        Ok(HeuristicWeights {
            travel: values[0] / sum,
            latest: values[1] / sum,
            earliest: values[2] / sum,
        })
    }
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        HeuristicWeights {
            travel: 1.0 / 3.0,
            latest: 1.0 / 3.0,
            earliest: 1.0 / 3.0,
        }
    }
}

/// A complete TSPTW instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TsptwInstance {
    /// Name of the instance (file stem when loaded from disk).
    pub name: String,
    /// Number of nodes, including the start node 0.
    pub dimension: usize,
    /// Travel time matrix, row major; not necessarily symmetric.
    pub distance_matrix: Vec<Vec<f64>>,
    /// One service window per node.
    pub windows: Vec<TimeWindow>,
    /// Whether the travel time matrix is symmetric.
    pub symmetric: bool,
    /// Weights used to build the heuristic-information matrix.
    pub weights: HeuristicWeights,
    /// Precomputed heuristic desirability per directed node pair.
    #[serde(skip)]
    heuristic_matrix: Vec<Vec<f64>>,
    #[serde(skip)]
    evaluations: Cell<u64>,
}

impl TsptwInstance {
    /// Load an instance from a file.
    pub fn from_file<P: AsRef<Path>>(path: P, weights: HeuristicWeights) -> Result<Self, String> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| format!("cannot open instance file: {}", e))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "unnamed".to_string());
        Self::from_reader(BufReader::new(file), name, weights)
    }

    /// Parse an instance from any buffered reader.
    pub fn from_reader<R: BufRead>(
        reader: R,
        name: String,
        weights: HeuristicWeights,
    ) -> Result<Self, String> {
        let mut tokens: Vec<String> = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|e| format!("read error: {}", e))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            tokens.extend(line.split_whitespace().map(str::to_string));
        }

        let mut cursor = tokens.iter();
        let dimension: usize = cursor
            .next()
            .ok_or("empty instance file")?
            .parse()
            .map_err(|_| "invalid dimension".to_string())?;
        if dimension < 2 {
            return Err("instance must have at least two nodes".to_string());
        }

        let mut next_value = |what: &str| -> Result<f64, String> {
            cursor
                .next()
                .ok_or(format!("unexpected end of file while reading {}", what))?
                .parse()
                .map_err(|_| format!("invalid value while reading {}", what))
        };

        let mut distance_matrix = vec![vec![0.0; dimension]; dimension];
        for row in distance_matrix.iter_mut() {
            for value in row.iter_mut() {
                *value = next_value("the travel time matrix")?;
            }
        }

        let mut windows = Vec::with_capacity(dimension);
        for _ in 0..dimension {
            let earliest = next_value("the time windows")?;
            let latest = next_value("the time windows")?;
            windows.push(TimeWindow { earliest, latest });
        }

        Self::from_parts(name, distance_matrix, windows, weights)
    }

    /// Build an instance from already-parsed data.
    pub fn from_parts(
        name: String,
        distance_matrix: Vec<Vec<f64>>,
        windows: Vec<TimeWindow>,
        weights: HeuristicWeights,
    ) -> Result<Self, String> {
        let dimension = distance_matrix.len();
        if dimension < 2 {
            return Err("instance must have at least two nodes".to_string());
        }
        if distance_matrix.iter().any(|row| row.len() != dimension) {
            return Err("travel time matrix is not square".to_string());
        }
        if windows.len() != dimension {
            return Err(format!(
                "expected {} time windows, got {}",
                dimension,
                windows.len()
            ));
        }
        if let Some(w) = windows.iter().find(|w| w.latest < w.earliest) {
            return Err(format!(
                "time window closes before it opens: [{}, {}]",
                w.earliest, w.latest
            ));
        }

        let symmetric = (0..dimension).all(|i| {
            (i + 1..dimension).all(|j| distance_matrix[i][j] == distance_matrix[j][i])
        });
        let heuristic_matrix = build_heuristic_matrix(&distance_matrix, &windows, &weights);

        Ok(TsptwInstance {
            name,
            dimension,
            distance_matrix,
            windows,
            symmetric,
            weights,
            heuristic_matrix,
            evaluations: Cell::new(0),
        })
    }

    /// Travel time from node `i` to node `j`.
    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.distance_matrix[i][j]
    }

    /// Service window of node `i`.
    #[inline]
    pub fn window(&self, i: usize) -> TimeWindow {
        self.windows[i]
    }
}

/// Desirability of the directed pair (i, j): weighted sum of inverse
/// travel time and the urgency of j's window, each normalized over the
/// instance. A degenerate signal (all windows equal) contributes a
/// constant, which cancels out during candidate comparison.
fn build_heuristic_matrix(
    distance_matrix: &[Vec<f64>],
    windows: &[TimeWindow],
    weights: &HeuristicWeights,
) -> Vec<Vec<f64>> {
    let n = distance_matrix.len();

    let latest_min = windows.iter().map(|w| w.latest).fold(f64::INFINITY, f64::min);
    let latest_max = windows.iter().map(|w| w.latest).fold(f64::NEG_INFINITY, f64::max);
    let earliest_min = windows.iter().map(|w| w.earliest).fold(f64::INFINITY, f64::min);
    let earliest_max = windows.iter().map(|w| w.earliest).fold(f64::NEG_INFINITY, f64::max);
    let latest_range = latest_max - latest_min;
    let earliest_range = earliest_max - earliest_min;

    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let travel = 1.0 / (1.0 + distance_matrix[i][j]);
            let deadline = if latest_range > 0.0 {
                (latest_max - windows[j].latest) / latest_range
            } else {
                1.0
            };
            let opening = if earliest_range > 0.0 {
                (earliest_max - windows[j].earliest) / earliest_range
            } else {
                1.0
            };
            let desirability =
                weights.travel * travel + weights.latest * deadline + weights.earliest * opening;
            matrix[i][j] = desirability.max(MIN_DESIRABILITY);
        }
    }
    matrix
}

impl ProblemModel for TsptwInstance {
    type Solution = Tour;

    fn n(&self) -> usize {
        self.dimension
    }

    fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    fn start_element(&self) -> usize {
        0
    }

    fn heuristic(&self, from: usize, to: usize) -> f64 {
        self.heuristic_matrix[from][to]
    }

    fn evaluate(&self, permutation: Vec<usize>) -> Tour {
        debug_assert_eq!(permutation.len(), self.dimension);
        self.evaluations.set(self.evaluations.get() + 1);

        let mut cost = 0.0;
        let mut time = 0.0;
        let mut violations = 0u32;

        for k in 1..permutation.len() {
            let travel = self.distance_matrix[permutation[k - 1]][permutation[k]];
            cost += travel;
            time += travel;
            let window = self.windows[permutation[k]];
            if time < window.earliest {
                time = window.earliest;
            }
            if time > window.latest {
                violations += 1;
            }
        }

        // Close the tour back to the start node.
        let first = permutation[0];
        let last = permutation[permutation.len() - 1];
        let travel = self.distance_matrix[last][first];
        cost += travel;
        time += travel;
        if time > self.windows[first].latest {
            violations += 1;
        }

        Tour {
            permutation,
            cost,
            violations,
        }
    }

    fn local_search(&self, solution: &Tour, mode: LocalSearchMode) -> Tour {
        match mode {
            LocalSearchMode::None => solution.clone(),
            LocalSearchMode::First => relocation_pass(self, solution, true),
            LocalSearchMode::Best => relocation_pass(self, solution, false),
        }
    }

    fn two_opt_first(&self, solution: &Tour) -> Tour {
        two_opt_first_pass(self, solution)
    }

    fn check(&self, solution: &Tour) -> bool {
        if solution.permutation.len() != self.dimension {
            return false;
        }
        let mut seen = vec![false; self.dimension];
        for &node in &solution.permutation {
            if node >= self.dimension || seen[node] {
                return false;
            }
            seen[node] = true;
        }
        let fresh = self.evaluate(solution.permutation.clone());
        (fresh.cost - solution.cost).abs() < 1e-6 && fresh.violations == solution.violations
    }

    fn evaluations(&self) -> u64 {
        self.evaluations.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

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

    #[test]
    fn test_evaluate_line_tour() {
        let instance = line_instance(5);
        let tour = instance.evaluate(vec![0, 1, 2, 3, 4]);
        assert_eq!(tour.cost, 8.0);
        assert_eq!(tour.violations, 0);
    }

    #[test]
    fn test_evaluate_counts_window_violations() {
        let matrix = vec![vec![0.0, 5.0], vec![5.0, 0.0]];
        let windows = vec![
            TimeWindow {
                earliest: 0.0,
                latest: 100.0,
            },
            TimeWindow {
                earliest: 0.0,
                latest: 3.0,
            },
        ];
        let instance = TsptwInstance::from_parts(
            "tight".to_string(),
            matrix,
            windows,
            HeuristicWeights::default(),
        )
        .unwrap();
        let tour = instance.evaluate(vec![0, 1]);
        assert_eq!(tour.cost, 10.0);
        assert_eq!(tour.violations, 1);
    }

    #[test]
    fn test_waiting_is_not_travel_cost() {
        let matrix = vec![vec![0.0, 2.0], vec![2.0, 0.0]];
        let windows = vec![
            TimeWindow {
                earliest: 0.0,
                latest: 100.0,
            },
            TimeWindow {
                earliest: 50.0,
                latest: 60.0,
            },
        ];
        let instance = TsptwInstance::from_parts(
            "wait".to_string(),
            matrix,
            windows,
            HeuristicWeights::default(),
        )
        .unwrap();
        let tour = instance.evaluate(vec![0, 1]);
        // Arrives at 2, waits until 50, returns at 52. Travel cost is 4.
        assert_eq!(tour.cost, 4.0);
        assert_eq!(tour.violations, 0);
    }

    #[test]
    fn test_from_reader() {
        let text = "# tiny instance\n3\n0 1 2\n1 0 1\n2 1 0\n0 10\n0 10\n0 10\n";
        let instance = TsptwInstance::from_reader(
            Cursor::new(text.as_bytes()),
            "tiny".to_string(),
            HeuristicWeights::default(),
        )
        .unwrap();
        assert_eq!(instance.dimension, 3);
        assert!(instance.symmetric);
        assert_eq!(instance.distance(0, 2), 2.0);
        assert_eq!(instance.window(1).latest, 10.0);
    }

    #[test]
    fn test_from_reader_rejects_truncated_matrix() {
        let text = "3\n0 1 2\n1 0 1\n";
        let result = TsptwInstance::from_reader(
            Cursor::new(text.as_bytes()),
            "bad".to_string(),
            HeuristicWeights::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_asymmetric_detection() {
        let matrix = vec![vec![0.0, 1.0], vec![4.0, 0.0]];
        let windows = vec![
            TimeWindow {
                earliest: 0.0,
                latest: 10.0,
            };
            2
        ];
        let instance = TsptwInstance::from_parts(
            "asym".to_string(),
            matrix,
            windows,
            HeuristicWeights::default(),
        )
        .unwrap();
        assert!(!instance.symmetric);
    }

    #[test]
    fn test_evaluation_counter_increases() {
        let instance = line_instance(4);
        assert_eq!(instance.evaluations(), 0);
        instance.evaluate(vec![0, 1, 2, 3]);
        instance.evaluate(vec![0, 2, 1, 3]);
        assert_eq!(instance.evaluations(), 2);
    }

    #[test]
    fn test_check_detects_corrupted_solution() {
        let instance = line_instance(4);
        let mut tour = instance.evaluate(vec![0, 1, 2, 3]);
        assert!(instance.check(&tour));
        tour.cost += 1.0;
        assert!(!instance.check(&tour));
    }

    #[test]
    fn test_heuristic_weights_parse() {
        let w = HeuristicWeights::parse("2,1,1").unwrap();
        assert!((w.travel - 0.5).abs() < 1e-12);
        assert!((w.latest - 0.25).abs() < 1e-12);
        assert!(HeuristicWeights::parse("1,2").is_err());
        assert!(HeuristicWeights::parse("0,0,0").is_err());
        assert!(HeuristicWeights::parse("1,x,1").is_err());
    }
}
