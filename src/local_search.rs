//! Local search passes for TSPTW tours.
//!
//! Two neighborhoods are provided: node relocation (move one node to
//! another position) and 2-opt (reverse a segment). Each function performs
//! a single improving pass and returns a new tour; callers loop while the
//! result keeps strictly improving. 2-opt assumes a symmetric travel time
//! matrix and must not be applied to asymmetric instances.

use crate::instance::TsptwInstance;
use crate::model::ProblemModel;
use crate::solution::Tour;

/// One relocation pass: try moving every non-start node to every other
/// position. With `first_improvement` the first improving move is
/// returned, otherwise the best one. Returns a clone when no move helps.
pub fn relocation_pass(instance: &TsptwInstance, tour: &Tour, first_improvement: bool) -> Tour {
    let n = tour.permutation.len();
    if n < 3 {
        return tour.clone();
    }

    let mut best: Option<Tour> = None;

    for from in 1..n {
        for to in 1..n {
            if to == from || to == from + 1 {
                continue;
            }

            let mut permutation = tour.permutation.clone();
            let node = permutation.remove(from);
            let insert_pos = if to > from { to - 1 } else { to };
            permutation.insert(insert_pos, node);

            let candidate = instance.evaluate(permutation);
            if !candidate.better_than(tour) {
                continue;
            }
            if first_improvement {
                return candidate;
            }
            match &best {
                Some(current) if !candidate.better_than(current) => {}
                _ => best = Some(candidate),
            }
        }
    }

    best.unwrap_or_else(|| tour.clone())
}

/// One first-improvement 2-opt pass: reverse the segment between two tour
/// positions, keeping the start node in place. Returns a clone when no
/// reversal helps.
pub fn two_opt_first_pass(instance: &TsptwInstance, tour: &Tour) -> Tour {
    let n = tour.permutation.len();
    if n < 4 {
        return tour.clone();
    }

    for i in 0..n - 2 {
        for j in i + 2..n {
            if i == 0 && j == n - 1 {
                continue;
            }

            let mut permutation = tour.permutation.clone();
            permutation[i + 1..=j].reverse();

            let candidate = instance.evaluate(permutation);
            if candidate.better_than(tour) {
                return candidate;
            }
        }
    }

    tour.clone()
}
