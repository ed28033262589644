//! Solution representation for the TSP with time windows.
//!
//! A solution is a tour: a permutation of all nodes starting at node 0,
//! together with its travel cost and the number of missed time windows.

use crate::model::Evaluated;
use serde::{Deserialize, Serialize};

/// A complete tour with its evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tour {
    /// Visiting order of node indices; the first entry is the start node.
    pub permutation: Vec<usize>,
    /// Total travel time along the closed tour (waiting excluded).
    pub cost: f64,
    /// Number of time windows missed along the tour.
    pub violations: u32,
}

impl Tour {
    /// Lower cost wins; equal cost is broken by fewer violations.
    pub fn better_than(&self, other: &Tour) -> bool {
        if self.cost < other.cost {
            return true;
        }
        if self.cost > other.cost {
            return false;
        }
        self.violations < other.violations
    }

}

impl Evaluated for Tour {
    fn cost(&self) -> f64 {
        self.cost
    }

    fn constraint_violations(&self) -> u32 {
        self.violations
    }

    fn better_than(&self, other: &Self) -> bool {
        Tour::better_than(self, other)
    }

    fn permutation(&self) -> &[usize] {
        &self.permutation
    }
}

impl std::fmt::Display for Tour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Tour")?;
        writeln!(f, "  Cost: {:.2}", self.cost)?;
        writeln!(f, "  Violations: {}", self.violations)?;
        writeln!(f, "  Order: {:?}", self.permutation)
    }
}
