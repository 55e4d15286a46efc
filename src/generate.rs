//! # Candidate enumeration
//!
//! This module implements the constraint-pruned enumerator over the Cartesian
//! product of a hole space. Hole names are sorted lexicographically and each
//! domain is sorted by a stable string key, so enumeration order is fully
//! deterministic. The index vector behaves like a mixed-radix counter: the
//! rightmost hole advances fastest.

use crate::constraint::Constraint;
use crate::template::{CandidateAssignment, HoleSpace};
use crate::value::Value;

/// A lazy, finite, restartable sequence of candidate assignments.
#[derive(Debug, Clone)]
pub struct CandidateGenerator {
    holes: Vec<String>,
    domains: Vec<Vec<Value>>,
    constraints: Vec<Constraint>,
    indices: Vec<usize>,
    exhausted: bool,
}

impl CandidateGenerator {
    pub fn new(hole_space: &HoleSpace, constraints: Vec<Constraint>) -> Self {
        let mut holes: Vec<String> = hole_space.keys().cloned().collect();
        holes.sort();

        let domains: Vec<Vec<Value>> = holes
            .iter()
            .map(|h| {
                let mut domain: Vec<Value> =
                    hole_space[h].iter().cloned().collect();
                domain.sort_by_key(|v| v.sort_key());
                domain
            })
            .collect();

        let mut generator = CandidateGenerator {
            indices: vec![0; holes.len()],
            exhausted: false,
            holes,
            domains,
            constraints,
        };
        generator.reset();
        generator
    }

    fn reset(&mut self) {
        self.indices = vec![0; self.holes.len()];
        self.exhausted =
            self.holes.is_empty() || self.domains.iter().any(|d| d.is_empty());
    }

    /// Replace the constraint list and restart enumeration from the first
    /// index. Candidates already emitted may be re-visited; re-evaluating
    /// them against the real oracles yields the same verdict, so correctness
    /// is preserved at the cost of repeated work.
    pub fn update_constraints(&mut self, constraints: Vec<Constraint>) {
        self.constraints = constraints;
        self.reset();
    }

    /// The unpruned product of domain sizes (worst-case search space size,
    /// for diagnostics only).
    pub fn estimate_size(&self) -> usize {
        self.domains
            .iter()
            .fold(1usize, |acc, d| acc.saturating_mul(d.len()))
    }

    fn advance(&mut self) {
        for i in (0..self.indices.len()).rev() {
            self.indices[i] += 1;
            if self.indices[i] < self.domains[i].len() {
                return;
            }
            self.indices[i] = 0;
        }
        self.exhausted = true;
    }

    fn excluded(&self, candidate: &CandidateAssignment) -> bool {
        self.constraints.iter().any(|c| c.excludes(candidate))
    }
}

impl Iterator for CandidateGenerator {
    type Item = CandidateAssignment;

    fn next(&mut self) -> Option<CandidateAssignment> {
        while !self.exhausted {
            let candidate: CandidateAssignment = self
                .holes
                .iter()
                .enumerate()
                .map(|(i, h)| (h.clone(), self.domains[i][self.indices[i]].clone()))
                .collect();

            self.advance();

            if !self.excluded(&candidate) {
                return Some(candidate);
            }
        }
        None
    }
}
