//! # Counterexample accumulation
//!
//! Tracks violations across repeated repair attempts so that a failing case
//! fixed by an earlier attempt is never silently reintroduced by a later one.
//! Deduplication keys on violation *content* (evidence inputs/expected plus
//! the first two path components), not on the id or message, so the same
//! underlying case is recognized even when its wording changes.

use crate::oracle::Violation;

use std::collections::HashSet;

/// A violation tracked across attempts.
#[derive(Debug, Clone)]
pub struct AccumulatedCounterexample {
    pub violation: Violation,
    /// Attempt number at which this counterexample was first seen.
    pub iteration: usize,
    /// Whether the current artifact satisfies this case.
    pub satisfied: bool,
}

fn content_key(violation: &Violation) -> String {
    let empty = serde_json::json!({});
    let evidence = violation.evidence.as_ref().unwrap_or(&empty);

    let mut key = serde_json::Map::new();
    key.insert(
        "inputs".to_owned(),
        evidence
            .get("inputs")
            .cloned()
            .unwrap_or(serde_json::json!([])),
    );
    key.insert(
        "expected".to_owned(),
        evidence.get("expected").cloned().unwrap_or(serde_json::Value::Null),
    );
    key.insert(
        "file".to_owned(),
        serde_json::Value::String(
            violation.path.first().cloned().unwrap_or_default(),
        ),
    );
    key.insert(
        "func".to_owned(),
        serde_json::Value::String(
            violation.path.get(1).cloned().unwrap_or_default(),
        ),
    );

    serde_json::Value::Object(key).to_string()
}

#[derive(Debug, Default)]
pub struct CounterexampleAccumulator {
    accumulated: Vec<AccumulatedCounterexample>,
    seen: HashSet<String>,
}

impl CounterexampleAccumulator {
    pub fn new() -> Self {
        CounterexampleAccumulator::default()
    }

    /// Record a counterexample if its content has not been seen. Returns
    /// `true` if it was new. A duplicate leaves the existing record (and its
    /// `satisfied` flag) untouched.
    pub fn add(&mut self, violation: Violation, iteration: usize) -> bool {
        let key = content_key(&violation);
        if !self.seen.insert(key) {
            return false;
        }
        self.accumulated.push(AccumulatedCounterexample {
            violation,
            iteration,
            satisfied: false,
        });
        true
    }

    /// Record many counterexamples; returns how many were new.
    pub fn add_all(
        &mut self,
        violations: Vec<Violation>,
        iteration: usize,
    ) -> usize {
        violations
            .into_iter()
            .filter(|v| self.add(v.clone(), iteration))
            .count()
    }

    /// Mark the record matching `violation`'s content as satisfied. The
    /// record is kept. Returns whether a match was found.
    pub fn mark_satisfied(&mut self, violation: &Violation) -> bool {
        let key = content_key(violation);
        for record in &mut self.accumulated {
            if content_key(&record.violation) == key {
                record.satisfied = true;
                return true;
            }
        }
        false
    }

    pub fn mark_all_satisfied(&mut self, violations: &[Violation]) -> usize {
        violations
            .iter()
            .filter(|v| self.mark_satisfied(v))
            .count()
    }

    /// The unsatisfied violations, in insertion order.
    pub fn get_all(&self) -> Vec<&Violation> {
        self.accumulated
            .iter()
            .filter(|record| !record.satisfied)
            .map(|record| &record.violation)
            .collect()
    }

    /// Every record, including satisfied ones.
    pub fn records(&self) -> &[AccumulatedCounterexample] {
        &self.accumulated
    }

    /// Total records ever added (including satisfied ones).
    pub fn count(&self) -> usize {
        self.accumulated.len()
    }

    pub fn count_unsatisfied(&self) -> usize {
        self.accumulated.iter().filter(|r| !r.satisfied).count()
    }

    pub fn clear(&mut self) {
        self.accumulated.clear();
        self.seen.clear();
    }
}
