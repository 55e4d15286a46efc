//! # Learned constraints
//!
//! Constraints record hole assignments that are known to fail, so the
//! candidate generator can skip them. They are learned from oracle evidence
//! during synthesis and persisted in the Fix Bank for warm starts.

use crate::template::CandidateAssignment;
use crate::value::Value;

use serde::{Deserialize, Serialize};

/// A learned exclusion rule over hole values.
///
/// Serializes to the Fix Bank's `{"type": ..., "data": {...}}` form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Constraint {
    /// The named hole must never take this value.
    ForbiddenValue { hole: String, value: Value },
    /// The named holes must never take these values simultaneously.
    /// `holes` and `values` are parallel lists; order is significant for
    /// matching.
    ForbiddenTuple {
        holes: Vec<String>,
        values: Vec<Value>,
    },
}

impl Constraint {
    /// Whether `candidate` is excluded by this constraint.
    ///
    /// A `ForbiddenTuple` only excludes when *all* of its holes match; a
    /// tuple hole absent from the candidate never matches.
    pub fn excludes(&self, candidate: &CandidateAssignment) -> bool {
        match self {
            Constraint::ForbiddenValue { hole, value } => {
                candidate.get(hole) == Some(value)
            }
            Constraint::ForbiddenTuple { holes, values } => {
                !holes.is_empty()
                    && holes
                        .iter()
                        .zip(values)
                        .all(|(h, v)| candidate.get(h) == Some(v))
            }
        }
    }

    /// A canonical string identity used for structural deduplication and
    /// Fix Bank constraint union. Equal constraints have equal keys.
    pub fn canonical_key(&self) -> String {
        match self {
            Constraint::ForbiddenValue { hole, value } => {
                format!("value|{}|{}", hole, value.sort_key())
            }
            Constraint::ForbiddenTuple { holes, values } => {
                let pairs = holes
                    .iter()
                    .zip(values)
                    .map(|(h, v)| format!("{}={}", h, v.sort_key()))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("tuple|{}", pairs)
            }
        }
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Constraint::ForbiddenValue { hole, value } => {
                write!(f, "forbid {}={}", hole, value)
            }
            Constraint::ForbiddenTuple { holes, values } => {
                let pairs = holes
                    .iter()
                    .zip(values)
                    .map(|(h, v)| format!("{}={}", h, v))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "forbid {}", pairs)
            }
        }
    }
}

/// Append the constraints in `new` that are not already structurally present
/// in `known`. Returns how many were appended.
pub fn extend_dedup(known: &mut Vec<Constraint>, new: Vec<Constraint>) -> usize {
    let mut keys: indexmap::IndexSet<String> =
        known.iter().map(|c| c.canonical_key()).collect();
    let mut added = 0;
    for c in new {
        if keys.insert(c.canonical_key()) {
            known.push(c);
            added += 1;
        }
    }
    added
}
