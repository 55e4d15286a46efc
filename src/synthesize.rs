//! # Synthesis
//!
//! One synthesis attempt: drive the candidate generator against a template,
//! artifact, and oracle set, turning each oracle failure into reusable
//! constraints. Budget exhaustion is reported as `Unsat`; wall-clock
//! exhaustion as `Timeout`. Both are ordinary outcomes, not errors.

use crate::constraint::{self, Constraint};
use crate::generate::CandidateGenerator;
use crate::oracle::{Artifact, Oracle, Violation};
use crate::template::{
    instantiate, CandidateAssignment, HoleSpace, InstantiateError, Patch,
    PatchTemplate,
};
use crate::util::Timer;
use crate::value::Value;

use instant::Duration;

////////////////////////////////////////////////////////////////////////////////
// Configuration and results

#[derive(Debug, Clone)]
pub struct SynthConfig {
    /// Maximum number of candidates to try before giving up (reported as
    /// `Unsat`, distinct from wall-clock `Timeout`).
    pub max_candidates: usize,
    /// Wall-clock budget, checked once per candidate.
    pub timeout: Duration,
}

impl Default for SynthConfig {
    fn default() -> Self {
        SynthConfig {
            max_candidates: 1000,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthStatus {
    Success,
    Unsat,
    Timeout,
}

/// Outcome of one synthesis attempt. `patch` is present iff
/// `status == Success`. `constraints` holds the initial constraints plus
/// everything learned in this attempt, suitable for Fix Bank storage.
#[derive(Debug, Clone)]
pub struct SynthResult {
    pub status: SynthStatus,
    pub patch: Option<Patch>,
    pub tried_candidates: usize,
    pub constraints: Vec<Constraint>,
    pub last_assignment: Option<CandidateAssignment>,
}

/// An unexpected fault during search; never used for the ordinary
/// unsat/timeout outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    /// The template referenced a hole missing from a generated assignment.
    /// This is a template/hole-space mismatch and fails the whole attempt
    /// rather than being absorbed as a rejected candidate.
    Instantiate(InstantiateError),
    /// An internal invariant was broken.
    Internal(String),
}

impl std::fmt::Display for SynthesisError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SynthesisError::Instantiate(e) => {
                write!(f, "template instantiation failed: {}", e)
            }
            SynthesisError::Internal(msg) => {
                write!(f, "synthesis failed: {}", msg)
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Constraint learning

fn forbid_value_hint(
    hint: &serde_json::Value,
    hole_space: &HoleSpace,
) -> Option<Constraint> {
    let hole = hint.get("hole")?.as_str()?;
    let value = Value::from_json(hint.get("value")?)?;
    if !hole_space.contains_key(hole) {
        return None;
    }
    Some(Constraint::ForbiddenValue {
        hole: hole.to_owned(),
        value,
    })
}

fn forbid_tuple_hint(
    hint: &serde_json::Value,
    hole_space: &HoleSpace,
) -> Option<Constraint> {
    let holes = hint.get("holes")?.as_array()?;
    let values = hint.get("values")?.as_array()?;

    // Keep only the pairs whose hole actually exists in the current hole
    // space; a tuple that degrades to one pair becomes a plain forbidden
    // value.
    let mut kept_holes = vec![];
    let mut kept_values = vec![];
    for (h, v) in holes.iter().zip(values) {
        let name = match h.as_str() {
            Some(name) => name,
            None => continue,
        };
        let value = match Value::from_json(v) {
            Some(value) => value,
            None => continue,
        };
        if hole_space.contains_key(name) {
            kept_holes.push(name.to_owned());
            kept_values.push(value);
        }
    }

    match kept_holes.len() {
        0 => None,
        1 => Some(Constraint::ForbiddenValue {
            hole: kept_holes.remove(0),
            value: kept_values.remove(0),
        }),
        _ => Some(Constraint::ForbiddenTuple {
            holes: kept_holes,
            values: kept_values,
        }),
    }
}

/// Extract constraints from the `forbid_value`/`forbid_tuple` hints carried
/// in violation evidence. Hints referencing holes unknown to `hole_space`
/// are dropped.
pub fn constraints_from_violations(
    violations: &[Violation],
    hole_space: &HoleSpace,
) -> Vec<Constraint> {
    let mut constraints = vec![];

    for violation in violations {
        let evidence = match &violation.evidence {
            Some(e) => e,
            None => continue,
        };

        if let Some(hint) = evidence.get("forbid_value") {
            if let Some(c) = forbid_value_hint(hint, hole_space) {
                log::debug!("learned constraint from oracle: {}", c);
                constraints.push(c);
            }
        }

        if let Some(hint) = evidence.get("forbid_tuple") {
            if let Some(c) = forbid_tuple_hint(hint, hole_space) {
                log::debug!("learned constraint from oracle: {}", c);
                constraints.push(c);
            }
        }
    }

    constraints
}

////////////////////////////////////////////////////////////////////////////////
// Synthesis

/// Search for one patch that makes all oracles report zero violations.
pub fn synthesize<A: Artifact>(
    artifact: &A,
    template: &PatchTemplate,
    hole_space: &HoleSpace,
    oracles: &[Box<dyn Oracle<A>>],
    config: &SynthConfig,
    initial_constraints: &[Constraint],
) -> Result<SynthResult, SynthesisError> {
    let mut all_constraints = initial_constraints.to_vec();

    log::info!(
        "starting synthesis with {} initial constraints over {} holes",
        all_constraints.len(),
        hole_space.len()
    );

    let mut generator =
        CandidateGenerator::new(hole_space, all_constraints.clone());
    log::info!(
        "estimated candidates before pruning: {}",
        generator.estimate_size()
    );

    let timer = Timer::finite(config.timeout);
    let mut tried_candidates = 0;
    let mut last_assignment = None;

    while let Some(candidate) = generator.next() {
        tried_candidates += 1;
        last_assignment = Some(candidate.clone());

        if tried_candidates > config.max_candidates {
            log::info!("candidate budget ({}) exceeded", config.max_candidates);
            return Ok(SynthResult {
                status: SynthStatus::Unsat,
                patch: None,
                tried_candidates,
                constraints: all_constraints,
                last_assignment,
            });
        }

        if timer.expired() {
            log::info!("wall-clock budget ({:?}) exceeded", config.timeout);
            return Ok(SynthResult {
                status: SynthStatus::Timeout,
                patch: None,
                tried_candidates,
                constraints: all_constraints,
                last_assignment,
            });
        }

        log::debug!("trying candidate #{}: {:?}", tried_candidates, candidate);

        let patch = instantiate(template, &candidate)
            .map_err(SynthesisError::Instantiate)?;

        let patched = match artifact.apply_patch(&patch) {
            Ok(patched) => patched,
            Err(e) => {
                log::warn!("failed to apply patch: {}", e);
                continue;
            }
        };

        let mut violations = vec![];
        for oracle in oracles {
            match oracle.check(&patched) {
                Ok(vs) => violations.extend(vs),
                // A failing oracle contributes no evidence for this
                // candidate; the attempt continues.
                Err(e) => {
                    log::warn!("oracle '{}' failed: {}", oracle.name(), e)
                }
            }
        }

        if violations.is_empty() {
            log::info!("found solution after {} candidates", tried_candidates);
            return Ok(SynthResult {
                status: SynthStatus::Success,
                patch: Some(patch),
                tried_candidates,
                constraints: all_constraints,
                last_assignment: Some(candidate),
            });
        }

        let learned = constraints_from_violations(&violations, hole_space);
        let added = constraint::extend_dedup(&mut all_constraints, learned);
        if added > 0 {
            log::debug!("learned {} new constraints", added);
            generator.update_constraints(all_constraints.clone());
        }
    }

    log::info!(
        "unsat: exhausted all candidates ({} tried)",
        tried_candidates
    );
    Ok(SynthResult {
        status: SynthStatus::Unsat,
        patch: None,
        tried_candidates,
        constraints: all_constraints,
        last_assignment,
    })
}
