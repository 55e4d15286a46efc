//! # CEGIS repair loop
//!
//! Alternates verification and synthesis over one artifact: run all oracles,
//! and if anything fails, synthesize a patch, apply it, and verify again.
//! Constraints learned in one turn seed the next turn's synthesizer.

use crate::constraint::Constraint;
use crate::oracle::{check_all, Artifact, Oracle, PatchApplyError, Violation};
use crate::synthesize::{
    synthesize, SynthConfig, SynthResult, SynthStatus, SynthesisError,
};
use crate::template::{CandidateAssignment, HoleSpace, PatchTemplate};

////////////////////////////////////////////////////////////////////////////////
// Results and errors

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStatus {
    Success,
    Unsat,
    Timeout,
    MaxIters,
}

impl std::fmt::Display for RepairStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RepairStatus::Success => write!(f, "success"),
            RepairStatus::Unsat => write!(f, "unsat"),
            RepairStatus::Timeout => write!(f, "timeout"),
            RepairStatus::MaxIters => write!(f, "max_iters"),
        }
    }
}

/// Terminal state of one `repair` invocation. `artifact` is the repaired
/// artifact on success, or the best attempt so far otherwise. `violations`
/// is empty on success; on `MaxIters` it holds every violation observed
/// across all turns, otherwise the final turn's violations.
#[derive(Debug, Clone)]
pub struct RepairOutcome<A> {
    pub artifact: A,
    pub status: RepairStatus,
    pub iterations: usize,
    pub tried_candidates: usize,
    pub constraints: Vec<Constraint>,
    pub last_assignment: Option<CandidateAssignment>,
    pub violations: Vec<Violation>,
}

/// A genuine fault, as opposed to the ordinary unsat/timeout/max-iters
/// outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairError {
    /// An oracle failed during the verification step. Verification cannot
    /// proceed without a verdict, so this is fatal here even though the
    /// synthesizer tolerates the same failure per candidate.
    Oracle { oracle: String, message: String },
    /// Applying a successfully synthesized patch failed.
    PatchApply(PatchApplyError),
    Synthesis(SynthesisError),
}

impl std::fmt::Display for RepairError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RepairError::Oracle { oracle, message } => {
                write!(f, "oracle '{}' failed: {}", oracle, message)
            }
            RepairError::PatchApply(e) => write!(f, "{}", e),
            RepairError::Synthesis(e) => write!(f, "{}", e),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Loop

fn terminal<A>(
    artifact: &A,
    status: RepairStatus,
    iterations: usize,
    tried_candidates: usize,
    result: &SynthResult,
    violations: Vec<Violation>,
) -> RepairOutcome<A>
where
    A: Artifact,
{
    RepairOutcome {
        artifact: artifact.clone(),
        status,
        iterations,
        tried_candidates,
        constraints: result.constraints.clone(),
        last_assignment: result.last_assignment.clone(),
        violations,
    }
}

/// Repair `artifact` until every oracle passes, the search space is
/// exhausted, a budget runs out, or `max_iters` verify/synthesize turns have
/// elapsed.
pub fn repair<A: Artifact>(
    artifact: &A,
    template: &PatchTemplate,
    hole_space: &HoleSpace,
    oracles: &[Box<dyn Oracle<A>>],
    max_iters: usize,
    initial_constraints: &[Constraint],
    config: &SynthConfig,
) -> Result<RepairOutcome<A>, RepairError> {
    log::info!(
        "starting CEGIS repair: max {} iterations, {} template ops, {} holes",
        max_iters,
        template.ops.len(),
        hole_space.len()
    );

    let mut current = artifact.clone();
    let mut total_tried = 0;
    let mut learned = initial_constraints.to_vec();
    let mut all_seen: Vec<Violation> = vec![];
    let mut last_result: Option<SynthResult> = None;

    for iteration in 0..max_iters {
        log::info!("=== CEGIS iteration {}/{} ===", iteration + 1, max_iters);

        let violations = check_all(&current, oracles).map_err(
            |(oracle, message)| RepairError::Oracle { oracle, message },
        )?;

        if violations.is_empty() {
            log::info!("verification passed after {} iterations", iteration);
            return Ok(RepairOutcome {
                artifact: current,
                status: RepairStatus::Success,
                iterations: iteration,
                tried_candidates: total_tried,
                constraints: learned,
                last_assignment: last_result
                    .and_then(|r| r.last_assignment),
                violations: vec![],
            });
        }

        log::info!("verification failed with {} violations", violations.len());
        all_seen.extend(violations.iter().cloned());

        let result = synthesize(
            &current, template, hole_space, oracles, config, &learned,
        )
        .map_err(RepairError::Synthesis)?;

        total_tried += result.tried_candidates;
        learned = result.constraints.clone();

        log::info!(
            "synthesis tried {} candidates, {} constraints known",
            result.tried_candidates,
            learned.len()
        );

        match result.status {
            SynthStatus::Success => {
                let patch = match &result.patch {
                    Some(patch) => patch.clone(),
                    None => {
                        return Err(RepairError::Synthesis(
                            SynthesisError::Internal(
                                "successful synthesis returned no patch"
                                    .to_owned(),
                            ),
                        ))
                    }
                };
                current = current
                    .apply_patch(&patch)
                    .map_err(RepairError::PatchApply)?;
                last_result = Some(result);
            }
            SynthStatus::Unsat => {
                log::warn!("synthesis returned unsat");
                return Ok(terminal(
                    &current,
                    RepairStatus::Unsat,
                    iteration + 1,
                    total_tried,
                    &result,
                    violations,
                ));
            }
            SynthStatus::Timeout => {
                log::warn!("synthesis timed out");
                return Ok(terminal(
                    &current,
                    RepairStatus::Timeout,
                    iteration + 1,
                    total_tried,
                    &result,
                    violations,
                ));
            }
        }
    }

    log::warn!("max iterations ({}) exceeded without a fix", max_iters);
    Ok(RepairOutcome {
        artifact: current,
        status: RepairStatus::MaxIters,
        iterations: max_iters,
        tried_candidates: total_tried,
        constraints: learned,
        last_assignment: None,
        violations: all_seen,
    })
}
