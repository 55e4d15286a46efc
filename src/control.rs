//! # Repair orchestration
//!
//! The controller in front of the CEGIS loop: it decides where the repair
//! template comes from (Fix Bank hit, proposer, stock default, or the
//! caller), runs the loop, records the recipe in the Fix Bank on success,
//! and tracks counterexamples across repeated repair calls.

use crate::accumulate::CounterexampleAccumulator;
use crate::constraint::Constraint;
use crate::fixbank::{build_signature, FixBank, FixEntry, FixMetadata};
use crate::oracle::{check_all, Artifact, Oracle};
use crate::repair::{repair, RepairError, RepairOutcome, RepairStatus};
use crate::synthesize::SynthConfig;
use crate::propose::TemplateProposer;
use crate::template::{HoleSpace, PatchTemplate};

////////////////////////////////////////////////////////////////////////////////
// Requests and reports

/// Per-call inputs to [`Controller::repair_artifact`]. `template` and
/// `hole_space` are the lowest-priority template source; `default_template`
/// sits between the proposer and them. `initial_constraints`, when set,
/// override whatever a Fix Bank hit would seed.
pub struct RepairRequest {
    pub template: Option<PatchTemplate>,
    pub hole_space: Option<HoleSpace>,
    pub default_template: Option<(PatchTemplate, HoleSpace)>,
    pub max_iters: usize,
    pub initial_constraints: Option<Vec<Constraint>>,
    pub config: SynthConfig,
}

impl Default for RepairRequest {
    fn default() -> Self {
        RepairRequest {
            template: None,
            hole_space: None,
            default_template: None,
            max_iters: 10,
            initial_constraints: None,
            config: SynthConfig::default(),
        }
    }
}

/// Where the template that drove a repair came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateSource {
    FixBank,
    Proposer,
    Default,
    Provided,
}

/// A repair outcome plus the orchestration facts around it.
#[derive(Debug)]
pub struct RepairReport<A> {
    pub outcome: RepairOutcome<A>,
    pub fixbank_hit: bool,
    /// How many times the proposer was consulted (0 or 1 per call).
    pub proposer_calls: usize,
    /// `None` when the artifact already passed verification.
    pub template_source: Option<TemplateSource>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// No template source produced a template: no Fix Bank hit, no (or a
    /// failing) proposer, no default, nothing provided.
    NoTemplate,
    Repair(RepairError),
}

impl std::fmt::Display for ControlError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ControlError::NoTemplate => write!(
                f,
                "no template/hole space available: need a Fix Bank entry, \
                 a proposer, a default template, or a provided template"
            ),
            ControlError::Repair(e) => write!(f, "{}", e),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Controller

/// Long-lived orchestration state: the Fix Bank, an optional proposer, and
/// the counterexample record spanning every repair attempt this controller
/// has driven.
pub struct Controller {
    bank: Option<FixBank>,
    proposer: Option<Box<dyn TemplateProposer>>,
    counterexamples: CounterexampleAccumulator,
    attempts: usize,
}

impl Controller {
    pub fn new() -> Self {
        Controller {
            bank: None,
            proposer: None,
            counterexamples: CounterexampleAccumulator::new(),
            attempts: 0,
        }
    }

    pub fn with_bank(mut self, bank: FixBank) -> Self {
        self.bank = Some(bank);
        self
    }

    pub fn with_proposer(
        mut self,
        proposer: Box<dyn TemplateProposer>,
    ) -> Self {
        self.proposer = Some(proposer);
        self
    }

    pub fn bank(&self) -> Option<&FixBank> {
        self.bank.as_ref()
    }

    /// Violations seen across attempts that no successful repair has
    /// discharged yet.
    pub fn counterexamples(&self) -> &CounterexampleAccumulator {
        &self.counterexamples
    }

    /// Verify, pick a template source, run the CEGIS loop, and on success
    /// store the recipe in the Fix Bank (new entry on a miss, merge on a
    /// hit).
    pub fn repair_artifact<A: Artifact>(
        &mut self,
        artifact: &A,
        oracles: &[Box<dyn Oracle<A>>],
        request: RepairRequest,
    ) -> Result<RepairReport<A>, ControlError> {
        let attempt = self.attempts;
        self.attempts += 1;

        let violations = check_all(artifact, oracles)
            .map_err(|(oracle, message)| {
                ControlError::Repair(RepairError::Oracle { oracle, message })
            })?;

        if violations.is_empty() {
            log::info!("artifact already passes all oracles");
            return Ok(RepairReport {
                outcome: RepairOutcome {
                    artifact: artifact.clone(),
                    status: RepairStatus::Success,
                    iterations: 0,
                    tried_candidates: 0,
                    constraints: vec![],
                    last_assignment: None,
                    violations: vec![],
                },
                fixbank_hit: false,
                proposer_calls: 0,
                template_source: None,
            });
        }

        let new = self
            .counterexamples
            .add_all(violations.clone(), attempt);
        log::debug!("{} new counterexamples recorded", new);

        let artifact_json = artifact.to_serializable();
        let signature = build_signature(&artifact_json, &violations);
        log::info!(
            "signature: oracles={:?} codes={:?}",
            signature.failed_oracles,
            signature.error_codes
        );

        // Template acquisition priority: Fix Bank, proposer, default,
        // caller-provided.
        let mut fixbank_hit = false;
        let mut proposer_calls = 0;
        let mut bank_constraints: Option<Vec<Constraint>> = None;
        let mut source = None;
        let mut template_and_holes: Option<(PatchTemplate, HoleSpace)> = None;

        if let Some(bank) = &self.bank {
            if let Some(entry) = bank.lookup(&signature) {
                log::info!(
                    "fix bank hit: reusing template with {} constraints",
                    entry.learned_constraints.len()
                );
                template_and_holes =
                    Some((entry.template.clone(), entry.hole_space.clone()));
                bank_constraints = Some(entry.learned_constraints.clone());
                fixbank_hit = true;
                source = Some(TemplateSource::FixBank);
            }
        }

        if template_and_holes.is_none() {
            if let Some(proposer) = &self.proposer {
                proposer_calls += 1;
                match proposer.propose(&artifact_json, &violations) {
                    Ok(pair) => {
                        log::info!(
                            "proposer '{}' supplied a template",
                            proposer.name()
                        );
                        template_and_holes = Some(pair);
                        source = Some(TemplateSource::Proposer);
                    }
                    Err(e) => {
                        log::warn!(
                            "proposer '{}' failed: {}",
                            proposer.name(),
                            e
                        );
                    }
                }
            }
        }

        let mut request = request;
        if template_and_holes.is_none() {
            if let Some(pair) = request.default_template.take() {
                log::info!("using default template");
                template_and_holes = Some(pair);
                source = Some(TemplateSource::Default);
            }
        }

        if template_and_holes.is_none() {
            if let (Some(template), Some(holes)) =
                (request.template.take(), request.hole_space.take())
            {
                template_and_holes = Some((template, holes));
                source = Some(TemplateSource::Provided);
            }
        }

        let (template, hole_space) =
            template_and_holes.ok_or(ControlError::NoTemplate)?;

        let initial_constraints = request
            .initial_constraints
            .or(bank_constraints)
            .unwrap_or_default();

        let outcome = repair(
            artifact,
            &template,
            &hole_space,
            oracles,
            request.max_iters,
            &initial_constraints,
            &request.config,
        )
        .map_err(ControlError::Repair)?;

        if outcome.status == RepairStatus::Success {
            let satisfied =
                self.counterexamples.mark_all_satisfied(&violations);
            log::debug!("{} counterexamples satisfied", satisfied);

            if let Some(bank) = &mut self.bank {
                let entry = FixEntry {
                    signature,
                    template,
                    hole_space,
                    learned_constraints: outcome.constraints.clone(),
                    successful_assignment: outcome.last_assignment.clone(),
                    metadata: FixMetadata {
                        candidates_tried: Some(outcome.tried_candidates),
                        ..FixMetadata::default()
                    },
                };
                if let Err(e) = bank.add(entry) {
                    log::error!("failed to update fix bank: {}", e);
                }
            }
        }

        Ok(RepairReport {
            outcome,
            fixbank_hit,
            proposer_calls,
            template_source: source,
        })
    }
}

impl Default for Controller {
    fn default() -> Self {
        Controller::new()
    }
}
