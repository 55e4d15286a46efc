//! # Artifacts, oracles, and violations
//!
//! The boundary contracts the engine consumes: an [`Artifact`] is anything a
//! patch can be applied to, an [`Oracle`] is a check that reports zero or
//! more [`Violation`]s, and a violation's free-form evidence may carry
//! machine-readable constraint hints for the synthesizer.

use crate::template::Patch;

use serde::{Deserialize, Serialize};

////////////////////////////////////////////////////////////////////////////////
// Violations

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// One concrete way an artifact fails an oracle.
///
/// The `id` is expected to be prefixed by the oracle family (e.g.
/// `policy.ENV_PROD_REPLICA_COUNT`); the prefix feeds Fix Bank signatures.
/// `evidence` is free-form JSON and may carry an `error_code` field and
/// `forbid_value`/`forbid_tuple` constraint hints.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Violation {
    pub id: String,
    pub message: String,
    pub path: Vec<String>,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<serde_json::Value>,
}

impl Violation {
    pub fn new(
        id: impl Into<String>,
        message: impl Into<String>,
        path: Vec<String>,
    ) -> Self {
        Violation {
            id: id.into(),
            message: message.into(),
            path,
            severity: Severity::Error,
            evidence: None,
        }
    }

    pub fn with_evidence(mut self, evidence: serde_json::Value) -> Self {
        self.evidence = Some(evidence);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// The oracle-family prefix of the id: the substring before the first
    /// `.`, or the whole id when there is no separator.
    pub fn oracle_family(&self) -> &str {
        self.id.split('.').next().unwrap_or(&self.id)
    }

    /// The `error_code` evidence field, if present.
    pub fn error_code(&self) -> Option<&str> {
        self.evidence.as_ref()?.get("error_code")?.as_str()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Artifacts

/// Applying a concrete patch to an artifact failed (unknown operation,
/// invalid arguments).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchApplyError {
    pub op: String,
    pub message: String,
}

impl PatchApplyError {
    pub fn new(op: impl Into<String>, message: impl Into<String>) -> Self {
        PatchApplyError {
            op: op.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for PatchApplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "patch op '{}' failed: {}", self.op, self.message)
    }
}

/// A value that patches can be applied to.
///
/// `apply_patch` is pure: it returns a new artifact and must not mutate the
/// receiver. `to_serializable` is used only for diagnostics and Fix Bank
/// signature context extraction.
pub trait Artifact: Clone {
    fn apply_patch(&self, patch: &Patch) -> Result<Self, PatchApplyError>;

    fn to_serializable(&self) -> serde_json::Value;
}

////////////////////////////////////////////////////////////////////////////////
// Oracles

/// A specification check over an artifact.
///
/// `check` must be callable repeatedly and should be deterministic for a
/// fixed artifact. It may fail; the synthesizer tolerates a failing oracle
/// during candidate trials while the repair loop treats a failure during
/// verification as fatal.
pub trait Oracle<A> {
    /// Short name used in logs and error reports.
    fn name(&self) -> &str;

    fn check(&self, artifact: &A) -> Result<Vec<Violation>, String>;
}

/// Run every oracle against `artifact` and concatenate the violations,
/// stopping at the first oracle failure.
pub fn check_all<A>(
    artifact: &A,
    oracles: &[Box<dyn Oracle<A>>],
) -> Result<Vec<Violation>, (String, String)> {
    let mut violations = vec![];
    for oracle in oracles {
        match oracle.check(artifact) {
            Ok(vs) => violations.extend(vs),
            Err(e) => return Err((oracle.name().to_owned(), e)),
        }
    }
    Ok(violations)
}
