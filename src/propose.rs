//! # Template proposers
//!
//! The boundary behind which template generation lives. The controller asks
//! a proposer for a template/hole-space pair when the Fix Bank has nothing
//! for the current signature. [`HintProposer`] derives a minimal template
//! from the observed violations' error codes; an LLM-backed proposer would
//! implement the same trait.

use crate::oracle::Violation;
use crate::template::{HoleSpace, PatchTemplate, TemplateArg, TemplateOp};
use crate::value::Value;

use indexmap::{IndexMap, IndexSet};

/// Produces a repair template and hole space for an artifact that failed
/// verification. An `Err` makes the controller fall through to the next
/// template source.
pub trait TemplateProposer {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn propose(
        &self,
        artifact_json: &serde_json::Value,
        violations: &[Violation],
    ) -> Result<(PatchTemplate, HoleSpace), String>;
}

////////////////////////////////////////////////////////////////////////////////
// Hint-driven proposer

/// Maps violation error codes and oracle families to the patch operations
/// that can discharge them, proposing only the operations and holes the
/// observed failures call for.
pub struct HintProposer;

// Pulls the container name and env label out of the first Deployment in the
// artifact's serialized form.
fn extract_target(
    artifact_json: &serde_json::Value,
) -> (Option<String>, Option<String>) {
    let files = match artifact_json.get("files").and_then(|f| f.as_object()) {
        Some(files) => files,
        None => return (None, None),
    };

    for doc in files.values() {
        if doc.get("kind").and_then(|k| k.as_str()) != Some("Deployment") {
            continue;
        }
        let container = doc
            .pointer("/spec/template/spec/containers/0/name")
            .and_then(|n| n.as_str())
            .map(str::to_owned);
        let env = doc
            .pointer("/spec/template/metadata/labels/env")
            .and_then(|e| e.as_str())
            .map(str::to_owned);
        return (container, env);
    }
    (None, None)
}

fn str_set<I: IntoIterator<Item = &'static str>>(items: I) -> IndexSet<Value> {
    items.into_iter().map(Value::from).collect()
}

impl HintProposer {
    fn label_domain(label: &str) -> IndexSet<Value> {
        match label {
            "env" => str_set(["production-us", "staging-us", "dev-us"]),
            "team" => str_set(["payments", "platform", "data"]),
            "tier" => str_set(["frontend", "backend", "data"]),
            _ => IndexSet::new(),
        }
    }
}

impl TemplateProposer for HintProposer {
    fn name(&self) -> &str {
        "hints"
    }

    fn propose(
        &self,
        artifact_json: &serde_json::Value,
        violations: &[Violation],
    ) -> Result<(PatchTemplate, HoleSpace), String> {
        let (container, env) = extract_target(artifact_json);
        let container = container
            .ok_or_else(|| "no container found in artifact".to_owned())?;

        let mut ops = vec![];
        let mut holes: HoleSpace = IndexMap::new();
        let mut needs_security = false;

        for violation in violations {
            let code = violation.error_code().unwrap_or("");
            let family = violation.oracle_family();

            if let Some(label) =
                violation.id.strip_prefix("policy.MISSING_LABEL_")
            {
                let label = label.to_lowercase();
                let hole = label.clone();
                let domain = HintProposer::label_domain(&label);
                if domain.is_empty() || holes.contains_key(&hole) {
                    continue;
                }
                let mut args = IndexMap::new();
                args.insert(
                    "scope".to_owned(),
                    TemplateArg::value("podTemplate"),
                );
                args.insert("key".to_owned(), TemplateArg::value(label));
                args.insert("value".to_owned(), TemplateArg::hole(&hole));
                ops.push(TemplateOp::new("EnsureLabel", args));
                holes.insert(hole, domain);
                continue;
            }

            match code {
                "ENV_PROD_REPLICA_COUNT" => {
                    if holes.contains_key("replicas") {
                        continue;
                    }
                    let mut args = IndexMap::new();
                    args.insert(
                        "replicas".to_owned(),
                        TemplateArg::hole("replicas"),
                    );
                    ops.push(TemplateOp::new("EnsureReplicas", args));
                    holes.insert(
                        "replicas".to_owned(),
                        [3, 4, 5].into_iter().map(Value::from).collect(),
                    );
                }
                "ENV_PROD_PROFILE_SMALL" => {
                    if holes.contains_key("profile") {
                        continue;
                    }
                    let mut args = IndexMap::new();
                    args.insert(
                        "container".to_owned(),
                        TemplateArg::value(container.as_str()),
                    );
                    args.insert(
                        "profile".to_owned(),
                        TemplateArg::hole("profile"),
                    );
                    ops.push(TemplateOp::new("EnsureResourceProfile", args));
                    holes.insert(
                        "profile".to_owned(),
                        str_set(["medium", "large"]),
                    );
                }
                "IMAGE_NOT_FROM_ECR" | "ECR_ENV_MISMATCH"
                | "ENV_PROD_IMAGE_TAG" => {
                    if holes.contains_key("version") {
                        continue;
                    }
                    let env = env.as_deref().unwrap_or("production-us");
                    let mut versions = IndexSet::new();
                    for tag in ["prod-1.2.3", "prod-1.2.4", "prod-1.3.0"] {
                        versions.insert(Value::from(format!(
                            "123456789012.dkr.ecr.us-east-1.amazonaws.com/{}/{}:{}",
                            env, container, tag
                        )));
                    }
                    let mut args = IndexMap::new();
                    args.insert(
                        "container".to_owned(),
                        TemplateArg::value(container.as_str()),
                    );
                    args.insert(
                        "version".to_owned(),
                        TemplateArg::hole("version"),
                    );
                    ops.push(TemplateOp::new("EnsureImageVersion", args));
                    holes.insert("version".to_owned(), versions);
                }
                _ => {}
            }

            if violation.id == "policy.MISSING_PRIORITY_CLASS"
                && !holes.contains_key("priority_class")
            {
                let mut args = IndexMap::new();
                args.insert(
                    "name".to_owned(),
                    TemplateArg::hole("priority_class"),
                );
                ops.push(TemplateOp::new("EnsurePriorityClass", args));
                holes.insert(
                    "priority_class".to_owned(),
                    str_set(["critical", "high-priority"]),
                );
            }

            if family == "resource" && !holes.contains_key("profile") {
                let mut args = IndexMap::new();
                args.insert(
                    "container".to_owned(),
                    TemplateArg::value(container.as_str()),
                );
                args.insert("profile".to_owned(), TemplateArg::hole("profile"));
                ops.push(TemplateOp::new("EnsureResourceProfile", args));
                holes.insert(
                    "profile".to_owned(),
                    str_set(["small", "medium", "large"]),
                );
            }

            if family == "security" && !needs_security {
                needs_security = true;
                let mut args = IndexMap::new();
                args.insert(
                    "container".to_owned(),
                    TemplateArg::value(container.as_str()),
                );
                ops.push(TemplateOp::new("EnsureSecurityBaseline", args));
            }
        }

        if ops.is_empty() {
            return Err(
                "no patch operation maps to the observed violations".to_owned()
            );
        }

        log::info!(
            "proposed template with {} ops over {} holes",
            ops.len(),
            holes.len()
        );
        Ok((PatchTemplate { ops }, holes))
    }
}
