//! # Fixture deployments and stock repair templates
//!
//! Sample manifests (one compliant, one policy-breaking) and the standard
//! repair template covering labels, image, security, resources, replicas,
//! and priority class. Used by the CLI demo and the integration tests.

use crate::manifest::ManifestArtifact;
use crate::template::{HoleSpace, PatchTemplate, TemplateArg, TemplateOp};
use crate::value::Value;

use indexmap::{IndexMap, IndexSet};
use serde_json::json;

/// A deployment that passes every stock oracle.
pub fn baseline_deployment() -> ManifestArtifact {
    ManifestArtifact::single(
        "deployment.json",
        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": "payments-api",
                "labels": {
                    "app": "payments-api",
                    "env": "production-us",
                    "team": "payments",
                    "tier": "backend",
                },
            },
            "spec": {
                "replicas": 3,
                "priorityClassName": "critical",
                "selector": { "matchLabels": { "app": "payments-api" } },
                "template": {
                    "metadata": {
                        "labels": {
                            "app": "payments-api",
                            "env": "production-us",
                            "team": "payments",
                            "tier": "backend",
                        },
                    },
                    "spec": {
                        "containers": [{
                            "name": "payments-api",
                            "image": "123456789012.dkr.ecr.us-east-1.amazonaws.com/production-us/payments-api:prod-1.2.3",
                            "securityContext": {
                                "runAsNonRoot": true,
                                "allowPrivilegeEscalation": false,
                                "readOnlyRootFilesystem": true,
                                "capabilities": { "drop": ["ALL"] },
                            },
                            "resources": {
                                "requests": { "cpu": "500m", "memory": "512Mi" },
                                "limits": { "cpu": "1000m", "memory": "1Gi" },
                            },
                        }],
                    },
                },
            },
        }),
    )
}

/// A careless edit of the baseline: wrong replica count, non-ECR `latest`
/// image, small resources, no security context, missing labels and priority
/// class.
pub fn broken_deployment() -> ManifestArtifact {
    ManifestArtifact::single(
        "deployment.json",
        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": "payments-api",
                "labels": { "app": "payments-api" },
            },
            "spec": {
                "replicas": 2,
                "selector": { "matchLabels": { "app": "payments-api" } },
                "template": {
                    "metadata": {
                        "labels": { "app": "payments-api", "env": "prod" },
                    },
                    "spec": {
                        "containers": [{
                            "name": "payments-api",
                            "image": "payments-api:latest",
                            "resources": {
                                "requests": { "cpu": "100m", "memory": "128Mi" },
                            },
                        }],
                    },
                },
            },
        }),
    )
}

fn ecr_versions(envs: &IndexSet<Value>, container: &str) -> IndexSet<Value> {
    let mut versions = IndexSet::new();
    for env in envs {
        for tag in ["prod-1.2.3", "prod-1.2.4", "prod-1.3.0"] {
            versions.insert(Value::from(format!(
                "123456789012.dkr.ecr.us-east-1.amazonaws.com/{}/{}:{}",
                env, container, tag
            )));
        }
    }
    versions
}

fn label_op(key: &str, hole: &str) -> TemplateOp {
    let mut args = IndexMap::new();
    args.insert("scope".to_owned(), TemplateArg::value("podTemplate"));
    args.insert("key".to_owned(), TemplateArg::value(key));
    args.insert("value".to_owned(), TemplateArg::hole(hole));
    TemplateOp::new("EnsureLabel", args)
}

/// The full repair template over `container`: pod-template labels, image
/// version, security baseline, resource profile, replicas, priority class.
pub fn standard_template(container: &str) -> PatchTemplate {
    let mut ops = vec![
        label_op("env", "env"),
        label_op("team", "team"),
        label_op("tier", "tier"),
    ];

    let mut args = IndexMap::new();
    args.insert("container".to_owned(), TemplateArg::value(container));
    args.insert("version".to_owned(), TemplateArg::hole("version"));
    ops.push(TemplateOp::new("EnsureImageVersion", args));

    let mut args = IndexMap::new();
    args.insert("container".to_owned(), TemplateArg::value(container));
    ops.push(TemplateOp::new("EnsureSecurityBaseline", args));

    let mut args = IndexMap::new();
    args.insert("container".to_owned(), TemplateArg::value(container));
    args.insert("profile".to_owned(), TemplateArg::hole("profile"));
    ops.push(TemplateOp::new("EnsureResourceProfile", args));

    let mut args = IndexMap::new();
    args.insert("replicas".to_owned(), TemplateArg::hole("replicas"));
    ops.push(TemplateOp::new("EnsureReplicas", args));

    let mut args = IndexMap::new();
    args.insert("name".to_owned(), TemplateArg::hole("priority_class"));
    ops.push(TemplateOp::new("EnsurePriorityClass", args));

    PatchTemplate { ops }
}

fn str_set<I: IntoIterator<Item = &'static str>>(items: I) -> IndexSet<Value> {
    items.into_iter().map(Value::from).collect()
}

// Artifact-aware env neighborhoods: the extracted env plus the environments
// worth searching from it.
fn env_domain(extracted: Option<&str>) -> IndexSet<Value> {
    match extracted {
        Some("production-us") => str_set(["production-us", "staging-us"]),
        Some("staging-us") => {
            str_set(["staging-us", "production-us", "dev-us"])
        }
        Some("dev-us") => str_set(["dev-us", "staging-us"]),
        Some(other) => {
            let mut envs = IndexSet::new();
            envs.insert(Value::from(other));
            envs.extend(str_set(["production-us", "staging-us", "dev-us"]));
            envs
        }
        None => str_set(["staging-us", "production-us", "dev-us"]),
    }
}

/// The standard template and a broad hole space, with the container name
/// and label domains extracted from the first Deployment found in
/// `artifact`. Fails when no container can be found.
pub fn default_template_and_holes(
    artifact: &ManifestArtifact,
) -> Result<(PatchTemplate, HoleSpace), String> {
    let mut container = None;
    let mut env = None;
    let mut team = None;
    let mut tier = None;

    for doc in artifact.files.values() {
        if !crate::manifest::is_deployment(doc) {
            continue;
        }
        container = crate::manifest::containers(doc)
            .first()
            .and_then(|c| c.get("name"))
            .and_then(|n| n.as_str())
            .map(str::to_owned);
        env = crate::manifest::pod_template_label(doc, "env")
            .map(str::to_owned);
        team = crate::manifest::pod_template_label(doc, "team")
            .map(str::to_owned);
        tier = crate::manifest::pod_template_label(doc, "tier")
            .map(str::to_owned);
        break;
    }

    let container = container
        .ok_or_else(|| "no container found in any Deployment".to_owned())?;

    let envs = env_domain(env.as_deref());

    let mut teams = str_set(["payments", "platform", "data"]);
    if let Some(team) = team {
        teams.shift_insert(0, Value::from(team));
    }
    let mut tiers = str_set(["frontend", "backend", "data"]);
    if let Some(tier) = tier {
        tiers.shift_insert(0, Value::from(tier));
    }

    let versions = ecr_versions(&envs, &container);

    let mut holes: HoleSpace = IndexMap::new();
    holes.insert("env".to_owned(), envs);
    holes.insert("team".to_owned(), teams);
    holes.insert("tier".to_owned(), tiers);
    holes.insert("version".to_owned(), versions);
    holes.insert("profile".to_owned(), str_set(["small", "medium", "large"]));
    holes.insert(
        "replicas".to_owned(),
        [2, 3, 4, 5].into_iter().map(Value::from).collect(),
    );
    let mut priorities = IndexSet::new();
    priorities.insert(Value::Absent);
    priorities.extend(str_set(["critical", "high-priority"]));
    holes.insert("priority_class".to_owned(), priorities);

    Ok((standard_template(&container), holes))
}

/// A deliberately oversized hole space mixing valid and invalid values, to
/// show constraint learning pruning the search. Pairs with
/// [`broken_deployment`].
pub fn demo_template_and_holes() -> (PatchTemplate, HoleSpace) {
    let container = "payments-api";

    let mut holes: HoleSpace = IndexMap::new();
    holes.insert("env".to_owned(), str_set(["production-us", "prod"]));
    holes.insert(
        "team".to_owned(),
        str_set(["payments", "platform", "invalid-team"]),
    );
    holes.insert("tier".to_owned(), str_set(["backend", "frontend"]));
    holes.insert(
        "version".to_owned(),
        str_set([
            "123456789012.dkr.ecr.us-east-1.amazonaws.com/production-us/payments-api:prod-1.2.3",
            "123456789012.dkr.ecr.us-east-1.amazonaws.com/production-us/payments-api:prod-1.2.4",
            "payments-api:latest",
            "docker.io/library/payments-api:latest",
            "123456789012.dkr.ecr.us-east-1.amazonaws.com/staging-us/payments-api:staging-1.2.3",
        ]),
    );
    holes.insert("profile".to_owned(), str_set(["medium", "large", "small"]));
    holes.insert(
        "replicas".to_owned(),
        [3, 4, 5, 1, 2].into_iter().map(Value::from).collect(),
    );
    let mut priorities = str_set(["critical", "high-priority"]);
    priorities.insert(Value::Absent);
    holes.insert("priority_class".to_owned(), priorities);

    (standard_template(container), holes)
}
