//! # Manifest oracles
//!
//! The checks this crate ships for deployment manifests: organization
//! policies (environments, replica ranges, image provenance, required
//! labels), the container security baseline, and resource-profile
//! conformance. Policy violations carry `forbid_value`/`forbid_tuple`
//! evidence hints wherever a failing value can be ruled out directly.

use crate::manifest::{self, ManifestArtifact};
use crate::oracle::{Oracle, Severity, Violation};

use serde_json::json;

/// Environments subject to production policy.
pub fn is_prod(env: &str) -> bool {
    env == "prod" || env == "production-us"
}

fn first_container_requests(doc: &serde_json::Value) -> (String, String) {
    let containers = manifest::containers(doc);
    let requests = containers
        .first()
        .and_then(|c| c.pointer("/resources/requests"));
    let get = |key: &str| {
        requests
            .and_then(|r| r.get(key))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_owned()
    };
    (get("cpu"), get("memory"))
}

// Classifies a container's requests against the standard profiles; falls
// back to substring heuristics for near-misses so a hand-edited "small-ish"
// block is still recognized.
fn extract_profile(doc: &serde_json::Value) -> String {
    if manifest::containers(doc).is_empty() {
        return String::new();
    }
    let (cpu, memory) = first_container_requests(doc);

    for name in manifest::PROFILE_NAMES {
        if let Some(profile) = manifest::profile_resources(name) {
            let req_cpu = profile.pointer("/requests/cpu").and_then(|v| v.as_str());
            let req_mem =
                profile.pointer("/requests/memory").and_then(|v| v.as_str());
            if Some(cpu.as_str()) == req_cpu && Some(memory.as_str()) == req_mem
            {
                return name.to_owned();
            }
        }
    }

    if cpu.contains("100m") || memory.contains("128Mi") {
        "small".to_owned()
    } else if cpu.contains("500m") || memory.contains("512Mi") {
        "medium".to_owned()
    } else if cpu.contains("1000m") || memory.contains("1Gi") {
        "large".to_owned()
    } else {
        "unknown".to_owned()
    }
}

fn first_container_image(doc: &serde_json::Value) -> String {
    manifest::containers(doc)
        .first()
        .and_then(|c| c.get("image"))
        .and_then(|i| i.as_str())
        .unwrap_or("")
        .to_owned()
}

fn image_tag(image: &str) -> &str {
    match image.rsplit_once(':') {
        Some((_, tag)) => tag,
        None => "",
    }
}

// `<12-digit account>.dkr.ecr.<region>.amazonaws.com/<repo>[:<tag>]`
fn parse_ecr_image(image: &str) -> Option<(&str, &str, &str, &str)> {
    let (account, rest) = image.split_once(".dkr.ecr.")?;
    if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (region, rest) = rest.split_once(".amazonaws.com/")?;
    if region.is_empty() || region.contains('.') || rest.is_empty() {
        return None;
    }
    let (repo, tag) = match rest.rsplit_once(':') {
        Some((repo, tag)) => (repo, tag),
        None => (rest, ""),
    };
    Some((account, region, repo, tag))
}

////////////////////////////////////////////////////////////////////////////////
// Policy oracle

/// Organization policy checks for production deployments: replica range,
/// resource profile floor, image tag discipline, required labels, priority
/// class, and ECR image provenance.
pub struct PolicyOracle;

impl PolicyOracle {
    fn check_ecr(
        &self,
        image: &str,
        env: &str,
        filepath: &str,
    ) -> Option<Violation> {
        let (_, _, repo, tag) = match parse_ecr_image(image) {
            Some(parts) => parts,
            None => {
                return Some(
                    Violation::new(
                        "policy.IMAGE_NOT_FROM_ECR",
                        format!("image must come from AWS ECR, got {}", image),
                        vec![
                            filepath.to_owned(),
                            "spec".to_owned(),
                            "template".to_owned(),
                            "spec".to_owned(),
                            "containers".to_owned(),
                            "image".to_owned(),
                        ],
                    )
                    .with_evidence(json!({
                        "image": image,
                        "error_code": "IMAGE_NOT_FROM_ECR",
                        "forbid_value": { "hole": "version", "value": image },
                    })),
                )
            }
        };

        if env.is_empty() {
            return None;
        }
        let env_lower = env.to_lowercase();
        if repo.to_lowercase().contains(&env_lower)
            || tag.to_lowercase().contains(&env_lower)
        {
            return None;
        }
        Some(
            Violation::new(
                "policy.ECR_ENV_MISMATCH",
                format!(
                    "ECR image must match environment '{}', got {}",
                    env, image
                ),
                vec![
                    filepath.to_owned(),
                    "spec".to_owned(),
                    "template".to_owned(),
                    "spec".to_owned(),
                    "containers".to_owned(),
                    "image".to_owned(),
                ],
            )
            .with_evidence(json!({
                "env": env,
                "image": image,
                "error_code": "ECR_ENV_MISMATCH",
                "forbid_tuple": {
                    "holes": ["env", "version"],
                    "values": [env, image],
                },
            })),
        )
    }
}

impl Oracle<ManifestArtifact> for PolicyOracle {
    fn name(&self) -> &str {
        "policy"
    }

    fn check(
        &self,
        artifact: &ManifestArtifact,
    ) -> Result<Vec<Violation>, String> {
        let mut violations = vec![];

        for (filepath, doc) in &artifact.files {
            if !manifest::is_deployment(doc) {
                continue;
            }

            let env = manifest::pod_template_label(doc, "env")
                .unwrap_or("")
                .to_owned();
            let replicas =
                doc.pointer("/spec/replicas").and_then(|r| r.as_i64());
            let priority_class = doc
                .pointer("/spec/priorityClassName")
                .and_then(|p| p.as_str())
                .unwrap_or("");
            let profile = extract_profile(doc);
            let image = first_container_image(doc);
            let tag = image_tag(&image).to_owned();

            if !image.is_empty() {
                if let Some(v) = self.check_ecr(&image, &env, filepath) {
                    violations.push(v);
                }
            }

            if !is_prod(&env) {
                continue;
            }

            if let Some(replicas) = replicas {
                if !(3..=5).contains(&replicas) {
                    violations.push(
                        Violation::new(
                            "policy.ENV_PROD_REPLICA_COUNT",
                            format!(
                                "env={} requires replicas in [3,5], got {}",
                                env, replicas
                            ),
                            vec![
                                filepath.to_owned(),
                                "spec".to_owned(),
                                "replicas".to_owned(),
                            ],
                        )
                        .with_evidence(json!({
                            "env": env,
                            "replicas": replicas,
                            "error_code": "ENV_PROD_REPLICA_COUNT",
                            "forbid_tuple": {
                                "holes": ["env", "replicas"],
                                "values": [env, replicas],
                            },
                        })),
                    );
                }
            }

            if profile == "small" {
                violations.push(
                    Violation::new(
                        "policy.ENV_PROD_PROFILE_SMALL",
                        format!(
                            "env={} requires profile in {{medium, large}}, got small",
                            env
                        ),
                        vec![
                            filepath.to_owned(),
                            "spec".to_owned(),
                            "template".to_owned(),
                            "spec".to_owned(),
                            "containers".to_owned(),
                        ],
                    )
                    .with_evidence(json!({
                        "env": env,
                        "profile": profile,
                        "error_code": "ENV_PROD_PROFILE_SMALL",
                        "forbid_tuple": {
                            "holes": ["env", "profile"],
                            "values": [env, "small"],
                        },
                    })),
                );
            }

            if !tag.is_empty() && (tag == "latest" || tag.contains("staging")) {
                violations.push(
                    Violation::new(
                        "policy.ENV_PROD_IMAGE_TAG",
                        format!(
                            "env={} requires prod-x.y.z tag pattern, got {}",
                            env, tag
                        ),
                        vec![
                            filepath.to_owned(),
                            "spec".to_owned(),
                            "template".to_owned(),
                            "spec".to_owned(),
                            "containers".to_owned(),
                            "image".to_owned(),
                        ],
                    )
                    .with_evidence(json!({
                        "env": env,
                        "image_tag": tag,
                        "error_code": "ENV_PROD_IMAGE_TAG",
                    })),
                );
            }

            for label in ["env", "team", "tier"] {
                if manifest::pod_template_label(doc, label)
                    .unwrap_or("")
                    .is_empty()
                {
                    violations.push(
                        Violation::new(
                            format!(
                                "policy.MISSING_LABEL_{}",
                                label.to_uppercase()
                            ),
                            format!("env={} requires label '{}'", env, label),
                            vec![
                                filepath.to_owned(),
                                "spec".to_owned(),
                                "template".to_owned(),
                                "metadata".to_owned(),
                                "labels".to_owned(),
                            ],
                        )
                        .with_evidence(json!({ "missing_label": label })),
                    );
                }
            }

            if priority_class.is_empty() {
                violations.push(
                    Violation::new(
                        "policy.MISSING_PRIORITY_CLASS",
                        format!(
                            "env={} requires priorityClassName to be set",
                            env
                        ),
                        vec![
                            filepath.to_owned(),
                            "spec".to_owned(),
                            "priorityClassName".to_owned(),
                        ],
                    )
                    .with_evidence(json!({ "env": env })),
                );
            }
        }

        Ok(violations)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Security oracle

/// Container security baseline: every container must run as non-root and
/// must disable privilege escalation.
pub struct SecurityOracle;

impl Oracle<ManifestArtifact> for SecurityOracle {
    fn name(&self) -> &str {
        "security"
    }

    fn check(
        &self,
        artifact: &ManifestArtifact,
    ) -> Result<Vec<Violation>, String> {
        let mut violations = vec![];

        for (filepath, doc) in &artifact.files {
            if !manifest::is_deployment(doc) {
                continue;
            }

            for container in manifest::containers(doc) {
                let name = container
                    .get("name")
                    .and_then(|n| n.as_str())
                    .unwrap_or("unknown");
                let ctx = container.get("securityContext");

                let run_as_non_root = ctx
                    .and_then(|c| c.get("runAsNonRoot"))
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                if !run_as_non_root {
                    violations.push(
                        Violation::new(
                            format!("security.NO_RUN_AS_NON_ROOT.{}", name),
                            format!(
                                "container {} must set runAsNonRoot=true",
                                name
                            ),
                            vec![
                                filepath.to_owned(),
                                "spec".to_owned(),
                                "template".to_owned(),
                                "spec".to_owned(),
                                "containers".to_owned(),
                                name.to_owned(),
                                "securityContext".to_owned(),
                            ],
                        )
                        .with_evidence(json!({ "container": name })),
                    );
                }

                let escalation = ctx
                    .and_then(|c| c.get("allowPrivilegeEscalation"))
                    .and_then(|v| v.as_bool());
                if escalation != Some(false) {
                    violations.push(
                        Violation::new(
                            format!("security.PRIVILEGE_ESCALATION.{}", name),
                            format!(
                                "container {} must set allowPrivilegeEscalation=false",
                                name
                            ),
                            vec![
                                filepath.to_owned(),
                                "spec".to_owned(),
                                "template".to_owned(),
                                "spec".to_owned(),
                                "containers".to_owned(),
                                name.to_owned(),
                                "securityContext".to_owned(),
                            ],
                        )
                        .with_evidence(json!({ "container": name })),
                    );
                }
            }
        }

        Ok(violations)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Resource oracle

/// Resource conformance: every container declares resources, and requests
/// should match one of the standard profiles.
pub struct ResourceOracle;

impl Oracle<ManifestArtifact> for ResourceOracle {
    fn name(&self) -> &str {
        "resource"
    }

    fn check(
        &self,
        artifact: &ManifestArtifact,
    ) -> Result<Vec<Violation>, String> {
        let mut violations = vec![];

        for (filepath, doc) in &artifact.files {
            if !manifest::is_deployment(doc) {
                continue;
            }

            for container in manifest::containers(doc) {
                let name = container
                    .get("name")
                    .and_then(|n| n.as_str())
                    .unwrap_or("unknown");

                let resources = container.get("resources");
                if resources.map_or(true, |r| {
                    r.as_object().map_or(true, |o| o.is_empty())
                }) {
                    violations.push(
                        Violation::new(
                            format!("resource.MISSING_RESOURCES.{}", name),
                            format!(
                                "container {} must specify resources",
                                name
                            ),
                            vec![
                                filepath.to_owned(),
                                "spec".to_owned(),
                                "template".to_owned(),
                                "spec".to_owned(),
                                "containers".to_owned(),
                                name.to_owned(),
                            ],
                        )
                        .with_evidence(json!({ "container": name })),
                    );
                    continue;
                }

                let cpu = container
                    .pointer("/resources/requests/cpu")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                let memory = container
                    .pointer("/resources/requests/memory")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");

                let matches_profile =
                    manifest::PROFILE_NAMES.into_iter().any(|p| {
                        manifest::profile_resources(p).is_some_and(|spec| {
                            spec.pointer("/requests/cpu")
                                .and_then(|v| v.as_str())
                                == Some(cpu)
                                && spec
                                    .pointer("/requests/memory")
                                    .and_then(|v| v.as_str())
                                    == Some(memory)
                        })
                    });

                if !matches_profile
                    && !cpu.is_empty()
                    && !memory.is_empty()
                    && (cpu.contains("100m") || memory.contains("128Mi"))
                {
                    violations.push(
                        Violation::new(
                            format!("resource.NONSTANDARD_PROFILE.{}", name),
                            format!(
                                "container {} resources don't match standard profiles",
                                name
                            ),
                            vec![
                                filepath.to_owned(),
                                "spec".to_owned(),
                                "template".to_owned(),
                                "spec".to_owned(),
                                "containers".to_owned(),
                                name.to_owned(),
                                "resources".to_owned(),
                            ],
                        )
                        .with_severity(Severity::Warning)
                        .with_evidence(json!({
                            "container": name,
                            "cpu": cpu,
                            "memory": memory,
                            "suggested_profiles": manifest::PROFILE_NAMES,
                        })),
                    );
                }
            }
        }

        Ok(violations)
    }
}

/// The standard oracle set for manifest repair.
pub fn standard_oracles() -> Vec<Box<dyn Oracle<ManifestArtifact>>> {
    vec![
        Box::new(PolicyOracle),
        Box::new(SecurityOracle),
        Box::new(ResourceOracle),
    ]
}
