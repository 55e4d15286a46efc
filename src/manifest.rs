//! # Deployment manifest artifacts
//!
//! The concrete artifact this crate ships with: a set of JSON deployment
//! manifests keyed by file path, plus the edit operations patches may apply
//! to them. Only documents with `kind: Deployment` are touched by edits; all
//! other documents pass through unchanged.

use crate::oracle::{Artifact, PatchApplyError};
use crate::template::{Patch, PatchOp};
use crate::value::Value;

use indexmap::IndexMap;
use serde_json::json;
use std::path::Path;

////////////////////////////////////////////////////////////////////////////////
// Resource profiles

pub const PROFILE_NAMES: [&str; 3] = ["small", "medium", "large"];

/// The requests/limits block for a named resource profile.
pub fn profile_resources(profile: &str) -> Option<serde_json::Value> {
    match profile {
        "small" => Some(json!({
            "requests": { "cpu": "100m", "memory": "128Mi" },
            "limits": { "cpu": "200m", "memory": "256Mi" },
        })),
        "medium" => Some(json!({
            "requests": { "cpu": "500m", "memory": "512Mi" },
            "limits": { "cpu": "1000m", "memory": "1Gi" },
        })),
        "large" => Some(json!({
            "requests": { "cpu": "1000m", "memory": "1Gi" },
            "limits": { "cpu": "2000m", "memory": "2Gi" },
        })),
        _ => None,
    }
}

////////////////////////////////////////////////////////////////////////////////
// Document helpers

pub fn is_deployment(doc: &serde_json::Value) -> bool {
    doc.get("kind").and_then(|k| k.as_str()) == Some("Deployment")
}

/// The value of a pod-template label, if present.
pub fn pod_template_label<'a>(
    doc: &'a serde_json::Value,
    key: &str,
) -> Option<&'a str> {
    doc.pointer("/spec/template/metadata/labels")?
        .get(key)?
        .as_str()
}

pub fn containers(doc: &serde_json::Value) -> &[serde_json::Value] {
    doc.pointer("/spec/template/spec/containers")
        .and_then(|c| c.as_array())
        .map(|c| c.as_slice())
        .unwrap_or(&[])
}

fn containers_mut(
    doc: &mut serde_json::Value,
) -> Option<&mut Vec<serde_json::Value>> {
    doc.pointer_mut("/spec/template/spec/containers")?
        .as_array_mut()
}

// Walks `path` from the document root, inserting empty objects as needed, and
// returns the object at the end. Returns `None` if a step exists but is not
// an object.
fn ensure_object<'a>(
    root: &'a mut serde_json::Value,
    path: &[&str],
) -> Option<&'a mut serde_json::Map<String, serde_json::Value>> {
    let mut cur = root;
    for key in path {
        let obj = cur.as_object_mut()?;
        cur = obj
            .entry(*key)
            .or_insert_with(|| serde_json::Value::Object(Default::default()));
    }
    cur.as_object_mut()
}

////////////////////////////////////////////////////////////////////////////////
// Artifact

/// One or more JSON deployment manifests (typically a single Deployment).
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestArtifact {
    pub files: IndexMap<String, serde_json::Value>,
}

impl ManifestArtifact {
    pub fn new(files: IndexMap<String, serde_json::Value>) -> Self {
        ManifestArtifact { files }
    }

    pub fn single(
        path: impl Into<String>,
        doc: serde_json::Value,
    ) -> Self {
        let mut files = IndexMap::new();
        files.insert(path.into(), doc);
        ManifestArtifact { files }
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        let doc: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| format!("cannot parse {}: {}", path.display(), e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| format!("not a file: {}", path.display()))?;
        Ok(ManifestArtifact::single(name, doc))
    }

    /// Load every file in `dir` matching `pattern` (e.g. `*.json`).
    pub fn from_dir(dir: &Path, pattern: &str) -> Result<Self, String> {
        let full_pattern = dir.join(pattern);
        let full_pattern = full_pattern
            .to_str()
            .ok_or_else(|| format!("non-UTF-8 path: {}", dir.display()))?;

        let mut files = IndexMap::new();
        let paths =
            glob::glob(full_pattern).map_err(|e| e.to_string())?;
        for entry in paths {
            let path = entry.map_err(|e| e.to_string())?;
            if !path.is_file() {
                continue;
            }
            let loaded = ManifestArtifact::from_file(&path)?;
            files.extend(loaded.files);
        }

        if files.is_empty() {
            return Err(format!(
                "no manifests matching '{}' in {}",
                pattern,
                dir.display()
            ));
        }
        Ok(ManifestArtifact { files })
    }

    /// Write every manifest to `dir`, creating it if needed. When
    /// `output_filename` is given the first file is written under that name
    /// instead of its own.
    pub fn write_to_dir(
        &self,
        dir: &Path,
        output_filename: Option<&str>,
    ) -> Result<(), String> {
        std::fs::create_dir_all(dir).map_err(|e| e.to_string())?;

        for (i, (rel_path, doc)) in self.files.iter().enumerate() {
            let name = match (i, output_filename) {
                (0, Some(name)) => name,
                _ => rel_path.as_str(),
            };
            let target = dir.join(name);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
            }
            let json = serde_json::to_string_pretty(doc)
                .map_err(|e| e.to_string())?;
            std::fs::write(&target, json + "\n").map_err(|e| {
                format!("cannot write {}: {}", target.display(), e)
            })?;
        }
        Ok(())
    }
}

impl Artifact for ManifestArtifact {
    fn apply_patch(&self, patch: &Patch) -> Result<Self, PatchApplyError> {
        let mut files = self.files.clone();
        for op in &patch.ops {
            apply_op(&mut files, op)?;
        }
        Ok(ManifestArtifact { files })
    }

    fn to_serializable(&self) -> serde_json::Value {
        json!({ "files": self.files })
    }
}

////////////////////////////////////////////////////////////////////////////////
// Patch operations

fn apply_op(
    files: &mut IndexMap<String, serde_json::Value>,
    op: &PatchOp,
) -> Result<(), PatchApplyError> {
    match op.op.as_str() {
        "EnsureLabel" => ensure_label(files, op),
        "EnsureImageVersion" => ensure_image_version(files, op),
        "EnsureSecurityBaseline" => ensure_security_baseline(files, op),
        "EnsureResourceProfile" => ensure_resource_profile(files, op),
        "EnsureReplicas" => ensure_replicas(files, op),
        "EnsurePriorityClass" => ensure_priority_class(files, op),
        other => Err(PatchApplyError::new(other, "unknown patch operation")),
    }
}

fn str_arg<'a>(op: &'a PatchOp, key: &str) -> Result<&'a str, PatchApplyError> {
    op.args.get(key).and_then(Value::as_str).ok_or_else(|| {
        PatchApplyError::new(
            &op.op,
            format!("missing string argument '{}'", key),
        )
    })
}

fn int_arg(op: &PatchOp, key: &str) -> Result<i64, PatchApplyError> {
    op.args.get(key).and_then(Value::as_int).ok_or_else(|| {
        PatchApplyError::new(
            &op.op,
            format!("missing integer argument '{}'", key),
        )
    })
}

fn structure_error(op: &PatchOp) -> PatchApplyError {
    PatchApplyError::new(&op.op, "manifest structure is not an object")
}

/// `{scope: "deployment" | "podTemplate" | "both", key, value}`
fn ensure_label(
    files: &mut IndexMap<String, serde_json::Value>,
    op: &PatchOp,
) -> Result<(), PatchApplyError> {
    let scope = op
        .args
        .get("scope")
        .and_then(Value::as_str)
        .unwrap_or("both");
    let key = str_arg(op, "key")?;
    let value = str_arg(op, "value")?;

    for doc in files.values_mut() {
        if !is_deployment(doc) {
            continue;
        }
        if scope == "deployment" || scope == "both" {
            let labels = ensure_object(doc, &["metadata", "labels"])
                .ok_or_else(|| structure_error(op))?;
            labels.insert(key.to_owned(), json!(value));
        }
        if scope == "podTemplate" || scope == "both" {
            let labels = ensure_object(
                doc,
                &["spec", "template", "metadata", "labels"],
            )
            .ok_or_else(|| structure_error(op))?;
            labels.insert(key.to_owned(), json!(value));
        }
    }
    Ok(())
}

/// `{container, version}`. A version containing an ECR host (or a full URL)
/// replaces the image wholesale; anything else is treated as a tag appended
/// to the current image base.
fn ensure_image_version(
    files: &mut IndexMap<String, serde_json::Value>,
    op: &PatchOp,
) -> Result<(), PatchApplyError> {
    let container_name = str_arg(op, "container")?;
    let version = str_arg(op, "version")?;

    for doc in files.values_mut() {
        if !is_deployment(doc) {
            continue;
        }
        let containers = match containers_mut(doc) {
            Some(containers) => containers,
            None => continue,
        };
        for container in containers {
            if container.get("name").and_then(|n| n.as_str())
                != Some(container_name)
            {
                continue;
            }
            let image = if version.contains(".dkr.ecr.")
                || version.starts_with("http://")
                || version.starts_with("https://")
            {
                version.to_owned()
            } else {
                let current = container
                    .get("image")
                    .and_then(|i| i.as_str())
                    .unwrap_or("");
                let base = current
                    .split(':')
                    .next()
                    .filter(|b| !b.is_empty())
                    .unwrap_or(container_name);
                format!("{}:{}", base, version)
            };
            let obj = container
                .as_object_mut()
                .ok_or_else(|| structure_error(op))?;
            obj.insert("image".to_owned(), json!(image));
        }
    }
    Ok(())
}

/// `{container}`: non-root, no privilege escalation, read-only root
/// filesystem, all capabilities dropped.
fn ensure_security_baseline(
    files: &mut IndexMap<String, serde_json::Value>,
    op: &PatchOp,
) -> Result<(), PatchApplyError> {
    let container_name = str_arg(op, "container")?;

    for doc in files.values_mut() {
        if !is_deployment(doc) {
            continue;
        }
        let containers = match containers_mut(doc) {
            Some(containers) => containers,
            None => continue,
        };
        for container in containers {
            if container.get("name").and_then(|n| n.as_str())
                != Some(container_name)
            {
                continue;
            }
            let ctx = ensure_object(container, &["securityContext"])
                .ok_or_else(|| structure_error(op))?;
            ctx.insert("runAsNonRoot".to_owned(), json!(true));
            ctx.insert("allowPrivilegeEscalation".to_owned(), json!(false));
            ctx.insert("readOnlyRootFilesystem".to_owned(), json!(true));
            let caps =
                ensure_object(container, &["securityContext", "capabilities"])
                    .ok_or_else(|| structure_error(op))?;
            caps.insert("drop".to_owned(), json!(["ALL"]));
        }
    }
    Ok(())
}

/// `{container, profile}`: replaces the container's resources block with the
/// named profile's requests/limits.
fn ensure_resource_profile(
    files: &mut IndexMap<String, serde_json::Value>,
    op: &PatchOp,
) -> Result<(), PatchApplyError> {
    let container_name = str_arg(op, "container")?;
    let profile = str_arg(op, "profile")?;

    let resources = profile_resources(profile).ok_or_else(|| {
        PatchApplyError::new(
            &op.op,
            format!(
                "unknown resource profile '{}' (valid: {})",
                profile,
                PROFILE_NAMES.join(", ")
            ),
        )
    })?;

    for doc in files.values_mut() {
        if !is_deployment(doc) {
            continue;
        }
        let containers = match containers_mut(doc) {
            Some(containers) => containers,
            None => continue,
        };
        for container in containers {
            if container.get("name").and_then(|n| n.as_str())
                != Some(container_name)
            {
                continue;
            }
            let obj = container
                .as_object_mut()
                .ok_or_else(|| structure_error(op))?;
            obj.insert("resources".to_owned(), resources.clone());
        }
    }
    Ok(())
}

/// `{replicas}`
fn ensure_replicas(
    files: &mut IndexMap<String, serde_json::Value>,
    op: &PatchOp,
) -> Result<(), PatchApplyError> {
    let replicas = int_arg(op, "replicas")?;

    for doc in files.values_mut() {
        if !is_deployment(doc) {
            continue;
        }
        let spec =
            ensure_object(doc, &["spec"]).ok_or_else(|| structure_error(op))?;
        spec.insert("replicas".to_owned(), json!(replicas));
    }
    Ok(())
}

/// `{name}`: sets `spec.priorityClassName`; an absent value removes it.
fn ensure_priority_class(
    files: &mut IndexMap<String, serde_json::Value>,
    op: &PatchOp,
) -> Result<(), PatchApplyError> {
    let name = op.args.get("name").ok_or_else(|| {
        PatchApplyError::new(&op.op, "missing argument 'name'")
    })?;

    for doc in files.values_mut() {
        if !is_deployment(doc) {
            continue;
        }
        let spec =
            ensure_object(doc, &["spec"]).ok_or_else(|| structure_error(op))?;
        match name {
            Value::Absent => {
                spec.remove("priorityClassName");
            }
            Value::Str(s) => {
                spec.insert("priorityClassName".to_owned(), json!(s));
            }
            other => {
                return Err(PatchApplyError::new(
                    &op.op,
                    format!("'name' must be a string or absent, got {}", other),
                ))
            }
        }
    }
    Ok(())
}
