//! Shared fixtures: a minimal key-value artifact and closure-backed oracles.

#![allow(dead_code)]

use manifix::oracle::{Artifact, Oracle, PatchApplyError, Violation};
use manifix::template::{
    HoleSpace, Patch, PatchTemplate, TemplateArg, TemplateOp,
};
use manifix::value::Value;

use indexmap::{IndexMap, IndexSet};
use serde_json::json;

/// A flat string-to-value store. The only patch operation is `Set`, whose
/// arguments are written into the store verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct KvArtifact {
    pub entries: IndexMap<String, Value>,
}

impl KvArtifact {
    pub fn new() -> Self {
        KvArtifact {
            entries: IndexMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.entries.insert(key.to_owned(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }
}

impl Artifact for KvArtifact {
    fn apply_patch(&self, patch: &Patch) -> Result<Self, PatchApplyError> {
        let mut next = self.clone();
        for op in &patch.ops {
            if op.op != "Set" {
                return Err(PatchApplyError::new(
                    &op.op,
                    "unknown patch operation",
                ));
            }
            for (key, value) in &op.args {
                next.entries.insert(key.clone(), value.clone());
            }
        }
        Ok(next)
    }

    fn to_serializable(&self) -> serde_json::Value {
        let entries: serde_json::Map<String, serde_json::Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        json!({ "entries": entries })
    }
}

/// A template with one `Set` op whose arguments are all holes named after
/// themselves.
pub fn set_template(holes: &[&str]) -> PatchTemplate {
    let mut args = IndexMap::new();
    for hole in holes {
        args.insert((*hole).to_owned(), TemplateArg::hole(*hole));
    }
    PatchTemplate {
        ops: vec![TemplateOp::new("Set", args)],
    }
}

pub fn hole_space(
    domains: &[(&str, Vec<Value>)],
) -> HoleSpace {
    domains
        .iter()
        .map(|(hole, values)| {
            (
                (*hole).to_owned(),
                values.iter().cloned().collect::<IndexSet<Value>>(),
            )
        })
        .collect()
}

pub fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().copied().map(Value::from).collect()
}

pub fn strs(values: &[&str]) -> Vec<Value> {
    values.iter().copied().map(Value::from).collect()
}

struct FnOracle<F> {
    name: String,
    check: F,
}

impl<A, F> Oracle<A> for FnOracle<F>
where
    F: Fn(&A) -> Result<Vec<Violation>, String>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, artifact: &A) -> Result<Vec<Violation>, String> {
        (self.check)(artifact)
    }
}

pub fn oracle<A: 'static>(
    name: &str,
    check: impl Fn(&A) -> Result<Vec<Violation>, String> + 'static,
) -> Box<dyn Oracle<A>> {
    Box::new(FnOracle {
        name: name.to_owned(),
        check,
    })
}

/// An oracle requiring `key` to equal `expected`, reporting a
/// `forbid_value` hint for the actual value otherwise.
pub fn require_value(
    key: &'static str,
    expected: impl Into<Value>,
) -> Box<dyn Oracle<KvArtifact>> {
    let expected = expected.into();
    oracle("require", move |artifact: &KvArtifact| {
        match artifact.get(key) {
            Some(actual) if *actual == expected => Ok(vec![]),
            Some(actual) => Ok(vec![Violation::new(
                format!("require.WRONG_VALUE_{}", key.to_uppercase()),
                format!("{} must be {}, got {}", key, expected, actual),
                vec!["store".to_owned(), key.to_owned()],
            )
            .with_evidence(json!({
                "error_code": format!("WRONG_VALUE_{}", key.to_uppercase()),
                "forbid_value": { "hole": key, "value": actual.to_json() },
            }))]),
            None => Ok(vec![Violation::new(
                format!("require.MISSING_{}", key.to_uppercase()),
                format!("{} must be set", key),
                vec!["store".to_owned(), key.to_owned()],
            )
            .with_evidence(json!({
                "error_code": format!("MISSING_{}", key.to_uppercase()),
            }))]),
        }
    })
}

/// A unique path under the system temp directory.
pub fn temp_path(tag: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "manifix-test-{}-{}.json",
        tag,
        std::process::id()
    ))
}
