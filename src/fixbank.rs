//! # Fix Bank
//!
//! A persistent, signature-indexed cache of repair recipes. One successful
//! repair warm-starts every structurally identical future repair: the stored
//! template, hole space, and learned constraints are reused instead of
//! re-derived. The store is a pretty-printed JSON file intended to be
//! committed to version control.
//!
//! The backing store is single-writer; concurrent processes racing on the
//! same file are not synchronized here.

use crate::constraint::Constraint;
use crate::oracle::Violation;
use crate::template::{CandidateAssignment, HoleSpace, PatchTemplate};
use crate::util;
use crate::value::Value;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const FORMAT_VERSION: &str = "1.0";

////////////////////////////////////////////////////////////////////////////////
// Signatures

/// A fingerprint of which oracle families and error codes an artifact
/// currently fails. `context` carries best-effort descriptive fields (app
/// name, environment label) and is advisory only: it never participates in
/// matching, so the same shape of failure shares one fix across
/// environments.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Signature {
    pub failed_oracles: Vec<String>,
    pub error_codes: Vec<String>,
    #[serde(default)]
    pub context: IndexMap<String, String>,
}

impl Signature {
    pub fn matches(&self, other: &Signature) -> bool {
        self.failed_oracles == other.failed_oracles
            && self.error_codes == other.error_codes
    }
}

/// Build a signature from an artifact's serialized form and its current
/// violations.
pub fn build_signature(
    artifact_json: &serde_json::Value,
    violations: &[Violation],
) -> Signature {
    let mut failed_oracles: Vec<String> = violations
        .iter()
        .map(|v| v.oracle_family().to_owned())
        .collect();
    failed_oracles.sort();
    failed_oracles.dedup();

    let mut error_codes: Vec<String> = violations
        .iter()
        .filter_map(|v| v.error_code().map(str::to_owned))
        .collect();
    error_codes.sort();
    error_codes.dedup();

    Signature {
        failed_oracles,
        error_codes,
        context: extract_context(artifact_json),
    }
}

// Best-effort: peeks at the first Deployment document found under "files"
// and records its name and env label. Anything that does not look like a
// manifest bundle just yields an empty context.
fn extract_context(
    artifact_json: &serde_json::Value,
) -> IndexMap<String, String> {
    let mut context = IndexMap::new();

    let files = match artifact_json.get("files").and_then(|f| f.as_object()) {
        Some(files) => files,
        None => return context,
    };

    for doc in files.values() {
        if doc.get("kind").and_then(|k| k.as_str()) != Some("Deployment") {
            continue;
        }
        if let Some(app) = doc
            .pointer("/metadata/name")
            .and_then(|n| n.as_str())
        {
            context.insert("app".to_owned(), app.to_owned());
        }
        if let Some(env) = doc
            .pointer("/spec/template/metadata/labels/env")
            .and_then(|e| e.as_str())
        {
            context.insert("env".to_owned(), env.to_owned());
        }
        break;
    }

    context
}

////////////////////////////////////////////////////////////////////////////////
// Entries

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct FixMetadata {
    #[serde(default)]
    pub success_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidates_tried: Option<usize>,
}

/// One cached repair recipe.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FixEntry {
    pub signature: Signature,
    pub template: PatchTemplate,
    #[serde(
        serialize_with = "serialize_hole_space",
        deserialize_with = "deserialize_hole_space"
    )]
    pub hole_space: HoleSpace,
    #[serde(default)]
    pub learned_constraints: Vec<Constraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_assignment: Option<CandidateAssignment>,
    #[serde(default)]
    pub metadata: FixMetadata,
}

// Hole-space value sets serialize as lists sorted by stringified value, with
// keys sorted too, so the stored file is deterministic and diff-friendly.
fn serialize_hole_space<S>(
    hole_space: &HoleSpace,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeMap;

    let mut keys: Vec<&String> = hole_space.keys().collect();
    keys.sort();

    let mut map = serializer.serialize_map(Some(keys.len()))?;
    for key in keys {
        let mut values: Vec<&Value> = hole_space[key].iter().collect();
        values.sort_by_key(|v| v.sort_key());
        map.serialize_entry(key, &values)?;
    }
    map.end()
}

fn deserialize_hole_space<'de, D>(deserializer: D) -> Result<HoleSpace, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: IndexMap<String, Vec<Value>> =
        IndexMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(hole, values)| (hole, values.into_iter().collect()))
        .collect())
}

#[derive(Debug, Deserialize, Serialize)]
struct BankFile {
    version: String,
    entries: Vec<FixEntry>,
}

////////////////////////////////////////////////////////////////////////////////
// The bank

/// An explicit handle to the persistent store. With no path configured the
/// bank works purely in memory.
#[derive(Debug, Default)]
pub struct FixBank {
    path: Option<PathBuf>,
    entries: Vec<FixEntry>,
}

impl FixBank {
    pub fn in_memory() -> Self {
        FixBank::default()
    }

    /// Open a bank backed by `path`, loading existing entries if the file
    /// exists. A corrupt file is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut bank = FixBank {
            path: Some(path.clone()),
            entries: vec![],
        };
        if path.exists() {
            if let Err(e) = bank.load() {
                log::error!("failed to load fix bank: {}", e);
                bank.entries = vec![];
            } else {
                log::info!(
                    "loaded fix bank from {} with {} entries",
                    path.display(),
                    bank.entries.len()
                );
            }
        }
        bank
    }

    pub fn entries(&self) -> &[FixEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The first stored entry whose signature matches.
    pub fn lookup(&self, signature: &Signature) -> Option<&FixEntry> {
        let hit = self
            .entries
            .iter()
            .find(|entry| entry.signature.matches(signature));
        match hit {
            Some(_) => log::debug!("fix bank hit for {:?}", signature),
            None => log::debug!("fix bank miss for {:?}", signature),
        }
        hit
    }

    /// Add a new entry, or merge into the existing entry with a matching
    /// signature: bump the success counter, stamp last-used, and union in
    /// constraints not already structurally present. The store is persisted
    /// before returning.
    pub fn add(&mut self, entry: FixEntry) -> Result<(), String> {
        let now = util::unix_timestamp();

        let existing = self
            .entries
            .iter_mut()
            .find(|e| e.signature.matches(&entry.signature));

        match existing {
            Some(existing) => {
                existing.metadata.success_count += 1;
                existing.metadata.last_used = Some(now);

                let added = crate::constraint::extend_dedup(
                    &mut existing.learned_constraints,
                    entry.learned_constraints,
                );
                if added > 0 {
                    log::info!(
                        "merged {} newly learned constraints into existing entry",
                        added
                    );
                }
                if entry.successful_assignment.is_some() {
                    existing.successful_assignment =
                        entry.successful_assignment;
                }
                log::info!(
                    "updated fix bank entry (success_count={})",
                    existing.metadata.success_count
                );
            }
            None => {
                let mut entry = entry;
                entry.metadata.success_count = 1;
                entry.metadata.created_at =
                    entry.metadata.created_at.or(Some(now));
                entry.metadata.last_used = Some(now);
                log::info!(
                    "added new fix bank entry with {} constraints",
                    entry.learned_constraints.len()
                );
                self.entries.push(entry);
            }
        }

        self.save()
    }

    /// Persist all entries to the configured path; a no-op for in-memory
    /// banks.
    pub fn save(&self) -> Result<(), String> {
        let path = match &self.path {
            Some(path) => path,
            None => return Ok(()),
        };

        let file = BankFile {
            version: FORMAT_VERSION.to_owned(),
            entries: self.entries.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| e.to_string())?;
        std::fs::write(path, json + "\n").map_err(|e| e.to_string())?;

        log::debug!("saved fix bank to {}", path.display());
        Ok(())
    }

    /// Replace in-memory entries with the contents of the configured path.
    pub fn load(&mut self) -> Result<(), String> {
        let path = match &self.path {
            Some(path) => path,
            None => return Ok(()),
        };

        let text =
            std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        let file: BankFile =
            serde_json::from_str(&text).map_err(|e| e.to_string())?;
        self.entries = file.entries;
        Ok(())
    }
}
