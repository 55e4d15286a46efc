//! # Patch templates
//!
//! A patch is an ordered edit program over an artifact. A patch *template* is
//! a patch where some operation arguments are named holes instead of concrete
//! values; the synthesizer fills the holes by searching the hole space.
//!
//! Holes serialize to a tagged `{"$hole": name}` marker so that stored
//! templates (e.g. in the Fix Bank) stay distinguishable from plain string
//! arguments.

use crate::value::Value;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

////////////////////////////////////////////////////////////////////////////////
// Holes

/// A reference to a named hole inside a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct HoleRef {
    #[serde(rename = "$hole")]
    pub name: String,
}

impl HoleRef {
    pub fn new(name: impl Into<String>) -> Self {
        HoleRef { name: name.into() }
    }
}

/// A template operation argument: either a concrete value or a hole.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TemplateArg {
    Hole(HoleRef),
    Concrete(Value),
}

impl TemplateArg {
    pub fn hole(name: impl Into<String>) -> Self {
        TemplateArg::Hole(HoleRef::new(name))
    }

    pub fn value(v: impl Into<Value>) -> Self {
        TemplateArg::Concrete(v.into())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Concrete patches

/// One fully concrete edit operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PatchOp {
    pub op: String,
    pub args: IndexMap<String, Value>,
}

impl PatchOp {
    pub fn new(op: impl Into<String>, args: IndexMap<String, Value>) -> Self {
        PatchOp {
            op: op.into(),
            args,
        }
    }
}

/// A fully concrete edit program; no holes remain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Patch {
    pub ops: Vec<PatchOp>,
}

////////////////////////////////////////////////////////////////////////////////
// Templates

/// One edit operation whose arguments may contain holes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TemplateOp {
    pub op: String,
    pub args: IndexMap<String, TemplateArg>,
}

impl TemplateOp {
    pub fn new(
        op: impl Into<String>,
        args: IndexMap<String, TemplateArg>,
    ) -> Self {
        TemplateOp {
            op: op.into(),
            args,
        }
    }
}

/// An ordered edit program with holes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PatchTemplate {
    pub ops: Vec<TemplateOp>,
}

impl PatchTemplate {
    /// The distinct hole names referenced by this template, in order of first
    /// appearance.
    pub fn hole_names(&self) -> IndexSet<String> {
        let mut names = IndexSet::new();
        for op in &self.ops {
            for arg in op.args.values() {
                if let TemplateArg::Hole(h) = arg {
                    names.insert(h.name.clone());
                }
            }
        }
        names
    }
}

/// The domain of legal values per hole.
pub type HoleSpace = IndexMap<String, IndexSet<Value>>;

/// One concrete point in the search space: a value for every hole.
pub type CandidateAssignment = IndexMap<String, Value>;

////////////////////////////////////////////////////////////////////////////////
// Instantiation

/// A hole referenced by the template is missing from the assignment. This is
/// a programming error in the template or hole space, not a search outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstantiateError {
    pub hole: String,
    pub available: Vec<String>,
}

impl std::fmt::Display for InstantiateError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "hole '{}' not found in assignment (available: {})",
            self.hole,
            self.available.join(", ")
        )
    }
}

/// Fill every hole in `template` with the corresponding value from
/// `assignment`, producing a concrete patch.
pub fn instantiate(
    template: &PatchTemplate,
    assignment: &CandidateAssignment,
) -> Result<Patch, InstantiateError> {
    let mut ops = vec![];

    for op in &template.ops {
        let mut args = IndexMap::new();
        for (key, arg) in &op.args {
            let value = match arg {
                TemplateArg::Concrete(v) => v.clone(),
                TemplateArg::Hole(h) => match assignment.get(&h.name) {
                    Some(v) => v.clone(),
                    None => {
                        return Err(InstantiateError {
                            hole: h.name.clone(),
                            available: assignment.keys().cloned().collect(),
                        })
                    }
                },
            };
            args.insert(key.clone(), value);
        }
        ops.push(PatchOp::new(op.op.clone(), args));
    }

    Ok(Patch { ops })
}
