//! # Hole values
//!
//! Hole domains mix strings, integers, booleans, and "absent" (used by patch
//! operations that clear a field). This module defines the closed variant
//! that represents all of them, so hole spaces, assignments, and constraints
//! get well-defined equality and hashing.

use serde::{Deserialize, Serialize};

/// A concrete value that may fill a hole or appear as a patch argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    /// Explicit "no value"; serializes to JSON `null`. Patch operations treat
    /// it as "remove this field".
    Absent,
}

impl Value {
    /// The string key used to sort domain values deterministically.
    pub fn sort_key(&self) -> String {
        self.to_string()
    }

    /// Best-effort conversion from free-form JSON (oracle evidence, stored
    /// hole spaces). Floats, arrays, and objects have no `Value`
    /// representation and yield `None`.
    pub fn from_json(v: &serde_json::Value) -> Option<Value> {
        match v {
            serde_json::Value::Null => Some(Value::Absent),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => n.as_i64().map(Value::Int),
            serde_json::Value::String(s) => Some(Value::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(x) => serde_json::Value::Number((*x).into()),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Absent => serde_json::Value::Null,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(x) => Some(*x),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Absent => write!(f, "null"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(x: i64) -> Self {
        Value::Int(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
