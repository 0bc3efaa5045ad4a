//! Script values and the per-run variable store
//!
//! `Value` is the only data that flows through a block program. Arithmetic and
//! comparison are defined for integers only; every coercion is explicit.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

// ─────────────────────────────────────────────────────────────────────────────
// Value
// ─────────────────────────────────────────────────────────────────────────────

/// Runtime value of a script variable
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Value {
    /// Signed 64-bit integer
    Integer(i64),
    /// UTF-8 text
    Text(String),
    /// Boolean value
    Boolean(bool),
    /// No value; never satisfies a numeric predicate
    #[default]
    Unset,
}

impl Value {
    /// Coerce an externally supplied literal.
    ///
    /// Numeric text (surrounding whitespace ignored) becomes `Integer`,
    /// anything else is kept verbatim as `Text`.
    pub fn from_literal(literal: &str) -> Self {
        match literal.trim().parse::<i64>() {
            Ok(n) => Value::Integer(n),
            Err(_) => Value::Text(literal.to_string()),
        }
    }

    /// Get as integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Check if value is unset
    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    /// Name of the variant, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Text(_) => "text",
            Value::Boolean(_) => "boolean",
            Value::Unset => "unset",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Unset => write!(f, "unset"),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Variable Store
// ─────────────────────────────────────────────────────────────────────────────

/// Mapping from variable name to value, scoped to a single run.
///
/// Serializes as a map sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableStore {
    vars: HashMap<String, Value>,
}

impl VariableStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a variable value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Get a variable value, `Unset` when absent
    pub fn lookup(&self, name: &str) -> Value {
        self.vars.get(name).cloned().unwrap_or_default()
    }

    /// Set a variable value, returning the previous one
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.vars.insert(name.into(), value)
    }

    /// Remove a variable
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    /// Check if a variable exists
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterate variables sorted by name
    pub fn iter_sorted(&self) -> impl Iterator<Item = (&str, &Value)> {
        let mut entries: Vec<_> = self.vars.iter().map(|(k, v)| (k.as_str(), v)).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }
}

impl Serialize for VariableStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter_sorted())
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for VariableStore {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<K: Into<String>> Extend<(K, Value)> for VariableStore {
    fn extend<I: IntoIterator<Item = (K, Value)>>(&mut self, iter: I) {
        self.vars
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v)));
    }
}
