//! Conversation context: the shared variable store for one run

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The shared variable store accumulated over one conversation run
///
/// Every answer a user gives and every side-effect lookup result is stored
/// here under its variable/context key. The context is owned exclusively by
/// the walker driving the run; subscribers only ever see snapshots taken at
/// publish time, so later mutations never change what was already observed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    values: HashMap<String, Value>,
}

impl Context {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context pre-seeded with the given values
    pub fn seeded(values: HashMap<String, Value>) -> Self {
        Self { values }
    }

    /// Get the value stored under a key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Store a value under a key, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Check whether a key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the context holds no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over all key/value pairs
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Take a deep copy for publishing alongside an event
    pub fn snapshot(&self) -> Context {
        self.clone()
    }
}

impl From<HashMap<String, Value>> for Context {
    fn from(values: HashMap<String, Value>) -> Self {
        Self { values }
    }
}

impl FromIterator<(String, Value)> for Context {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
