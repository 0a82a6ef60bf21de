//! Accumulated variable bindings visible to expression evaluation.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map as JsonMap, Value};

/// Immutable name→value mapping threaded through a walk.
///
/// Environments are never mutated in place. [`Environment::merged`] returns a
/// fresh value and leaves every earlier holder untouched; unchanged
/// environments share their storage. Equality ignores insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    bindings: Arc<IndexMap<String, Value>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.bindings.iter()
    }

    /// Returns a new environment with `additions` layered on top.
    ///
    /// Names already present are shadowed by the addition.
    pub fn merged<I>(&self, additions: I) -> Environment
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut additions = additions.into_iter().peekable();
        if additions.peek().is_none() {
            return self.clone();
        }
        let mut bindings = IndexMap::clone(&self.bindings);
        bindings.extend(additions);
        Self {
            bindings: Arc::new(bindings),
        }
    }

    /// Copies the bindings into a JSON object, e.g. for display.
    pub fn to_json_map(&self) -> JsonMap<String, Value> {
        self.bindings
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

impl FromIterator<(String, Value)> for Environment {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            bindings: Arc::new(iter.into_iter().collect()),
        }
    }
}

impl From<JsonMap<String, Value>> for Environment {
    fn from(map: JsonMap<String, Value>) -> Self {
        map.into_iter().collect()
    }
}

impl Serialize for Environment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.bindings.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Environment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bindings = IndexMap::<String, Value>::deserialize(deserializer)?;
        Ok(Self {
            bindings: Arc::new(bindings),
        })
    }
}
