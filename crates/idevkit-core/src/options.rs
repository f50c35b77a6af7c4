//! Per-operation option sets and deep merging of caller overrides

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Option name → value mapping for one operation.
///
/// Nested option groups are JSON objects; [`resolve`] merges them
/// recursively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionSet(Map<String, Value>);

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build an option set from a JSON value; only objects are accepted.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::invalid_option(format!(
                "expected an object of options, got {}",
                other
            ))),
        }
    }

    /// Deserialize the resolved set into a typed options struct.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(Value::Object(self.0))
            .map_err(|e| Error::invalid_option(e.to_string()))
    }
}

impl From<Map<String, Value>> for OptionSet {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Merge `overrides` over `defaults`.
///
/// Keys present in `overrides` win; when both sides hold an object the two
/// are merged recursively. Keys absent from `overrides` keep their default.
/// Arrays and scalars are replaced wholesale. No validation happens here.
pub fn resolve(defaults: &OptionSet, overrides: Option<&OptionSet>) -> OptionSet {
    let mut merged = defaults.0.clone();
    if let Some(overrides) = overrides {
        merge_into(&mut merged, &overrides.0);
    }
    OptionSet(merged)
}

fn merge_into(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}
