use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TaskError;

/// Name and type of a value passed from one step to a later one.
pub struct OverrideKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> OverrideKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self { name, _marker: PhantomData }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for OverrideKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for OverrideKey<T> {}

impl<T> fmt::Debug for OverrideKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OverrideKey").field(&self.name).finish()
    }
}

/// Scratch space threaded through the steps of one chain run.
///
/// Values are kept as JSON so a run survives a restart.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Overrides(BTreeMap<String, Value>);

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &OverrideKey<T>) -> Result<T, TaskError> {
        let raw = self.0.get(key.name).ok_or_else(|| TaskError::MissingOverride { key: key.name.to_string() })?;
        serde_json::from_value(raw.clone())
            .map_err(|e| TaskError::MalformedOverride { key: key.name.to_string(), reason: e.to_string() })
    }

    pub fn set<T: Serialize>(&mut self, key: &OverrideKey<T>, value: &T) -> Result<(), TaskError> {
        let raw = serde_json::to_value(value)
            .map_err(|e| TaskError::MalformedOverride { key: key.name.to_string(), reason: e.to_string() })?;
        self.0.insert(key.name.to_string(), raw);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
