//! Device configuration snapshot and partial updates.
//!
//! The device exposes its named variables as one UTF-8 JSON object. Reads
//! return the whole object; writes send only the keys being changed, wrapped
//! as `{"set": {...}}`. The key set is defined by the firmware, so both types
//! here are open mappings rather than fixed structs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{LinkError, Result};

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ConfigValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Int(v) => Some(*v as f64),
            ConfigValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Flags travel as `0`/`1` integers; native booleans are accepted too.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(v) => Some(*v),
            ConfigValue::Int(0) => Some(false),
            ConfigValue::Int(1) => Some(true),
            _ => None,
        }
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<i32> for ConfigValue {
    fn from(v: i32) -> Self {
        ConfigValue::Int(v.into())
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Float(v)
    }
}

/// Booleans are encoded as `0`/`1`, matching the firmware's integer flags.
impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Int(i64::from(v))
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::Text(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::Text(v)
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(v) => write!(f, "{v}"),
            ConfigValue::Int(v) => write!(f, "{v}"),
            ConfigValue::Float(v) => write!(f, "{v}"),
            ConfigValue::Text(v) => f.write_str(v),
        }
    }
}

/// Live configuration state read from the device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigSnapshot {
    values: BTreeMap<String, ConfigValue>,
}

impl ConfigSnapshot {
    /// Parse the device's configuration text.
    pub fn from_json(text: &str) -> Result<Self> {
        let trimmed = text.trim_end_matches('\0');
        serde_json::from_str(trimmed).map_err(|e| LinkError::Config {
            details: format!("{e} (payload: {trimmed:?})"),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(ConfigValue::as_i64)
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(ConfigValue::as_flag)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ConfigValue::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Apply a patch locally, as the device would.
    pub fn apply(&mut self, patch: &ConfigPatch) {
        for (key, value) in patch.iter() {
            self.values.insert(key.to_string(), value.clone());
        }
    }

    /// Keys whose value in `newer` differs from this snapshot.
    pub fn diff(&self, newer: &ConfigSnapshot) -> ConfigPatch {
        let mut patch = ConfigPatch::new();
        for (key, value) in &newer.values {
            if self.values.get(key) != Some(value) {
                patch.insert(key.clone(), value.clone());
            }
        }
        patch
    }
}

/// Partial configuration update carrying only changed keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigPatch {
    values: BTreeMap<String, ConfigValue>,
}

#[derive(Serialize)]
struct SetCommand<'a> {
    set: &'a ConfigPatch,
}

impl ConfigPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: String, value: ConfigValue) {
        self.values.insert(key, value);
    }

    /// Merge a newer patch into this one; keys in `newer` win.
    pub fn merge(&mut self, newer: ConfigPatch) {
        self.values.extend(newer.values);
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Encode as the device's write command: `{"set": {...}}`.
    pub fn to_command_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&SetCommand { set: self })?)
    }
}

impl<K: Into<String>, V: Into<ConfigValue>> FromIterator<(K, V)> for ConfigPatch {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}
