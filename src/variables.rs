//! Variable bags and their composition into playbook extra variables.
//!
//! Several objects own default variables for Ansible: the core playbook
//! variables and the AWS variables. Before a run they are merged with the
//! caller's variables into one bag. Later sources win over earlier ones and
//! the caller's variables win over everything.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Value;

use crate::error::{OctError, Result};

/// Mapping from variable name to value, handed to Ansible as extra variables.
pub type VariableBag = BTreeMap<String, Value>;

/// An object that owns a set of default playbook variables.
pub trait VariableDefaults {
    /// The stored defaults.
    fn defaults(&self) -> &VariableBag;

    /// Merge `overrides` over the stored defaults.
    ///
    /// Keys present in `overrides` take precedence; every other key falls
    /// back to the default value.
    fn default_variables(&self, overrides: Option<&VariableBag>) -> VariableBag {
        let mut merged = self.defaults().clone();
        if let Some(overrides) = overrides {
            merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }
}

/// Compose `bases` left to right, then apply `overrides` last.
///
/// A key defined by a later base replaces the same key from an earlier one.
pub fn compose(bases: &[&dyn VariableDefaults], overrides: Option<&VariableBag>) -> VariableBag {
    let mut merged = overrides.cloned().unwrap_or_default();
    // The last base sits closest to the overrides, so fold from the right.
    for base in bases.iter().rev() {
        merged = base.default_variables(Some(&merged));
    }
    merged
}

/// A bare variable bag with defaults, used for the persisted variable files.
///
/// An empty bag is stored as `variables:` with a null value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableSet {
    #[serde(
        default,
        serialize_with = "serialize_bag",
        deserialize_with = "deserialize_bag"
    )]
    pub variables: VariableBag,
}

fn serialize_bag<S: Serializer>(
    bag: &VariableBag,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    if bag.is_empty() {
        serializer.serialize_none()
    } else {
        bag.serialize(serializer)
    }
}

fn deserialize_bag<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<VariableBag, D::Error> {
    Ok(Option::<VariableBag>::deserialize(deserializer)?.unwrap_or_default())
}

impl VariableSet {
    pub fn new(variables: VariableBag) -> Self {
        Self { variables }
    }

    /// Set a variable, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.variables.insert(key.into(), value)
    }

    /// Remove a variable, returning its value if it was set.
    pub fn unset(&mut self, key: &str) -> Option<Value> {
        self.variables.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }
}

impl VariableDefaults for VariableSet {
    fn defaults(&self) -> &VariableBag {
        &self.variables
    }
}

/// Extra variables sent to every Ansible playbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaybookExtraVariables(VariableSet);

impl Default for PlaybookExtraVariables {
    fn default() -> Self {
        let mut set = VariableSet::default();
        set.set("origin_ci_hosts", Value::from("localhost"));
        set.set("origin_ci_connection", Value::from("local"));
        Self(set)
    }
}

impl Deref for PlaybookExtraVariables {
    type Target = VariableSet;

    fn deref(&self) -> &VariableSet {
        &self.0
    }
}

impl DerefMut for PlaybookExtraVariables {
    fn deref_mut(&mut self) -> &mut VariableSet {
        &mut self.0
    }
}

impl VariableDefaults for PlaybookExtraVariables {
    fn defaults(&self) -> &VariableBag {
        &self.0.variables
    }
}

/// Parse a value from the command line as a YAML scalar.
///
/// `3` becomes an integer, `true` a boolean, anything else a string.
pub fn parse_value(raw: &str) -> Value {
    match serde_yaml::from_str::<Value>(raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::String(_))) => value,
        _ => Value::String(raw.to_string()),
    }
}

/// Parse a `key=value` assignment.
pub fn parse_assignment(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| OctError::validation(format!("expected key=value, got '{raw}'")))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(OctError::validation(format!("missing variable name in '{raw}'")));
    }
    Ok((key.to_string(), parse_value(value)))
}

/// Build a bag from `key=value` assignments. Later assignments win.
pub fn bag_from_assignments<S: AsRef<str>>(assignments: &[S]) -> Result<VariableBag> {
    assignments
        .iter()
        .map(|raw| parse_assignment(raw.as_ref()))
        .collect()
}
