//! Element domain model
//!
//! Elements are the atomic, identified records of the architecture model.
//! Per-element properties use an explicit tagged [`Value`] so that merge and
//! validation code can match on every shape a property can take.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::id::ElementId;
use super::layer::Layer;

/// Property map, ordered by key for canonical serialization
pub type Properties = BTreeMap<String, Value>;

/// A dynamic property value
///
/// Serialized untagged so layer files read naturally:
/// `method: POST`, `retries: 3`, `tags: [a, b]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the string if this is a `Value::String`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Visits every string contained in this value, including nested ones
    pub fn visit_strings<'a>(&'a self, visit: &mut impl FnMut(&'a str)) {
        match self {
            Value::String(s) => visit(s),
            Value::List(items) => items.iter().for_each(|v| v.visit_strings(visit)),
            Value::Map(map) => map.values().for_each(|v| v.visit_strings(visit)),
            Value::Bool(_) | Value::Number(_) => {}
        }
    }

    /// Merges `patch` onto this value
    ///
    /// Maps merge key by key (recursively); any other combination replaces.
    pub fn merge(&mut self, patch: &Value) {
        match (self, patch) {
            (Value::Map(current), Value::Map(incoming)) => {
                for (key, value) in incoming {
                    match current.get_mut(key) {
                        Some(existing) => existing.merge(value),
                        None => {
                            current.insert(key.clone(), value.clone());
                        }
                    }
                }
            }
            (current, incoming) => *current = incoming.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(s),
            Value::List(_) | Value::Map(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = String;

    /// Converts untyped JSON into a property value; `null` has no counterpart
    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        match json {
            serde_json::Value::Null => Err("null is not a valid property value".to_string()),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(Value::Number)
                .ok_or_else(|| format!("number out of range: {}", n)),
            serde_json::Value::String(s) => Ok(Value::String(s)),
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(Value::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            serde_json::Value::Object(obj) => obj
                .into_iter()
                .map(|(k, v)| Value::try_from(v).map(|v| (k, v)))
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Value::Map),
        }
    }
}

/// A single element of the architecture model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,

    pub layer: Layer,

    #[serde(rename = "type")]
    pub element_type: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,
}

impl Element {
    /// Creates a new element; layer and type are taken from the id
    pub fn new(id: ElementId, name: impl Into<String>) -> Self {
        Self {
            layer: id.layer(),
            element_type: id.element_type().to_string(),
            id,
            name: name.into(),
            description: None,
            properties: Properties::new(),
        }
    }

    /// Sets the description (builder style)
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets a property (builder style)
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Gets a property by key
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Applies an update delta to this element
    pub fn apply(&mut self, delta: &ElementDelta) {
        if let Some(name) = &delta.name {
            self.name = name.clone();
        }
        if let Some(description) = &delta.description {
            self.description = Some(description.clone());
        }
        for (key, value) in &delta.properties {
            match self.properties.get_mut(key) {
                Some(existing) => existing.merge(value),
                None => {
                    self.properties.insert(key.clone(), value.clone());
                }
            }
        }
        for key in &delta.remove_properties {
            self.properties.remove(key);
        }
    }

    /// Returns the canonical JSON encoding used for hashing
    pub fn canonical_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// The payload of a staged update: only the fields being changed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_properties: Vec<String>,
}

impl ElementDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the new name (builder style)
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the new description (builder style)
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets a property (builder style)
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Removes a property (builder style)
    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.remove_properties.push(key.into());
        self
    }

    /// Returns true if the delta changes nothing
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.properties.is_empty()
            && self.remove_properties.is_empty()
    }
}
