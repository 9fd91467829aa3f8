//! Structured identifiers for elements and changesets
//!
//! ID Format:
//! - Element IDs: `{layer}.{type}.{kebab-name}` (e.g., `api.operation.create-user`)
//! - Changeset IDs: lowercase slug (e.g., `add-endpoint`)
//!
//! Element IDs are structurally fixed: the layer segment must name a known
//! layer, and the type and name segments are lowercase kebab-case. Changeset
//! IDs double as file stems, so they are restricted to a filename-safe set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::layer::Layer;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Invalid element ID format: expected '{{layer}}.{{type}}.{{kebab-name}}', got '{0}'")]
    InvalidElementId(String),

    #[error("Unknown layer: '{0}'")]
    UnknownLayer(String),

    #[error("Invalid changeset ID: expected lowercase letters, digits, '-' or '_' (max 64), got '{0}'")]
    InvalidChangesetId(String),
}

const MAX_CHANGESET_ID_LEN: usize = 64;

/// Returns true if `s` is lowercase kebab-case (`abc`, `abc-123`)
fn is_kebab(s: &str) -> bool {
    !s.is_empty()
        && s.split('-')
            .all(|part| {
                !part.is_empty()
                    && part.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            })
}

/// Converts free text into a kebab-case name segment
///
/// `"Create User"` becomes `create-user`. Returns `None` when nothing usable remains.
pub fn kebab_case(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Element ID in the format `{layer}.{type}.{kebab-name}`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ElementId {
    layer: Layer,
    element_type: String,
    name: String,
}

impl ElementId {
    /// Creates an element ID from its parts, validating the segments
    pub fn new(layer: Layer, element_type: &str, name: &str) -> Result<Self, IdError> {
        if !is_kebab(element_type) || !is_kebab(name) {
            return Err(IdError::InvalidElementId(format!(
                "{}.{}.{}",
                layer, element_type, name
            )));
        }

        Ok(Self {
            layer,
            element_type: element_type.to_string(),
            name: name.to_string(),
        })
    }

    /// Returns the layer segment
    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// Returns the type segment
    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    /// Returns the kebab-case name segment
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.layer, self.element_type, self.name)
    }
}

impl FromStr for ElementId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(IdError::InvalidElementId(s.to_string()));
        }

        let layer: Layer = parts[0].parse()?;
        Self::new(layer, parts[1], parts[2]).map_err(|_| IdError::InvalidElementId(s.to_string()))
    }
}

impl TryFrom<String> for ElementId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ElementId> for String {
    fn from(id: ElementId) -> Self {
        id.to_string()
    }
}

/// Changeset ID, a lowercase slug that is safe to use as a file stem
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChangesetId(String);

impl ChangesetId {
    /// Returns the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangesetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChangesetId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let valid = !s.is_empty()
            && s.len() <= MAX_CHANGESET_ID_LEN
            && s.chars().next().is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            && s
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');

        if !valid {
            return Err(IdError::InvalidChangesetId(s.to_string()));
        }

        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ChangesetId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChangesetId> for String {
    fn from(id: ChangesetId) -> Self {
        id.0
    }
}
