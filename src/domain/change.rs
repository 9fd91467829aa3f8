//! Staged changes
//!
//! A change is one pending edit against the model. Changes carry a sequence
//! number scoped to their changeset; the projection engine applies them in
//! ascending sequence order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::element::{Element, ElementDelta};
use super::id::ElementId;
use super::layer::Layer;

/// The kind-specific payload of a change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeKind {
    /// Insert a new element
    Add { after: Element },

    /// Merge a delta onto an existing element
    ///
    /// `before` is the committed element at staging time, or `None` when the
    /// target only exists through an earlier staged add.
    Update {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        before: Option<Element>,
        after: ElementDelta,
    },

    /// Remove an existing element
    Delete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        before: Option<Element>,
    },
}

impl ChangeKind {
    /// Returns the short label for the kind
    pub fn label(&self) -> &'static str {
        match self {
            ChangeKind::Add { .. } => "add",
            ChangeKind::Update { .. } => "update",
            ChangeKind::Delete { .. } => "delete",
        }
    }
}

/// A single staged edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub sequence_number: u64,

    pub element_id: ElementId,

    #[serde(rename = "layerId")]
    pub layer: Layer,

    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub kind: ChangeKind,
}

impl Change {
    /// Creates a change stamped with the current time
    pub fn new(sequence_number: u64, element_id: ElementId, kind: ChangeKind) -> Self {
        Self {
            sequence_number,
            layer: element_id.layer(),
            element_id,
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Returns true if this change adds an element
    pub fn is_add(&self) -> bool {
        matches!(self.kind, ChangeKind::Add { .. })
    }

    /// Returns the committed element this change was staged against, if any
    pub fn before(&self) -> Option<&Element> {
        match &self.kind {
            ChangeKind::Add { .. } => None,
            ChangeKind::Update { before, .. } | ChangeKind::Delete { before } => before.as_ref(),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {}",
            self.sequence_number,
            self.kind.label(),
            self.element_id
        )
    }
}

/// An edit as requested by a caller, before it is numbered and stamped
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    Add(Element),
    Update(ElementId, ElementDelta),
    Delete(ElementId),
}

impl Edit {
    /// Returns the id of the element this edit targets
    pub fn element_id(&self) -> &ElementId {
        match self {
            Edit::Add(element) => &element.id,
            Edit::Update(id, _) | Edit::Delete(id) => id,
        }
    }
}
