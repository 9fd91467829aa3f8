//! Changeset domain model
//!
//! A changeset is a named, ordered list of staged changes plus a lifecycle
//! status. It is created `Staged`, accepts edits only while `Staged`, and
//! moves exactly once to `Committed` or `Discarded`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

use super::change::{Change, ChangeKind};
use super::id::{ChangesetId, ElementId};

#[derive(Debug, Error, PartialEq)]
pub enum ChangesetError {
    #[error("Cannot {operation} changeset '{id}': it is {status}")]
    InvalidState {
        id: ChangesetId,
        status: ChangesetStatus,
        operation: &'static str,
    },

    #[error("Changeset '{id}' has no change #{sequence}")]
    ChangeNotFound { id: ChangesetId, sequence: u64 },
}

/// Lifecycle status of a changeset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChangesetStatus {
    #[default]
    Staged,
    Committed,
    Discarded,
}

impl ChangesetStatus {
    /// Returns true for `Committed` and `Discarded`
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChangesetStatus::Staged)
    }
}

impl fmt::Display for ChangesetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangesetStatus::Staged => write!(f, "staged"),
            ChangesetStatus::Committed => write!(f, "committed"),
            ChangesetStatus::Discarded => write!(f, "discarded"),
        }
    }
}

/// The metadata record of a changeset (everything except its changes)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesetMeta {
    pub id: ChangesetId,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub status: ChangesetStatus,

    pub created_at: DateTime<Utc>,

    pub modified_at: DateTime<Utc>,

    pub base_snapshot_hash: String,

    /// Per-element digests of the model when the changeset was created
    #[serde(default)]
    pub base_manifest: BTreeMap<ElementId, String>,

    /// Next sequence number to hand out; never decreases
    #[serde(default)]
    pub next_sequence: u64,
}

/// A named, ordered set of staged changes
#[derive(Debug, Clone, PartialEq)]
pub struct Changeset {
    pub meta: ChangesetMeta,
    changes: Vec<Change>,
}

impl Changeset {
    /// Creates a staged changeset capturing the given base snapshot
    pub fn new(
        id: ChangesetId,
        name: Option<String>,
        description: Option<String>,
        base_snapshot_hash: impl Into<String>,
        base_manifest: BTreeMap<ElementId, String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            meta: ChangesetMeta {
                name: name.unwrap_or_else(|| id.to_string()),
                id,
                description,
                status: ChangesetStatus::Staged,
                created_at: now,
                modified_at: now,
                base_snapshot_hash: base_snapshot_hash.into(),
                base_manifest,
                next_sequence: 1,
            },
            changes: Vec::new(),
        }
    }

    /// Reassembles a changeset from its stored records
    ///
    /// Changes are sorted by sequence number. A missing or stale
    /// `next_sequence` is raised past the highest recorded number.
    pub fn from_parts(mut meta: ChangesetMeta, mut changes: Vec<Change>) -> Self {
        changes.sort_by_key(|c| c.sequence_number);
        let floor = changes.last().map_or(1, |c| c.sequence_number + 1);
        meta.next_sequence = meta.next_sequence.max(floor);
        Self { meta, changes }
    }

    pub fn id(&self) -> &ChangesetId {
        &self.meta.id
    }

    pub fn status(&self) -> ChangesetStatus {
        self.meta.status
    }

    /// Changes in ascending sequence order
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Looks up a change by sequence number
    pub fn change(&self, sequence: u64) -> Option<&Change> {
        self.changes
            .binary_search_by_key(&sequence, |c| c.sequence_number)
            .ok()
            .map(|idx| &self.changes[idx])
    }

    /// Returns the set of element ids targeted by staged changes
    pub fn targets(&self) -> BTreeSet<ElementId> {
        self.changes.iter().map(|c| c.element_id.clone()).collect()
    }

    fn require_staged(&self, operation: &'static str) -> Result<(), ChangesetError> {
        if self.meta.status == ChangesetStatus::Staged {
            Ok(())
        } else {
            Err(ChangesetError::InvalidState {
                id: self.meta.id.clone(),
                status: self.meta.status,
                operation,
            })
        }
    }

    /// Appends a change with the next sequence number
    pub fn stage(
        &mut self,
        element_id: ElementId,
        kind: ChangeKind,
    ) -> Result<&Change, ChangesetError> {
        self.require_staged("stage")?;

        let sequence = self.meta.next_sequence.max(1);
        self.meta.next_sequence = sequence + 1;
        self.changes.push(Change::new(sequence, element_id, kind));
        self.touch();

        Ok(&self.changes[self.changes.len() - 1])
    }

    /// Removes a change; remaining sequence numbers keep their values
    pub fn unstage(&mut self, sequence: u64) -> Result<Change, ChangesetError> {
        self.require_staged("unstage")?;

        let idx = self
            .changes
            .binary_search_by_key(&sequence, |c| c.sequence_number)
            .map_err(|_| ChangesetError::ChangeNotFound {
                id: self.meta.id.clone(),
                sequence,
            })?;
        let removed = self.changes.remove(idx);
        self.touch();

        Ok(removed)
    }

    /// Fails unless the changeset can still be previewed or committed
    pub fn ensure_staged(&self, operation: &'static str) -> Result<(), ChangesetError> {
        self.require_staged(operation)
    }

    /// Moves the changeset to `Committed`
    pub fn mark_committed(&mut self) -> Result<(), ChangesetError> {
        self.require_staged("commit")?;
        self.meta.status = ChangesetStatus::Committed;
        self.touch();
        Ok(())
    }

    /// Moves the changeset to `Discarded`
    pub fn mark_discarded(&mut self) -> Result<(), ChangesetError> {
        self.require_staged("discard")?;
        self.meta.status = ChangesetStatus::Discarded;
        self.touch();
        Ok(())
    }

    /// Content fingerprint over the staged changes
    ///
    /// Two changesets with the same changes (including sequence numbers and
    /// timestamps) share a fingerprint; any stage or unstage changes it.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for change in &self.changes {
            // Serializing our own types cannot fail; fall back to the display form regardless.
            let encoded = serde_json::to_string(change).unwrap_or_else(|_| change.to_string());
            hasher.update(encoded.as_bytes());
            hasher.update(b"\n");
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Summary used for listings
    pub fn summary(&self) -> ChangesetSummary {
        ChangesetSummary {
            id: self.meta.id.clone(),
            name: self.meta.name.clone(),
            status: self.meta.status,
            change_count: self.changes.len(),
            created_at: self.meta.created_at,
            modified_at: self.meta.modified_at,
        }
    }

    fn touch(&mut self) {
        self.meta.modified_at = Utc::now();
    }
}

/// Listing entry for a stored changeset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesetSummary {
    pub id: ChangesetId,
    pub name: String,
    pub status: ChangesetStatus,
    pub change_count: usize,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}
