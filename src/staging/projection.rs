//! Virtual projection engine
//!
//! A projection is the committed model with a changeset's changes applied,
//! computed in memory and never written anywhere. The working view starts as
//! a clone of the base [`Model`], which shares every element by reference;
//! only elements a change touches are copied. Changes are applied strictly in
//! ascending sequence order.
//!
//! Projections are cached per changeset under the key
//! `(changeset id, base snapshot hash, changeset fingerprint)`. An entry is
//! served only while its key still matches and its TTL has not run out, and
//! the staging area drops it outright on every stage or unstage.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::StagingError;
use crate::domain::{
    Change, ChangeKind, Changeset, ChangesetId, Element, ElementId, Layer, Model, ModelError,
};

/// Read-only merge of the committed model and a changeset
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    key: ProjectionKey,
    model: Model,
    touched: BTreeSet<ElementId>,
}

impl Projection {
    /// The cache key this projection was computed for
    pub fn key(&self) -> &ProjectionKey {
        &self.key
    }

    /// The merged model
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Ids of elements changed by the changeset (including deleted ones)
    pub fn touched(&self) -> &BTreeSet<ElementId> {
        &self.touched
    }

    /// Layers holding at least one touched element
    pub fn touched_layers(&self) -> BTreeSet<Layer> {
        self.touched.iter().map(ElementId::layer).collect()
    }

    pub fn get(&self, id: &ElementId) -> Option<&Element> {
        self.model.get(id)
    }

    /// Elements matching `filter`, in id order
    pub fn view<'a>(
        &'a self,
        filter: &'a ProjectionFilter,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.model.elements().filter(move |element| filter.matches(element))
    }
}

/// Restricts which elements of a projection are shown
///
/// Filtering never changes which changes are applied; a projection is
/// always computed in full and filtered on read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionFilter {
    pub layers: BTreeSet<Layer>,
    pub element_type: Option<String>,
    pub touched_only: Option<BTreeSet<ElementId>>,
}

impl ProjectionFilter {
    /// Matches everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches only elements of the given layer
    pub fn layer(layer: Layer) -> Self {
        Self {
            layers: [layer].into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn matches(&self, element: &Element) -> bool {
        (self.layers.is_empty() || self.layers.contains(&element.layer))
            && self
                .element_type
                .as_ref()
                .map_or(true, |t| t == &element.element_type)
            && self
                .touched_only
                .as_ref()
                .map_or(true, |ids| ids.contains(&element.id))
    }
}

/// Identity of a projection for caching purposes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectionKey {
    pub changeset_id: ChangesetId,
    pub base_hash: String,
    pub fingerprint: String,
}

impl ProjectionKey {
    pub fn new(changeset: &Changeset, base_hash: impl Into<String>) -> Self {
        Self {
            changeset_id: changeset.id().clone(),
            base_hash: base_hash.into(),
            fingerprint: changeset.fingerprint(),
        }
    }
}

/// Computes projections; never mutates the base model
pub struct ProjectionEngine;

impl ProjectionEngine {
    /// Applies `changeset` to a copy of `base`
    pub fn project(
        base: &Model,
        base_hash: &str,
        changeset: &Changeset,
    ) -> Result<Projection, StagingError> {
        let mut model = base.clone();
        let mut touched = BTreeSet::new();

        let mut ordered: Vec<&Change> = changeset.changes().iter().collect();
        ordered.sort_by_key(|c| c.sequence_number);

        for change in ordered {
            Self::apply(&mut model, change)?;
            touched.insert(change.element_id.clone());
        }

        Ok(Projection {
            key: ProjectionKey::new(changeset, base_hash),
            model,
            touched,
        })
    }

    /// Applies one change to the working view
    pub fn apply(model: &mut Model, change: &Change) -> Result<(), StagingError> {
        let id = &change.element_id;
        let sequence = change.sequence_number;

        match &change.kind {
            ChangeKind::Add { after } => model.insert(after.clone()).map_err(|e| match e {
                ModelError::AlreadyExists(element) => StagingError::Conflict { element, sequence },
                other => StagingError::Io(other.into()),
            }),
            ChangeKind::Update { after, .. } => {
                let element = model.get_mut(id).ok_or_else(|| StagingError::ElementNotFound {
                    element: id.clone(),
                    sequence,
                })?;
                element.apply(after);
                Ok(())
            }
            ChangeKind::Delete { .. } => model.remove(id).map(|_| ()).map_err(|_| {
                StagingError::ElementNotFound {
                    element: id.clone(),
                    sequence,
                }
            }),
        }
    }
}

struct CachedProjection {
    computed_at: Instant,
    projection: Arc<Projection>,
}

/// TTL-bounded cache of projections, one entry per changeset
pub struct ProjectionCache {
    ttl: Duration,
    entries: HashMap<ChangesetId, CachedProjection>,
}

impl ProjectionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached projection if its key matches and it has not expired
    pub fn get(&mut self, key: &ProjectionKey) -> Option<Arc<Projection>> {
        let entry = self.entries.get(&key.changeset_id)?;

        if entry.projection.key() == key && entry.computed_at.elapsed() < self.ttl {
            tracing::debug!(changeset = %key.changeset_id, "projection cache hit");
            return Some(Arc::clone(&entry.projection));
        }

        tracing::debug!(changeset = %key.changeset_id, "projection cache entry stale");
        self.entries.remove(&key.changeset_id);
        None
    }

    /// Stores a projection under its own key, replacing any older entry
    pub fn insert(&mut self, projection: Arc<Projection>) {
        self.entries.insert(
            projection.key().changeset_id.clone(),
            CachedProjection {
                computed_at: Instant::now(),
                projection,
            },
        );
    }

    /// Drops the entry for a changeset
    pub fn invalidate(&mut self, id: &ChangesetId) {
        if self.entries.remove(id).is_some() {
            tracing::debug!(changeset = %id, "projection cache invalidated");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
