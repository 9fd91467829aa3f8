//! Base snapshots
//!
//! A snapshot is a content hash of the committed model plus the per-element
//! digests it was computed from. The hash depends only on content: elements
//! are digested from their canonical JSON and combined in id order, so the
//! order in which layers or elements were read never matters.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::domain::{Element, ElementId, Model};
use crate::storage::BaseStore;

/// Content hash of a model, with the per-element digests behind it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseSnapshot {
    pub hash: String,
    pub manifest: BTreeMap<ElementId, String>,
}

impl BaseSnapshot {
    /// Computes the snapshot of an in-memory model
    pub fn from_model(model: &Model) -> Self {
        let manifest: BTreeMap<ElementId, String> = model
            .elements()
            .map(|element| (element.id.clone(), element_digest(element)))
            .collect();

        Self {
            hash: manifest_hash(&manifest),
            manifest,
        }
    }
}

/// Computes the snapshot of everything currently in `store`
pub fn compute_snapshot<S: BaseStore + ?Sized>(store: &S) -> Result<BaseSnapshot> {
    let model = store.read_model()?;
    Ok(BaseSnapshot::from_model(&model))
}

/// Digest of a single element's canonical encoding
pub fn element_digest(element: &Element) -> String {
    // Serializing an element cannot fail (all map keys are strings); the
    // debug form is only a fallback so the digest stays total.
    let encoded = element
        .canonical_json()
        .unwrap_or_else(|_| format!("{:?}", element));
    blake3::hash(encoded.as_bytes()).to_hex().to_string()
}

/// Combines per-element digests into one hash, in id order
pub fn manifest_hash(manifest: &BTreeMap<ElementId, String>) -> String {
    let mut hasher = blake3::Hasher::new();
    for (id, digest) in manifest {
        hasher.update(id.to_string().as_bytes());
        hasher.update(b"\0");
        hasher.update(digest.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}
