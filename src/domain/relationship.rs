//! Side registry of element references
//!
//! Elements refer to one another by putting element ids in their property
//! values. The registry records those references as `id -> set<id>` in both
//! directions; nothing in the model holds a pointer to another element, so
//! reference cycles are harmless and every lookup goes through an id.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::element::Element;
use super::id::ElementId;
use super::model::Model;

/// Outgoing and incoming references between elements
#[derive(Debug, Clone, Default)]
pub struct RelationshipRegistry {
    outgoing: BTreeMap<ElementId, BTreeSet<ElementId>>,
    incoming: BTreeMap<ElementId, BTreeSet<ElementId>>,
}

impl RelationshipRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry from every element of a model
    pub fn from_model(model: &Model) -> Self {
        let mut registry = Self::new();
        for element in model.elements() {
            registry.record(element);
        }
        registry
    }

    /// Records the references held by one element
    pub fn record(&mut self, element: &Element) {
        for target in Self::references_in(element) {
            if target == element.id {
                continue;
            }
            self.incoming
                .entry(target.clone())
                .or_default()
                .insert(element.id.clone());
            self.outgoing
                .entry(element.id.clone())
                .or_default()
                .insert(target);
        }
    }

    /// Collects the element ids mentioned in an element's properties
    pub fn references_in(element: &Element) -> BTreeSet<ElementId> {
        let mut found = BTreeSet::new();
        for value in element.properties.values() {
            value.visit_strings(&mut |s| {
                if let Ok(id) = s.parse::<ElementId>() {
                    found.insert(id);
                }
            });
        }
        found
    }

    /// Ids this element refers to
    pub fn references_from(&self, id: &ElementId) -> impl Iterator<Item = &ElementId> {
        self.outgoing.get(id).into_iter().flatten()
    }

    /// Ids of elements that refer to this one
    pub fn referenced_by(&self, id: &ElementId) -> impl Iterator<Item = &ElementId> {
        self.incoming.get(id).into_iter().flatten()
    }

    /// Every element that reaches `id` through one or more references
    pub fn dependents(&self, id: &ElementId) -> BTreeSet<ElementId> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&ElementId> = self.referenced_by(id).collect();

        while let Some(next) = queue.pop_front() {
            if next == id || !seen.insert(next.clone()) {
                continue;
            }
            queue.extend(self.referenced_by(next));
        }

        seen
    }

    /// References whose target is missing from `model`, as `(source, target)` pairs
    pub fn dangling(&self, model: &Model) -> Vec<(ElementId, ElementId)> {
        self.outgoing
            .iter()
            .flat_map(|(source, targets)| {
                targets
                    .iter()
                    .filter(|target| !model.contains(target))
                    .map(move |target| (source.clone(), target.clone()))
            })
            .collect()
    }

    /// Number of elements holding at least one reference
    pub fn len(&self) -> usize {
        self.outgoing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty()
    }
}
