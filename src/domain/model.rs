//! In-memory view of the layered model
//!
//! Elements are held behind `Arc` so that copies of a model share every
//! element they do not modify. Mutating an element goes through
//! `Arc::make_mut`, which materializes a private copy only for that element.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use super::element::Element;
use super::id::ElementId;
use super::layer::Layer;

/// Elements of one layer, ordered by id
pub type LayerMap = BTreeMap<ElementId, Element>;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Element already exists: {0}")]
    AlreadyExists(ElementId),

    #[error("Element not found: {0}")]
    NotFound(ElementId),

    #[error("Element {id} does not belong in layer '{layer}'")]
    WrongLayer { id: ElementId, layer: Layer },
}

/// A set of layers, each holding elements keyed by id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    layers: BTreeMap<Layer, BTreeMap<ElementId, Arc<Element>>>,
}

impl Model {
    /// Creates an empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a model from per-layer maps, checking each element sits in its own layer
    pub fn from_layers(
        layers: impl IntoIterator<Item = (Layer, LayerMap)>,
    ) -> Result<Self, ModelError> {
        let mut model = Self::new();
        for (layer, elements) in layers {
            for (id, element) in elements {
                if id.layer() != layer || element.id != id {
                    return Err(ModelError::WrongLayer { id, layer });
                }
                model.insert(element)?;
            }
        }
        Ok(model)
    }

    /// Returns true if an element with this id exists anywhere in the model
    pub fn contains(&self, id: &ElementId) -> bool {
        self.get(id).is_some()
    }

    /// Gets an element by id
    pub fn get(&self, id: &ElementId) -> Option<&Element> {
        self.layers
            .get(&id.layer())
            .and_then(|layer| layer.get(id))
            .map(Arc::as_ref)
    }

    /// Gets the shared handle for an element
    pub fn get_shared(&self, id: &ElementId) -> Option<&Arc<Element>> {
        self.layers.get(&id.layer()).and_then(|layer| layer.get(id))
    }

    /// Inserts a new element; fails if the id is already present
    pub fn insert(&mut self, element: Element) -> Result<(), ModelError> {
        if self.contains(&element.id) {
            return Err(ModelError::AlreadyExists(element.id));
        }
        if element.layer != element.id.layer() {
            return Err(ModelError::WrongLayer {
                layer: element.layer,
                id: element.id,
            });
        }

        self.layers
            .entry(element.id.layer())
            .or_default()
            .insert(element.id.clone(), Arc::new(element));
        Ok(())
    }

    /// Returns a mutable reference to an element, copying it out of any shared storage
    pub fn get_mut(&mut self, id: &ElementId) -> Option<&mut Element> {
        self.layers
            .get_mut(&id.layer())
            .and_then(|layer| layer.get_mut(id))
            .map(Arc::make_mut)
    }

    /// Removes an element
    pub fn remove(&mut self, id: &ElementId) -> Result<Element, ModelError> {
        let layer = self
            .layers
            .get_mut(&id.layer())
            .ok_or_else(|| ModelError::NotFound(id.clone()))?;
        let removed = layer
            .remove(id)
            .ok_or_else(|| ModelError::NotFound(id.clone()))?;
        if layer.is_empty() {
            self.layers.remove(&id.layer());
        }
        Ok(Arc::unwrap_or_clone(removed))
    }

    /// Iterates over all elements in id order
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.layers.values().flat_map(|layer| layer.values().map(Arc::as_ref))
    }

    /// Iterates over the elements of one layer
    pub fn layer(&self, layer: Layer) -> impl Iterator<Item = &Element> {
        self.layers
            .get(&layer)
            .into_iter()
            .flat_map(|elements| elements.values().map(Arc::as_ref))
    }

    /// Copies one layer out as an owned map
    pub fn layer_map(&self, layer: Layer) -> LayerMap {
        self.layer(layer)
            .map(|element| (element.id.clone(), element.clone()))
            .collect()
    }

    /// Number of elements in one layer
    pub fn layer_len(&self, layer: Layer) -> usize {
        self.layers.get(&layer).map_or(0, BTreeMap::len)
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.layers.values().map(BTreeMap::len).sum()
    }

    /// Returns true if the model holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
