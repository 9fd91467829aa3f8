//! YAML storage for the committed model
//!
//! Each layer is stored in `.archstage/model/{layer}.yaml` as a map from
//! element id to element, sorted by id. Writes go
//! through [`write_atomic`] so a layer file is always either the old or the
//! new content.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::atomic::{open_if_exists, write_atomic};
use crate::domain::{Layer, LayerMap, Model};

/// Read/write access to the committed model, one layer at a time
///
/// Both operations are atomic with respect to a single layer. Atomicity
/// across layers is the caller's concern (see the staging commit journal).
pub trait BaseStore {
    /// Reads every element of one layer
    fn read_layer(&self, layer: Layer) -> Result<LayerMap>;

    /// Replaces the full contents of one layer
    fn write_layer(&self, layer: Layer, elements: &LayerMap) -> Result<()>;

    /// Reads all layers into a model
    fn read_model(&self) -> Result<Model> {
        let mut layers = Vec::with_capacity(Layer::ALL.len());
        for layer in Layer::ALL {
            layers.push((layer, self.read_layer(layer)?));
        }
        Model::from_layers(layers).context("Committed model is inconsistent")
    }
}

/// File-backed model store
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    /// Creates a store rooted at the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates the default store for a project
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(project_root.join(".archstage").join("model"))
    }

    /// Returns the directory holding the layer files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of a layer file
    pub fn layer_path(&self, layer: Layer) -> PathBuf {
        self.dir.join(format!("{}.yaml", layer))
    }
}

impl BaseStore for ModelStore {
    fn read_layer(&self, layer: Layer) -> Result<LayerMap> {
        let path = self.layer_path(layer);
        let Some(reader) = open_if_exists(&path)? else {
            return Ok(LayerMap::new());
        };

        let elements: Option<LayerMap> = serde_yaml::from_reader(reader)
            .with_context(|| format!("Failed to parse layer file: {}", path.display()))?;
        let elements = elements.unwrap_or_default();

        for (id, element) in &elements {
            if id.layer() != layer || &element.id != id || element.layer != layer {
                anyhow::bail!(
                    "Element '{}' is misplaced in layer file {}",
                    id,
                    path.display()
                );
            }
        }

        Ok(elements)
    }

    fn write_layer(&self, layer: Layer, elements: &LayerMap) -> Result<()> {
        let path = self.layer_path(layer);

        if elements.is_empty() {
            return match fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
            };
        }

        tracing::debug!(layer = %layer, elements = elements.len(), "writing layer");

        write_atomic(&path, |writer| {
            serde_yaml::to_writer(writer, elements)
                .with_context(|| format!("Failed to serialize layer '{}'", layer))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Element, ElementId};
    use tempfile::TempDir;

    fn layer_map(ids: &[&str]) -> LayerMap {
        ids.iter()
            .map(|id| {
                let id: ElementId = id.parse().unwrap();
                (id.clone(), Element::new(id, "Test").with_property("method", "POST"))
            })
            .collect()
    }

    #[test]
    fn read_missing_layer_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());

        assert!(store.read_layer(Layer::Api).unwrap().is_empty());
    }

    #[test]
    fn write_and_read_layer() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        let elements = layer_map(&["api.operation.create-user", "api.operation.list-users"]);

        store.write_layer(Layer::Api, &elements).unwrap();

        let loaded = store.read_layer(Layer::Api).unwrap();
        assert_eq!(loaded, elements);
        assert!(store.layer_path(Layer::Api).exists());
    }

    #[test]
    fn layer_file_is_sorted_by_id() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        store
            .write_layer(Layer::Api, &layer_map(&["api.operation.zeta", "api.operation.alpha"]))
            .unwrap();

        let content = fs::read_to_string(store.layer_path(Layer::Api)).unwrap();
        let alpha = content.find("api.operation.alpha").unwrap();
        let zeta = content.find("api.operation.zeta").unwrap();
        assert!(alpha < zeta);
    }

    #[test]
    fn writing_empty_layer_removes_file() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        store
            .write_layer(Layer::Api, &layer_map(&["api.operation.a"]))
            .unwrap();

        store.write_layer(Layer::Api, &LayerMap::new()).unwrap();
        assert!(!store.layer_path(Layer::Api).exists());
        assert!(store.read_layer(Layer::Api).unwrap().is_empty());
    }

    #[test]
    fn misplaced_element_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        // Written into the business layer file by hand
        store
            .write_layer(Layer::Business, &layer_map(&["api.operation.a"]))
            .unwrap();

        assert!(store.read_layer(Layer::Business).is_err());
    }

    #[test]
    fn read_model_collects_layers() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        store
            .write_layer(Layer::Api, &layer_map(&["api.operation.a"]))
            .unwrap();
        store
            .write_layer(Layer::Business, &layer_map(&["business.service.b"]))
            .unwrap();

        let model = store.read_model().unwrap();
        assert_eq!(model.len(), 2);
        assert_eq!(model.layer_len(Layer::Business), 1);
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        store
            .write_layer(Layer::Api, &layer_map(&["api.operation.a"]))
            .unwrap();

        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }
}
