//! Domain models for archstage
//!
//! Contains the model and changeset types without any I/O concerns.

mod id;
mod layer;
mod element;
mod model;
mod change;
mod changeset;
mod relationship;

pub use id::{kebab_case, ChangesetId, ElementId, IdError};
pub use layer::Layer;
pub use element::{Element, ElementDelta, Properties, Value};
pub use model::{LayerMap, Model, ModelError};
pub use change::{Change, ChangeKind, Edit};
pub use changeset::{Changeset, ChangesetError, ChangesetMeta, ChangesetStatus, ChangesetSummary};
pub use relationship::RelationshipRegistry;
