//! archstage - Staged, drift-aware changesets for layered architecture models
//!
//! Edits to a committed, multi-layer architecture model are collected in
//! named changesets, previewed as virtual projections, validated against the
//! model they would produce, and committed atomically across layer files.
//! Changes made to the model by someone else in the meantime are detected by
//! comparing content snapshots.

pub mod domain;
pub mod storage;
pub mod staging;
pub mod cli;

pub use domain::{
    Change, ChangeKind, Changeset, ChangesetId, ChangesetStatus, Edit, Element, ElementDelta,
    ElementId, Layer,
};
pub use staging::{CommitOptions, CommitReport, StagingArea, StagingError};
