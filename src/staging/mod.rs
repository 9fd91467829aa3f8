//! # Staging Engine
//!
//! Stages edits to the committed model as named changesets, previews them
//! as virtual projections, and commits them as one all-or-nothing unit.
//!
//! ## Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`BaseSnapshot`] | Content hash of the committed model |
//! | [`DriftDetector`] | Finds elements changed since a changeset was created |
//! | [`ProjectionEngine`] | Applies a changeset to a copy-on-write view of the model |
//! | [`ProjectionCache`] | TTL cache of projections, dropped on every edit |
//! | [`ChangesetValidator`] | Runs [`ModelValidator`] rules against a projection |
//! | [`StagingArea`] | State machine tying the above to storage |
//!
//! Concurrent processes are handled optimistically: the snapshot hash taken
//! at commit time is compared with the one captured at creation, and there
//! is no lock on the model as a whole.

mod error;
mod snapshot;
mod drift;
mod projection;
mod validator;
mod manager;

pub use error::{ErrorKind, StagingError};
pub use snapshot::{compute_snapshot, element_digest, manifest_hash, BaseSnapshot};
pub use drift::{DriftDetector, DriftReport};
pub use projection::{
    Projection, ProjectionCache, ProjectionEngine, ProjectionFilter, ProjectionKey,
};
pub use validator::{
    ChangesetValidator, ElementIdentity, ModelValidator, ReferenceIntegrity, ValidationIssue,
    ValidationReport,
};
pub use manager::{CommitOptions, CommitReport, RecoveryOutcome, StagingArea};
