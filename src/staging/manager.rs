//! Staging area manager
//!
//! The single entry point for changeset operations. A [`StagingArea`] is
//! built once per command invocation and owns everything an operation needs:
//! the committed model store, the changeset records, the commit journal, the
//! projection cache, and the validator.
//!
//! ## Commit
//!
//! 1. The changeset must be `Staged`
//! 2. Drift is checked; overlapping drift blocks only in strict mode without force
//! 3. The projection is validated; errors block unless forced
//! 4. Layer pre-images are journaled, then every touched layer is rewritten
//! 5. The changeset is marked `Committed` and saved, then the journal is removed
//!
//! Steps 2-5 run under the exclusive commit lock, so commits from different
//! processes are serialized and each one applies its changes to the model as
//! it is after the previous one. Any failure in steps 4-5 restores the
//! written layers from their pre-images before returning. If the process
//! dies instead, the journal left behind is resolved by
//! [`StagingArea::recover`] on the next open, once no commit holds the lock.
//! Whole-model reads take the lock shared and never see a commit half-applied.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use super::drift::{DriftDetector, DriftReport};
use super::error::StagingError;
use super::projection::{Projection, ProjectionCache, ProjectionEngine, ProjectionKey};
use super::snapshot::BaseSnapshot;
use super::validator::{ChangesetValidator, ValidationReport};
use crate::domain::{
    Change, ChangeKind, Changeset, ChangesetId, ChangesetStatus, ChangesetSummary, Edit, Element,
    ElementId, Layer, LayerMap, Model,
};
use crate::storage::{
    BaseStore, ChangesetStore, CommitJournal, JournalFile, ModelStore, Project, ProjectConfig,
};

/// Caller choices for a commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// Commit despite overlapping drift or validation errors
    pub force: bool,
    /// Block on overlapping drift; `None` uses the configured default
    pub strict: Option<bool>,
}

impl CommitOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            strict: None,
        }
    }

    pub fn strict() -> Self {
        Self {
            force: false,
            strict: Some(true),
        }
    }
}

/// What a successful commit did
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitReport {
    pub changeset: ChangesetSummary,
    pub drift: DriftReport,
    pub validation: ValidationReport,
    /// Number of changes applied
    pub applied: usize,
    pub touched_layers: BTreeSet<Layer>,
    /// True if drift or validation errors were overridden
    pub forced: bool,
}

/// How an interrupted commit was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The changeset was never marked committed; layers were restored
    RolledBack(ChangesetId),
    /// The changeset was committed; only the journal was left over
    RolledForward(ChangesetId),
}

/// Staging operations over one committed model
pub struct StagingArea<S: BaseStore> {
    store: S,
    changesets: ChangesetStore,
    journal: JournalFile,
    cache: ProjectionCache,
    validator: ChangesetValidator,
    strict_default: bool,
}

impl StagingArea<ModelStore> {
    /// Opens the staging area of a project, recovering any interrupted commit
    pub fn for_project(project: &Project) -> Result<Self, StagingError> {
        Self::open(
            project.model_store(),
            project.changeset_store(),
            project.journal(),
            &project.config().project,
        )
    }
}

impl<S: BaseStore> StagingArea<S> {
    /// Creates a staging area without checking for an interrupted commit
    pub fn new(
        store: S,
        changesets: ChangesetStore,
        journal: JournalFile,
        config: &ProjectConfig,
    ) -> Self {
        Self {
            store,
            changesets,
            journal,
            cache: ProjectionCache::new(config.staging.projection_ttl()),
            validator: ChangesetValidator::from_config(&config.validation),
            strict_default: config.staging.strict_drift,
        }
    }

    /// Creates a staging area and resolves any interrupted commit
    pub fn open(
        store: S,
        changesets: ChangesetStore,
        journal: JournalFile,
        config: &ProjectConfig,
    ) -> Result<Self, StagingError> {
        let area = Self::new(store, changesets, journal, config);
        area.recover()?;
        Ok(area)
    }

    /// Replaces the validator built from configuration
    pub fn with_validator(mut self, validator: ChangesetValidator) -> Self {
        self.validator = validator;
        self
    }

    /// The committed model store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The changeset record store
    pub fn changesets(&self) -> &ChangesetStore {
        &self.changesets
    }

    /// Resolves a commit journal left behind by an interrupted process
    ///
    /// Does nothing while another commit holds the lock: its journal belongs
    /// to a commit that is still running.
    pub fn recover(&self) -> Result<Option<RecoveryOutcome>, StagingError> {
        if !self.journal.path().exists() {
            return Ok(None);
        }
        let Some(_lock) = self.journal.try_lock_exclusive()? else {
            tracing::debug!("commit in progress elsewhere; leaving its journal alone");
            return Ok(None);
        };
        self.resolve_journal()
    }

    /// Reads the committed model without observing a commit in progress
    pub fn committed_model(&self) -> Result<Model, StagingError> {
        {
            let _lock = self.journal.lock_shared()?;
            // Nobody can be committing while we hold the lock shared, so a
            // journal here was left by a crashed commit
            if !self.journal.path().exists() {
                return Ok(self.store.read_model()?);
            }
        }

        {
            let _lock = self.journal.lock_exclusive()?;
            self.resolve_journal()?;
        }
        let _lock = self.journal.lock_shared()?;
        Ok(self.store.read_model()?)
    }

    /// Finishes or undoes the commit recorded in the journal; needs the lock held
    fn resolve_journal(&self) -> Result<Option<RecoveryOutcome>, StagingError> {
        let Some(journal) = self.journal.read()? else {
            return Ok(None);
        };
        let id = journal.changeset_id.clone();

        let committed = self
            .changesets
            .load(&id)?
            .is_some_and(|cs| cs.status() == ChangesetStatus::Committed);

        if committed {
            self.journal.remove()?;
            tracing::warn!(changeset = %id, "found journal of a finished commit; removed it");
            return Ok(Some(RecoveryOutcome::RolledForward(id)));
        }

        for (layer, elements) in &journal.pre_images {
            self.store
                .write_layer(*layer, elements)
                .with_context(|| {
                    format!("Failed to restore layer '{}' from commit journal", layer)
                })?;
        }
        self.journal.remove()?;
        tracing::warn!(
            changeset = %id,
            layers = journal.pre_images.len(),
            "rolled back interrupted commit"
        );
        Ok(Some(RecoveryOutcome::RolledBack(id)))
    }

    /// Creates a changeset against the current committed model
    ///
    /// A discarded changeset's id may be reused; its record is archived
    /// first. Any other existing id is a duplicate.
    pub fn create_changeset(
        &mut self,
        id: ChangesetId,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<Changeset, StagingError> {
        if let Some(existing) = self.changesets.load(&id)? {
            if existing.status() != ChangesetStatus::Discarded {
                return Err(StagingError::DuplicateId(id));
            }
            let archived = self.changesets.archive(&id)?;
            tracing::debug!(
                changeset = %id,
                path = %archived.display(),
                "archived discarded changeset"
            );
        }

        let snapshot = BaseSnapshot::from_model(&self.committed_model()?);
        let changeset = Changeset::new(id, name, description, snapshot.hash, snapshot.manifest);
        self.changesets.save(&changeset)?;
        self.cache.invalidate(changeset.id());

        tracing::debug!(
            changeset = %changeset.id(),
            base = %changeset.meta.base_snapshot_hash,
            "created changeset"
        );
        Ok(changeset)
    }

    /// Loads a changeset
    pub fn changeset(&self, id: &ChangesetId) -> Result<Changeset, StagingError> {
        self.changesets
            .load(id)?
            .ok_or_else(|| StagingError::ChangesetNotFound(id.clone()))
    }

    /// Lists all changesets, oldest first
    pub fn list(&self) -> Result<Vec<ChangesetSummary>, StagingError> {
        Ok(self.changesets.list()?)
    }

    /// Appends an edit to a changeset
    ///
    /// `Update` and `Delete` record the committed element as `before` when
    /// there is one. An added element takes its layer and type from its id.
    pub fn stage(&mut self, id: &ChangesetId, edit: Edit) -> Result<Change, StagingError> {
        let mut changeset = self.changeset(id)?;
        changeset.ensure_staged("stage")?;

        let element_id = edit.element_id().clone();
        let kind = match edit {
            Edit::Add(mut element) => {
                element.layer = element_id.layer();
                element.element_type = element_id.element_type().to_string();
                ChangeKind::Add { after: element }
            }
            Edit::Update(_, delta) => ChangeKind::Update {
                before: self.committed_element(&element_id)?,
                after: delta,
            },
            Edit::Delete(_) => ChangeKind::Delete {
                before: self.committed_element(&element_id)?,
            },
        };

        let change = changeset.stage(element_id, kind)?.clone();
        self.changesets.save(&changeset)?;
        self.cache.invalidate(id);

        tracing::debug!(changeset = %id, change = %change, "staged change");
        Ok(change)
    }

    /// Removes a staged change by sequence number
    pub fn unstage(&mut self, id: &ChangesetId, sequence: u64) -> Result<Change, StagingError> {
        let mut changeset = self.changeset(id)?;
        let removed = changeset.unstage(sequence)?;
        self.changesets.save(&changeset)?;
        self.cache.invalidate(id);

        tracing::debug!(changeset = %id, change = %removed, "unstaged change");
        Ok(removed)
    }

    /// Returns the projection of a staged changeset onto the current model
    pub fn preview(&mut self, id: &ChangesetId) -> Result<Arc<Projection>, StagingError> {
        let changeset = self.changeset(id)?;
        changeset.ensure_staged("preview")?;

        let base = self.committed_model()?;
        let snapshot = BaseSnapshot::from_model(&base);
        self.projection(&changeset, &base, &snapshot.hash)
    }

    /// Compares a changeset's base with the current committed model
    pub fn check_drift(&self, id: &ChangesetId) -> Result<DriftReport, StagingError> {
        let changeset = self.changeset(id)?;
        let current = BaseSnapshot::from_model(&self.committed_model()?);
        Ok(DriftDetector::check_against(&changeset, &current))
    }

    /// Validates the projection of a staged changeset
    pub fn validate(&mut self, id: &ChangesetId) -> Result<ValidationReport, StagingError> {
        let projection = self.preview(id)?;
        Ok(self.validator.validate(&projection))
    }

    /// Applies a changeset to the committed model
    ///
    /// On error, neither the model nor the changeset record has changed.
    pub fn commit(
        &mut self,
        id: &ChangesetId,
        options: CommitOptions,
    ) -> Result<CommitReport, StagingError> {
        self.changeset(id)?.ensure_staged("commit")?;

        let lock = self.journal.lock_exclusive()?;
        self.resolve_journal()?;

        // Reloaded under the lock: a concurrent commit may have finished it
        let mut changeset = self.changeset(id)?;
        changeset.ensure_staged("commit")?;
        let base = self.store.read_model()?;
        let snapshot = BaseSnapshot::from_model(&base);

        let drift = DriftDetector::check_against(&changeset, &snapshot);
        let strict = options.strict.unwrap_or(self.strict_default);
        let mut forced = false;
        if drift.overlaps() {
            if strict && !options.force {
                return Err(StagingError::Drift {
                    id: id.clone(),
                    overlapping: drift.overlapping,
                });
            }
            forced = strict;
            tracing::warn!(
                changeset = %id,
                overlapping = drift.overlapping.len(),
                "model changed under staged elements; staged values win"
            );
        } else if drift.has_drifted {
            tracing::warn!(
                changeset = %id,
                changed = drift.changed_element_ids.len(),
                "model changed since changeset was created"
            );
        }

        let projection = self.projection(&changeset, &base, &snapshot.hash)?;
        let validation = self.validator.validate(&projection);
        if !validation.is_valid() {
            if !options.force {
                return Err(StagingError::Validation {
                    id: id.clone(),
                    report: validation,
                });
            }
            forced = true;
            tracing::warn!(
                changeset = %id,
                errors = validation.errors.len(),
                "committing despite validation errors"
            );
        }

        let touched_layers = projection.touched_layers();
        self.apply(&mut changeset, &base, &projection, &touched_layers)?;
        drop(lock);

        // The commit is durable; nothing below may turn it into an error
        self.cache.invalidate(id);
        self.release_active(id);

        tracing::debug!(
            changeset = %id,
            changes = changeset.changes().len(),
            layers = touched_layers.len(),
            "committed changeset"
        );
        Ok(CommitReport {
            applied: changeset.changes().len(),
            changeset: changeset.summary(),
            drift,
            validation,
            touched_layers,
            forced,
        })
    }

    /// Marks a changeset discarded; the committed model is not touched
    pub fn discard(&mut self, id: &ChangesetId) -> Result<Changeset, StagingError> {
        let mut changeset = self.changeset(id)?;
        changeset.mark_discarded()?;
        self.changesets.save(&changeset)?;
        self.cache.invalidate(id);
        self.release_active(id);

        tracing::debug!(changeset = %id, "discarded changeset");
        Ok(changeset)
    }

    /// Returns the active changeset id, if one is set
    pub fn active(&self) -> Result<Option<ChangesetId>, StagingError> {
        Ok(self.changesets.active()?)
    }

    /// Makes a staged changeset the active one
    pub fn activate(&self, id: &ChangesetId) -> Result<(), StagingError> {
        let changeset = self.changeset(id)?;
        changeset.ensure_staged("activate")?;
        Ok(self.changesets.set_active(id)?)
    }

    fn committed_element(&self, id: &ElementId) -> Result<Option<Element>, StagingError> {
        let _lock = self.journal.lock_shared()?;
        let mut layer = self.store.read_layer(id.layer())?;
        Ok(layer.remove(id))
    }

    /// Clears the active pointer if it names `id`; failures are only logged
    fn release_active(&self, id: &ChangesetId) {
        let cleared = self.changesets.active().and_then(|active| match active {
            Some(active) if &active == id => self.changesets.clear_active(),
            _ => Ok(()),
        });
        if let Err(err) = cleared {
            tracing::warn!(
                changeset = %id,
                error = %format!("{:#}", err),
                "failed to clear active changeset"
            );
        }
    }

    fn projection(
        &mut self,
        changeset: &Changeset,
        base: &Model,
        base_hash: &str,
    ) -> Result<Arc<Projection>, StagingError> {
        let key = ProjectionKey::new(changeset, base_hash);
        if let Some(projection) = self.cache.get(&key) {
            return Ok(projection);
        }

        let projection = Arc::new(ProjectionEngine::project(base, base_hash, changeset)?);
        self.cache.insert(Arc::clone(&projection));
        Ok(projection)
    }

    /// Writes the projected layers and marks the changeset committed, as one unit
    fn apply(
        &self,
        changeset: &mut Changeset,
        base: &Model,
        projection: &Projection,
        layers: &BTreeSet<Layer>,
    ) -> Result<(), StagingError> {
        let pre_images: BTreeMap<Layer, LayerMap> =
            layers.iter().map(|layer| (*layer, base.layer_map(*layer))).collect();
        self.journal
            .write(&CommitJournal::new(changeset.id().clone(), pre_images.clone()))
            .context("Failed to write commit journal")?;

        let mut written = Vec::with_capacity(layers.len());
        for layer in layers {
            let elements = projection.model().layer_map(*layer);
            if let Err(err) = self.store.write_layer(*layer, &elements) {
                return Err(self.roll_back(&written, &pre_images, err));
            }
            written.push(*layer);
        }

        let mut committed = changeset.clone();
        committed.mark_committed()?;
        if let Err(err) = self.changesets.save(&committed) {
            return Err(self.roll_back(&written, &pre_images, err));
        }
        *changeset = committed;

        // The commit is durable from here; a leftover journal rolls forward
        if let Err(err) = self.journal.remove() {
            tracing::warn!(error = %format!("{:#}", err), "failed to remove commit journal");
        }
        Ok(())
    }

    /// Restores written layers after a failed commit and returns the cause
    fn roll_back(
        &self,
        written: &[Layer],
        pre_images: &BTreeMap<Layer, LayerMap>,
        cause: anyhow::Error,
    ) -> StagingError {
        for layer in written.iter().rev() {
            let Some(elements) = pre_images.get(layer) else {
                continue;
            };
            if let Err(err) = self.store.write_layer(*layer, elements) {
                // Leave the journal in place so the next open can finish the rollback
                tracing::warn!(
                    layer = %layer,
                    error = %format!("{:#}", err),
                    "failed to restore layer; commit journal kept for recovery"
                );
                let cause = cause.context("Commit failed and could not be fully rolled back");
                return StagingError::Io(cause);
            }
        }

        if let Err(err) = self.journal.remove() {
            tracing::warn!(error = %format!("{:#}", err), "failed to remove commit journal");
        }
        tracing::debug!(layers = written.len(), "rolled back failed commit");
        StagingError::Io(cause.context("Commit failed; the model was left unchanged"))
    }
}
