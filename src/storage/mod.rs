//! # Storage Layer
//!
//! Persistence for the committed model and for changesets.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Model layers | YAML map of id to element | `.archstage/model/{layer}.yaml` |
//! | Changesets | JSONL (metadata line, then one change per line) | `.archstage/changesets/{id}.jsonl` |
//! | Active changeset | Plain text id | `.archstage/changesets/ACTIVE` |
//! | Commit journal | JSON (layer pre-images) | `.archstage/changesets/commit.journal.json` |
//! | Commit lock | Empty file, `fs2` advisory lock | `.archstage/changesets/commit.lock` |
//! | Config | TOML | `.archstage/config.toml` |
//!
//! ## Concurrency Safety
//!
//! - All writes are atomic (temp file + rename), and the temp file is removed
//!   on every failure path
//! - Commits and journal recovery hold the commit lock exclusively; reads of
//!   the whole model hold it shared, so no reader sees a half-applied commit
//! - Staged edits are not locked; changes made by other processes are
//!   detected optimistically by the staging engine's snapshot comparison
//!
//! ## Key Types
//!
//! - [`Project`] - Entry point for accessing an archstage project
//! - [`BaseStore`] / [`ModelStore`] - Read/write model layers
//! - [`ChangesetStore`] - Read/write changeset records
//! - [`Config`] - Project and global configuration

mod atomic;
mod model_store;
mod changeset_store;
mod journal;
mod config;
mod project;

pub use atomic::write_atomic;
pub use model_store::{BaseStore, ModelStore};
pub use changeset_store::ChangesetStore;
pub use journal::{CommitJournal, CommitLock, JournalFile};
pub use config::{
    Config, ConfigError, GlobalConfig, OutputFormat, ProjectConfig, StagingConfig, ValidationConfig,
};
pub use project::{Project, ProjectError};
