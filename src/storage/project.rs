//! Project management
//!
//! Handles project initialization and provides access to stores.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use super::{ChangesetStore, Config, JournalFile, ModelStore};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not in an archstage project. Run 'archstage init' first.")]
    NotInProject,
}

/// An archstage project
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.join(".archstage").is_dir() {
            return Err(ProjectError::NotInProject.into());
        }

        let config = Config::for_project(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the project at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_project_root().ok_or(ProjectError::NotInProject)?;

        Self::open(root)
    }

    /// Initializes a new project at the given path
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let state_dir = root.join(".archstage");

        for dir in [
            state_dir.clone(),
            state_dir.join("model"),
            state_dir.join("changesets"),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        let config_path = state_dir.join("config.toml");
        if !config_path.exists() {
            let default_config = r#"# archstage configuration

[staging]
# Seconds a cached preview stays valid
projection_ttl_secs = 5

# Block commits when the model changed underneath a staged element
strict_drift = false

[validation]
reference_integrity = true
element_identity = true
"#;
            fs::write(&config_path, default_config)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let gitignore_path = state_dir.join(".gitignore");
        if !gitignore_path.exists() {
            let gitignore = r#"# Pointer to the changeset currently being edited (per working copy)
changesets/ACTIVE

# Present only while a commit is in flight
changesets/commit.journal.json

# Serializes commits across processes
changesets/commit.lock
"#;
            fs::write(&gitignore_path, gitignore).with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        Self::open(root)
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .archstage directory path
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(".archstage")
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the committed model store
    pub fn model_store(&self) -> ModelStore {
        ModelStore::for_project(&self.root)
    }

    /// Returns the changeset store
    pub fn changeset_store(&self) -> ChangesetStore {
        ChangesetStore::for_project(&self.root)
    }

    /// Returns the commit journal location
    pub fn journal(&self) -> JournalFile {
        JournalFile::new(self.changeset_store().journal_path())
    }
}
