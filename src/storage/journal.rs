//! Commit journal
//!
//! A commit rewrites several layer files, and a process can die between any
//! two of those writes. Before the first write, the pre-image of every layer
//! the commit touches is saved here. The journal is removed only after the
//! changeset has been marked committed, so finding one on startup means the
//! commit either has to be rolled back (changeset still staged) or only needs
//! the journal cleaned up (changeset committed).
//!
//! A journal alone cannot tell a crashed commit from one that is still
//! running in another process. The sibling `commit.lock` file settles that:
//! a commit holds it exclusively from reading the base until the journal is
//! gone, so a journal found while the lock can be taken is a crashed one.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use super::atomic::{open_if_exists, write_atomic};
use crate::domain::{ChangesetId, Layer, LayerMap};

/// Pre-images of the layers touched by an in-flight commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitJournal {
    pub changeset_id: ChangesetId,
    pub started_at: DateTime<Utc>,
    pub pre_images: BTreeMap<Layer, LayerMap>,
}

impl CommitJournal {
    pub fn new(changeset_id: ChangesetId, pre_images: BTreeMap<Layer, LayerMap>) -> Self {
        Self {
            changeset_id,
            started_at: Utc::now(),
            pre_images,
        }
    }
}

/// A held `fs2` lock on `commit.lock`, released on drop
pub struct CommitLock {
    file: File,
}

impl Drop for CommitLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            tracing::debug!(error = %err, "failed to release commit lock");
        }
    }
}

/// Location of the commit journal and its lock file on disk
pub struct JournalFile {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JournalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = path.with_file_name("commit.lock");
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Blocks until no other commit or reader holds the lock
    pub fn lock_exclusive(&self) -> Result<CommitLock> {
        let file = self.open_lock_file()?;
        file.lock_exclusive().context("Failed to acquire commit lock")?;
        Ok(CommitLock { file })
    }

    /// Takes the lock only if nobody holds it; `None` while a commit is running
    pub fn try_lock_exclusive(&self) -> Result<Option<CommitLock>> {
        let file = self.open_lock_file()?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(CommitLock { file })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e).context("Failed to acquire commit lock"),
        }
    }

    /// Blocks until no commit holds the lock; other readers may share it
    pub fn lock_shared(&self) -> Result<CommitLock> {
        let file = self.open_lock_file()?;
        FileExt::lock_shared(&file).context("Failed to acquire shared commit lock")?;
        Ok(CommitLock { file })
    }

    fn open_lock_file(&self) -> Result<File> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .with_context(|| format!("Failed to open lock file: {}", self.lock_path.display()))
    }

    /// Durably records the journal
    pub fn write(&self, journal: &CommitJournal) -> Result<()> {
        write_atomic(&self.path, |writer| {
            serde_json::to_writer(writer, journal).context("Failed to serialize commit journal")
        })
    }

    /// Reads the journal if one is present
    pub fn read(&self) -> Result<Option<CommitJournal>> {
        let Some(reader) = open_if_exists(&self.path)? else {
            return Ok(None);
        };
        let journal = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse commit journal: {}", self.path.display()))?;
        Ok(Some(journal))
    }

    /// Removes the journal; a missing journal is not an error
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Element, ElementId};
    use tempfile::TempDir;

    #[test]
    fn write_read_remove() {
        let dir = TempDir::new().unwrap();
        let file = JournalFile::new(dir.path().join("commit.journal.json"));
        assert!(file.read().unwrap().is_none());

        let id: ElementId = "api.operation.a".parse().unwrap();
        let mut layer = LayerMap::new();
        layer.insert(id.clone(), Element::new(id, "A"));
        let mut pre_images = BTreeMap::new();
        pre_images.insert(Layer::Api, layer);
        pre_images.insert(Layer::Business, LayerMap::new());

        let journal = CommitJournal::new("cs".parse().unwrap(), pre_images);
        file.write(&journal).unwrap();

        assert_eq!(file.read().unwrap(), Some(journal));

        file.remove().unwrap();
        file.remove().unwrap();
        assert!(!file.path().exists());
    }

    #[test]
    fn lock_file_sits_next_to_journal() {
        let dir = TempDir::new().unwrap();
        let file = JournalFile::new(dir.path().join("commit.journal.json"));
        assert_eq!(file.lock_path(), dir.path().join("commit.lock"));
    }

    #[test]
    fn exclusive_lock_excludes_other_handles() {
        let dir = TempDir::new().unwrap();
        let first = JournalFile::new(dir.path().join("commit.journal.json"));
        let second = JournalFile::new(dir.path().join("commit.journal.json"));

        let held = first.lock_exclusive().unwrap();
        assert!(second.try_lock_exclusive().unwrap().is_none());

        drop(held);
        assert!(second.try_lock_exclusive().unwrap().is_some());
    }

    #[test]
    fn shared_lock_blocks_exclusive() {
        let dir = TempDir::new().unwrap();
        let file = JournalFile::new(dir.path().join("commit.journal.json"));

        let reader = file.lock_shared().unwrap();
        let other_reader = file.lock_shared().unwrap();
        assert!(file.try_lock_exclusive().unwrap().is_none());

        drop(reader);
        drop(other_reader);
        assert!(file.try_lock_exclusive().unwrap().is_some());
    }
}
