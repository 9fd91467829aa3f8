//! JSONL storage for changesets
//!
//! Each changeset is stored in `.archstage/changesets/{id}.jsonl`: the first
//! line is the metadata record and every following line is one change, in
//! sequence order. Records are rewritten whole through [`write_atomic`].

use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;

use super::atomic::{open_if_exists, write_atomic};
use crate::domain::{Change, Changeset, ChangesetId, ChangesetMeta, ChangesetSummary};

const ACTIVE_FILE: &str = "ACTIVE";
const JOURNAL_FILE: &str = "commit.journal.json";
const RECORD_EXT: &str = "jsonl";

/// Store for changeset records
pub struct ChangesetStore {
    dir: PathBuf,
}

impl ChangesetStore {
    /// Creates a store rooted at the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates the default store for a project
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(project_root.join(".archstage").join("changesets"))
    }

    /// Returns the directory holding changeset records
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of a changeset record
    pub fn record_path(&self, id: &ChangesetId) -> PathBuf {
        self.dir.join(format!("{}.{}", id, RECORD_EXT))
    }

    /// Returns the directory holding archived records
    pub fn archive_dir(&self) -> PathBuf {
        self.dir.join("archive")
    }

    /// Returns the path of the commit journal
    pub fn journal_path(&self) -> PathBuf {
        self.dir.join(JOURNAL_FILE)
    }

    /// Writes a changeset (full rewrite, atomic)
    pub fn save(&self, changeset: &Changeset) -> Result<()> {
        let path = self.record_path(changeset.id());

        write_atomic(&path, |writer| {
            let meta = serde_json::to_string(&changeset.meta)
                .context("Failed to serialize changeset metadata")?;
            writeln!(writer, "{}", meta).context("Failed to write changeset metadata")?;

            for change in changeset.changes() {
                let line = serde_json::to_string(change).context("Failed to serialize change")?;
                writeln!(writer, "{}", line).context("Failed to write change")?;
            }
            Ok(())
        })
        .with_context(|| format!("Failed to save changeset '{}'", changeset.id()))
    }

    /// Reads a changeset; `None` if no record exists
    pub fn load(&self, id: &ChangesetId) -> Result<Option<Changeset>> {
        Self::read_record(&self.record_path(id))
    }

    fn read_record(path: &Path) -> Result<Option<Changeset>> {
        let Some(reader) = open_if_exists(path)? else {
            return Ok(None);
        };

        let mut meta: Option<ChangesetMeta> = None;
        let mut changes = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.with_context(|| {
                format!("Failed to read line {} of {}", line_num + 1, path.display())
            })?;

            if line.trim().is_empty() {
                continue;
            }

            if meta.is_none() {
                meta = Some(serde_json::from_str(&line).with_context(|| {
                    format!("Failed to parse changeset metadata in {}", path.display())
                })?);
            } else {
                let change: Change = serde_json::from_str(&line).with_context(|| {
                    format!("Failed to parse change at line {} of {}", line_num + 1, path.display())
                })?;
                changes.push(change);
            }
        }

        let meta = meta.with_context(|| format!("Changeset record is empty: {}", path.display()))?;
        Ok(Some(Changeset::from_parts(meta, changes)))
    }

    /// Lists every stored changeset, ordered by creation time
    pub fn list(&self) -> Result<Vec<ChangesetSummary>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read directory: {}", self.dir.display()))
            }
        };

        let mut summaries = Vec::new();
        for entry in entries {
            let path = entry
                .with_context(|| format!("Failed to read directory: {}", self.dir.display()))?
                .path();
            let is_record = path.extension().and_then(|ext| ext.to_str()) == Some(RECORD_EXT);
            if !path.is_file() || !is_record {
                continue;
            }
            if let Some(changeset) = Self::read_record(&path)? {
                summaries.push(changeset.summary());
            }
        }

        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(summaries)
    }

    /// Removes a record; returns false if none existed
    pub fn delete(&self, id: &ChangesetId) -> Result<bool> {
        let path = self.record_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }

    /// Moves a record into the archive so its id can be reused
    pub fn archive(&self, id: &ChangesetId) -> Result<PathBuf> {
        let archive_dir = self.archive_dir();
        fs::create_dir_all(&archive_dir).with_context(|| {
            format!("Failed to create archive directory: {}", archive_dir.display())
        })?;

        let target = archive_dir.join(format!(
            "{}.{}.{}",
            id,
            Utc::now().timestamp_millis(),
            RECORD_EXT
        ));
        let source = self.record_path(id);
        fs::rename(&source, &target).with_context(|| {
            format!("Failed to archive {} to {}", source.display(), target.display())
        })?;

        Ok(target)
    }

    /// Returns the id of the active changeset, if one is set
    pub fn active(&self) -> Result<Option<ChangesetId>> {
        let path = self.dir.join(ACTIVE_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
        };

        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        let id = content
            .parse()
            .with_context(|| format!("Invalid active changeset in {}", path.display()))?;
        Ok(Some(id))
    }

    /// Marks a changeset as the active one
    pub fn set_active(&self, id: &ChangesetId) -> Result<()> {
        write_atomic(&self.dir.join(ACTIVE_FILE), |writer| {
            writeln!(writer, "{}", id).context("Failed to write active changeset")
        })
    }

    /// Clears the active changeset pointer
    pub fn clear_active(&self) -> Result<()> {
        let path = self.dir.join(ACTIVE_FILE);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}
