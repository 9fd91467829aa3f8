//! Atomic file replacement
//!
//! Every durable write goes to a temp file in the destination directory and
//! is renamed over the destination only after it has been fully written and
//! synced. The temp file is owned by a guard that deletes it on drop, so an
//! early return or error never leaves a partial artifact behind.
//!
//! Readers therefore always see a whole file. Serializing writers against
//! each other is the job of the commit lock (see `journal.rs`).

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// Writes `path` atomically; `write` receives a buffered writer over the temp file
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&File>) -> Result<()>,
{
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

    let temp = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;

    {
        let file = temp.as_file();
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;
        writer
            .flush()
            .with_context(|| format!("Failed to flush {}", path.display()))?;
        drop(writer);

        file.sync_all()
            .with_context(|| format!("Failed to sync {}", path.display()))?;
    }

    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    Ok(())
}

/// Opens `path` for buffered reading; `None` if the file does not exist
pub fn open_if_exists(path: &Path) -> Result<Option<BufReader<File>>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to open {}", path.display()));
        }
    };

    Ok(Some(BufReader::new(file)))
}
