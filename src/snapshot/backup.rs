//! Snapshot backups with rotation.
//!
//! Each backup is a directory `backups/snapshot-<UTC timestamp>-<generation>/`
//! holding a copy of the pair that was about to be replaced. Names sort
//! chronologically, so "oldest" is simply "smallest name".

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use super::format::{self, MetadataFile, METADATA_FILE, VECTORS_FILE};

pub const BACKUPS_DIR: &str = "backups";
const BACKUP_PREFIX: &str = "snapshot-";

#[derive(Debug, Clone, Serialize)]
pub struct BackupInfo {
    pub name: String,
    pub path: PathBuf,
    /// Record count from the backed-up ledger; `None` if it cannot be read.
    pub records: Option<usize>,
}

/// Copy the current pair under `root` into a fresh backup directory.
///
/// Returns `None` when there is nothing to back up.
pub(crate) fn archive(root: &Path) -> io::Result<Option<PathBuf>> {
    let vectors = root.join(VECTORS_FILE);
    let metadata = root.join(METADATA_FILE);
    if !vectors.exists() && !metadata.exists() {
        return Ok(None);
    }

    let generation = fs::read(&vectors)
        .ok()
        .and_then(|bytes| format::decode_header(&bytes).ok())
        .map(|header| header.generation.to_string())
        .unwrap_or_else(|| "unknown".into());
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%6fZ");
    let dest = root
        .join(BACKUPS_DIR)
        .join(format!("{BACKUP_PREFIX}{stamp}-{generation}"));
    fs::create_dir_all(&dest)?;

    for (source, name) in [(&vectors, VECTORS_FILE), (&metadata, METADATA_FILE)] {
        if source.exists() {
            fs::copy(source, dest.join(name))?;
        }
    }
    tracing::debug!(backup = %dest.display(), "archived previous snapshot");
    Ok(Some(dest))
}

/// Backup directories under `root`, newest first.
fn backup_dirs(root: &Path) -> io::Result<Vec<PathBuf>> {
    let dir = root.join(BACKUPS_DIR);
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut dirs: Vec<PathBuf> = fs::read_dir(&dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(BACKUP_PREFIX))
        })
        .collect();
    dirs.sort();
    dirs.reverse();
    Ok(dirs)
}

/// Delete all but the `keep` newest backups. Returns how many were removed.
///
/// A directory that cannot be removed is logged and skipped.
pub(crate) fn rotate(root: &Path, keep: usize) -> io::Result<usize> {
    let dirs = backup_dirs(root)?;
    let mut removed = 0;
    for old in dirs.iter().skip(keep) {
        match fs::remove_dir_all(old) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!(
                backup = %old.display(),
                error = %e,
                "failed to remove old backup"
            ),
        }
    }
    if removed > 0 {
        tracing::debug!(removed, keep, "rotated snapshot backups");
    }
    Ok(removed)
}

fn info_for(path: PathBuf) -> BackupInfo {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let records = fs::read_to_string(path.join(METADATA_FILE))
        .ok()
        .and_then(|json| serde_json::from_str::<MetadataFile>(&json).ok())
        .map(|meta| meta.records.len());
    BackupInfo {
        name,
        path,
        records,
    }
}

/// List backups, newest first.
pub fn list(root: &Path) -> io::Result<Vec<BackupInfo>> {
    Ok(backup_dirs(root)?.into_iter().map(info_for).collect())
}

/// Find a backup by name, or the newest one when `name` is `None`.
pub fn find(root: &Path, name: Option<&str>) -> io::Result<Option<BackupInfo>> {
    let dirs = backup_dirs(root)?;
    let found = match name {
        Some(name) => dirs
            .into_iter()
            .find(|d| d.file_name().and_then(|n| n.to_str()) == Some(name)),
        None => dirs.into_iter().next(),
    };
    Ok(found.map(info_for))
}
